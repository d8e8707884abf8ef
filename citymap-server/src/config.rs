use citymap_core::source::DEFAULT_CACHE_ENTRIES;

use std::{env, path::PathBuf};

use anyhow::Context;

const SERVER_PORT_KEY: &str = "SERVER_PORT";
const OSM_PBF_KEY: &str = "CITYMAP_OSM_PBF";
const PREVIEW_DPI_KEY: &str = "CITYMAP_PREVIEW_DPI";
const CACHE_ENTRIES_KEY: &str = "CITYMAP_CACHE_ENTRIES";

const DEFAULT_PREVIEW_DPI: u32 = 72;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub server_port: String,
    pub osm_pbf: PathBuf,
    pub preview_dpi: u32,
    /// Geometry queries kept in memory, per query kind.
    pub cache_entries: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Config> {
        let server_port = load_env(SERVER_PORT_KEY)?;
        let osm_pbf = PathBuf::from(load_env(OSM_PBF_KEY)?);

        let preview_dpi = match env::var(PREVIEW_DPI_KEY) {
            Ok(raw) => parse_positive(PREVIEW_DPI_KEY, &raw)?,
            Err(_) => DEFAULT_PREVIEW_DPI,
        };
        let cache_entries = match env::var(CACHE_ENTRIES_KEY) {
            Ok(raw) => parse_positive(CACHE_ENTRIES_KEY, &raw)?,
            Err(_) => DEFAULT_CACHE_ENTRIES,
        };

        Ok(Config {
            server_port,
            osm_pbf,
            preview_dpi,
            cache_entries,
        })
    }
}

fn load_env(key: &str) -> anyhow::Result<String> {
    env::var(key).with_context(|| format!("failed to load environment variable {}", key))
}

fn parse_positive<T>(key: &str, raw: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr + PartialOrd + Default,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value: T = raw
        .trim()
        .parse()
        .with_context(|| format!("{} must be a whole number, got {:?}", key, raw))?;

    anyhow::ensure!(value > T::default(), "{} must be positive", key);

    Ok(value)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn numeric_settings_must_be_positive_integers() {
        assert_eq!(parse_positive::<u32>(PREVIEW_DPI_KEY, " 96 ").unwrap(), 96);
        assert!(parse_positive::<u32>(PREVIEW_DPI_KEY, "0").is_err());
        assert!(parse_positive::<u32>(PREVIEW_DPI_KEY, "72.5").is_err());
        assert!(parse_positive::<u32>(PREVIEW_DPI_KEY, "high").is_err());

        assert_eq!(parse_positive::<usize>(CACHE_ENTRIES_KEY, "256").unwrap(), 256);
        assert!(parse_positive::<usize>(CACHE_ENTRIES_KEY, "-1").is_err());
    }
}

mod config;
mod domain;
mod inbound;
mod outbound;

use citymap_core::source::{CachedSource, PbfSource};

use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::Config::from_env()?;

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    anyhow::ensure!(
        config.osm_pbf.is_file(),
        "OSM extract {} does not exist",
        config.osm_pbf.display()
    );

    // Neighbouring previews share most of their geometry.
    let source = Arc::new(CachedSource::with_capacity(
        PbfSource::new(&config.osm_pbf),
        config.cache_entries,
    ));

    let repository = outbound::repositories::NullRepository;
    let metrics = outbound::metrics::NullMetrics;
    let notifier = outbound::notifiers::NullNotifier;
    let preview_service = domain::service::Service::new(
        source,
        config.preview_dpi,
        repository,
        metrics,
        notifier,
    );

    let server_config = inbound::HttpServerConfig {
        port: &config.server_port,
    };
    let http_server = inbound::HttpServer::new(preview_service, server_config).await?;

    http_server.run().await
}

use super::{GeometrySource, RawArea, RawBuilding, RawEdge, RawWater};
use crate::types::{GeoBounds, GeoPoint};

use std::{
    collections::HashMap,
    hash::Hash,
    sync::{Arc, Mutex, PoisonError},
};

use anyhow::Result;
use tracing::{Level, event};

// Degrees are keyed at 1e-7 (about 1 cm), radii at 1 cm.
fn quantize_deg(value: f64) -> i64 {
    (value * 1e7).round() as i64
}

fn quantize_m(value: f64) -> i64 {
    (value * 100.0).round() as i64
}

type RoadKey = (i64, i64, i64);
type AreaKey = (i64, i64, i64, i64);

/// Entries kept per query kind unless another capacity is given.
pub const DEFAULT_CACHE_ENTRIES: usize = 64;

#[derive(Debug)]
struct Entry<V> {
    value: Arc<V>,
    last_used: u64,
}

/// Map bounded to `capacity` entries, evicting the least recently used one first.
#[derive(Debug)]
struct LruMap<K, V> {
    entries: HashMap<K, Entry<V>>,
    capacity: usize,
    clock: u64,
}

impl<K: Hash + Eq + Clone, V> LruMap<K, V> {
    fn new(capacity: usize) -> Self {
        LruMap {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            clock: 0,
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn get(&mut self, key: &K) -> Option<Arc<V>> {
        let now = self.tick();
        let entry = self.entries.get_mut(key)?;
        entry.last_used = now;
        Some(entry.value.clone())
    }

    /// Inserts `value` unless another fetch already did, returning how many entries were evicted.
    fn insert(&mut self, key: K, value: Arc<V>) -> usize {
        let now = self.tick();
        self.entries
            .entry(key)
            .and_modify(|entry| entry.last_used = now)
            .or_insert(Entry {
                value,
                last_used: now,
            });

        let mut evicted = 0;
        while self.entries.len() > self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| key.clone());

            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                    evicted += 1;
                }
                None => break,
            }
        }
        evicted
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }
}

/// Read-through cache in front of another [GeometrySource], keyed by the query.
///
/// A miss always fetches from the inner source; it never waits for another in-flight fetch of
/// the same key. Results are inserted whole, so readers never observe a partial entry. Each
/// query kind keeps at most `capacity` results and drops the least recently used beyond that.
#[derive(Debug)]
pub struct CachedSource<S> {
    inner: S,
    roads: Mutex<LruMap<RoadKey, Vec<RawEdge>>>,
    water: Mutex<LruMap<AreaKey, Vec<RawWater>>>,
    buildings: Mutex<LruMap<AreaKey, Vec<RawBuilding>>>,
}

impl<S: GeometrySource> CachedSource<S> {
    pub fn new(inner: S) -> Self {
        CachedSource::with_capacity(inner, DEFAULT_CACHE_ENTRIES)
    }

    pub fn with_capacity(inner: S, capacity: usize) -> Self {
        CachedSource {
            inner,
            roads: Mutex::new(LruMap::new(capacity)),
            water: Mutex::new(LruMap::new(capacity)),
            buildings: Mutex::new(LruMap::new(capacity)),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: GeometrySource> GeometrySource for CachedSource<S> {
    fn road_graph(&self, center: GeoPoint, radius_m: f64) -> Result<Vec<RawEdge>> {
        let key = (
            quantize_deg(center.lat),
            quantize_deg(center.lon),
            quantize_m(radius_m),
        );

        let cached = self
            .roads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key);
        if let Some(edges) = cached {
            event!(Level::DEBUG, "Road graph cache hit for {}", center);
            return Ok(edges.as_ref().clone());
        }

        let edges = Arc::new(self.inner.road_graph(center, radius_m)?);
        let evicted = self
            .roads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, edges.clone());
        if evicted > 0 {
            event!(Level::DEBUG, "Evicted {} road graphs", evicted);
        }

        Ok(edges.as_ref().clone())
    }

    fn water(&self, bounds: GeoBounds) -> Result<Vec<RawWater>> {
        cached_areas(&self.water, bounds, || self.inner.water(bounds))
    }

    fn buildings(&self, bounds: GeoBounds) -> Result<Vec<RawBuilding>> {
        cached_areas(&self.buildings, bounds, || self.inner.buildings(bounds))
    }
}

fn cached_areas(
    map: &Mutex<LruMap<AreaKey, Vec<RawArea>>>,
    bounds: GeoBounds,
    fetch: impl FnOnce() -> Result<Vec<RawArea>>,
) -> Result<Vec<RawArea>> {
    let key = (
        quantize_deg(bounds.lat_min),
        quantize_deg(bounds.lon_min),
        quantize_deg(bounds.lat_max),
        quantize_deg(bounds.lon_max),
    );

    let cached = map.lock().unwrap_or_else(PoisonError::into_inner).get(&key);
    if let Some(areas) = cached {
        return Ok(areas.as_ref().clone());
    }

    let areas = Arc::new(fetch()?);
    map.lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(key, areas.clone());

    Ok(areas.as_ref().clone())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::source::{MemorySource, bounds_around};

    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        inner: MemorySource,
        calls: AtomicUsize,
    }

    impl GeometrySource for CountingSource {
        fn road_graph(&self, center: GeoPoint, radius_m: f64) -> Result<Vec<RawEdge>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.road_graph(center, radius_m)
        }

        fn water(&self, bounds: GeoBounds) -> Result<Vec<RawWater>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.water(bounds)
        }

        fn buildings(&self, bounds: GeoBounds) -> Result<Vec<RawBuilding>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.buildings(bounds)
        }
    }

    #[test]
    fn repeated_queries_hit_the_cache() {
        let source = CachedSource::new(CountingSource {
            inner: MemorySource::default(),
            calls: AtomicUsize::new(0),
        });
        let center = GeoPoint::new(47.5, 19.04);

        source.road_graph(center, 1000.0).unwrap();
        source.road_graph(center, 1000.0).unwrap();
        source.water(bounds_around(center, 1000.0)).unwrap();
        source.water(bounds_around(center, 1000.0)).unwrap();
        source.buildings(bounds_around(center, 1000.0)).unwrap();
        source.buildings(bounds_around(center, 1000.0)).unwrap();
        assert_eq!(source.inner().calls.load(Ordering::SeqCst), 3);

        // A different extent is a different key.
        source.road_graph(center, 2000.0).unwrap();
        assert_eq!(source.inner().calls.load(Ordering::SeqCst), 4);
    }

    struct FailingSource;

    impl GeometrySource for FailingSource {
        fn road_graph(&self, _: GeoPoint, _: f64) -> Result<Vec<RawEdge>> {
            Err(anyhow::anyhow!("offline"))
        }

        fn water(&self, _: GeoBounds) -> Result<Vec<RawWater>> {
            Err(anyhow::anyhow!("offline"))
        }
    }

    #[test]
    fn failures_are_not_cached() {
        let source = CachedSource::new(FailingSource);
        let center = GeoPoint::new(0.0, 0.0);

        assert!(source.road_graph(center, 10.0).is_err());
        assert_eq!(source.roads.lock().unwrap().len(), 0);
    }

    #[test]
    fn least_recently_used_entries_are_evicted() {
        let source = CachedSource::with_capacity(
            CountingSource {
                inner: MemorySource::default(),
                calls: AtomicUsize::new(0),
            },
            2,
        );
        let calls = || source.inner().calls.load(Ordering::SeqCst);
        let key = |radius_m: f64| (quantize_deg(47.5), quantize_deg(19.04), quantize_m(radius_m));
        let center = GeoPoint::new(47.5, 19.04);

        source.road_graph(center, 1000.0).unwrap();
        source.road_graph(center, 2000.0).unwrap();
        // Touch the oldest entry so the second one becomes the eviction candidate.
        source.road_graph(center, 1000.0).unwrap();
        source.road_graph(center, 3000.0).unwrap();
        assert_eq!(calls(), 3);

        {
            let roads = source.roads.lock().unwrap();
            assert_eq!(roads.len(), 2);
            assert!(roads.contains(&key(1000.0)));
            assert!(!roads.contains(&key(2000.0)));
            assert!(roads.contains(&key(3000.0)));
        }

        source.road_graph(center, 1000.0).unwrap();
        assert_eq!(calls(), 3);
        source.road_graph(center, 2000.0).unwrap();
        assert_eq!(calls(), 4);
    }
}

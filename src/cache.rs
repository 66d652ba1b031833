use std::{fmt, fs, path::PathBuf, sync::Mutex};

use ahash::AHashMap;
use anyhow::Result;
use geo::MultiPolygon;
use sha2::{Digest, Sha256};

use crate::types::{PrefixRange, TowerId};

/// Deterministic content-derived key addressing a cached union result.
///
/// Derived from the sorted failed-tower id list and the prefix-range bounds
/// (or an "ALL" sentinel), so equal input sets produce equal fingerprints
/// regardless of supply order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of<'a>(
        failed: impl IntoIterator<Item = &'a TowerId>,
        prefix_range: Option<&PrefixRange>,
    ) -> Self {
        let mut ids: Vec<&str> = failed.into_iter().map(TowerId::as_str).collect();
        ids.sort_unstable();
        ids.dedup();

        let range_token = prefix_range.map_or_else(|| "ALL".to_string(), PrefixRange::cache_token);

        let mut hasher = Sha256::new();
        hasher.update(ids.join(",").as_bytes());
        hasher.update(b"|PREFIX:");
        hasher.update(range_token.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    #[inline]
    pub fn as_hex(&self) -> &str { &self.0 }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is plenty for logs and file names.
        f.write_str(&self.0[..16.min(self.0.len())])
    }
}

/// Backing store for cached coverage unions, addressed purely by fingerprint.
///
/// Entries are never invalidated: a changed underlying reference dataset with
/// the same fingerprint will silently return the outdated geometry. Writes are
/// whole-value replacements, so concurrent same-fingerprint writers race
/// benignly.
pub trait CoverageStore {
    fn get(&self, key: &Fingerprint) -> Option<MultiPolygon<f64>>;
    fn put(&self, key: &Fingerprint, value: &MultiPolygon<f64>);
}

/// In-memory store, for repeated runs within one process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<AHashMap<Fingerprint, MultiPolygon<f64>>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }
}

impl CoverageStore for MemoryStore {
    fn get(&self, key: &Fingerprint) -> Option<MultiPolygon<f64>> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn put(&self, key: &Fingerprint, value: &MultiPolygon<f64>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.clone(), value.clone());
        }
    }
}

/// On-disk store, one JSON geometry file per fingerprint.
///
/// Read and write failures degrade to cache misses with a warning; the store
/// never aborts a run.
#[derive(Debug)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn entry_path(&self, key: &Fingerprint) -> PathBuf {
        self.root.join(format!("live_union_{}.json", key.as_hex()))
    }
}

impl CoverageStore for DiskStore {
    fn get(&self, key: &Fingerprint) -> Option<MultiPolygon<f64>> {
        let path = self.entry_path(key);
        let text = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&text) {
            Ok(geom) => Some(geom),
            Err(err) => {
                log::warn!("discarding unreadable cache entry {}: {err}", path.display());
                None
            }
        }
    }

    fn put(&self, key: &Fingerprint, value: &MultiPolygon<f64>) {
        let path = self.entry_path(key);
        let write = || -> Result<()> {
            fs::create_dir_all(&self.root)?;
            let text = serde_json::to_string(value)?;
            fs::write(&path, text)?;
            Ok(())
        };
        if let Err(err) = write() {
            log::warn!("failed to persist cache entry {}: {err}", path.display());
        }
    }
}

/// Store that caches nothing; every lookup is a miss.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoStore;

impl CoverageStore for NoStore {
    fn get(&self, _key: &Fingerprint) -> Option<MultiPolygon<f64>> { None }
    fn put(&self, _key: &Fingerprint, _value: &MultiPolygon<f64>) {}
}

/// Return the stored geometry for `key`, or compute, persist and return it.
/// At most one computation per fingerprint per store.
pub fn get_or_compute<F>(
    store: &dyn CoverageStore,
    key: &Fingerprint,
    compute: F,
) -> Result<MultiPolygon<f64>>
where
    F: FnOnce() -> Result<MultiPolygon<f64>>,
{
    if let Some(hit) = store.get(key) {
        log::info!("reusing cached coverage union {key}");
        return Ok(hit);
    }
    let value = compute()?;
    store.put(key, &value);
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn sample_geom() -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0),
        ]])
    }

    fn ids(raw: &[&str]) -> Vec<TowerId> {
        raw.iter().map(|s| TowerId::new(s)).collect()
    }

    #[test]
    fn fingerprint_is_order_insensitive() {
        let a = Fingerprint::of(&ids(&["002-B", "001-A"]), None);
        let b = Fingerprint::of(&ids(&["001-A", "002-B"]), None);
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_distinguishes_sets_and_ranges() {
        let base = Fingerprint::of(&ids(&["001-A"]), None);
        assert_ne!(base, Fingerprint::of(&ids(&["001-A", "002-B"]), None));

        let range = PrefixRange::new("001", "010").unwrap();
        assert_ne!(base, Fingerprint::of(&ids(&["001-A"]), Some(&range)));

        let wider = PrefixRange::new("001", "020").unwrap();
        assert_ne!(
            Fingerprint::of(&ids(&["001-A"]), Some(&range)),
            Fingerprint::of(&ids(&["001-A"]), Some(&wider)),
        );
    }

    #[test]
    fn memory_store_computes_at_most_once() {
        let store = MemoryStore::new();
        let key = Fingerprint::of(&ids(&["001-A"]), None);

        let mut calls = 0;
        for _ in 0..2 {
            let out = get_or_compute(&store, &key, || {
                calls += 1;
                Ok(sample_geom())
            })
            .unwrap();
            assert_eq!(out, sample_geom());
        }
        assert_eq!(calls, 1);
    }

    #[test]
    fn disk_store_round_trips_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::new(dir.path());
        let key = Fingerprint::of(&ids(&["001-A", "003-C"]), None);

        assert!(store.get(&key).is_none());
        store.put(&key, &sample_geom());
        assert_eq!(store.get(&key), Some(sample_geom()));
    }

    #[test]
    fn no_store_always_recomputes() {
        let key = Fingerprint::of(&ids(&["001-A"]), None);
        let mut calls = 0;
        for _ in 0..2 {
            get_or_compute(&NoStore, &key, || {
                calls += 1;
                Ok(sample_geom())
            })
            .unwrap();
        }
        assert_eq!(calls, 2);
    }
}

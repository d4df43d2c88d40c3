// src/cache/mod.rs

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, RwLock,
    },
};
use tracing::{debug, info};

/// Parsed dataset plus the digest of the bytes it came from.
#[derive(Debug)]
pub struct CacheEntry<T> {
    pub digest: String,
    pub data: Arc<T>,
    pub loaded_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    /// Whole seconds since this entry was parsed.
    pub fn age_secs(&self) -> i64 {
        (Utc::now() - self.loaded_at).num_seconds()
    }
}

/// Thread-safe cache of source → parsed dataset. Entries are read-only once
/// stored; a changed source (different digest) is parsed again, and a failed
/// parse leaves the previous entry untouched.
pub struct DatasetCache<T> {
    map: RwLock<HashMap<String, Arc<CacheEntry<T>>>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl<T> Default for DatasetCache<T> {
    fn default() -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }
}

pub fn content_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

impl<T> DatasetCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the parsed form of `bytes` for `source`, parsing only when the
    /// digest differs from the stored one.
    pub fn load<F>(&self, source: &str, bytes: &[u8], parse: F) -> Result<Arc<T>>
    where
        F: FnOnce(&[u8]) -> Result<T>,
    {
        let digest = content_digest(bytes);
        if let Some(entry) = self.entry(source)? {
            if entry.digest == digest {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(source, age_secs = entry.age_secs(), "cache hit");
                return Ok(Arc::clone(&entry.data));
            }
            info!(source, old = %entry.digest, new = %digest, "source changed; reparsing");
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let data = Arc::new(parse(bytes)?);
        let entry = Arc::new(CacheEntry {
            digest,
            data: Arc::clone(&data),
            loaded_at: Utc::now(),
        });
        self.map
            .write()
            .map_err(|_| anyhow!("dataset cache lock poisoned"))?
            .insert(source.to_string(), entry);
        Ok(data)
    }

    /// The stored dataset for `source`, without any fetch or digest check.
    pub fn cached(&self, source: &str) -> Result<Option<Arc<T>>> {
        let Some(entry) = self.entry(source)? else {
            return Ok(None);
        };
        self.hits.fetch_add(1, Ordering::Relaxed);
        debug!(source, age_secs = entry.age_secs(), "serving cached load");
        Ok(Some(Arc::clone(&entry.data)))
    }

    pub fn entry(&self, source: &str) -> Result<Option<Arc<CacheEntry<T>>>> {
        let map = self
            .map
            .read()
            .map_err(|_| anyhow!("dataset cache lock poisoned"))?;
        Ok(map.get(source).cloned())
    }

    pub fn invalidate(&self, source: &str) -> Result<bool> {
        let mut map = self
            .map
            .write()
            .map_err(|_| anyhow!("dataset cache lock poisoned"))?;
        Ok(map.remove(source).is_some())
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn count_lines(calls: &Cell<usize>) -> impl FnOnce(&[u8]) -> Result<usize> + '_ {
        move |b| {
            calls.set(calls.get() + 1);
            Ok(b.iter().filter(|&&c| c == b'\n').count())
        }
    }

    #[test]
    fn same_bytes_parse_once() -> Result<()> {
        let cache = DatasetCache::new();
        let calls = Cell::new(0);
        let a = cache.load("st3", b"a\nb\n", count_lines(&calls))?;
        let b = cache.load("st3", b"a\nb\n", count_lines(&calls))?;
        assert_eq!((*a, *b), (2, 2));
        assert_eq!(calls.get(), 1);
        assert_eq!((cache.hits(), cache.misses()), (1, 1));
        assert!(Arc::ptr_eq(&a, &b));
        Ok(())
    }

    #[test]
    fn hits_keep_the_first_load_time() -> Result<()> {
        let cache: DatasetCache<usize> = DatasetCache::new();
        let before = Utc::now();
        cache.load("st3", b"a", |_| Ok(1))?;
        let first = cache.entry("st3")?.unwrap();
        assert!(first.loaded_at >= before);
        assert!(first.age_secs() >= 0);

        cache.load("st3", b"a", |_| Ok(2))?;
        assert_eq!(cache.entry("st3")?.unwrap().loaded_at, first.loaded_at);

        cache.load("st3", b"b", |_| Ok(3))?;
        assert!(cache.entry("st3")?.unwrap().loaded_at >= first.loaded_at);
        Ok(())
    }

    #[test]
    fn changed_bytes_reparse() -> Result<()> {
        let cache = DatasetCache::new();
        let calls = Cell::new(0);
        cache.load("st3", b"a\n", count_lines(&calls))?;
        let fresh = cache.load("st3", b"a\nb\nc\n", count_lines(&calls))?;
        assert_eq!(*fresh, 3);
        assert_eq!(calls.get(), 2);
        assert_eq!(*cache.cached("st3")?.unwrap(), 3);
        Ok(())
    }

    #[test]
    fn failed_parse_keeps_previous_entry() -> Result<()> {
        let cache: DatasetCache<usize> = DatasetCache::new();
        cache.load("st3", b"ok", |_| Ok(1))?;
        let err = cache.load("st3", b"broken", |_| Err(anyhow!("schema mismatch")));
        assert!(err.is_err());
        assert_eq!(*cache.cached("st3")?.unwrap(), 1);
        assert_eq!(cache.entry("st3")?.unwrap().digest, content_digest(b"ok"));
        Ok(())
    }

    #[test]
    fn sources_are_independent_and_invalidatable() -> Result<()> {
        let cache: DatasetCache<&str> = DatasetCache::new();
        cache.load("st3", b"x", |_| Ok("three"))?;
        cache.load("st53", b"x", |_| Ok("fifty-three"))?;
        assert_eq!(*cache.cached("st53")?.unwrap(), "fifty-three");
        assert!(cache.invalidate("st3")?);
        assert!(cache.cached("st3")?.is_none());
        assert!(!cache.invalidate("st3")?);
        Ok(())
    }
}

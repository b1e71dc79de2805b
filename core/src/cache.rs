//! Time-to-live stores for the sensor directory and the last result.
//!
//! The pipeline itself never touches a cache; drivers wrap their
//! retrieval in [`get_or_refresh`] with a store of their choosing.

use crate::telemetry::log::LogManager;
use std::time::{Duration, Instant};

#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error("cache I/O failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache entry is corrupt: {0}")]
    Corrupt(String),
}

/// A value read back from a store, with the time since it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    pub value: T,
    pub age: Duration,
}

pub trait TtlStore<T> {
    /// `Ok(None)` when nothing has been stored yet.
    fn read(&self) -> Result<Option<Cached<T>>, CacheError>;
    fn write(&mut self, value: &T) -> Result<(), CacheError>;
}

/// Returns the stored value when it is younger than `ttl`. Read failures count as a miss.
pub fn read_fresh<T, S>(store: &S, ttl: Duration) -> Option<T>
where
    S: TtlStore<T> + ?Sized,
{
    let logger = LogManager::new("cache");
    match store.read() {
        Ok(Some(cached)) if cached.age < ttl => {
            logger.detail(&format!("hit, age {}s", cached.age.as_secs()));
            Some(cached.value)
        }
        Ok(Some(cached)) => {
            logger.detail(&format!("stale, age {}s", cached.age.as_secs()));
            None
        }
        Ok(None) => None,
        Err(err) => {
            logger.warn(&format!("error reading cached value: {}", err));
            None
        }
    }
}

/// Serves a fresh cached value or runs `refresh` and stores its result.
/// A failed write is logged and does not discard the refreshed value.
pub fn get_or_refresh<T, E, S, F>(store: &mut S, ttl: Duration, refresh: F) -> Result<T, E>
where
    S: TtlStore<T> + ?Sized,
    F: FnOnce() -> Result<T, E>,
{
    if let Some(value) = read_fresh(store, ttl) {
        return Ok(value);
    }
    let value = refresh()?;
    if let Err(err) = store.write(&value) {
        LogManager::new("cache").warn(&format!("error writing cached value: {}", err));
    }
    Ok(value)
}

/// Process-local store, mainly for tests and embedding.
pub struct MemoryStore<T> {
    entry: Option<(T, Instant)>,
}

impl<T> MemoryStore<T> {
    pub fn new() -> Self {
        Self { entry: None }
    }
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> TtlStore<T> for MemoryStore<T> {
    fn read(&self) -> Result<Option<Cached<T>>, CacheError> {
        Ok(self.entry.as_ref().map(|(value, stored_at)| Cached {
            value: value.clone(),
            age: stored_at.elapsed(),
        }))
    }

    fn write(&mut self, value: &T) -> Result<(), CacheError> {
        self.entry = Some((value.clone(), Instant::now()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenStore;

    impl TtlStore<u32> for BrokenStore {
        fn read(&self) -> Result<Option<Cached<u32>>, CacheError> {
            Err(CacheError::Corrupt("unreadable".into()))
        }

        fn write(&mut self, _: &u32) -> Result<(), CacheError> {
            Err(CacheError::Corrupt("read-only".into()))
        }
    }

    #[test]
    fn refresh_runs_once_while_fresh() {
        let mut store = MemoryStore::new();
        let mut calls = 0;
        for _ in 0..3 {
            let value: Result<u32, ()> =
                get_or_refresh(&mut store, Duration::from_secs(60), || {
                    calls += 1;
                    Ok(7)
                });
            assert_eq!(value, Ok(7));
        }
        assert_eq!(calls, 1);
    }

    #[test]
    fn zero_ttl_always_refreshes() {
        let mut store = MemoryStore::new();
        store.write(&1u32).unwrap();
        assert_eq!(read_fresh(&store, Duration::ZERO), None);
        let value: Result<u32, ()> = get_or_refresh(&mut store, Duration::ZERO, || Ok(2));
        assert_eq!(value, Ok(2));
    }

    #[test]
    fn broken_store_degrades_to_refresh() {
        let mut store = BrokenStore;
        let value: Result<u32, ()> = get_or_refresh(&mut store, Duration::from_secs(60), || Ok(9));
        assert_eq!(value, Ok(9));
    }

    #[test]
    fn refresh_error_propagates() {
        let mut store: MemoryStore<u32> = MemoryStore::new();
        let value: Result<u32, &str> =
            get_or_refresh(&mut store, Duration::from_secs(60), || Err("offline"));
        assert_eq!(value, Err("offline"));
        assert!(store.read().unwrap().is_none());
    }
}

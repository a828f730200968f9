// src/cache.rs
//! Single-slot result cache with an absolute TTL and single-flight refresh.
//!
//! Readers that find a fresh entry never wait. When the entry is missing or stale,
//! exactly one caller runs the refresh; concurrent callers queue on the gate and then
//! re-check the slot, so they observe the value the leader just stored.
//! A queued caller with a deadline stops waiting when it passes and gets `Busy`.
//! Failed refreshes leave the slot untouched, as do values the caller marks
//! as not worth sharing.

use std::future::Future;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{timeout_at, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub produced: Instant,
}

impl<T> CacheEntry<T> {
    pub fn age(&self) -> Duration {
        self.produced.elapsed()
    }
}

/// Result of [`ResultCache::get_or_refresh`].
#[derive(Debug)]
pub enum Lookup<T, E> {
    /// Served from the slot without running the refresh.
    Hit { value: T, age: Duration },
    /// This call ran the refresh and stored the value.
    Refreshed(T),
    /// This call ran the refresh; the value was not shareable and was not stored.
    Uncached(T),
    /// The deadline passed while another caller held the refresh gate.
    Busy,
    /// This call ran the refresh and it failed; nothing was stored.
    Failed(E),
}

pub struct ResultCache<T> {
    ttl: Duration,
    slot: RwLock<Option<CacheEntry<T>>>,
    gate: Mutex<()>,
}

impl<T: Clone> ResultCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: RwLock::new(None),
            gate: Mutex::new(()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn read_slot(&self) -> RwLockReadGuard<'_, Option<CacheEntry<T>>> {
        match self.slot.read() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        }
    }

    fn write_slot(&self) -> RwLockWriteGuard<'_, Option<CacheEntry<T>>> {
        match self.slot.write() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        }
    }

    /// Clone of the entry if it is younger than the TTL.
    pub fn fresh(&self) -> Option<CacheEntry<T>> {
        let guard = self.read_slot();
        guard
            .as_ref()
            .filter(|e| e.age() < self.ttl)
            .cloned()
    }

    pub fn store(&self, value: T) {
        *self.write_slot() = Some(CacheEntry {
            value,
            produced: Instant::now(),
        });
    }

    pub fn clear(&self) {
        *self.write_slot() = None;
    }

    pub async fn get_or_refresh<F, Fut, E>(&self, refresh: F) -> Lookup<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.get_or_refresh_until(None, refresh, |_| true).await
    }

    /// Like [`get_or_refresh`](Self::get_or_refresh), but a queued caller gives up at
    /// `wait_until`, and a refreshed value is stored only when `shareable` accepts it.
    pub async fn get_or_refresh_until<F, Fut, E, S>(
        &self,
        wait_until: Option<Instant>,
        refresh: F,
        shareable: S,
    ) -> Lookup<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        S: FnOnce(&T) -> bool,
    {
        if let Some(hit) = self.fresh() {
            return Lookup::Hit {
                age: hit.age(),
                value: hit.value,
            };
        }

        let _leader = match wait_until {
            Some(end) => match timeout_at(end, self.gate.lock()).await {
                Ok(guard) => guard,
                Err(_) => {
                    debug!(target: "curation", "deadline passed waiting for concurrent refresh");
                    return Lookup::Busy;
                }
            },
            None => self.gate.lock().await,
        };

        // Another caller may have refreshed while we waited.
        if let Some(hit) = self.fresh() {
            debug!(target: "curation", "cache filled by concurrent refresh");
            return Lookup::Hit {
                age: hit.age(),
                value: hit.value,
            };
        }

        match refresh().await {
            Ok(value) if shareable(&value) => {
                self.store(value.clone());
                Lookup::Refreshed(value)
            }
            Ok(value) => Lookup::Uncached(value),
            Err(e) => Lookup::Failed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn hit_within_ttl_then_expire() {
        let cache = ResultCache::new(Duration::from_secs(1800));
        let calls = AtomicUsize::new(0);

        let first = cache
            .get_or_refresh(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ()>(1u32)
            })
            .await;
        assert!(matches!(first, Lookup::Refreshed(1)));

        tokio::time::advance(Duration::from_secs(60)).await;
        match cache.get_or_refresh(|| async { Ok::<_, ()>(2u32) }).await {
            Lookup::Hit { value, age } => {
                assert_eq!(value, 1);
                assert!(age >= Duration::from_secs(60));
            }
            other => panic!("expected hit, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(1800)).await;
        assert!(cache.fresh().is_none());
        let third = cache.get_or_refresh(|| async { Ok::<_, ()>(3u32) }).await;
        assert!(matches!(third, Lookup::Refreshed(3)));
    }

    #[tokio::test]
    async fn failure_is_not_stored() {
        let cache: ResultCache<u32> = ResultCache::new(Duration::from_secs(60));
        let out = cache.get_or_refresh(|| async { Err::<u32, _>("boom") }).await;
        assert!(matches!(out, Lookup::Failed("boom")));
        assert!(cache.fresh().is_none());

        cache.store(7);
        let out = cache.get_or_refresh(|| async { Err::<u32, _>("boom") }).await;
        assert!(matches!(out, Lookup::Hit { value: 7, .. }));
    }

    #[tokio::test]
    async fn clear_empties_slot() {
        let cache = ResultCache::new(Duration::from_secs(60));
        cache.store("x".to_string());
        assert!(cache.fresh().is_some());
        cache.clear();
        assert!(cache.fresh().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_refresh() {
        let cache = Arc::new(ResultCache::new(Duration::from_secs(60)));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            tasks.push(tokio::spawn(async move {
                cache
                    .get_or_refresh(|| async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok::<_, ()>(42u32)
                    })
                    .await
            }));
        }

        let mut refreshed = 0;
        for t in tasks {
            match t.await.unwrap() {
                Lookup::Refreshed(v) => {
                    refreshed += 1;
                    assert_eq!(v, 42);
                }
                Lookup::Hit { value, .. } => assert_eq!(value, 42),
                other => panic!("unexpected lookup {other:?}"),
            }
        }
        assert_eq!(refreshed, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn queued_caller_gives_up_at_its_deadline() {
        let cache = Arc::new(ResultCache::new(Duration::from_secs(60)));

        let leader = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get_or_refresh(|| async {
                        tokio::time::sleep(Duration::from_secs(20)).await;
                        Ok::<_, ()>(1u32)
                    })
                    .await
            })
        };
        // Let the leader take the gate.
        tokio::task::yield_now().await;

        let started = Instant::now();
        let end = started + Duration::from_millis(500);
        let out = cache
            .get_or_refresh_until(Some(end), || async { Ok::<_, ()>(2u32) }, |_| true)
            .await;
        assert!(matches!(out, Lookup::Busy), "got {out:?}");
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(500) && waited < Duration::from_secs(1));

        assert!(matches!(leader.await.unwrap(), Lookup::Refreshed(1)));
        assert_eq!(cache.fresh().map(|e| e.value), Some(1));
    }

    #[tokio::test]
    async fn unshareable_value_is_returned_but_not_stored() {
        let cache = ResultCache::new(Duration::from_secs(60));
        let out = cache
            .get_or_refresh_until(None, || async { Ok::<_, ()>(5u32) }, |v| *v != 5)
            .await;
        assert!(matches!(out, Lookup::Uncached(5)));
        assert!(cache.fresh().is_none());

        let out = cache
            .get_or_refresh_until(None, || async { Ok::<_, ()>(6u32) }, |v| *v != 5)
            .await;
        assert!(matches!(out, Lookup::Refreshed(6)));
        assert_eq!(cache.fresh().map(|e| e.value), Some(6));
    }
}

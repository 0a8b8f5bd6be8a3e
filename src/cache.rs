use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use moka::sync::Cache;
use moka::Expiry;
use tracing::trace;

use crate::model::entity::{Id, Points};
use crate::repository::{PlayerRepository, RepositoryError};

pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);
pub const DEFAULT_CAPACITY: u64 = 10_000;

pub trait ExpiringStore<K, V>: Send + Sync {
    fn get(&self, key: &K) -> Option<V>;
    fn set(&self, key: K, value: V, ttl: Duration);
}

#[derive(Clone)]
struct Timed<V> {
    value: V,
    ttl: Duration,
}

struct PerEntryTtl;

impl<K, V> Expiry<K, Timed<V>> for PerEntryTtl {
    fn expire_after_create(&self, _key: &K, entry: &Timed<V>, _created_at: Instant) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &K,
        entry: &Timed<V>,
        _updated_at: Instant,
        _remaining: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// Bounded moka cache where every `set` carries its own TTL, capped at [`MAX_TTL`].
pub struct MokaStore<K, V> {
    cache: Cache<K, Timed<V>>,
}

impl<K, V> MokaStore<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(max_entries: u64) -> MokaStore<K, V> {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(PerEntryTtl)
            .build();
        MokaStore { cache }
    }
}

impl<K, V> ExpiringStore<K, V> for MokaStore<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, key: &K) -> Option<V> {
        self.cache.get(key).map(|entry| entry.value)
    }

    fn set(&self, key: K, value: V, ttl: Duration) {
        self.cache.insert(key, Timed { value, ttl: ttl.min(MAX_TTL) });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Season point totals per player for the lifetime of one run.
///
/// Two tasks missing on the same id both compute and store; the second
/// write wins with an identical value.
pub struct PointsCache<S = MokaStore<Id, Points>> {
    store: S,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PointsCache {
    pub fn new(ttl: Duration) -> PointsCache {
        PointsCache::with_store(MokaStore::new(DEFAULT_CAPACITY), ttl)
    }
}

impl<S: ExpiringStore<Id, Points>> PointsCache<S> {
    pub fn with_store(store: S, ttl: Duration) -> PointsCache<S> {
        PointsCache {
            store,
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get_or_compute<R>(&self, repo: &R, player_id: Id) -> Result<Points, RepositoryError>
    where
        R: PlayerRepository + ?Sized,
    {
        if let Some(points) = self.store.get(&player_id) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(points);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let points: Points = repo
            .season_scores(player_id)?
            .iter()
            .map(|gameweek| gameweek.total_points)
            .sum();
        trace!(player_id, points, "season total computed");
        self.store.set(player_id, points, self.ttl);
        Ok(points)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

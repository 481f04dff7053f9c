use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::clock::{Clock, SystemClock};
use crate::model::{EventInfo, MatchEvent, PreMatchBundle, RankingEntry, YearlyStatRecord};

const RANKINGS_TTL_SECS: u64 = 300;
const MATCHES_TTL_SECS: u64 = 300;
const YEAR_STATS_TTL_SECS: u64 = 900;
const EVENT_DETAILS_TTL_SECS: u64 = 30;
const PRE_MATCH_TTL_SECS: u64 = 60;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    fetched_at: Instant,
}

/// One cache space: a capacity-less map whose entries go stale after `ttl`.
///
/// Stale entries are never swept; they are ignored on read and replaced on
/// the next fill. The lock is not held while a fetch runs, so two callers
/// missing the same key may both fetch; the last one to finish wins.
pub struct TtlCache<K, V> {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let entries = self.lock();
        let entry = entries.get(key)?;
        if now.saturating_duration_since(entry.fetched_at) < self.ttl {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    pub fn insert(&self, key: K, value: V) {
        let entry = CacheEntry {
            value,
            fetched_at: self.clock.now(),
        };
        self.lock().insert(key, entry);
    }

    pub fn get_or_fetch(&self, key: K, fetch: impl FnOnce() -> V) -> V {
        if let Some(value) = self.get(&key) {
            return value;
        }
        let value = fetch();
        self.insert(key, value.clone());
        value
    }

    /// Like [`get_or_fetch`](Self::get_or_fetch), but failed fetches are not stored.
    pub fn get_or_try_fetch(&self, key: K, fetch: impl FnOnce() -> Result<V>) -> Result<V> {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let value = fetch()?;
        self.insert(key, value.clone());
        Ok(value)
    }

    /// Number of stored entries, stale ones included.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, CacheEntry<V>>> {
        // A panic while holding the lock cannot leave the map half-written.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub rankings: Duration,
    pub matches: Duration,
    pub year_stats: Duration,
    pub event_details: Duration,
    pub pre_match: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            rankings: Duration::from_secs(RANKINGS_TTL_SECS),
            matches: Duration::from_secs(MATCHES_TTL_SECS),
            year_stats: Duration::from_secs(YEAR_STATS_TTL_SECS),
            event_details: Duration::from_secs(EVENT_DETAILS_TTL_SECS),
            pre_match: Duration::from_secs(PRE_MATCH_TTL_SECS),
        }
    }
}

/// The five independent cache spaces the aggregation pipeline reads through.
pub struct CacheSpaces {
    pub rankings: TtlCache<u64, Vec<RankingEntry>>,
    pub matches: TtlCache<u64, Vec<MatchEvent>>,
    pub year_stats: TtlCache<(u64, i32), Vec<YearlyStatRecord>>,
    pub event_details: TtlCache<u64, EventInfo>,
    pub pre_match: TtlCache<(u64, u64, u64), PreMatchBundle>,
}

impl CacheSpaces {
    pub fn new(ttls: CacheTtls, clock: Arc<dyn Clock>) -> Self {
        Self {
            rankings: TtlCache::new(ttls.rankings, clock.clone()),
            matches: TtlCache::new(ttls.matches, clock.clone()),
            year_stats: TtlCache::new(ttls.year_stats, clock.clone()),
            event_details: TtlCache::new(ttls.event_details, clock.clone()),
            pre_match: TtlCache::new(ttls.pre_match, clock),
        }
    }
}

impl Default for CacheSpaces {
    fn default() -> Self {
        Self::new(CacheTtls::default(), Arc::new(SystemClock))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::clock::ManualClock;

    fn cache_with_clock(ttl_secs: u64) -> (TtlCache<u64, String>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let cache = TtlCache::new(Duration::from_secs(ttl_secs), clock.clone() as Arc<dyn Clock>);
        (cache, clock)
    }

    #[test]
    fn hit_within_ttl_skips_fetch() {
        let (cache, clock) = cache_with_clock(300);
        let calls = Cell::new(0);
        let fetch = || {
            calls.set(calls.get() + 1);
            "X".to_string()
        };

        assert_eq!(cache.get_or_fetch(1, fetch), "X");
        clock.set_elapsed(Duration::from_secs(299));
        assert_eq!(cache.get_or_fetch(1, fetch), "X");
        assert_eq!(calls.get(), 1);

        clock.set_elapsed(Duration::from_secs(301));
        assert_eq!(cache.get_or_fetch(1, fetch), "X");
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn entry_is_stale_exactly_at_ttl() {
        let (cache, clock) = cache_with_clock(30);
        cache.insert(7, "a".to_string());
        clock.advance(Duration::from_secs(29));
        assert!(cache.get(&7).is_some());
        clock.advance(Duration::from_secs(1));
        assert!(cache.get(&7).is_none());
        // Lazy eviction: the stale entry is still stored until overwritten.
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failed_fetch_is_not_stored() {
        let (cache, _clock) = cache_with_clock(300);
        let err = cache.get_or_try_fetch(3, || Err(anyhow::anyhow!("upstream down")));
        assert!(err.is_err());
        assert!(cache.is_empty());

        let ok = cache.get_or_try_fetch(3, || Ok("fresh".to_string())).unwrap();
        assert_eq!(ok, "fresh");
        let again = cache
            .get_or_try_fetch(3, || Err(anyhow::anyhow!("should not be called")))
            .unwrap();
        assert_eq!(again, "fresh");
    }

    #[test]
    fn spaces_are_independent() {
        let clock = Arc::new(ManualClock::new());
        let spaces = CacheSpaces::new(CacheTtls::default(), clock.clone());
        spaces.rankings.insert(1, Vec::new());
        spaces.matches.insert(1, Vec::new());

        // 60s is past neither the rankings nor the matches TTL.
        clock.advance(Duration::from_secs(60));
        assert!(spaces.rankings.get(&1).is_some());
        assert!(spaces.year_stats.get(&(1, 2024)).is_none());
        assert_eq!(spaces.event_details.ttl(), Duration::from_secs(30));
        assert_eq!(spaces.year_stats.ttl(), Duration::from_secs(900));
    }
}

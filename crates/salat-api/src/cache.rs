//! In-memory response cache with a fixed time-to-live per entry.

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::methods::CalculationMethod;
use crate::types::{DateSpec, Place, PrayerTimes, QiblaResult};

pub const DEFAULT_TTL: Duration = Duration::from_secs(86_400);

/// Time source for expiry checks.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to. Used by tests.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub keys: usize,
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Key/value store where every entry expires `ttl` after its last `set`.
///
/// There is no capacity bound. Concurrent writers to one key are
/// last-write-wins.
pub struct TtlCache<K, V> {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<K, Entry<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + fmt::Debug,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a live entry. Expired entries are removed and count as misses.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if now < entry.expires_at => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.value.clone());
                }
                Some(_) => {}
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            }
        }

        let mut entries = self.entries.write();
        // Another writer may have refreshed it between the two locks.
        if let Some(entry) = entries.get(key) {
            if now < entry.expires_at {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
            tracing::debug!(?key, "Cache entry expired");
            entries.remove(key);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store `value`, restarting the TTL for `key`.
    pub fn set(&self, key: K, value: V) {
        let expires_at = self.clock.now() + self.ttl;
        self.entries.write().insert(key, Entry { value, expires_at });
    }

    /// Drop every entry and reset the counters.
    pub fn flush_all(&self) {
        self.entries.write().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            keys: self.len(),
        }
    }

    /// Number of stored entries, including ones that expired but were not read since.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tear the cache down, returning the final counters.
    pub fn dispose(self) -> CacheStats {
        let stats = self.stats();
        tracing::debug!(?stats, "Cache disposed");
        stats
    }
}

impl<K, V> fmt::Debug for TtlCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlCache")
            .field("ttl", &self.ttl)
            .field("entries", &self.entries.read().len())
            .finish()
    }
}

/// Normalized location part of a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PlaceKey {
    /// Bit patterns of the validated floats, with `-0.0` folded into `0.0`.
    Coordinates { latitude: u64, longitude: u64 },
    City {
        city: String,
        country: Option<String>,
    },
}

impl From<&Place> for PlaceKey {
    fn from(place: &Place) -> Self {
        match place {
            Place::Coordinates(c) => Self::Coordinates {
                latitude: (c.latitude + 0.0).to_bits(),
                longitude: (c.longitude + 0.0).to_bits(),
            },
            Place::City { city, country } => Self::City {
                city: city.clone(),
                country: country.clone(),
            },
        }
    }
}

/// Operation tag plus every normalized input that affects the result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Times {
        method: CalculationMethod,
        date: DateSpec,
        place: PlaceKey,
    },
    Qibla {
        place: PlaceKey,
    },
}

impl CacheKey {
    pub fn times(method: CalculationMethod, date: &DateSpec, place: &Place) -> Self {
        Self::Times {
            method,
            date: date.clone(),
            place: place.into(),
        }
    }

    pub fn qibla(place: &Place) -> Self {
        Self::Qibla {
            place: place.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    Times(PrayerTimes),
    Qibla(QiblaResult),
}

pub type ResponseCache = TtlCache<CacheKey, CachedValue>;

//! Prayer times and qibla direction for Salat.
//!
//! Wraps the Aladhan API behind allowlist validators, a TTL cache and a
//! host allowlist, plus a few geometry helpers that need no network.

pub mod cache;
pub mod client;
pub mod error;
pub mod geometry;
pub mod methods;
pub mod transport;
pub mod types;
pub mod validate;

pub use cache::{CacheStats, Clock, ManualClock, SystemClock, TtlCache};
pub use client::{PrayerClient, PrayerClientBuilder, DEFAULT_BASE_URL};
pub use error::{PrayerError, PrayerResult, TransportError};
pub use geometry::{direction_name, distance, distance_to_kaaba, KAABA};
pub use methods::CalculationMethod;
pub use transport::{ApiRequest, HttpTransport, Transport, ALLOWED_HOSTS};
pub use types::*;
pub use validate::ValidationError;

//! Aladhan API client: validation gate, cache, allowlist, response mapping.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;
use url::Url;

use crate::cache::{CacheKey, CacheStats, CachedValue, Clock, ResponseCache, SystemClock, DEFAULT_TTL};
use crate::error::{PrayerError, PrayerResult};
use crate::methods::CalculationMethod;
use crate::transport::{AllowList, ApiRequest, HttpTransport, Transport, TransportOptions};
use crate::types::{
    Coordinates, DateSpec, LocationQuery, Place, PrayerTimes, QiblaResult, ResolvedLocation,
    TimesMeta,
};
use crate::validate::{validate_date, validate_method};

pub const DEFAULT_BASE_URL: &str = "https://api.aladhan.com/v1";

#[derive(Debug, Deserialize)]
struct Envelope {
    code: u16,
    #[serde(default)]
    status: serde_json::Value,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct TimingsData {
    timings: ApiTimings,
    meta: ApiMeta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiTimings {
    fajr: String,
    sunrise: String,
    dhuhr: String,
    asr: String,
    maghrib: String,
    isha: String,
}

#[derive(Debug, Deserialize)]
struct ApiMeta {
    timezone: String,
    method: ApiMethod,
    #[serde(deserialize_with = "number_or_string")]
    latitude: f64,
    #[serde(deserialize_with = "number_or_string")]
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct ApiMethod {
    name: String,
}

#[derive(Debug, Deserialize)]
struct QiblaData {
    #[serde(deserialize_with = "number_or_string")]
    direction: f64,
}

/// The API is not consistent about quoting numbers.
fn number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// City and country are reported exactly as the caller gave them, whichever
/// lookup produced the times.
fn echo_location(mut times: PrayerTimes, location: &LocationQuery) -> PrayerTimes {
    times.meta.location.city = location.city.clone();
    times.meta.location.country = location.country.clone();
    times
}

pub struct PrayerClientBuilder {
    base_url: String,
    cache_ttl: Duration,
    transport: TransportOptions,
    clock: Arc<dyn Clock>,
    allow_list: AllowList,
}

impl Default for PrayerClientBuilder {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            cache_ttl: DEFAULT_TTL,
            transport: TransportOptions::default(),
            clock: Arc::new(SystemClock),
            allow_list: AllowList::default(),
        }
    }
}

impl PrayerClientBuilder {
    /// Base URL every endpoint is appended to. It is checked against the
    /// allowlist on every request, not here.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.transport.timeout = timeout;
        self
    }

    pub fn max_redirects(mut self, max_redirects: usize) -> Self {
        self.transport.max_redirects = max_redirects;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[cfg(test)]
    pub(crate) fn allow_list(mut self, allow_list: AllowList) -> Self {
        self.allow_list = allow_list;
        self
    }

    /// Build a client backed by the reqwest transport.
    pub fn build(self) -> PrayerResult<PrayerClient<HttpTransport>> {
        let transport = HttpTransport::with_allow_list(self.transport, &self.allow_list)?;
        Ok(self.build_with_transport(transport))
    }

    /// Build a client around any transport.
    pub fn build_with_transport<T: Transport>(self, transport: T) -> PrayerClient<T> {
        PrayerClient {
            transport: Arc::new(transport),
            cache: Arc::new(ResponseCache::with_clock(self.cache_ttl, self.clock)),
            base_url: self.base_url.trim_end_matches('/').to_string(),
            allow_list: self.allow_list,
        }
    }
}

/// Validated, cached client for prayer times and qibla direction.
///
/// Cloning is cheap; clones share the transport and the cache.
pub struct PrayerClient<T = HttpTransport> {
    transport: Arc<T>,
    cache: Arc<ResponseCache>,
    base_url: String,
    allow_list: AllowList,
}

impl<T> Clone for PrayerClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            cache: Arc::clone(&self.cache),
            base_url: self.base_url.clone(),
            allow_list: self.allow_list.clone(),
        }
    }
}

impl PrayerClient<HttpTransport> {
    /// Client with default settings against the public API.
    pub fn new() -> PrayerResult<Self> {
        PrayerClientBuilder::default().build()
    }

    pub fn builder() -> PrayerClientBuilder {
        PrayerClientBuilder::default()
    }
}

impl<T: Transport> PrayerClient<T> {
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Prayer times for one day at one location.
    ///
    /// `method` must be one of the 14 method names; `date` is `DD-MM-YYYY`
    /// and defaults to today.
    #[instrument(skip(self), level = "info")]
    pub async fn get_prayer_times(
        &self,
        location: &LocationQuery,
        method: &str,
        date: Option<&str>,
    ) -> PrayerResult<PrayerTimes> {
        let method = validate_method(method)?;
        let date = match date {
            Some(d) => validate_date(d)?,
            None => DateSpec::today(),
        };
        let place = location.resolve()?;

        let key = CacheKey::times(method, &date, &place);
        if let Some(CachedValue::Times(times)) = self.cache.get(&key) {
            tracing::debug!("Prayer times served from cache");
            return Ok(echo_location(times, location));
        }

        let request = match &place {
            Place::Coordinates(c) => self
                .request("timings")?
                .param("method", method.code())
                .param("date", &date)
                .param("latitude", c.latitude)
                .param("longitude", c.longitude),
            Place::City { city, country } => {
                let request = self
                    .request("timingsByCity")?
                    .param("method", method.code())
                    .param("date", &date)
                    .param("city", city);
                match country {
                    Some(country) => request.param("country", country),
                    None => request,
                }
            }
        };

        let data: TimingsData = self.fetch(&request).await?;
        let times = PrayerTimes {
            fajr: data.timings.fajr,
            sunrise: data.timings.sunrise,
            dhuhr: data.timings.dhuhr,
            asr: data.timings.asr,
            maghrib: data.timings.maghrib,
            isha: data.timings.isha,
            meta: TimesMeta {
                timezone: data.meta.timezone,
                method: data.meta.method.name,
                location: ResolvedLocation {
                    latitude: data.meta.latitude,
                    longitude: data.meta.longitude,
                    city: None,
                    country: None,
                },
            },
        };

        self.cache.set(key, CachedValue::Times(times.clone()));
        tracing::info!(timezone = %times.meta.timezone, "Fetched prayer times");
        Ok(echo_location(times, location))
    }

    /// Qibla bearing for a location.
    ///
    /// A city-only location is first resolved to coordinates through a
    /// prayer-times lookup with the default method.
    #[instrument(skip(self), level = "info")]
    pub async fn get_qibla_direction(&self, location: &LocationQuery) -> PrayerResult<QiblaResult> {
        let place = location.resolve()?;

        let key = CacheKey::qibla(&place);
        if let Some(CachedValue::Qibla(qibla)) = self.cache.get(&key) {
            tracing::debug!("Qibla direction served from cache");
            return Ok(qibla);
        }

        let coords: Coordinates = match &place {
            Place::Coordinates(c) => *c,
            Place::City { .. } => {
                let times = self
                    .get_prayer_times(location, CalculationMethod::default().name(), None)
                    .await?;
                times.meta.location.coordinates()
            }
        };

        let request = self.request(&format!("qibla/{}/{}", coords.latitude, coords.longitude))?;
        let data: QiblaData = self.fetch(&request).await?;

        let qibla = QiblaResult {
            direction: data.direction,
            latitude: coords.latitude,
            longitude: coords.longitude,
        };

        self.cache.set(key, CachedValue::Qibla(qibla));
        tracing::info!(direction = qibla.direction, "Fetched qibla direction");
        Ok(qibla)
    }

    /// The remote method catalog, as returned. Never cached.
    #[instrument(skip(self), level = "info")]
    pub async fn get_methods(&self) -> PrayerResult<serde_json::Value> {
        let request = self.request("methods")?;
        self.fetch(&request).await
    }

    /// Drop every cached response.
    pub fn clear_cache(&self) -> bool {
        self.cache.flush_all();
        tracing::info!("Prayer times cache cleared");
        true
    }

    pub fn get_cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Build the endpoint URL and enforce the allowlist on it.
    fn request(&self, endpoint: &str) -> PrayerResult<ApiRequest> {
        let raw = format!("{}/{}", self.base_url, endpoint);
        let url = Url::parse(&raw)
            .map_err(|e| PrayerError::security(format!("Invalid URL: {}", e)))?;
        self.allow_list.check(&url)?;
        Ok(ApiRequest::new(url))
    }

    /// Send, unwrap the `{code, status, data}` envelope, decode `data`.
    async fn fetch<D: DeserializeOwned>(&self, request: &ApiRequest) -> PrayerResult<D> {
        let body = self.transport.get_json(request).await?;

        let envelope: Envelope = serde_json::from_value(body)
            .map_err(|e| PrayerError::api(200, format!("Malformed response: {}", e)))?;

        if envelope.code != 200 {
            let status = match envelope.status {
                serde_json::Value::String(s) => s,
                serde_json::Value::Null => "Unknown error".to_string(),
                other => other.to_string(),
            };
            return Err(PrayerError::api(envelope.code, status));
        }

        serde_json::from_value(envelope.data)
            .map_err(|e| PrayerError::api(envelope.code, format!("Unexpected payload: {}", e)))
    }
}

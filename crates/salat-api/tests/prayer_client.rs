//! Integration tests for PrayerClient through its public API, using a
//! recording transport instead of the network.

use async_trait::async_trait;
use parking_lot::Mutex;
use salat_api::{
    direction_name, distance_to_kaaba, ApiRequest, LocationQuery, PrayerClient, PrayerError,
    PrayerResult, Transport, KAABA,
};

#[derive(Default)]
struct RecordingTransport {
    paths: Mutex<Vec<String>>,
}

impl RecordingTransport {
    fn paths(&self) -> Vec<String> {
        self.paths.lock().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn get_json(&self, request: &ApiRequest) -> PrayerResult<serde_json::Value> {
        let path = request.url.path().to_string();
        self.paths.lock().push(path.clone());

        if path.contains("/qibla/") {
            return Ok(serde_json::json!({
                "code": 200,
                "status": "OK",
                "data": { "direction": "0.0" }
            }));
        }
        Ok(serde_json::json!({
            "code": 200,
            "status": "OK",
            "data": {
                "timings": {
                    "Fajr": "04:45", "Sunrise": "06:01", "Dhuhr": "12:22",
                    "Asr": "15:46", "Maghrib": "18:43", "Isha": "20:13"
                },
                "meta": {
                    "latitude": 21.4225,
                    "longitude": 39.8262,
                    "timezone": "Asia/Riyadh",
                    "method": { "id": 3, "name": "Muslim World League" }
                }
            }
        }))
    }
}

#[tokio::test]
async fn test_identical_requests_hit_remote_once() {
    let client = PrayerClient::builder().build_with_transport(RecordingTransport::default());
    let location = LocationQuery::coordinates(21.4225, 39.8262);

    for _ in 0..3 {
        let times = client
            .get_prayer_times(&location, "MWL", Some("10-03-2025"))
            .await
            .unwrap();
        assert_eq!(times.fajr, "04:45");
    }

    assert_eq!(client.transport().paths().len(), 1);
    assert_eq!(client.get_cache_stats().hits, 2);

    client.clear_cache();
    client
        .get_prayer_times(&location, "MWL", Some("10-03-2025"))
        .await
        .unwrap();
    assert_eq!(client.transport().paths().len(), 2);
}

#[tokio::test]
async fn test_foreign_host_is_rejected_without_network() {
    let client = PrayerClient::builder()
        .base_url("https://prayer-times.example.org/v1")
        .build_with_transport(RecordingTransport::default());

    let result = client
        .get_prayer_times(&LocationQuery::city("Mecca"), "MWL", None)
        .await;

    assert!(matches!(result, Err(PrayerError::Security(_))));
    assert!(client.transport().paths().is_empty());
}

#[tokio::test]
async fn test_qibla_for_city_looks_up_times_first() {
    let client = PrayerClient::builder().build_with_transport(RecordingTransport::default());

    let qibla = client
        .get_qibla_direction(&LocationQuery::city("Mecca"))
        .await
        .unwrap();

    let paths = client.transport().paths();
    assert_eq!(paths.len(), 2);
    assert!(paths[0].ends_with("/timingsByCity"));
    assert!(paths[1].starts_with("/v1/qibla/"));
    assert_eq!(qibla.direction, 0.0);

    // Kaaba to itself.
    assert_eq!(distance_to_kaaba(KAABA).unwrap(), 0);
    assert_eq!(direction_name(qibla.direction).unwrap(), "N");
}

#[tokio::test]
async fn test_validation_errors_carry_field() {
    let client = PrayerClient::builder().build_with_transport(RecordingTransport::default());

    let err = client
        .get_prayer_times(&LocationQuery::coordinates(120.0, 0.0), "MWL", None)
        .await
        .unwrap_err();

    match err {
        PrayerError::Validation(e) => assert_eq!(e.field, "latitude"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(client.transport().paths().is_empty());
}

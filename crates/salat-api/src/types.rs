use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::validate::{self, ValidationError};

/// Latitude/longitude pair that has passed range validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Calendar date in `DD-MM-YYYY` form, as the API expects it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DateSpec(String);

impl DateSpec {
    /// Today's local date.
    pub fn today() -> Self {
        Self(Local::now().format("%d-%m-%Y").to_string())
    }

    pub(crate) fn from_validated(date: &str) -> Self {
        Self(date.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DateSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw, caller-supplied location. Nothing here has been validated yet.
///
/// When both coordinates and a city are present the coordinates win.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl LocationQuery {
    pub fn coordinates(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
            ..Self::default()
        }
    }

    pub fn city(city: impl Into<String>) -> Self {
        Self {
            city: Some(city.into()),
            ..Self::default()
        }
    }

    pub fn city_in(city: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            city: Some(city.into()),
            country: Some(country.into()),
            ..Self::default()
        }
    }

    /// Pick the representation and validate the fields it uses.
    pub fn resolve(&self) -> Result<Place, ValidationError> {
        if let (Some(lat), Some(lon)) = (self.latitude, self.longitude) {
            return validate::validate_coordinates(lat, lon).map(Place::Coordinates);
        }

        match self.city.as_deref() {
            Some(city) if !city.is_empty() => {
                let city = validate::validate_city(city)?;
                let country = self
                    .country
                    .as_deref()
                    .filter(|c| !c.is_empty())
                    .map(validate::validate_country)
                    .transpose()?;
                Ok(Place::City { city, country })
            }
            _ => Err(ValidationError::new(
                "location",
                "Invalid location: must provide either city or latitude/longitude",
            )),
        }
    }
}

/// A validated location in exactly one representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Place {
    Coordinates(Coordinates),
    City {
        city: String,
        country: Option<String>,
    },
}

/// Daily prayer times plus the metadata the API resolved them with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrayerTimes {
    pub fajr: String,
    pub sunrise: String,
    pub dhuhr: String,
    pub asr: String,
    pub maghrib: String,
    pub isha: String,
    pub meta: TimesMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimesMeta {
    pub timezone: String,
    /// Method name as reported by the API (its long form).
    pub method: String,
    pub location: ResolvedLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub city: Option<String>,
    pub country: Option<String>,
}

impl ResolvedLocation {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// Bearing towards the Kaaba from a point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QiblaResult {
    /// Degrees clockwise from true north, 0 to 360.
    pub direction: f64,
    pub latitude: f64,
    pub longitude: f64,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_coordinates_take_precedence_over_city() {
        let query = LocationQuery {
            latitude: Some(21.4225),
            longitude: Some(39.8262),
            city: Some("Paris".into()),
            country: Some("France".into()),
        };
        assert_eq!(
            query.resolve().unwrap(),
            Place::Coordinates(Coordinates {
                latitude: 21.4225,
                longitude: 39.8262
            })
        );
    }

    #[test]
    fn test_half_coordinates_fall_back_to_city() {
        let query = LocationQuery {
            latitude: Some(10.0),
            city: Some("Lyon".into()),
            ..LocationQuery::default()
        };
        assert!(matches!(query.resolve().unwrap(), Place::City { ref city, .. } if city == "Lyon"));
    }

    #[test]
    fn test_city_with_country() {
        let place = LocationQuery::city_in("Mecca", "Saudi Arabia").resolve().unwrap();
        assert_eq!(
            place,
            Place::City {
                city: "Mecca".into(),
                country: Some("Saudi Arabia".into())
            }
        );
    }

    #[test]
    fn test_empty_location_rejected() {
        let err = LocationQuery::default().resolve().unwrap_err();
        assert_eq!(err.field, "location");
        assert!(LocationQuery::city("").resolve().is_err());
    }

    #[test]
    fn test_invalid_fields_rejected() {
        assert!(LocationQuery::coordinates(100.0, 0.0).resolve().is_err());
        assert!(LocationQuery::city("Par1s").resolve().is_err());
        assert!(LocationQuery::city_in("Paris", "Fr4nce").resolve().is_err());
    }

    #[test]
    fn test_today_has_api_format() {
        let today = DateSpec::today();
        assert!(crate::validate::validate_date(today.as_str()).is_ok());
    }

    #[test]
    fn test_location_query_deserializes_partial_json() {
        let query: LocationQuery = serde_json::from_str(r#"{"city":"Mecca"}"#).unwrap();
        assert_eq!(query, LocationQuery::city("Mecca"));
    }
}

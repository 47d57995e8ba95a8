//! Great-circle distance and compass labels. No network involved.

use crate::types::Coordinates;
use crate::validate::{validate_coordinates, ValidationError, ValidationResult};

pub const KAABA: Coordinates = Coordinates {
    latitude: 21.4225,
    longitude: 39.8262,
};

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

const COMPASS_POINTS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

/// Haversine distance between two points, rounded to whole kilometres.
pub fn distance(from: Coordinates, to: Coordinates) -> ValidationResult<u32> {
    let a = validate_coordinates(from.latitude, from.longitude)?;
    let b = validate_coordinates(to.latitude, to.longitude)?;

    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    // Half the circumference is ~20015 km, well inside u32.
    Ok((EARTH_RADIUS_KM * c).round() as u32)
}

/// Distance from a point to the Kaaba.
pub fn distance_to_kaaba(from: Coordinates) -> ValidationResult<u32> {
    distance(from, KAABA)
}

/// 16-point compass label for a bearing in degrees.
///
/// Any finite input is accepted and wrapped into `[0, 360)`. Exact halfway
/// points round up: 11.25 is "NNE".
pub fn direction_name(degrees: f64) -> ValidationResult<&'static str> {
    if !degrees.is_finite() {
        return Err(ValidationError::new("degrees", "Invalid degrees value"));
    }
    let normalized = degrees.rem_euclid(360.0);
    let index = (normalized / 22.5).round() as usize % COMPASS_POINTS.len();
    Ok(COMPASS_POINTS[index])
}

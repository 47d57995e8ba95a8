//! Allowlist validators for every untrusted input.
//!
//! Each function takes one raw value and either returns a normalized value or
//! a [`ValidationError`]. Validators never perform I/O. Anything that ends up
//! in a query string, a log line, or an outbound message must pass through
//! exactly one of them.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::methods::CalculationMethod;
use crate::types::{Coordinates, DateSpec};

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_USERNAME_LEN: usize = 33;
pub const MAX_MESSAGE_LEN: usize = 4096;

// Letters (ASCII and Latin-1 accented), whitespace, hyphen, apostrophe.
#[allow(clippy::expect_used)]
static CITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z\x{C0}-\x{FF}\s'-]+$").expect("valid regex"));
#[allow(clippy::expect_used)]
static COUNTRY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z\s]+$").expect("valid regex"));
#[allow(clippy::expect_used)]
static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(0[1-9]|[12][0-9]|3[01])-(0[1-9]|1[0-2])-[0-9]{4}$").expect("valid regex")
});
#[allow(clippy::expect_used)]
static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([01][0-9]|2[0-3]):[0-5][0-9]$").expect("valid regex"));
#[allow(clippy::expect_used)]
static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@[a-zA-Z0-9_]+$").expect("valid regex"));
// Leading "+", then digits with the usual separators. Letters (vanity numbers) are refused.
#[allow(clippy::expect_used)]
static PHONE_CHARS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+[0-9][0-9 ().-]*$").expect("valid regex"));

/// An input rejected by one of the validators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }

    /// User-friendly error message for UI display.
    pub fn user_message(&self) -> String {
        format!("Invalid {}: {}", self.field, self.message)
    }
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Check latitude and longitude ranges.
pub fn validate_coordinates(latitude: f64, longitude: f64) -> ValidationResult<Coordinates> {
    if latitude.is_nan() || longitude.is_nan() {
        return Err(ValidationError::new(
            "coordinates",
            "Coordinates must be valid numbers",
        ));
    }
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(ValidationError::new(
            "latitude",
            "Latitude must be between -90 and 90",
        ));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(ValidationError::new(
            "longitude",
            "Longitude must be between -180 and 180",
        ));
    }
    Ok(Coordinates {
        latitude,
        longitude,
    })
}

/// Parse textual coordinates, then range-check them.
pub fn parse_coordinates(latitude: &str, longitude: &str) -> ValidationResult<Coordinates> {
    let lat = latitude.trim().parse::<f64>();
    let lon = longitude.trim().parse::<f64>();
    match (lat, lon) {
        (Ok(lat), Ok(lon)) => validate_coordinates(lat, lon),
        _ => Err(ValidationError::new(
            "coordinates",
            "Coordinates must be valid numbers",
        )),
    }
}

/// Validate a city name and return it trimmed and HTML-escaped.
pub fn validate_city(city: &str) -> ValidationResult<String> {
    validate_place_name("city", "City", city, &CITY_RE)
}

/// Validate a country name (plain ASCII letters and whitespace only).
pub fn validate_country(country: &str) -> ValidationResult<String> {
    validate_place_name("country", "Country", country, &COUNTRY_RE)
}

fn validate_place_name(
    field: &'static str,
    label: &str,
    value: &str,
    pattern: &Regex,
) -> ValidationResult<String> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, format!("Invalid {} name", field)));
    }
    if !pattern.is_match(value) {
        return Err(ValidationError::new(
            field,
            format!("{} name contains invalid characters", label),
        ));
    }
    if value.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::new(
            field,
            format!("{} name is too long (max {} characters)", label, MAX_NAME_LEN),
        ));
    }
    Ok(escape_html(value.trim()))
}

/// Accept exactly one of the known calculation method names.
pub fn validate_method(method: &str) -> ValidationResult<CalculationMethod> {
    method.parse()
}

/// Accept `DD-MM-YYYY` with day 01-31 and month 01-12.
///
/// Only the shape is checked: `31-02-2024` passes.
pub fn validate_date(date: &str) -> ValidationResult<DateSpec> {
    if !DATE_RE.is_match(date) {
        return Err(ValidationError::new(
            "date",
            "Date must be in DD-MM-YYYY format",
        ));
    }
    Ok(DateSpec::from_validated(date))
}

/// Accept `HH:mm`, 00:00 to 23:59.
pub fn validate_time(time: &str) -> ValidationResult<String> {
    if !TIME_RE.is_match(time) {
        return Err(ValidationError::new(
            "time",
            "Time must be in HH:mm format (00:00 to 23:59)",
        ));
    }
    Ok(time.to_string())
}

/// Validate an international mobile number such as `+33612345678`.
///
/// The number must carry its country code and be a valid mobile (or
/// mobile-capable, as in North America) number for that country.
pub fn validate_phone_number(phone: &str) -> ValidationResult<String> {
    if phone.is_empty() {
        return Err(ValidationError::new("phone", "Invalid phone number"));
    }
    if !phone.starts_with('+') {
        return Err(ValidationError::new(
            "phone",
            "Phone number must start with + (international format)",
        ));
    }
    if !PHONE_CHARS_RE.is_match(phone) {
        return Err(ValidationError::new("phone", "Invalid phone number format"));
    }

    let number = phonenumber::parse(None, phone)
        .map_err(|_| ValidationError::new("phone", "Invalid phone number format"))?;
    if !phonenumber::is_valid(&number) {
        return Err(ValidationError::new("phone", "Invalid phone number"));
    }
    match number.number_type(&phonenumber::metadata::DATABASE) {
        phonenumber::Type::Mobile | phonenumber::Type::FixedLineOrMobile => {
            Ok(phone.to_string())
        }
        _ => Err(ValidationError::new("phone", "Not a mobile phone number")),
    }
}

/// Validate a messaging handle such as `@salat_bot`.
pub fn validate_username(username: &str) -> ValidationResult<String> {
    if username.is_empty() {
        return Err(ValidationError::new("username", "Invalid username"));
    }
    if !username.starts_with('@') {
        return Err(ValidationError::new("username", "Username must start with @"));
    }
    if !USERNAME_RE.is_match(username) {
        return Err(ValidationError::new(
            "username",
            "Username contains invalid characters",
        ));
    }
    if username.len() > MAX_USERNAME_LEN {
        return Err(ValidationError::new(
            "username",
            format!(
                "Username is too long (max {} characters)",
                MAX_USERNAME_LEN - 1
            ),
        ));
    }
    Ok(username.to_string())
}

/// Destination of an outbound notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Recipient {
    Phone(String),
    Username(String),
}

impl Recipient {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Phone(s) | Self::Username(s) => s,
        }
    }
}

/// Dispatch on the leading `+` or `@`.
pub fn validate_recipient(recipient: &str) -> ValidationResult<Recipient> {
    if recipient.starts_with('+') {
        validate_phone_number(recipient).map(Recipient::Phone)
    } else if recipient.starts_with('@') {
        validate_username(recipient).map(Recipient::Username)
    } else {
        Err(ValidationError::new(
            "recipient",
            "Recipient must be a phone number (+...) or username (@...)",
        ))
    }
}

/// Check message length and strip ASCII control characters.
///
/// No escaping is applied; the delivery channel owns its own encoding.
pub fn validate_message(message: &str) -> ValidationResult<String> {
    if message.is_empty() {
        return Err(ValidationError::new("message", "Invalid message"));
    }
    if message.chars().count() > MAX_MESSAGE_LEN {
        return Err(ValidationError::new(
            "message",
            format!("Message is too long (max {} characters)", MAX_MESSAGE_LEN),
        ));
    }
    Ok(message
        .chars()
        .filter(|c| !matches!(*c, '\u{00}'..='\u{1F}' | '\u{7F}'))
        .collect())
}

/// Parse an integer and require `min <= value <= max`.
pub fn validate_integer(value: &str, min: i64, max: i64) -> ValidationResult<i64> {
    let num = value
        .trim()
        .parse::<i64>()
        .map_err(|_| ValidationError::new("integer", "Value must be a valid integer"))?;
    if num < min || num > max {
        return Err(ValidationError::new(
            "integer",
            format!("Value must be between {} and {}", min, max),
        ));
    }
    Ok(num)
}

/// Interface language for notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ar,
    Fr,
    En,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Ar => "ar",
            Self::Fr => "fr",
            Self::En => "en",
        }
    }
}

pub fn validate_language(lang: &str) -> ValidationResult<Language> {
    match lang {
        "ar" => Ok(Language::Ar),
        "fr" => Ok(Language::Fr),
        "en" => Ok(Language::En),
        _ => Err(ValidationError::new(
            "language",
            "Invalid language. Must be one of: ar, fr, en",
        )),
    }
}

/// Escape the characters HTML treats specially.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '/' => out.push_str("&#x2F;"),
            '\\' => out.push_str("&#x5C;"),
            '`' => out.push_str("&#96;"),
            _ => out.push(c),
        }
    }
    out
}

//! SQLite helper utilities for type conversion
//!
//! SQLite doesn't natively support UUIDs, arrays, or timestamps.
//! This module converts between Rust types and the TEXT/INTEGER columns used instead.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

// ============================================================================
// UUID Helpers
// ============================================================================

/// Convert a UUID to a SQLite-compatible string
#[inline]
pub fn uuid_to_str(id: Uuid) -> String {
    id.to_string()
}

/// Parse a SQLite string back to a UUID
#[inline]
pub fn str_to_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| anyhow!("Invalid UUID '{}': {}", s, e))
}

// ============================================================================
// JSON Helpers (stored as TEXT in SQLite)
// ============================================================================

/// Serialize any serializable value to a JSON string
#[inline]
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

/// Deserialize a JSON string to a value
#[inline]
pub fn from_json<T: DeserializeOwned>(s: &str) -> Result<T> {
    serde_json::from_str(s).map_err(|e| anyhow!("JSON parse error: {}", e))
}

/// Deserialize a JSON string from SQLite to a Vec (empty on invalid input)
#[inline]
pub fn json_to_vec<T: DeserializeOwned>(s: &str) -> Vec<T> {
    serde_json::from_str(s).unwrap_or_default()
}

// ============================================================================
// Timestamp Helpers (stored as RFC3339 TEXT in SQLite)
// ============================================================================

/// Get current UTC timestamp as an RFC3339 string for SQLite
#[inline]
pub fn now_iso8601() -> String {
    datetime_to_str(Utc::now())
}

/// Convert a chrono DateTime to an RFC3339 string.
///
/// Fixed microsecond precision keeps lexicographic order equal to time order.
#[inline]
pub fn datetime_to_str(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Parse an RFC3339 string to DateTime
#[inline]
pub fn str_to_datetime(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // SQLite's datetime() format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| ndt.and_utc())
                .map_err(|e| anyhow!("Invalid datetime '{}': {}", s, e))
        })
}

// ============================================================================
// Boolean Helpers (SQLite uses 0/1 integers)
// ============================================================================

/// Convert bool to SQLite integer (0 or 1)
#[inline]
pub fn bool_to_int(b: bool) -> i32 {
    if b { 1 } else { 0 }
}

/// Convert SQLite integer to bool
#[inline]
pub fn int_to_bool(i: i32) -> bool {
    i != 0
}

/// Wrap a conversion error for use inside `FromRow`
pub fn decode_error(e: anyhow::Error) -> sqlx::Error {
    sqlx::Error::Decode(e.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone};

    #[test]
    fn test_uuid_roundtrip() {
        let id = Uuid::new_v4();
        assert_eq!(str_to_uuid(&uuid_to_str(id)).unwrap(), id);
        assert!(str_to_uuid("not-a-uuid").is_err());
    }

    #[test]
    fn test_invalid_json_vec_is_empty() {
        let parsed: Vec<String> = json_to_vec("{not json");
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_datetime_strings_sort_chronologically() {
        let early = Utc.with_ymd_and_hms(2026, 1, 7, 9, 0, 0).unwrap();
        let late = early + chrono::Duration::microseconds(1500);
        let (a, b) = (datetime_to_str(early), datetime_to_str(late));
        assert!(a < b);
        assert_eq!(str_to_datetime(&b).unwrap(), late);
    }

    #[test]
    fn test_sqlite_datetime_format() {
        let parsed = str_to_datetime("2024-01-15 10:30:45").unwrap();
        assert_eq!(parsed.year(), 2024);
        assert_eq!(parsed.month(), 1);
        assert_eq!(parsed.day(), 15);
    }

    #[test]
    fn test_bool_conversion() {
        assert_eq!(bool_to_int(true), 1);
        assert!(int_to_bool(42));
        assert!(!int_to_bool(0));
    }
}

//! # Pagination Cursor
//!
//! A cursor is the creation timestamp of the last record of a page,
//! rendered as RFC 3339 with nanosecond precision and wrapped in unpadded
//! URL-safe base64 so it can travel in a query string untouched.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, SecondsFormat, Utc};

use crate::domain::{DomainError, DomainResult};

/// Encode a timestamp into an opaque cursor
pub fn encode_cursor(t: &DateTime<Utc>) -> String {
    let text = t.to_rfc3339_opts(SecondsFormat::Nanos, true);
    URL_SAFE_NO_PAD.encode(text)
}

/// Decode a cursor produced by [`encode_cursor`]
pub fn decode_cursor(token: &str) -> DomainResult<DateTime<Utc>> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|_| DomainError::BadParamInput)?;
    let text = String::from_utf8(bytes).map_err(|_| DomainError::BadParamInput)?;
    let parsed =
        DateTime::parse_from_rfc3339(&text).map_err(|_| DomainError::BadParamInput)?;
    Ok(parsed.with_timezone(&Utc))
}

/// Exclusive lower bound for a page fetch.
///
/// An empty cursor means "from the beginning".
pub fn lower_bound(cursor: &str) -> DomainResult<DateTime<Utc>> {
    if cursor.is_empty() {
        return Ok(DateTime::<Utc>::MIN_UTC);
    }
    decode_cursor(cursor)
}

/// Cursor for the following page, empty when the page came back short
pub fn next_cursor(page_len: usize, num: u32, last_created: Option<&DateTime<Utc>>) -> String {
    match last_created {
        Some(t) if page_len == num as usize => encode_cursor(t),
        _ => String::new(),
    }
}

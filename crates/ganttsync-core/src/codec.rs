//! Timestamp codec between epoch milliseconds and the backend's
//! `YYYY-MM-DD HH:MM:SS` local timestamp strings.
//!
//! The backend stores wall-clock local times with no zone marker, so every
//! conversion needs the client's UTC offset. The offset follows the browser
//! convention: the number of minutes to *add* to local time to obtain UTC
//! (UTC+3 is `-180`, UTC-5 is `300`).
//!
//! Sub-second precision is dropped on encode.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::ErrorCode;

/// `strftime` pattern of the backend timestamp columns.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const MILLIS_PER_MINUTE: i64 = 60_000;

/// Errors produced while encoding or decoding timestamps.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The epoch value cannot be represented as a calendar date.
    #[error("epoch value {0} ms is outside the representable date range")]
    OutOfRange(i64),
    /// The input string does not match [`TIMESTAMP_FORMAT`].
    #[error("invalid timestamp '{input}': {source}")]
    Malformed {
        input: String,
        source: chrono::ParseError,
    },
}

impl CodecError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::InvalidTimestamp
    }
}

/// Encode an epoch millisecond value as a local timestamp string.
///
/// # Errors
///
/// Returns [`CodecError::OutOfRange`] when the shifted value has no calendar
/// representation.
pub fn encode(epoch_millis: i64, local_offset_minutes: i32) -> Result<String, CodecError> {
    let shifted = epoch_millis
        .checked_sub(i64::from(local_offset_minutes) * MILLIS_PER_MINUTE)
        .ok_or(CodecError::OutOfRange(epoch_millis))?;
    let wall = DateTime::<Utc>::from_timestamp(shifted.div_euclid(1000), 0)
        .ok_or(CodecError::OutOfRange(epoch_millis))?;
    Ok(wall.naive_utc().format(TIMESTAMP_FORMAT).to_string())
}

/// Decode a local timestamp string into epoch milliseconds.
///
/// # Errors
///
/// Returns [`CodecError::Malformed`] when the string is not in
/// [`TIMESTAMP_FORMAT`].
pub fn decode(timestamp: &str, local_offset_minutes: i32) -> Result<i64, CodecError> {
    let wall = NaiveDateTime::parse_from_str(timestamp.trim(), TIMESTAMP_FORMAT).map_err(
        |source| CodecError::Malformed {
            input: timestamp.to_string(),
            source,
        },
    )?;
    let wall_millis = wall.and_utc().timestamp_millis();
    wall_millis
        .checked_add(i64::from(local_offset_minutes) * MILLIS_PER_MINUTE)
        .ok_or(CodecError::OutOfRange(wall_millis))
}

/// A codec bound to one UTC offset for the lifetime of an editing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampCodec {
    offset_minutes: i32,
}

impl TimestampCodec {
    #[must_use]
    pub const fn with_offset(offset_minutes: i32) -> Self {
        Self { offset_minutes }
    }

    /// Codec using the machine's current local offset.
    #[must_use]
    pub fn local() -> Self {
        let east_secs = chrono::Local::now().offset().local_minus_utc();
        Self::with_offset(-(east_secs / 60))
    }

    #[must_use]
    pub const fn offset_minutes(self) -> i32 {
        self.offset_minutes
    }

    /// See [`encode`].
    ///
    /// # Errors
    ///
    /// Propagates [`CodecError`] from [`encode`].
    pub fn encode(self, epoch_millis: i64) -> Result<String, CodecError> {
        encode(epoch_millis, self.offset_minutes)
    }

    /// See [`decode`].
    ///
    /// # Errors
    ///
    /// Propagates [`CodecError`] from [`decode`].
    pub fn decode(self, timestamp: &str) -> Result<i64, CodecError> {
        decode(timestamp, self.offset_minutes)
    }
}

impl Default for TimestampCodec {
    fn default() -> Self {
        Self::local()
    }
}

//! Destination-facing timestamps
//!
//! The destination accepts exactly one shape: `YYYY-MM-DDTHH:mm:ss.sssZ`,
//! UTC with three fractional digits.

use chrono::{DateTime, Duration, SecondsFormat, Utc};

/// Format a UTC instant for the destination platform.
pub fn format_destination_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current time in destination format.
pub fn destination_now() -> String {
    format_destination_timestamp(Utc::now())
}

/// Current time shifted forward by `offset`, in destination format.
pub fn destination_after(offset: Duration) -> String {
    format_destination_timestamp(Utc::now() + offset)
}

//! # Time handling
//!
//! Epochs are absolute instants ([`hifitime::Epoch`]); observations are stamped in UTC.
//! Intervals used by the propagation code are plain `f64` seconds obtained by
//! differencing two epochs, so leap seconds between them are accounted for by
//! `hifitime`.
use std::str::FromStr;

use hifitime::{Duration, Epoch, TimeScale, Unit};

use crate::cometfit_errors::CometFitError;
use crate::constants::{Seconds, DAYS_PER_JULIAN_CENTURY, SECONDS_PER_DAY};

/// Parse an ISO 8601 UTC timestamp (`YYYY-MM-DDTHH:MM:SS[.fff]`).
///
/// A string without an explicit time scale is interpreted as UTC.
pub fn parse_utc(date: &str) -> Result<Epoch, CometFitError> {
    Epoch::from_str(date.trim())
        .map_err(|e| CometFitError::Domain(format!("invalid UTC timestamp '{date}': {e}")))
}

/// Signed interval `to - from` in seconds.
pub fn seconds_between(from: &Epoch, to: &Epoch) -> Seconds {
    (*to - *from).to_seconds()
}

/// Signed interval `to - from` in days.
pub fn days_between(from: &Epoch, to: &Epoch) -> f64 {
    seconds_between(from, to) / SECONDS_PER_DAY
}

/// Shift an epoch by a signed number of seconds.
pub fn offset_seconds(epoch: &Epoch, seconds: Seconds) -> Epoch {
    *epoch + Duration::from_seconds(seconds)
}

/// Shift an epoch by a signed number of days.
pub fn offset_days(epoch: &Epoch, days: f64) -> Epoch {
    *epoch + Unit::Day * days
}

/// The J2000.0 reference epoch, 2000-01-01T12:00:00 TT (JD 2451545.0).
pub fn j2000() -> Epoch {
    Epoch::from_gregorian_hms(2000, 1, 1, 12, 0, 0, TimeScale::TT)
}

/// Julian centuries elapsed since J2000.0 (TT).
///
/// Computed from the duration since [`j2000`] rather than from a Julian date,
/// which keeps sub-millisecond resolution.
pub fn julian_centuries_since_j2000(epoch: &Epoch) -> f64 {
    days_between(&j2000(), epoch) / DAYS_PER_JULIAN_CENTURY
}

/// Format an epoch as an ISO 8601 UTC timestamp with millisecond precision,
/// e.g. `2024-03-01T12:00:00.000Z`.
pub fn format_utc(epoch: &Epoch) -> String {
    let (y, mo, d, h, mi, s, ns) = epoch.to_gregorian_utc();
    format!(
        "{y:04}-{mo:02}-{d:02}T{h:02}:{mi:02}:{s:02}.{:03}Z",
        ns / 1_000_000
    )
}

/// Integer key identifying an instant to nanosecond resolution, used to memoize
/// lookups by epoch.
pub(crate) fn epoch_key(epoch: &Epoch) -> i128 {
    epoch.to_tai_duration().total_nanoseconds()
}

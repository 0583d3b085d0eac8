//! Time normalization: zone-aware parsing and snapping to the 5-minute grid.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use super::SchedulingError;

pub const DEFAULT_TIMEZONE: &str = "Africa/Cairo";

/// Minutes between grid lines.
pub const GRID_MINUTES: i64 = 5;

const LOCAL_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Resolves an IANA zone name. Missing or blank names fall back to `default`.
pub fn resolve_zone(name: Option<&str>, default: Tz) -> Result<Tz, SchedulingError> {
    match name.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(default),
        Some(name) => name
            .parse::<Tz>()
            .map_err(|_| SchedulingError::validation(format!("unknown timezone: {name}"))),
    }
}

/// Parses a timestamp into an absolute instant.
///
/// RFC 3339 input carries its own offset and ignores `tz`. Local input
/// (`YYYY-MM-DDTHH:MM[:SS]`) is interpreted in `tz`; a local time skipped by a
/// DST transition is rejected and a repeated one resolves to the earlier instant.
pub fn parse_instant(raw: &str, tz: Tz) -> Result<DateTime<Utc>, SchedulingError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(SchedulingError::validation("timestamp is empty"));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = LOCAL_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
        .ok_or_else(|| SchedulingError::validation(format!("invalid timestamp: {raw}")))?;

    local_to_utc(naive, tz).ok_or_else(|| {
        SchedulingError::validation(format!("{raw} does not exist in {}", tz.name()))
    })
}

fn local_to_utc(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Start of `date` in `tz`. Zones that skip midnight start the day at the first valid hour.
pub fn start_of_day(date: NaiveDate, tz: Tz) -> Option<DateTime<Utc>> {
    let midnight = date.and_hms_opt(0, 0, 0)?;
    local_to_utc(midnight, tz)
        .or_else(|| local_to_utc(midnight.checked_add_signed(TimeDelta::hours(1))?, tz))
}

/// Drops seconds, then moves the minute to a multiple of 5:
/// remainder 0 stays, 1-2 rounds down, 3-4 rounds up.
/// `None` when the result falls outside chrono's representable range.
pub fn snap_to_grid(t: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let whole_minute = t
        .checked_sub_signed(TimeDelta::seconds(i64::from(t.second())))?
        .checked_sub_signed(TimeDelta::nanoseconds(i64::from(t.nanosecond())))?;

    let rem = i64::from(t.minute()) % GRID_MINUTES;
    if rem < 3 {
        whole_minute.checked_sub_signed(TimeDelta::minutes(rem))
    } else {
        whole_minute.checked_add_signed(TimeDelta::minutes(GRID_MINUTES - rem))
    }
}

/// `parse_instant` followed by `snap_to_grid`.
pub fn parse_snapped(raw: &str, tz: Tz) -> Result<DateTime<Utc>, SchedulingError> {
    snap_to_grid(parse_instant(raw, tz)?)
        .ok_or_else(|| SchedulingError::validation("timestamp out of range"))
}

/// Whole minutes between two instants, rounded to nearest.
pub fn duration_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let ms = (end - start).num_milliseconds();
    (ms + 30_000).div_euclid(60_000)
}

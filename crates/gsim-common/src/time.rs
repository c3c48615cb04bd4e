//! Frame timestamp encoding.
//!
//! Output files are named `{YYYYMMDD}_{seconds-of-day:05}.{microseconds:06}`
//! plus the format suffix. The seconds field counts from midnight UT.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimeParseError {
    #[error("filename stem too short for a timestamp: {0:?}")]
    TooShort(String),

    #[error("invalid date in filename stem {0:?}")]
    InvalidDate(String),

    #[error("invalid seconds-of-day in filename stem {0:?}")]
    InvalidSeconds(String),

    #[error("invalid time components: ymd {ymd:?}, UTsec {utsec}")]
    InvalidComponents { ymd: [i64; 3], utsec: f64 },
}

/// Filename stem for a frame at `time`, without suffix.
pub fn frame_stem(time: &DateTime<Utc>) -> String {
    let seconds = time.num_seconds_from_midnight();
    format!(
        "{}_{:05}.{:06}",
        time.format("%Y%m%d"),
        seconds,
        time.timestamp_subsec_micros()
    )
}

/// Parse the timestamp embedded in a frame filename (stem or full name).
///
/// Only the leading `YYYYMMDD` and the 12-character seconds field are
/// examined, matching how externally-produced filenames are keyed.
pub fn parse_frame_stem(name: &str) -> Result<DateTime<Utc>, TimeParseError> {
    if name.len() < 21 || name.as_bytes().get(8) != Some(&b'_') {
        return Err(TimeParseError::TooShort(name.to_string()));
    }

    let date = NaiveDate::parse_from_str(&name[..8], "%Y%m%d")
        .map_err(|_| TimeParseError::InvalidDate(name.to_string()))?;

    // Seconds-of-day with fractional microseconds, e.g. "32400.500000".
    let seconds: f64 = name[9..21]
        .parse()
        .map_err(|_| TimeParseError::InvalidSeconds(name.to_string()))?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(TimeParseError::InvalidSeconds(name.to_string()));
    }

    let midnight = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("midnight is valid"));
    Ok(midnight + Duration::microseconds((seconds * 1e6).round() as i64))
}

/// Split a timestamp into the on-disk `(year, month, day)` triple and
/// seconds since midnight UT.
pub fn to_ymd_utsec(time: &DateTime<Utc>) -> ([i64; 3], f64) {
    let ymd: [i64; 3] = [time.year() as i64, time.month() as i64, time.day() as i64];
    let utsec =
        time.num_seconds_from_midnight() as f64 + time.timestamp_subsec_micros() as f64 / 1e6;
    (ymd, utsec)
}

/// Rebuild a timestamp from the on-disk `(year, month, day)` triple and
/// seconds since midnight UT.
pub fn from_ymd_utsec(ymd: [i64; 3], utsec: f64) -> Result<DateTime<Utc>, TimeParseError> {
    if !utsec.is_finite() || utsec < 0.0 {
        return Err(TimeParseError::InvalidComponents { ymd, utsec });
    }
    let date = NaiveDate::from_ymd_opt(ymd[0] as i32, ymd[1] as u32, ymd[2] as u32)
        .ok_or(TimeParseError::InvalidComponents { ymd, utsec })?;
    let midnight = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("midnight is valid"));
    Ok(midnight + Duration::microseconds((utsec * 1e6).round() as i64))
}

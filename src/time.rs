//! Time and offset utilities
//!
//! Wearable timestamps arrive as UTC instants with a separate `±HH:MM`
//! offset string. Everything downstream works in the wearer's local wall
//! clock, expressed either as `HH:MM:SS` strings or as minutes from midnight.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Timelike, Utc};
use tracing::warn;

/// Minutes in a 24h clock day
pub const MINUTES_PER_DAY: i64 = 24 * 60;

/// Returned by the formatting helpers when their input is unusable
pub const PLACEHOLDER: &str = "--";

const MILLIS_PER_MINUTE: f64 = 60_000.0;

/// An instant decomposed into the wearer's local calendar date and clock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDateTime {
    /// The underlying instant (UTC)
    pub instant: DateTime<Utc>,
    /// Local date, YYYY-MM-DD
    pub date: String,
    /// Local clock time, HH:MM:SS
    pub time: String,
    pub minutes_from_midnight: u32,
}

/// A position on the 24h clock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockPosition {
    /// HH:MM:00
    pub time: String,
    /// Always in `0..1440`
    pub minutes: u32,
}

/// Parse an ISO-8601 instant. Timestamps without an explicit offset are
/// read as UTC.
pub fn parse_instant(iso: &str) -> Option<DateTime<Utc>> {
    let trimmed = iso.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Parse a strict `±HH:MM` offset string
pub fn parse_utc_offset(offset: &str) -> Option<FixedOffset> {
    let bytes = offset.as_bytes();
    if bytes.len() != 6 || bytes[3] != b':' {
        return None;
    }

    let sign = match bytes[0] {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };

    let digits = [bytes[1], bytes[2], bytes[4], bytes[5]];
    if !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }

    let hours = i32::from(bytes[1] - b'0') * 10 + i32::from(bytes[2] - b'0');
    let minutes = i32::from(bytes[4] - b'0') * 10 + i32::from(bytes[5] - b'0');
    if minutes > 59 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Decompose an instant into local date and clock time.
///
/// With no offset the instant is decomposed in UTC. A malformed offset also
/// falls back to UTC, with a warning. Returns `None` only when the instant
/// itself cannot be parsed.
pub fn parse_local_date_time(iso: &str, offset: Option<&str>) -> Option<LocalDateTime> {
    let instant = parse_instant(iso)?;

    let utc = FixedOffset::east_opt(0)?;
    let fixed = match offset.map(str::trim).filter(|raw| !raw.is_empty()) {
        None => utc,
        Some(raw) => match parse_utc_offset(raw) {
            Some(parsed) => parsed,
            None => {
                warn!(offset = raw, "Malformed timezone offset, falling back to UTC");
                utc
            }
        },
    };

    let local = instant.with_timezone(&fixed);

    Some(LocalDateTime {
        instant,
        date: local.format("%Y-%m-%d").to_string(),
        time: local.format("%H:%M:%S").to_string(),
        minutes_from_midnight: local.hour() * 60 + local.minute(),
    })
}

/// Move along the 24h clock, wrapping in either direction
pub fn advance_clock(minutes_from_midnight: i64, delta_minutes: i64) -> ClockPosition {
    let total = (minutes_from_midnight + delta_minutes).rem_euclid(MINUTES_PER_DAY) as u32;
    ClockPosition {
        time: clock_string(total),
        minutes: total,
    }
}

/// Render minutes from midnight as `HH:MM:00`
pub fn clock_string(minutes_from_midnight: u32) -> String {
    let minutes = minutes_from_midnight % MINUTES_PER_DAY as u32;
    format!("{:02}:{:02}:00", minutes / 60, minutes % 60)
}

/// Parse an `HH:MM` or `HH:MM:SS` clock string into minutes from midnight
pub fn parse_clock(clock: &str) -> Option<u32> {
    let mut parts = clock.split(':');
    let hours = parse_two_digits(parts.next()?)?;
    let minutes = parse_two_digits(parts.next()?)?;
    if let Some(seconds) = parts.next() {
        if parse_two_digits(seconds)? > 59 {
            return None;
        }
    }
    if parts.next().is_some() || hours > 23 || minutes > 59 {
        return None;
    }
    Some(hours * 60 + minutes)
}

fn parse_two_digits(part: &str) -> Option<u32> {
    if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

/// Convert milliseconds to whole minutes, rounding to nearest.
/// Non-positive input yields zero.
pub fn minutes_from_millis(millis: i64) -> u32 {
    if millis <= 0 {
        return 0;
    }
    (millis as f64 / MILLIS_PER_MINUTE).round() as u32
}

/// Format a duration as "7h 36m"
pub fn format_duration(minutes: i64) -> String {
    if minutes < 0 {
        return PLACEHOLDER.to_string();
    }
    format!("{}h {}m", minutes / 60, minutes % 60)
}

/// Format an `HH:MM[:SS]` clock as "11:47 PM"
pub fn format_time(time: &str) -> String {
    let Some(minutes) = parse_clock(time) else {
        return PLACEHOLDER.to_string();
    };
    let hours = minutes / 60;
    let period = if hours >= 12 { "PM" } else { "AM" };
    let display_hours = match hours % 12 {
        0 => 12,
        h => h,
    };
    format!("{}:{:02} {}", display_hours, minutes % 60, period)
}

/// Format an offset as a GMT label, e.g. "+08:00" → "GMT+8", "-04:30" → "GMT-4:30".
///
/// When the offset is missing or unusable, the offset suffix of `iso` is
/// tried instead ("Z" → "GMT+0").
pub fn format_timezone_label(offset: Option<&str>, iso: Option<&str>) -> String {
    if let Some(label) = offset.and_then(|raw| {
        let trimmed = raw.trim();
        let stripped = strip_prefix_ignore_case(trimmed, "UTC")
            .or_else(|| strip_prefix_ignore_case(trimmed, "GMT"))
            .unwrap_or(trimmed);
        let compact: String = stripped.chars().filter(|c| !c.is_whitespace()).collect();
        gmt_label(&compact)
    }) {
        return label;
    }

    if let Some(label) = iso.and_then(iso_offset_label) {
        return label;
    }

    PLACEHOLDER.to_string()
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        value.get(prefix.len()..)
    } else {
        None
    }
}

fn iso_offset_label(iso: &str) -> Option<String> {
    let iso = iso.trim();
    if iso.ends_with('Z') || iso.ends_with('z') {
        return Some("GMT+0".to_string());
    }
    // ±HH:MM or ±HHMM at the end, after the time part
    let time_part = iso.split_once('T')?.1;
    let sign_at = time_part.rfind(['+', '-'])?;
    gmt_label(&time_part[sign_at..])
}

/// Accepts `[±]HH[[:]MM]`
fn gmt_label(offset: &str) -> Option<String> {
    let (negative, rest) = match offset.as_bytes().first()? {
        b'+' => (false, &offset[1..]),
        b'-' => (true, &offset[1..]),
        _ => (false, offset),
    };

    let hours = parse_two_digits(rest.get(..2)?)?;
    let tail = rest.get(2..)?;
    let tail = tail.strip_prefix(':').unwrap_or(tail);
    let minutes = match tail {
        "" => 0,
        mm => parse_two_digits(mm)?,
    };

    let sign = if negative { '-' } else { '+' };
    Some(if minutes == 0 {
        format!("GMT{}{}", sign, hours)
    } else {
        format!("GMT{}{}:{:02}", sign, hours, minutes)
    })
}

/// Label a YYYY-MM-DD date relative to `today`: "Today", "Yesterday",
/// or "Mon, Oct 15"
pub fn format_date_label(date: &str, today: NaiveDate) -> String {
    let Ok(parsed) = NaiveDate::parse_from_str(date, "%Y-%m-%d") else {
        return PLACEHOLDER.to_string();
    };

    if parsed == today {
        "Today".to_string()
    } else if today.pred_opt() == Some(parsed) {
        "Yesterday".to_string()
    } else {
        parsed.format("%a, %b %-d").to_string()
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minutes since midnight.
pub type Min = u32;

const MINUTES_PER_DAY: Min = 24 * 60;

/// The 09:00–17:00 band a full-day booking occupies.
pub const FULL_DAY: Window = Window { start: 9 * 60, end: 17 * 60 };
/// Early out-of-hour band.
pub const MORNING_BAND: Window = Window { start: 8 * 60, end: 9 * 60 };
/// Late out-of-hour band.
pub const EVENING_BAND: Window = Window { start: 18 * 60, end: 20 * 60 };

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed time {value:?}: {reason}")]
pub struct MalformedTime {
    pub value: String,
    pub reason: &'static str,
}

impl MalformedTime {
    fn new(value: &str, reason: &'static str) -> Self {
        Self { value: value.to_string(), reason }
    }
}

/// Parse `"HH:MM"` into minutes since midnight.
///
/// Anything after the minutes is ignored as long as it starts like a seconds,
/// fraction or zone suffix (`:SS`, `.fff`, `Z`, `+hh`, `-hh`, or a space).
pub fn to_minutes(time: &str) -> Result<Min, MalformedTime> {
    let trimmed = time.trim();
    let (hours, rest) = trimmed
        .split_once(':')
        .ok_or_else(|| MalformedTime::new(time, "expected HH:MM"))?;

    if hours.is_empty() || hours.len() > 2 || !hours.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MalformedTime::new(time, "hours must be one or two digits"));
    }
    let minutes = rest
        .get(..2)
        .filter(|m| m.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| MalformedTime::new(time, "minutes must be two digits"))?;

    let suffix = &rest[2..];
    if let Some(c) = suffix.chars().next()
        && !matches!(c, ':' | '.' | 'Z' | 'z' | '+' | '-' | ' ')
    {
        return Err(MalformedTime::new(time, "unexpected trailing characters"));
    }

    // Both halves are all-digit and at most two characters, so parsing cannot fail.
    let h: Min = hours.parse().map_err(|_| MalformedTime::new(time, "bad hours"))?;
    let m: Min = minutes.parse().map_err(|_| MalformedTime::new(time, "bad minutes"))?;
    if h > 23 {
        return Err(MalformedTime::new(time, "hours out of range"));
    }
    if m > 59 {
        return Err(MalformedTime::new(time, "minutes out of range"));
    }
    Ok(h * 60 + m)
}

/// Like `to_minutes`, but also accepts midnight as `"24:00"`.
fn end_minutes(time: &str) -> Result<Min, MalformedTime> {
    match time.trim() {
        "24:00" | "24:00:00" => Ok(MINUTES_PER_DAY),
        _ => to_minutes(time),
    }
}

/// Half-open overlap test; touching edges do not overlap.
pub fn overlaps(a_start: Min, a_end: Min, b_start: Min, b_end: Min) -> bool {
    !(a_end <= b_start || a_start >= b_end)
}

/// True iff `[inner_start, inner_end)` lies within `[outer_start, outer_end)`.
pub fn contains(outer_start: Min, outer_end: Min, inner_start: Min, inner_end: Min) -> bool {
    inner_start >= outer_start && inner_end <= outer_end
}

/// Half-open interval `[start, end)` on a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    pub start: Min,
    pub end: Min,
}

impl Window {
    pub fn new(start: Min, end: Min) -> Self {
        debug_assert!(start < end, "Window start must be before end");
        debug_assert!(end <= MINUTES_PER_DAY, "Window must end by midnight");
        Self { start, end }
    }

    /// Parse a pair of stored time strings. `end` must come after `start`,
    /// and may be `"24:00"` for a window running up to midnight.
    pub fn parse(start: &str, end: &str) -> Result<Self, MalformedTime> {
        let s = to_minutes(start)?;
        let e = end_minutes(end)?;
        if e <= s {
            return Err(MalformedTime::new(end, "window end must be after start"));
        }
        Ok(Self { start: s, end: e })
    }

    pub fn overlaps(&self, other: &Window) -> bool {
        overlaps(self.start, self.end, other.start, other.end)
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_window(&self, other: &Window) -> bool {
        contains(self.start, self.end, other.start, other.end)
    }

    /// `"HH:MM"` rendering of the start bound, as written back to the store.
    pub fn start_hhmm(&self) -> String {
        hhmm(self.start)
    }

    pub fn end_hhmm(&self) -> String {
        hhmm(self.end)
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}–{}", hhmm(self.start), hhmm(self.end))
    }
}

fn hhmm(m: Min) -> String {
    format!("{:02}:{:02}", m / 60, m % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_suffixed_times() {
        assert_eq!(to_minutes("09:00"), Ok(540));
        assert_eq!(to_minutes("9:05"), Ok(545));
        assert_eq!(to_minutes("17:30:00"), Ok(1050));
        assert_eq!(to_minutes("08:15:00+00"), Ok(495));
        assert_eq!(to_minutes("23:59Z"), Ok(1439));
        assert_eq!(to_minutes("00:00"), Ok(0));
        assert_eq!(to_minutes(" 10:10 "), Ok(610));
    }

    #[test]
    fn rejects_malformed_times() {
        for bad in ["", "0900", "24:00", "12:60", "ab:cd", "12:5", "123:00", "12:30pm", ":30"] {
            assert!(to_minutes(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn malformed_time_carries_value() {
        let err = to_minutes("nine").unwrap_err();
        assert_eq!(err.value, "nine");
        assert!(err.to_string().contains("nine"));
    }

    #[test]
    fn overlap_is_half_open() {
        assert!(overlaps(540, 600, 590, 650));
        assert!(!overlaps(540, 600, 600, 660)); // touching
        assert!(!overlaps(600, 660, 540, 600));
        assert!(overlaps(540, 1020, 600, 610)); // nested
    }

    #[test]
    fn containment() {
        assert!(contains(540, 1020, 600, 650));
        assert!(!contains(540, 720, 690, 750));
        assert!(contains(540, 590, 540, 590)); // equal
    }

    #[test]
    fn window_parse_rejects_inverted() {
        assert!(Window::parse("10:00", "09:00").is_err());
        assert!(Window::parse("10:00", "10:00").is_err());
        assert_eq!(Window::parse("09:00", "09:50").unwrap(), Window::new(540, 590));
    }

    #[test]
    fn window_may_end_at_midnight() {
        let late = Window::parse("23:00", "24:00").unwrap();
        assert_eq!(late, Window::new(1380, 1440));
        assert_eq!(late.end_hhmm(), "24:00");
        assert_eq!(Window::parse(&late.start_hhmm(), &late.end_hhmm()), Ok(late));
        assert!(Window::parse("24:00", "24:00").is_err());
        assert!(Window::parse("23:00", "00:00").is_err());
    }

    #[test]
    fn window_display() {
        assert_eq!(Window::new(540, 590).to_string(), "09:00–09:50");
        assert_eq!(FULL_DAY.start_hhmm(), "09:00");
        assert_eq!(FULL_DAY.end_hhmm(), "17:00");
    }
}

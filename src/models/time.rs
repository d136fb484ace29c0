//! Wall-clock times, weekdays, and the venue/day overlap test that keeps a
//! timetable free of double bookings.
//!
//! Times are held as minutes since midnight. `HH:MM` strings compare the same
//! way lexicographically, so stores that keep the zero-padded text form can
//! push the overlap test down into a query.

use std::{fmt, str::FromStr};

use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::{CoreError, CoreResult};

const DAY_NAMES: [&str; 7] = [
    "Sunday", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday",
];

// ── ClockTime ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime(u16);

impl ClockTime {
    pub fn from_hm(hour: u16, minute: u16) -> CoreResult<Self> {
        if hour > 23 || minute > 59 {
            return Err(CoreError::InvalidInput(format!(
                "Invalid time {hour}:{minute:02}"
            )));
        }
        Ok(Self(hour * 60 + minute))
    }

    /// Minutes since midnight.
    pub fn minute_of_day(self) -> u16 {
        self.0
    }

    pub fn hour(self) -> u16 {
        self.0 / 60
    }

    pub fn minute(self) -> u16 {
        self.0 % 60
    }

    pub fn to_naive_time(self) -> NaiveTime {
        NaiveTime::from_hms_opt(u32::from(self.hour()), u32::from(self.minute()), 0)
            .unwrap_or_default()
    }

    /// The moment this time falls on `date`.
    pub fn on(self, date: NaiveDate) -> chrono::NaiveDateTime {
        date.and_time(self.to_naive_time())
    }
}

impl FromStr for ClockTime {
    type Err = CoreError;

    /// Accepts `H:MM` or `HH:MM` (24-hour).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidInput(format!("Time '{s}' must be in HH:MM format"));

        let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return Err(invalid());
        }
        if !h.bytes().chain(m.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let hour: u16 = h.parse().map_err(|_| invalid())?;
        let minute: u16 = m.parse().map_err(|_| invalid())?;
        Self::from_hm(hour, minute).map_err(|_| invalid())
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl Serialize for ClockTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClockTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ── TimeWindow ───────────────────────────────────────────────

/// Half-open `[start, end)` window within one day. Construction rejects
/// empty and inverted windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    #[serde(rename = "start_time")]
    start: ClockTime,
    #[serde(rename = "end_time")]
    end: ClockTime,
}

impl TimeWindow {
    pub fn new(start: ClockTime, end: ClockTime) -> CoreResult<Self> {
        if end <= start {
            return Err(CoreError::InvalidTimeRange);
        }
        Ok(Self { start, end })
    }

    pub fn parse(start: &str, end: &str) -> CoreResult<Self> {
        Self::new(start.parse()?, end.parse()?)
    }

    pub fn start(&self) -> ClockTime {
        self.start
    }

    pub fn end(&self) -> ClockTime {
        self.end
    }

    pub fn duration_minutes(&self) -> u32 {
        u32::from(self.end.0 - self.start.0)
    }

    pub fn intersects(&self, other: &TimeWindow) -> bool {
        self.start < other.end && self.end > other.start
    }
}

/// `(end_h*60 + end_m) - (start_h*60 + start_m)`; non-positive spans are an error.
pub fn duration_minutes(start: ClockTime, end: ClockTime) -> CoreResult<u32> {
    TimeWindow::new(start, end).map(|w| w.duration_minutes())
}

/// True iff both slots sit on the same day at the same venue and their
/// windows intersect.
pub fn overlaps(
    a_day: DayOfWeek,
    a_window: &TimeWindow,
    a_venue: &str,
    b_day: DayOfWeek,
    b_window: &TimeWindow,
    b_venue: &str,
) -> bool {
    a_day == b_day && a_venue == b_venue && a_window.intersects(b_window)
}

// ── DayOfWeek ────────────────────────────────────────────────

/// 0 = Sunday … 6 = Saturday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayOfWeek(u8);

impl DayOfWeek {
    pub const SUNDAY: Self = DayOfWeek(0);
    pub const MONDAY: Self = DayOfWeek(1);
    pub const TUESDAY: Self = DayOfWeek(2);
    pub const WEDNESDAY: Self = DayOfWeek(3);
    pub const THURSDAY: Self = DayOfWeek(4);
    pub const FRIDAY: Self = DayOfWeek(5);
    pub const SATURDAY: Self = DayOfWeek(6);

    pub fn new(value: u8) -> CoreResult<Self> {
        if value > 6 {
            return Err(CoreError::InvalidInput(
                "Day of week must be between 0 and 6".into(),
            ));
        }
        Ok(Self(value))
    }

    pub fn of(date: NaiveDate) -> Self {
        // num_days_from_sunday is always 0..=6
        Self(date.weekday().num_days_from_sunday() as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn name(self) -> &'static str {
        DAY_NAMES[usize::from(self.0 % 7)]
    }
}

impl Serialize for DayOfWeek {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.0)
    }
}

impl<'de> Deserialize<'de> for DayOfWeek {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = u8::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(start: &str, end: &str) -> TimeWindow {
        TimeWindow::parse(start, end).unwrap()
    }

    #[test]
    fn parses_and_pads_clock_times() {
        assert_eq!("9:05".parse::<ClockTime>().unwrap().to_string(), "09:05");
        assert_eq!("23:59".parse::<ClockTime>().unwrap().minute_of_day(), 23 * 60 + 59);
        assert!("24:00".parse::<ClockTime>().is_err());
        assert!("9:5".parse::<ClockTime>().is_err());
        assert!("nine".parse::<ClockTime>().is_err());
    }

    #[test]
    fn duration_is_end_minus_start() {
        let start = "09:15".parse().unwrap();
        let end = "10:45".parse().unwrap();
        assert_eq!(duration_minutes(start, end).unwrap(), 90);
    }

    #[test]
    fn empty_or_inverted_windows_are_rejected() {
        let nine = "09:00".parse().unwrap();
        let eight = "08:00".parse().unwrap();
        assert!(matches!(duration_minutes(nine, nine), Err(CoreError::InvalidTimeRange)));
        assert!(matches!(TimeWindow::new(nine, eight), Err(CoreError::InvalidTimeRange)));
    }

    #[test]
    fn overlap_requires_same_day_and_venue() {
        let a = window("09:00", "10:00");
        let b = window("09:30", "10:30");
        assert!(overlaps(DayOfWeek::MONDAY, &a, "Pool", DayOfWeek::MONDAY, &b, "Pool"));
        assert!(!overlaps(DayOfWeek::MONDAY, &a, "Pool", DayOfWeek::TUESDAY, &b, "Pool"));
        assert!(!overlaps(DayOfWeek::MONDAY, &a, "Pool", DayOfWeek::MONDAY, &b, "Studio"));
    }

    #[test]
    fn back_to_back_windows_do_not_overlap() {
        let a = window("09:00", "10:00");
        let b = window("10:00", "11:00");
        assert!(!a.intersects(&b));
        assert!(!b.intersects(&a));
    }

    #[test]
    fn overlap_is_symmetric() {
        let slots = [
            window("06:00", "07:00"),
            window("06:30", "06:45"),
            window("06:59", "08:00"),
            window("07:00", "07:30"),
            window("05:00", "09:00"),
        ];
        for a in &slots {
            for b in &slots {
                assert_eq!(
                    overlaps(DayOfWeek::FRIDAY, a, "Gym", DayOfWeek::FRIDAY, b, "Gym"),
                    overlaps(DayOfWeek::FRIDAY, b, "Gym", DayOfWeek::FRIDAY, a, "Gym"),
                );
            }
        }
    }

    #[test]
    fn weekday_numbering_starts_on_sunday() {
        let monday = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        assert_eq!(DayOfWeek::of(monday), DayOfWeek::MONDAY);
        assert_eq!(DayOfWeek::SUNDAY.name(), "Sunday");
        assert!(DayOfWeek::new(7).is_err());
    }
}

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::engine::EngineError;
use crate::tz;

pub type ListingId = Ulid;

/// Instants are always UTC; wall clocks are derived through a `Tz`.
pub type Instant = DateTime<Utc>;

/// Whether a slot was published for a whole day or a time-of-day window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    Day,
    Time,
}

/// Half-open bookable interval `[start, end)` with a seat capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: Instant,
    pub end: Instant,
    pub seats: u32,
    pub kind: SlotKind,
}

impl TimeSlot {
    pub fn new(start: Instant, end: Instant, seats: u32, kind: SlotKind) -> Self {
        debug_assert!(start < end, "TimeSlot start must be before end");
        Self {
            start,
            end,
            seats,
            kind,
        }
    }

    /// Checked constructor for data arriving from outside the crate.
    pub fn try_new(
        start: Instant,
        end: Instant,
        seats: u32,
        kind: SlotKind,
    ) -> Result<Self, EngineError> {
        if start >= end {
            return Err(EngineError::InvalidSlot { start, end });
        }
        Ok(Self::new(start, end, seats, kind))
    }

    pub fn is_bookable(&self) -> bool {
        self.seats > 0
    }

    pub fn overlaps(&self, start: Instant, end: Instant) -> bool {
        self.start < end && start < self.end
    }

    pub fn contains_instant(&self, t: Instant) -> bool {
        self.start <= t && t < self.end
    }
}

/// Booking granularity of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitType {
    Day,
    Night,
    Hour,
    Fixed,
}

impl UnitType {
    pub fn is_daily(self) -> bool {
        matches!(self, UnitType::Day | UnitType::Night)
    }

    pub fn is_time_based(self) -> bool {
        matches!(self, UnitType::Hour | UnitType::Fixed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UnitType::Day => "day",
            UnitType::Night => "night",
            UnitType::Hour => "hour",
            UnitType::Fixed => "fixed",
        }
    }
}

impl FromStr for UnitType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(UnitType::Day),
            "night" => Ok(UnitType::Night),
            "hour" => Ok(UnitType::Hour),
            "fixed" => Ok(UnitType::Fixed),
            _ => Err(EngineError::InvalidUnitType(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusedField {
    Start,
    End,
}

/// The customer's in-progress pick. Days are calendar days of the listing zone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub focused: Option<FocusedField>,
    /// Chosen instants for time-based bookings.
    #[serde(default)]
    pub start_time: Option<Instant>,
    #[serde(default)]
    pub end_time: Option<Instant>,
}

impl Selection {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_start(start: NaiveDate) -> Self {
        Self {
            start_date: Some(start),
            focused: Some(FocusedField::End),
            ..Self::default()
        }
    }

    pub fn with_end(end: NaiveDate) -> Self {
        Self {
            end_date: Some(end),
            focused: Some(FocusedField::Start),
            ..Self::default()
        }
    }

    pub fn with_range(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start_date: Some(start),
            end_date: Some(end),
            focused: None,
            ..Self::default()
        }
    }

    pub fn with_start_time(mut self, start_time: Instant) -> Self {
        self.start_time = Some(start_time);
        self
    }

    pub fn with_end_time(mut self, end_time: Instant) -> Self {
        self.end_time = Some(end_time);
        self
    }
}

/// Calendar month key, `"YYYY-MM"`. Ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthId {
    year: i32,
    month: u32,
}

impl MonthId {
    pub fn new(year: i32, month: u32) -> Result<Self, EngineError> {
        if !(1..=12).contains(&month) || NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(EngineError::InvalidMonthId(format!("{year:04}-{month:02}")));
        }
        Ok(Self { year, month })
    }

    /// Month containing `instant` on the listing's wall clock.
    pub fn of(instant: Instant, zone: Tz) -> Self {
        Self::from_date(tz::day_of(instant, zone))
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        // Validated at construction.
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn offset(&self, months: i32) -> Self {
        let first = self.first_day();
        let shifted = if months >= 0 {
            first.checked_add_months(Months::new(months as u32))
        } else {
            first.checked_sub_months(Months::new(months.unsigned_abs()))
        };
        Self::from_date(shifted.unwrap_or(first))
    }

    pub fn next(&self) -> Self {
        self.offset(1)
    }

    pub fn prev(&self) -> Self {
        self.offset(-1)
    }

    /// Every calendar day of the month.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let month = *self;
        self.first_day()
            .iter_days()
            .take_while(move |d| MonthId::from_date(*d) == month)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        Self::from_date(date) == *self
    }

    /// `[start of month, start of next month)` in `zone`.
    pub fn range(&self, zone: Tz) -> (Instant, Instant) {
        (
            tz::day_start(self.first_day(), zone),
            tz::day_start(self.next().first_day(), zone),
        )
    }
}

impl fmt::Display for MonthId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthId {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EngineError::InvalidMonthId(s.to_string());
        let (y, m) = s.split_once('-').ok_or_else(invalid)?;
        if y.len() != 4 || m.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = y.parse().map_err(|_| invalid())?;
        let month: u32 = m.parse().map_err(|_| invalid())?;
        MonthId::new(year, month).map_err(|_| invalid())
    }
}

impl Serialize for MonthId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MonthId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A selectable time of day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOption {
    pub timestamp: Instant,
    /// `HH:MM` on the listing's wall clock.
    pub label: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32) -> Instant {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn slot_basics() {
        let s = TimeSlot::new(utc(2024, 7, 1, 9), utc(2024, 7, 1, 18), 1, SlotKind::Time);
        assert!(s.contains_instant(utc(2024, 7, 1, 9)));
        assert!(!s.contains_instant(utc(2024, 7, 1, 18))); // half-open
        assert!(s.is_bookable());
        assert!(!s.overlaps(utc(2024, 7, 1, 18), utc(2024, 7, 1, 20)));
    }

    #[test]
    fn slot_try_new_rejects_inverted() {
        let err = TimeSlot::try_new(utc(2024, 7, 2, 0), utc(2024, 7, 1, 0), 1, SlotKind::Day);
        assert!(matches!(err, Err(EngineError::InvalidSlot { .. })));
    }

    #[test]
    fn month_id_parse_and_display() {
        let m: MonthId = "2024-07".parse().unwrap();
        assert_eq!(m.year(), 2024);
        assert_eq!(m.month(), 7);
        assert_eq!(m.to_string(), "2024-07");
        assert!("2024-13".parse::<MonthId>().is_err());
        assert!("2024-7".parse::<MonthId>().is_err());
        assert!("garbage".parse::<MonthId>().is_err());
    }

    #[test]
    fn month_id_arithmetic_and_order() {
        let dec: MonthId = "2024-12".parse().unwrap();
        assert_eq!(dec.next().to_string(), "2025-01");
        assert_eq!(dec.next().prev(), dec);
        assert_eq!(dec.offset(-12).to_string(), "2023-12");
        assert!(dec < dec.next());
        assert_eq!(dec.days().count(), 31);
        let feb: MonthId = "2024-02".parse().unwrap();
        assert_eq!(feb.days().count(), 29);
    }

    #[test]
    fn month_id_uses_listing_zone() {
        // 2024-07-31 23:30 UTC is already August in Helsinki.
        let t = Utc.with_ymd_and_hms(2024, 7, 31, 23, 30, 0).unwrap();
        assert_eq!(MonthId::of(t, chrono_tz::UTC).to_string(), "2024-07");
        assert_eq!(MonthId::of(t, chrono_tz::Europe::Helsinki).to_string(), "2024-08");
    }

    #[test]
    fn month_id_serde_as_string() {
        let m: MonthId = "2024-03".parse().unwrap();
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, "\"2024-03\"");
        let back: MonthId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn unit_type_parse() {
        assert_eq!("Night".parse::<UnitType>().unwrap(), UnitType::Night);
        assert!("week".parse::<UnitType>().is_err());
        assert!(UnitType::Hour.is_time_based());
        assert!(UnitType::Day.is_daily());
    }
}

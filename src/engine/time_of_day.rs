use std::collections::HashSet;

use chrono::{Days, Duration, NaiveDate, Timelike};
use chrono_tz::Tz;
use serde::Serialize;

use crate::limits::MAX_TIME_OPTIONS;
use crate::model::{Instant, TimeOption, TimeSlot};
use crate::tz;

use super::EngineError;

/// Spacing of selectable times, aligned on the listing's wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeStep(u32);

impl TimeStep {
    pub const HOUR: TimeStep = TimeStep(60);

    /// Accepts steps that divide an hour (15, 20, 30...) or are whole hours
    /// dividing a day.
    pub fn from_minutes(minutes: u32) -> Result<Self, EngineError> {
        let divides_hour = minutes > 0 && 60 % minutes == 0;
        let whole_hours = minutes > 0 && minutes % 60 == 0 && (24 * 60) % minutes == 0;
        if divides_hour || whole_hours {
            Ok(TimeStep(minutes))
        } else {
            Err(EngineError::InvalidTimeStep(minutes))
        }
    }

    pub fn minutes(self) -> u32 {
        self.0
    }

    pub fn duration(self) -> Duration {
        Duration::minutes(i64::from(self.0))
    }
}

impl Default for TimeStep {
    fn default() -> Self {
        TimeStep::HOUR
    }
}

/// Smallest step-aligned instant strictly after `t`.
fn next_boundary(t: Instant, zone: Tz, step: TimeStep) -> Instant {
    let local = t.with_timezone(&zone);
    let minute_of_day = local.hour() * 60 + local.minute();
    let into_step = minute_of_day % step.minutes();
    let floor = t
        - Duration::minutes(i64::from(into_step))
        - Duration::seconds(i64::from(local.second()))
        - Duration::nanoseconds(i64::from(local.nanosecond()));
    floor + step.duration()
}

/// Step boundaries strictly inside `(lo, hi)`.
fn boundaries_inside(lo: Instant, hi: Instant, zone: Tz, step: TimeStep) -> Vec<Instant> {
    let mut out = Vec::new();
    let mut t = next_boundary(lo, zone, step);
    while t < hi && out.len() < MAX_TIME_OPTIONS {
        out.push(t);
        t += step.duration();
    }
    out
}

/// Label an instant relative to `date`; the following midnight reads `24:00`.
fn option_for(t: Instant, date: NaiveDate, zone: Tz) -> TimeOption {
    let label = if t == tz::day_start(date + Days::new(1), zone) {
        "24:00".to_string()
    } else {
        tz::format_hhmm(t, zone)
    };
    TimeOption {
        timestamp: t,
        label,
    }
}

/// Selectable start instants `[lo, hi)`: the window start plus every
/// step boundary before `hi`.
fn start_instants(lo: Instant, hi: Instant, zone: Tz, step: TimeStep) -> Vec<Instant> {
    if lo >= hi {
        return Vec::new();
    }
    let mut out = vec![lo];
    out.extend(boundaries_inside(lo, hi, zone, step));
    out
}

/// Slot clipped to calendar day `date`. `None` if they do not intersect.
fn clip_to_day(slot: &TimeSlot, date: NaiveDate, zone: Tz) -> Option<(Instant, Instant)> {
    let (day_start, next_day) = tz::day_bounds(date, zone);
    let lo = slot.start.max(day_start);
    let hi = slot.end.min(next_day);
    (lo < hi).then_some((lo, hi))
}

pub fn slot_containing(slots: &[TimeSlot], t: Instant) -> Option<&TimeSlot> {
    slots
        .iter()
        .find(|s| s.is_bookable() && s.contains_instant(t))
}

/// Start times offered on `date`, concatenated across the bookable slots
/// touching it.
pub fn available_start_times(
    date: NaiveDate,
    slots_on_date: &[TimeSlot],
    zone: Tz,
    step: TimeStep,
) -> Vec<TimeOption> {
    let mut seen = HashSet::new();
    let mut options = Vec::new();
    for slot in slots_on_date.iter().filter(|s| s.is_bookable()) {
        let Some((lo, hi)) = clip_to_day(slot, date, zone) else {
            continue;
        };
        for t in start_instants(lo, hi, zone, step) {
            if seen.insert(t) {
                options.push(option_for(t, date, zone));
            }
        }
    }
    options
}

/// End times for a booking starting at `start_time` inside `slot` and
/// ending on `end_date`. Window is `(lo, hi]`.
pub fn available_end_times(
    start_time: Instant,
    end_date: NaiveDate,
    slot: &TimeSlot,
    zone: Tz,
    step: TimeStep,
) -> Vec<TimeOption> {
    let start_date = tz::day_of(start_time, zone);
    if end_date < start_date {
        return Vec::new();
    }
    let (lo, hi) = if end_date == start_date {
        let next_day = tz::day_start(start_date + Days::new(1), zone);
        (start_time, slot.end.min(next_day))
    } else {
        let (end_day_start, following) = tz::day_bounds(end_date, zone);
        let hi = if slot.end <= following {
            slot.end
        } else {
            following
        };
        (end_day_start, hi)
    };
    if lo >= hi {
        return Vec::new();
    }
    let mut instants = boundaries_inside(lo, hi, zone, step);
    instants.push(hi);
    instants
        .into_iter()
        .map(|t| option_for(t, end_date, zone))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefaultTimes {
    pub start: TimeOption,
    pub end_date: NaiveDate,
    pub end: TimeOption,
}

/// Implicit pick used before the customer touches the time selects: the
/// first start time of the day and the first end time after it.
pub fn default_booking_times(
    date: NaiveDate,
    slots_on_date: &[TimeSlot],
    zone: Tz,
    step: TimeStep,
) -> Option<DefaultTimes> {
    let start = available_start_times(date, slots_on_date, zone, step)
        .into_iter()
        .next()?;
    let slot = slot_containing(slots_on_date, start.timestamp)?;
    let end = available_end_times(start.timestamp, date, slot, zone, step)
        .into_iter()
        .next()?;
    Some(DefaultTimes {
        start,
        end_date: date,
        end,
    })
}

/// Start times for fixed-length bookings: only starts whose whole
/// `duration` fits inside the same slot.
pub fn fixed_start_times(
    date: NaiveDate,
    slots_on_date: &[TimeSlot],
    zone: Tz,
    step: TimeStep,
    duration: Duration,
) -> Vec<TimeOption> {
    let mut seen = HashSet::new();
    let mut options = Vec::new();
    for slot in slots_on_date.iter().filter(|s| s.is_bookable()) {
        let Some((lo, hi)) = clip_to_day(slot, date, zone) else {
            continue;
        };
        for t in start_instants(lo, hi, zone, step) {
            if t + duration <= slot.end && seen.insert(t) {
                options.push(option_for(t, date, zone));
            }
        }
    }
    options
}

pub fn fixed_end_time(start_time: Instant, duration: Duration, zone: Tz) -> TimeOption {
    let end = start_time + duration;
    let end_date = tz::day_of(end - Duration::nanoseconds(1), zone);
    option_for(end, end_date, zone)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SlotKind;
    use chrono::{TimeZone, Utc};
    use chrono_tz::Europe;

    fn at(d: u32, h: u32, m: u32) -> Instant {
        Utc.with_ymd_and_hms(2024, 7, d, h, m, 0).unwrap()
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, d).unwrap()
    }

    fn slot(start: Instant, end: Instant) -> TimeSlot {
        TimeSlot::new(start, end, 1, SlotKind::Time)
    }

    fn labels(options: &[TimeOption]) -> Vec<&str> {
        options.iter().map(|o| o.label.as_str()).collect()
    }

    #[test]
    fn time_step_validation() {
        assert!(TimeStep::from_minutes(15).is_ok());
        assert!(TimeStep::from_minutes(120).is_ok());
        assert!(TimeStep::from_minutes(0).is_err());
        assert!(TimeStep::from_minutes(45).is_err());
        assert!(TimeStep::from_minutes(300).is_err());
    }

    #[test]
    fn start_times_hourly_exclude_slot_end() {
        let s = slot(at(10, 9, 0), at(10, 18, 0));
        let options = available_start_times(date(10), &[s], chrono_tz::UTC, TimeStep::HOUR);
        assert_eq!(
            labels(&options),
            vec!["09:00", "10:00", "11:00", "12:00", "13:00", "14:00", "15:00", "16:00", "17:00"]
        );
    }

    #[test]
    fn end_times_same_day_after_start() {
        let s = slot(at(10, 9, 0), at(10, 18, 0));
        let options =
            available_end_times(at(10, 14, 0), date(10), &s, chrono_tz::UTC, TimeStep::HOUR);
        assert_eq!(labels(&options), vec!["15:00", "16:00", "17:00", "18:00"]);
    }

    #[test]
    fn unaligned_slot_start_is_offered() {
        let s = slot(at(10, 9, 30), at(10, 12, 0));
        let options = available_start_times(date(10), &[s], chrono_tz::UTC, TimeStep::HOUR);
        assert_eq!(labels(&options), vec!["09:30", "10:00", "11:00"]);
        let half = TimeStep::from_minutes(30).unwrap();
        let options = available_start_times(date(10), &[s], chrono_tz::UTC, half);
        assert_eq!(labels(&options), vec!["09:30", "10:00", "10:30", "11:00", "11:30"]);
    }

    #[test]
    fn start_times_clip_multi_day_slot() {
        let s = slot(at(10, 20, 0), at(12, 3, 0));
        let first = available_start_times(date(10), &[s], chrono_tz::UTC, TimeStep::HOUR);
        assert_eq!(labels(&first), vec!["20:00", "21:00", "22:00", "23:00"]);
        let middle = available_start_times(date(11), &[s], chrono_tz::UTC, TimeStep::HOUR);
        assert_eq!(middle.len(), 24);
        assert_eq!(middle[0].label, "00:00");
        let last = available_start_times(date(12), &[s], chrono_tz::UTC, TimeStep::HOUR);
        assert_eq!(labels(&last), vec!["00:00", "01:00", "02:00"]);
    }

    #[test]
    fn end_times_roll_over_to_midnight() {
        let s = slot(at(10, 20, 0), at(12, 3, 0));
        let same_day =
            available_end_times(at(10, 22, 0), date(10), &s, chrono_tz::UTC, TimeStep::HOUR);
        assert_eq!(labels(&same_day), vec!["23:00", "24:00"]);

        let next_day =
            available_end_times(at(10, 22, 0), date(11), &s, chrono_tz::UTC, TimeStep::HOUR);
        assert_eq!(next_day.len(), 24);
        assert_eq!(next_day[0].label, "01:00");
        assert_eq!(next_day[23].label, "24:00");

        let last_day =
            available_end_times(at(10, 22, 0), date(12), &s, chrono_tz::UTC, TimeStep::HOUR);
        assert_eq!(labels(&last_day), vec!["01:00", "02:00", "03:00"]);

        let past_slot =
            available_end_times(at(10, 22, 0), date(13), &s, chrono_tz::UTC, TimeStep::HOUR);
        assert!(past_slot.is_empty());
    }

    #[test]
    fn labels_follow_listing_zone() {
        // 06:00-09:00 UTC is 09:00-12:00 in Helsinki (EEST).
        let s = slot(at(10, 6, 0), at(10, 9, 0));
        let options = available_start_times(date(10), &[s], Europe::Helsinki, TimeStep::HOUR);
        assert_eq!(labels(&options), vec!["09:00", "10:00", "11:00"]);
    }

    #[test]
    fn empty_and_unbookable_slots_yield_nothing() {
        assert!(available_start_times(date(10), &[], chrono_tz::UTC, TimeStep::HOUR).is_empty());
        let full = TimeSlot::new(at(10, 9, 0), at(10, 18, 0), 0, SlotKind::Time);
        assert!(available_start_times(date(10), &[full], chrono_tz::UTC, TimeStep::HOUR).is_empty());
        assert!(default_booking_times(date(10), &[full], chrono_tz::UTC, TimeStep::HOUR).is_none());
    }

    #[test]
    fn default_times_use_first_start() {
        let s = slot(at(10, 9, 0), at(10, 18, 0));
        let defaults =
            default_booking_times(date(10), &[s], chrono_tz::UTC, TimeStep::HOUR).unwrap();
        assert_eq!(defaults.start.label, "09:00");
        assert_eq!(defaults.end_date, date(10));
        assert_eq!(defaults.end.label, "10:00");
    }

    #[test]
    fn fixed_starts_leave_room_for_duration() {
        let s = slot(at(10, 9, 0), at(10, 12, 0));
        let options = fixed_start_times(
            date(10),
            &[s],
            chrono_tz::UTC,
            TimeStep::HOUR,
            Duration::minutes(90),
        );
        assert_eq!(labels(&options), vec!["09:00", "10:00"]);
        let end = fixed_end_time(options[1].timestamp, Duration::minutes(90), chrono_tz::UTC);
        assert_eq!(end.label, "11:30");
    }

    #[test]
    fn fixed_end_at_midnight_reads_24() {
        let end = fixed_end_time(at(10, 22, 0), Duration::hours(2), chrono_tz::UTC);
        assert_eq!(end.label, "24:00");
    }

    #[test]
    fn slot_containing_skips_full_slots() {
        let full = TimeSlot::new(at(10, 9, 0), at(10, 12, 0), 0, SlotKind::Time);
        let open = slot(at(10, 9, 0), at(10, 12, 0));
        assert_eq!(slot_containing(&[full, open], at(10, 10, 0)), Some(&open));
        assert_eq!(slot_containing(&[full], at(10, 10, 0)), None);
    }
}

use chrono::{
    Datelike, Days, Duration, LocalResult, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeZone,
    Timelike, Utc,
};
use chrono_tz::Tz;

use crate::engine::EngineError;
use crate::model::Instant;

/// Calendar unit for flooring and offsetting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Hour,
    Day,
    Month,
}

pub fn parse_zone(name: &str) -> Result<Tz, EngineError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| EngineError::InvalidZone(name.to_string()))
}

/// Map a wall-clock time in `zone` to an instant.
///
/// Fall-back overlaps resolve to the earlier instant. Spring-forward gaps
/// resolve to the first valid minute after the gap.
pub fn resolve_local(zone: Tz, naive: NaiveDateTime) -> Instant {
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(t) => t.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            let mut candidate = naive;
            for _ in 0..24 * 60 {
                candidate += Duration::minutes(1);
                if let Some(t) = zone.from_local_datetime(&candidate).earliest() {
                    return t.with_timezone(&Utc);
                }
            }
            Utc.from_utc_datetime(&naive)
        }
    }
}

/// Reinterpret `instant` so that its wall clock in `zone` reads the same as
/// its wall clock in `viewer_zone`.
pub fn to_zone(instant: Instant, viewer_zone: Tz, zone: Tz) -> Instant {
    let wall = instant.with_timezone(&viewer_zone).naive_local();
    resolve_local(zone, wall)
}

/// Inverse of [`to_zone`].
pub fn from_zone(instant: Instant, zone: Tz, viewer_zone: Tz) -> Instant {
    to_zone(instant, zone, viewer_zone)
}

pub fn day_of(instant: Instant, zone: Tz) -> NaiveDate {
    instant.with_timezone(&zone).date_naive()
}

pub fn day_start(date: NaiveDate, zone: Tz) -> Instant {
    resolve_local(zone, date.and_time(NaiveTime::MIN))
}

/// `[start of date, start of next date)` in `zone`.
pub fn day_bounds(date: NaiveDate, zone: Tz) -> (Instant, Instant) {
    (day_start(date, zone), day_start(date + Days::new(1), zone))
}

pub fn start_of_unit(instant: Instant, unit: TimeUnit, zone: Tz) -> Instant {
    start_of(instant, unit, zone, 0, unit)
}

/// Floor `instant` to the start of `unit` in `zone`, then shift by `offset`
/// instances of `offset_unit`. Day and month offsets move the wall clock;
/// hour offsets move the instant.
pub fn start_of(
    instant: Instant,
    unit: TimeUnit,
    zone: Tz,
    offset: i32,
    offset_unit: TimeUnit,
) -> Instant {
    let local = instant.with_timezone(&zone);
    let floored_wall = match unit {
        TimeUnit::Hour => local.date_naive().and_time(
            NaiveTime::from_hms_opt(local.hour(), 0, 0).unwrap_or(NaiveTime::MIN),
        ),
        TimeUnit::Day => local.date_naive().and_time(NaiveTime::MIN),
        TimeUnit::Month => local
            .date_naive()
            .with_day0(0)
            .unwrap_or(local.date_naive())
            .and_time(NaiveTime::MIN),
    };
    // Hour floors are taken on the instant so a repeated fall-back hour
    // keeps its own offset.
    let floored = match unit {
        TimeUnit::Hour => {
            instant
                - Duration::minutes(i64::from(local.minute()))
                - Duration::seconds(i64::from(local.second()))
                - Duration::nanoseconds(i64::from(local.nanosecond()))
        }
        _ => resolve_local(zone, floored_wall),
    };

    if offset == 0 {
        return floored;
    }
    match offset_unit {
        TimeUnit::Hour => floored + Duration::hours(i64::from(offset)),
        TimeUnit::Day => resolve_local(zone, shift_days(floored_wall, offset)),
        TimeUnit::Month => resolve_local(zone, shift_months(floored_wall, offset)),
    }
}

fn shift_days(wall: NaiveDateTime, offset: i32) -> NaiveDateTime {
    let days = Days::new(u64::from(offset.unsigned_abs()));
    let shifted = if offset >= 0 {
        wall.checked_add_days(days)
    } else {
        wall.checked_sub_days(days)
    };
    shifted.unwrap_or(wall)
}

fn shift_months(wall: NaiveDateTime, offset: i32) -> NaiveDateTime {
    let months = Months::new(offset.unsigned_abs());
    let shifted = if offset >= 0 {
        wall.checked_add_months(months)
    } else {
        wall.checked_sub_months(months)
    };
    shifted.unwrap_or(wall)
}

/// `HH:MM` on the wall clock of `zone`.
pub fn format_hhmm(instant: Instant, zone: Tz) -> String {
    instant.with_timezone(&zone).format("%H:%M").to_string()
}

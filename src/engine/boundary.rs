use chrono::{Days, NaiveDate};

use crate::limits::MAX_SCAN_DAYS;

use super::coalesce::DateIndex;

/// First blocked day strictly between `start` and `end`, scanning forward
/// one day at a time. `None` when the run stays open up to `end`.
pub fn first_blocked_between(
    index: &DateIndex,
    start: NaiveDate,
    end: NaiveDate,
) -> Option<NaiveDate> {
    let mut day = start.checked_add_days(Days::new(1))?;
    for _ in 0..MAX_SCAN_DAYS {
        if day >= end {
            return None;
        }
        if index.is_blocked(day) {
            return Some(day);
        }
        day = day.checked_add_days(Days::new(1))?;
    }
    None
}

/// Last blocked day strictly between `start` and `end`, scanning backward
/// from `end`.
pub fn last_blocked_between(
    index: &DateIndex,
    start: NaiveDate,
    end: NaiveDate,
) -> Option<NaiveDate> {
    let mut day = end.checked_sub_days(Days::new(1))?;
    for _ in 0..MAX_SCAN_DAYS {
        if day <= start {
            return None;
        }
        if index.is_blocked(day) {
            return Some(day);
        }
        day = day.checked_sub_days(Days::new(1))?;
    }
    None
}

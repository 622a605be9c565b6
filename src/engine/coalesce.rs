use std::collections::BTreeMap;

use chrono::{Days, Duration, NaiveDate};
use chrono_tz::Tz;
use serde::Serialize;

use crate::model::{Instant, MonthId, TimeSlot};
use crate::tz;

// ── Coalescing ────────────────────────────────────────────────────

/// Merge each slot into its predecessor when they touch (`prev.end ==
/// next.start`) and carry the same seat count. Single pass; only immediate
/// neighbours are compared, so callers feed slots in chronological order.
pub fn coalesce(slots: &[TimeSlot]) -> Vec<TimeSlot> {
    let mut merged: Vec<TimeSlot> = Vec::with_capacity(slots.len());
    for &slot in slots {
        if let Some(last) = merged.last_mut()
            && last.end == slot.start
            && last.seats == slot.seats
        {
            last.end = slot.end;
            continue;
        }
        merged.push(slot);
    }
    merged
}

/// Slots whose `[start, end)` intersects calendar day `date` in `zone`.
pub fn slots_on_date(slots: &[TimeSlot], date: NaiveDate, zone: Tz) -> Vec<TimeSlot> {
    let (day_start, day_end) = tz::day_bounds(date, zone);
    slots
        .iter()
        .filter(|s| s.overlaps(day_start, day_end))
        .copied()
        .collect()
}

// ── Per-date index ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DateEntry {
    /// Some touching slot still has a free seat.
    pub has_availability: bool,
    pub time_slots: Vec<TimeSlot>,
}

/// Day-keyed view over coalesced slots. Days absent from the index belong to
/// months without slot data and count as unknown, never as blocked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateIndex {
    days: BTreeMap<NaiveDate, DateEntry>,
}

impl DateIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, date: NaiveDate) -> Option<&DateEntry> {
        self.days.get(&date)
    }

    pub fn is_known(&self, date: NaiveDate) -> bool {
        self.days.contains_key(&date)
    }

    pub fn is_blocked(&self, date: NaiveDate) -> bool {
        self.days.get(&date).is_some_and(|e| !e.has_availability)
    }

    pub fn insert(&mut self, date: NaiveDate, entry: DateEntry) {
        self.days.insert(date, entry);
    }

    pub fn extend(&mut self, other: DateIndex) {
        self.days.extend(other.days);
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDate, &DateEntry)> {
        self.days.iter()
    }
}

/// Index every calendar day in `[from_month, to_month_exclusive)`.
///
/// Each slot is visited once and attached to every day it touches; days
/// with no touching slot get an empty, unavailable entry.
pub fn per_date_index(
    slots: &[TimeSlot],
    from_month: MonthId,
    to_month_exclusive: MonthId,
    zone: Tz,
) -> DateIndex {
    if from_month >= to_month_exclusive {
        return DateIndex::new();
    }
    let first = from_month.first_day();
    let last = to_month_exclusive.first_day() - Days::new(1);
    index_days(slots, first, last, zone)
}

/// Index only the days starting inside `[start, end)`. Days outside stay
/// unknown.
pub fn per_date_index_between(
    slots: &[TimeSlot],
    start: Instant,
    end: Instant,
    zone: Tz,
) -> DateIndex {
    if start >= end {
        return DateIndex::new();
    }
    let mut first = tz::day_of(start, zone);
    if tz::day_start(first, zone) < start {
        first = first + Days::new(1);
    }
    let last = tz::day_of(end - Duration::nanoseconds(1), zone);
    if first > last {
        return DateIndex::new();
    }
    index_days(slots, first, last, zone)
}

fn index_days(slots: &[TimeSlot], first: NaiveDate, last: NaiveDate, zone: Tz) -> DateIndex {
    let mut index = DateIndex::new();
    for day in first.iter_days().take_while(|d| *d <= last) {
        index.insert(day, DateEntry::default());
    }

    for slot in slots {
        let slot_first = tz::day_of(slot.start, zone).max(first);
        let slot_last = tz::day_of(slot.end - Duration::nanoseconds(1), zone).min(last);
        if slot_first > slot_last {
            continue;
        }
        for day in slot_first.iter_days().take_while(|d| *d <= slot_last) {
            if let Some(entry) = index.days.get_mut(&day) {
                entry.has_availability |= slot.is_bookable();
                entry.time_slots.push(*slot);
            }
        }
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SlotKind;
    use chrono::{TimeZone, Utc};

    fn at(d: u32, h: u32) -> Instant {
        Utc.with_ymd_and_hms(2024, 7, d, h, 0, 0).unwrap()
    }

    fn slot(start: Instant, end: Instant, seats: u32) -> TimeSlot {
        TimeSlot::new(start, end, seats, SlotKind::Time)
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, d).unwrap()
    }

    fn july() -> MonthId {
        "2024-07".parse().unwrap()
    }

    #[test]
    fn coalesce_merges_touching_equal_seats() {
        let a = slot(at(1, 0), at(2, 0), 1);
        let b = slot(at(2, 0), at(3, 0), 1);
        assert_eq!(coalesce(&[a, b]), vec![slot(at(1, 0), at(3, 0), 1)]);
    }

    #[test]
    fn coalesce_keeps_different_seats() {
        let a = slot(at(1, 0), at(2, 0), 1);
        let b = slot(at(2, 0), at(3, 0), 2);
        assert_eq!(coalesce(&[a, b]), vec![a, b]);
    }

    #[test]
    fn coalesce_keeps_gaps() {
        let a = slot(at(1, 0), at(2, 0), 1);
        let b = slot(at(2, 1), at(3, 0), 1);
        assert_eq!(coalesce(&[a, b]), vec![a, b]);
    }

    #[test]
    fn coalesce_chains_runs() {
        let slots = vec![
            slot(at(1, 0), at(2, 0), 1),
            slot(at(2, 0), at(3, 0), 1),
            slot(at(3, 0), at(4, 0), 1),
            slot(at(4, 0), at(5, 0), 0),
            slot(at(5, 0), at(6, 0), 0),
        ];
        assert_eq!(
            coalesce(&slots),
            vec![slot(at(1, 0), at(4, 0), 1), slot(at(4, 0), at(6, 0), 0)]
        );
    }

    #[test]
    fn slots_on_date_respects_exclusive_end() {
        let a = slot(at(1, 9), at(2, 0), 1); // ends exactly at midnight
        let b = slot(at(1, 20), at(2, 3), 1);
        assert_eq!(slots_on_date(&[a, b], date(1), chrono_tz::UTC), vec![a, b]);
        assert_eq!(slots_on_date(&[a, b], date(2), chrono_tz::UTC), vec![b]);
        assert!(slots_on_date(&[a, b], date(3), chrono_tz::UTC).is_empty());
    }

    #[test]
    fn slots_on_date_uses_zone() {
        // 22:00-23:00 UTC is the next morning in Helsinki.
        let s = slot(at(1, 22), at(1, 23), 1);
        assert!(slots_on_date(&[s], date(1), chrono_tz::Europe::Helsinki).is_empty());
        assert_eq!(slots_on_date(&[s], date(2), chrono_tz::Europe::Helsinki), vec![s]);
    }

    #[test]
    fn index_covers_whole_month() {
        let s = slot(at(10, 0), at(12, 0), 1);
        let index = per_date_index(&[s], july(), july().next(), chrono_tz::UTC);
        assert_eq!(index.len(), 31);
        assert!(index.get(date(10)).unwrap().has_availability);
        assert!(index.get(date(11)).unwrap().has_availability);
        assert!(index.is_blocked(date(12)));
        assert!(index.is_blocked(date(1)));
        assert!(!index.is_known(NaiveDate::from_ymd_opt(2024, 8, 1).unwrap()));
    }

    #[test]
    fn index_zero_seat_slot_blocks() {
        let s = slot(at(10, 0), at(11, 0), 0);
        let index = per_date_index(&[s], july(), july().next(), chrono_tz::UTC);
        let entry = index.get(date(10)).unwrap();
        assert!(!entry.has_availability);
        assert_eq!(entry.time_slots, vec![s]);
    }

    #[test]
    fn index_clips_slots_outside_range() {
        let s = slot(
            Utc.with_ymd_and_hms(2024, 6, 29, 0, 0, 0).unwrap(),
            at(2, 0),
            1,
        );
        let index = per_date_index(&[s], july(), july().next(), chrono_tz::UTC);
        assert!(index.get(date(1)).unwrap().has_availability);
        assert!(index.is_blocked(date(2)));
    }

    #[test]
    fn empty_month_range_yields_empty_index() {
        let index = per_date_index(&[], july(), july(), chrono_tz::UTC);
        assert!(index.is_empty());
    }

    #[test]
    fn partial_index_leaves_days_outside_range_unknown() {
        let s = slot(at(1, 0), Utc.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap(), 1);
        let index = per_date_index_between(&[s], at(15, 0), at(20, 0), chrono_tz::UTC);
        assert_eq!(index.len(), 5);
        assert!(!index.is_known(date(14)));
        assert!(index.is_known(date(15)));
        assert!(index.is_known(date(19)));
        assert!(!index.is_known(date(20)));
        assert!(!index.is_blocked(date(25)));
    }
}

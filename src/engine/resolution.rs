use chrono::{Days, Duration, NaiveDate};
use chrono_tz::Tz;

use crate::limits::{DEFAULT_HORIZON_DAYS, MAX_HORIZON_DAYS};
use crate::model::{FocusedField, Instant, MonthId, Selection, TimeOption, TimeSlot, UnitType};
use crate::store::{self, SlotCache};
use crate::tz;

use super::boundary::{first_blocked_between, last_blocked_between};
use super::coalesce::{DateIndex, coalesce, per_date_index, per_date_index_between};
use super::time_of_day::{
    self, DefaultTimes, TimeStep, available_end_times, available_start_times,
    default_booking_times, fixed_start_times, slot_containing,
};

/// Listing-level knobs for a resolution pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveOptions {
    pub zone: Tz,
    pub horizon_days: u32,
    pub time_step: TimeStep,
    /// Booking length for `UnitType::Fixed`.
    pub fixed_duration: Option<Duration>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            zone: chrono_tz::UTC,
            horizon_days: DEFAULT_HORIZON_DAYS,
            time_step: TimeStep::default(),
            fixed_duration: None,
        }
    }
}

/// One resolution pass over a cache snapshot and a selection.
///
/// `now` is captured once at construction; every predicate answers against
/// the same `today`, the same per-date index and the same boundaries.
#[derive(Debug, Clone)]
pub struct Resolution {
    unit_type: UnitType,
    zone: Tz,
    time_step: TimeStep,
    fixed_duration: Option<Duration>,
    today: NaiveDate,
    /// First day past the horizon.
    horizon_end: NaiveDate,
    index: DateIndex,
    /// Start chosen and the end is still open for picking.
    forward_cap: bool,
    /// End chosen, start still open.
    backward_cap: bool,
    forward_boundary: Option<NaiveDate>,
    backward_boundary: Option<NaiveDate>,
    start_date: Option<NaiveDate>,
    start_time: Option<Instant>,
    end_time: Option<Instant>,
}

impl Resolution {
    pub fn new(
        cache: &SlotCache,
        selection: &Selection,
        unit_type: UnitType,
        options: &ResolveOptions,
        now: Instant,
    ) -> Self {
        let zone = options.zone;
        let today = tz::day_of(now, zone);
        let horizon = options.horizon_days.min(MAX_HORIZON_DAYS);
        let horizon_end = today + Days::new(u64::from(horizon));
        let index = build_index(cache, zone);

        let forward_cap = selection.start_date.is_some()
            && (selection.end_date.is_none() || selection.focused == Some(FocusedField::End));
        let backward_cap = selection.end_date.is_some() && selection.start_date.is_none();

        let forward_boundary = match selection.start_date {
            Some(start) if forward_cap => first_blocked_between(&index, start, horizon_end),
            _ => None,
        };
        let backward_boundary = match selection.end_date {
            Some(end) if backward_cap => {
                let before_today = today - Days::new(1);
                last_blocked_between(&index, before_today, end)
            }
            _ => None,
        };

        Self {
            unit_type,
            zone,
            time_step: options.time_step,
            fixed_duration: options.fixed_duration,
            today,
            horizon_end,
            index,
            forward_cap,
            backward_cap,
            forward_boundary,
            backward_boundary,
            start_date: selection.start_date,
            start_time: selection.start_time,
            end_time: selection.end_time,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// `today + horizon − 1`, or `None` for a zero-day horizon.
    pub fn last_bookable_day(&self) -> Option<NaiveDate> {
        let last = self.horizon_end - Days::new(1);
        (last >= self.today).then_some(last)
    }

    pub fn date_index(&self) -> &DateIndex {
        &self.index
    }

    /// Nearest blocked day after the chosen start.
    pub fn forward_boundary(&self) -> Option<NaiveDate> {
        self.forward_boundary
    }

    /// Nearest blocked day before the chosen end.
    pub fn backward_boundary(&self) -> Option<NaiveDate> {
        self.backward_boundary
    }

    pub fn is_outside_bookable_range(&self, day: NaiveDate) -> bool {
        if day < self.today || day >= self.horizon_end {
            return true;
        }
        if self.forward_cap
            && let Some(boundary) = self.forward_boundary
        {
            // Night bookings may check out on the day the next booking
            // starts; the other unit types end the day before.
            let last_allowed = match self.unit_type {
                UnitType::Night => boundary,
                UnitType::Day | UnitType::Hour | UnitType::Fixed => boundary - Days::new(1),
            };
            if day > last_allowed {
                return true;
            }
        }
        if self.backward_cap
            && let Some(boundary) = self.backward_boundary
            && day <= boundary
        {
            return true;
        }
        false
    }

    pub fn is_day_blocked(&self, day: NaiveDate) -> bool {
        if !self.index.is_known(day) {
            return false;
        }
        if self.forward_cap || self.backward_cap {
            return false;
        }
        self.index.is_blocked(day)
    }

    /// Whether the calendar may page to `month`.
    pub fn can_navigate_to(&self, month: MonthId) -> bool {
        let first = MonthId::from_date(self.today);
        let last = MonthId::from_date(self.last_bookable_day().unwrap_or(self.today));
        first <= month && month <= last
    }

    fn bookable_slots_on(&self, date: NaiveDate) -> Vec<TimeSlot> {
        self.index
            .get(date)
            .map(|e| {
                e.time_slots
                    .iter()
                    .filter(|s| s.is_bookable())
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Selectable start times on `date`. Empty for day-granular listings.
    pub fn start_times(&self, date: NaiveDate) -> Vec<TimeOption> {
        if !self.unit_type.is_time_based() || self.is_outside_bookable_range(date) {
            return Vec::new();
        }
        let slots = self.bookable_slots_on(date);
        match (self.unit_type, self.fixed_duration) {
            (UnitType::Fixed, Some(duration)) => {
                fixed_start_times(date, &slots, self.zone, self.time_step, duration)
            }
            _ => available_start_times(date, &slots, self.zone, self.time_step),
        }
    }

    /// Selectable end times on `end_date` for a booking starting at `start_time`.
    pub fn end_times(&self, start_time: Instant, end_date: NaiveDate) -> Vec<TimeOption> {
        if !self.unit_type.is_time_based() {
            return Vec::new();
        }
        let start_date = tz::day_of(start_time, self.zone);
        let slots = self.bookable_slots_on(start_date);
        let Some(slot) = slot_containing(&slots, start_time) else {
            return Vec::new();
        };
        match (self.unit_type, self.fixed_duration) {
            (UnitType::Fixed, Some(duration)) => {
                let end = time_of_day::fixed_end_time(start_time, duration, self.zone);
                let on_end_date = tz::day_of(end.timestamp - Duration::nanoseconds(1), self.zone);
                if end.timestamp <= slot.end && on_end_date == end_date {
                    vec![end]
                } else {
                    Vec::new()
                }
            }
            _ => available_end_times(start_time, end_date, slot, self.zone, self.time_step),
        }
    }

    /// End times for the selection's chosen start, or for the default start
    /// of the selected start date while no time has been picked.
    pub fn selected_end_times(&self, end_date: NaiveDate) -> Vec<TimeOption> {
        let start = self.start_time.or_else(|| {
            self.start_date
                .and_then(|date| self.default_times(date))
                .map(|defaults| defaults.start.timestamp)
        });
        match start {
            Some(start_time) => self.end_times(start_time, end_date),
            None => Vec::new(),
        }
    }

    /// Start/end pick for `date`. A still-selectable start chosen in the
    /// selection wins; otherwise the first start and its first end.
    pub fn default_times(&self, date: NaiveDate) -> Option<DefaultTimes> {
        if !self.unit_type.is_time_based() || self.is_outside_bookable_range(date) {
            return None;
        }
        self.chosen_times(date).or_else(|| self.implicit_times(date))
    }

    fn chosen_times(&self, date: NaiveDate) -> Option<DefaultTimes> {
        let chosen = self.start_time?;
        let start = self
            .start_times(date)
            .into_iter()
            .find(|o| o.timestamp == chosen)?;
        let end_date = match (self.end_time, self.unit_type, self.fixed_duration) {
            (Some(end), _, _) => tz::day_of(end - Duration::nanoseconds(1), self.zone),
            (None, UnitType::Fixed, Some(duration)) => {
                tz::day_of(chosen + duration - Duration::nanoseconds(1), self.zone)
            }
            _ => date,
        };
        let ends = self.end_times(chosen, end_date);
        let picked = self
            .end_time
            .and_then(|t| ends.iter().find(|o| o.timestamp == t).cloned());
        let end = picked.or_else(|| ends.into_iter().next())?;
        Some(DefaultTimes {
            start,
            end_date,
            end,
        })
    }

    fn implicit_times(&self, date: NaiveDate) -> Option<DefaultTimes> {
        let slots = self.bookable_slots_on(date);
        match (self.unit_type, self.fixed_duration) {
            (UnitType::Fixed, Some(duration)) => {
                let start = fixed_start_times(date, &slots, self.zone, self.time_step, duration)
                    .into_iter()
                    .next()?;
                let end = time_of_day::fixed_end_time(start.timestamp, duration, self.zone);
                let end_date = tz::day_of(end.timestamp - Duration::nanoseconds(1), self.zone);
                Some(DefaultTimes {
                    start,
                    end_date,
                    end,
                })
            }
            _ => default_booking_times(date, &slots, self.zone, self.time_step),
        }
    }
}

/// Coalesce every fetched month's slots and index each month's days. A
/// month fetched for part of its range only indexes that part.
fn build_index(cache: &SlotCache, zone: Tz) -> DateIndex {
    let merged = coalesce(&store::fetched_slots_in_order(cache));
    let mut index = DateIndex::new();
    for (month, entry) in cache.iter().filter(|(_, e)| store::is_populated(e)) {
        let days = match entry.fetched_range() {
            Some((start, end)) => per_date_index_between(&merged, start, end, zone),
            None => per_date_index(&merged, *month, month.next(), zone),
        };
        index.extend(days);
    }
    index
}

//! Pure availability resolution over already-fetched slot data.
//!
//! Nothing in here performs I/O or reads the clock: callers pass `now` and a
//! [`SlotCache`](crate::store::SlotCache) snapshot for every pass.

mod boundary;
mod coalesce;
mod error;
mod resolution;
mod time_of_day;

pub use boundary::{first_blocked_between, last_blocked_between};
pub use coalesce::{
    DateEntry, DateIndex, coalesce, per_date_index, per_date_index_between, slots_on_date,
};
pub use error::EngineError;
pub use resolution::{ResolveOptions, Resolution};
pub use time_of_day::{
    DefaultTimes, TimeStep, available_end_times, available_start_times, default_booking_times,
    fixed_end_time, fixed_start_times, slot_containing,
};

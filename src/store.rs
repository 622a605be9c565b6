use std::collections::BTreeMap;
use std::sync::Arc;

use crate::model::{Instant, MonthId, TimeSlot};

/// Why a month's slots could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The backend answered with an error status.
    Backend { status: u16, message: String },
    /// The payload could not be decoded into time slots.
    Decode(String),
    /// The request never produced a response.
    Transport(String),
    /// The fetch task ended before merging a result (panicked or aborted).
    Interrupted,
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Backend { status, message } => {
                write!(f, "backend error {status}: {message}")
            }
            FetchError::Decode(e) => write!(f, "decode error: {e}"),
            FetchError::Transport(e) => write!(f, "transport error: {e}"),
            FetchError::Interrupted => write!(f, "fetch interrupted"),
        }
    }
}

impl std::error::Error for FetchError {}

/// Fetch lifecycle of one month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonthEntry {
    /// Entered the look-ahead window, no request issued yet.
    NotFetched,
    /// A request is outstanding.
    Fetching,
    /// Slots received. May be empty. `range` is the part of the month the
    /// request covered; `None` means the whole month.
    Fetched {
        slots: Arc<Vec<TimeSlot>>,
        range: Option<(Instant, Instant)>,
    },
    /// Last request failed. Eligible for retry.
    Failed { error: FetchError },
}

impl MonthEntry {
    /// Slots covering the whole month.
    pub fn fetched(slots: Vec<TimeSlot>) -> Self {
        MonthEntry::Fetched {
            slots: Arc::new(slots),
            range: None,
        }
    }

    /// Slots for the `[start, end)` part of the month only.
    pub fn fetched_within(slots: Vec<TimeSlot>, start: Instant, end: Instant) -> Self {
        MonthEntry::Fetched {
            slots: Arc::new(slots),
            range: Some((start, end)),
        }
    }

    pub fn time_slots(&self) -> Option<&[TimeSlot]> {
        match self {
            MonthEntry::Fetched { slots, .. } => Some(slots.as_slice()),
            _ => None,
        }
    }

    pub fn fetched_range(&self) -> Option<(Instant, Instant)> {
        match self {
            MonthEntry::Fetched { range, .. } => *range,
            _ => None,
        }
    }

    pub fn fetch_in_progress(&self) -> bool {
        matches!(self, MonthEntry::Fetching)
    }

    pub fn fetch_error(&self) -> Option<&FetchError> {
        match self {
            MonthEntry::Failed { error } => Some(error),
            _ => None,
        }
    }
}

/// Immutable month-keyed slot cache. Every update returns a new cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotCache {
    months: BTreeMap<MonthId, MonthEntry>,
}

impl SlotCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.months.len()
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MonthId, &MonthEntry)> {
        self.months.iter()
    }
}

pub fn get(cache: &SlotCache, month: MonthId) -> Option<&MonthEntry> {
    cache.months.get(&month)
}

/// New cache with `month` replaced by `entry`. `cache` is left untouched.
pub fn merge(cache: &SlotCache, month: MonthId, entry: MonthEntry) -> SlotCache {
    let mut months = cache.months.clone();
    months.insert(month, entry);
    SlotCache { months }
}

pub fn is_populated(entry: &MonthEntry) -> bool {
    matches!(entry, MonthEntry::Fetched { .. })
}

/// Every fetched month's slots sorted by start. Input for coalescing.
///
/// A slot crossing a month boundary is returned by both months' fetches;
/// identical records are kept once.
pub fn fetched_slots_in_order(cache: &SlotCache) -> Vec<TimeSlot> {
    let mut all: Vec<TimeSlot> = cache
        .months
        .values()
        .filter_map(MonthEntry::time_slots)
        .flatten()
        .copied()
        .collect();
    all.sort_by_key(|s| (s.start, s.end, s.seats));
    all.dedup();
    all
}

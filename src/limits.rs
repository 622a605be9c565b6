/// Longest booking horizon a listing may configure.
pub const MAX_HORIZON_DAYS: u32 = 730;

/// Horizon used when none is configured.
pub const DEFAULT_HORIZON_DAYS: u32 = 90;

/// Months pre-fetched after the visible one.
pub const DEFAULT_LOOK_AHEAD_MONTHS: u32 = 1;

pub const MAX_LOOK_AHEAD_MONTHS: u32 = 12;

/// Hard cap on day-by-day boundary scans. Covers the longest horizon.
pub const MAX_SCAN_DAYS: u32 = MAX_HORIZON_DAYS + 1;

/// Upper bound on time options enumerated for a single day window.
pub const MAX_TIME_OPTIONS: usize = 24 * 60;

/// Listings tracked by a single manager.
pub const MAX_LISTINGS: usize = 10_000;

/// Slots accepted from one month fetch.
pub const MAX_SLOTS_PER_MONTH: usize = 10_000;

use std::path::PathBuf;

use chrono::Duration;
use chrono_tz::Tz;

use crate::engine::{EngineError, ResolveOptions, TimeStep};
use crate::limits::*;
use crate::model::UnitType;
use crate::tz::parse_zone;

/// Per-listing settings a coordinator runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingSettings {
    pub unit_type: UnitType,
    pub look_ahead_months: u32,
    pub options: ResolveOptions,
}

impl Default for ListingSettings {
    fn default() -> Self {
        Self {
            unit_type: UnitType::Day,
            look_ahead_months: DEFAULT_LOOK_AHEAD_MONTHS,
            options: ResolveOptions::default(),
        }
    }
}

/// Process configuration read from `SLOTCAL_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub zone: Tz,
    pub unit_type: UnitType,
    pub horizon_days: u32,
    pub look_ahead_months: u32,
    pub time_step: TimeStep,
    pub fixed_duration_minutes: Option<u32>,
    pub slots_file: Option<PathBuf>,
    pub metrics_port: Option<u16>,
}

impl Config {
    pub fn from_env() -> Result<Self, EngineError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unparseable numbers fall back to defaults;
    /// an unknown zone, unit type or time step is an error.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, EngineError> {
        let number = |key: &str| get(key).and_then(|s| s.trim().parse::<u32>().ok());

        let zone = match get("SLOTCAL_ZONE") {
            Some(name) => parse_zone(&name)?,
            None => chrono_tz::UTC,
        };
        let unit_type = match get("SLOTCAL_UNIT_TYPE") {
            Some(s) => s.parse()?,
            None => UnitType::Day,
        };
        let horizon_days = number("SLOTCAL_HORIZON_DAYS")
            .unwrap_or(DEFAULT_HORIZON_DAYS)
            .min(MAX_HORIZON_DAYS);
        let look_ahead_months = number("SLOTCAL_LOOK_AHEAD_MONTHS")
            .unwrap_or(DEFAULT_LOOK_AHEAD_MONTHS)
            .min(MAX_LOOK_AHEAD_MONTHS);
        let time_step = match number("SLOTCAL_TIME_STEP_MINUTES") {
            Some(minutes) => TimeStep::from_minutes(minutes)?,
            None => TimeStep::default(),
        };
        let fixed_duration_minutes = number("SLOTCAL_FIXED_DURATION_MINUTES").filter(|m| *m > 0);
        let slots_file = get("SLOTCAL_SLOTS_FILE").map(PathBuf::from);
        let metrics_port = get("SLOTCAL_METRICS_PORT").and_then(|s| s.trim().parse().ok());

        Ok(Self {
            zone,
            unit_type,
            horizon_days,
            look_ahead_months,
            time_step,
            fixed_duration_minutes,
            slots_file,
            metrics_port,
        })
    }

    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            zone: self.zone,
            horizon_days: self.horizon_days,
            time_step: self.time_step,
            fixed_duration: self
                .fixed_duration_minutes
                .map(|m| Duration::minutes(i64::from(m))),
        }
    }

    pub fn listing_settings(&self) -> ListingSettings {
        ListingSettings {
            unit_type: self.unit_type,
            look_ahead_months: self.look_ahead_months,
            options: self.resolve_options(),
        }
    }
}

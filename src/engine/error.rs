use crate::model::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    InvalidZone(String),
    InvalidMonthId(String),
    InvalidUnitType(String),
    InvalidTimeStep(u32),
    InvalidSlot { start: Instant, end: Instant },
    LimitExceeded(&'static str),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidZone(z) => write!(f, "unknown time zone: {z}"),
            EngineError::InvalidMonthId(m) => write!(f, "invalid month id (want YYYY-MM): {m}"),
            EngineError::InvalidUnitType(u) => write!(f, "unknown unit type: {u}"),
            EngineError::InvalidTimeStep(m) => {
                write!(f, "time step of {m} minutes does not divide the hour or the day")
            }
            EngineError::InvalidSlot { start, end } => {
                write!(f, "time slot [{start}, {end}) does not start before it ends")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

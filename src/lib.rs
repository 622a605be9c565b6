pub mod config;
pub mod engine;
pub mod fetch;
pub mod limits;
pub mod listing;
pub mod model;
pub mod observability;
pub mod scheduler;
pub mod store;
pub mod tz;

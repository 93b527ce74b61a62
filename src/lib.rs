//! Scheduling and compliance engine for a personal time-investment tracker.
//!
//! `domain` holds the pure interval, overlap, validation, rule and goal
//! computations. `application` wraps them in owner-scoped operations that
//! read from and write to a [`TrackerStore`]. `infrastructure` provides the
//! config files, the SQLite schema and the store implementations.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::state::AppState;
pub use domain::interval::TimeInterval;
pub use domain::overlap::{has_overlap, intervals_overlap};
pub use infrastructure::config::EngineConfig;
pub use infrastructure::error::TrackerError;
pub use infrastructure::repository::TrackerStore;

//! Cadence - recurring AI-generated posts for Threads, LinkedIn and Instagram
//!
//! This library holds the scheduled-post processor, the platform publishers,
//! content generation and the SQLite store shared by the `cadence-*` tools.

pub mod config;
pub mod db;
pub mod error;
pub mod generator;
pub mod logging;
pub mod platforms;
pub mod processor;
pub mod scheduling;
pub mod service;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use db::{CorruptSchedule, Database, DueSchedule, HistoryFilter};
pub use error::{CadenceError, Result};
pub use processor::{CycleSummary, ScheduledPostProcessor};
pub use types::{
    Credentials, HistoryRecord, HistoryStatus, Interval, IntervalUnit, PlatformKind,
    ScheduleStatus, ScheduledPost, Template,
};

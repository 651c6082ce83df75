pub mod config;
pub mod cycle;
pub mod error;
pub mod layout;
pub mod merge;
pub mod model;
pub mod progress;
pub mod recurrence;
pub mod score;
pub mod service;
pub mod window;

pub use crate::config::EngineConfig;
pub use crate::cycle::{Cycle, WeekWindow};
pub use crate::error::{ConfigError, LayoutError, RecurrenceParseError};
pub use crate::model::{
    Activity, CompletionRecord, Occurrence, ScheduleKind, WeekStart, WithdrawalRecord,
};
pub use crate::recurrence::{Frequency, RecurrenceSpec};
pub use crate::service::{PlannerService, PlannerServiceBuilder, PlannerState};
pub use crate::window::{DateWindow, ViewMode};

pub mod config;
pub mod errors;
pub mod keys;
pub mod models;
pub mod traits;

pub use config::AppConfig;
pub use errors::*;
pub use keys::StateKeys;
pub use models::{
    AlertChannel, AlertDecision, AlertRule, Comparator, HealthEvent, JobDefinition, JobRun,
    JobRunStatus, MetricKind, Notification,
};
pub use traits::{
    AlertChannelSource, HealthEventSource, JobContext, JobHandler, Notifier, StateStore,
};

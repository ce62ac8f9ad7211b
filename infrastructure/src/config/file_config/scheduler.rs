//! Scheduler configuration from TOML (`[scheduler]` section)

use serde::{Deserialize, Serialize};
use std::time::Duration;
use toolgate_application::SchedulerConfig;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSchedulerConfig {
    /// Confirmation wait limit in milliseconds (omitted = wait indefinitely)
    pub confirmation_timeout_ms: Option<u64>,
    /// Concurrently executing calls (omitted = unbounded)
    pub max_concurrent_executions: Option<usize>,
}

impl FileSchedulerConfig {
    pub fn to_scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::default()
            .with_confirmation_timeout(self.confirmation_timeout_ms.map(Duration::from_millis))
            .with_max_concurrent_executions(self.max_concurrent_executions)
    }
}

//! Scheduler parameters — runtime knobs for the tool call scheduler.
//!
//! [`SchedulerConfig`] groups the static parameters that control
//! [`ToolCallScheduler`](crate::use_cases::schedule_tool_calls::ToolCallScheduler).
//! The binary maps the `[scheduler]` section of the config file into it.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How long a call may wait for a confirmation response.
    /// `None` waits indefinitely.
    pub confirmation_timeout: Option<Duration>,
    /// Upper bound on calls in the `Executing` state at once.
    /// `None` is unbounded.
    pub max_concurrent_executions: Option<usize>,
}

impl SchedulerConfig {
    // ==================== Builder Methods ====================

    pub fn with_confirmation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    pub fn with_max_concurrent_executions(mut self, max: Option<usize>) -> Self {
        self.max_concurrent_executions = max;
        self
    }
}

//! Application-level configuration.
//!
//! - [`SchedulerConfig`] — confirmation timeout and execution concurrency

pub mod scheduler_config;

pub use scheduler_config::SchedulerConfig;

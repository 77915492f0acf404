//! Background jobs for eventix.
//!
//! - **Scheduler**: periodic reconciliation of expired reservation holds
//! - **Jobs**: capacity notifications queued in Redis
//! - **Workers**: webhook delivery with Apalis

pub mod jobs;
pub mod notifier_impl;
pub mod scheduler;
pub mod workers;

pub use jobs::*;
pub use notifier_impl::{RedisCapacityNotifier, connect_notification_storage};
pub use scheduler::{ReconciliationExecutor, SchedulerConfig, run_reconciliation, run_scheduler};
pub use workers::*;

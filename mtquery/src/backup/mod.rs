//! Router configuration backups.
//!
//! [`BackupCoordinator`] exports the configuration of the managed router and writes it to the
//! backup directory. Exports are serialized by a guard with a bounded wait, so an on-demand
//! backup and a scheduled one never run at the same time. [`BackupScheduler`] owns the
//! recurring jobs.

pub mod coordinator;
pub mod models;
pub mod scheduler;

pub use coordinator::BackupCoordinator;
pub use models::{BackupInfo, BackupRecord, ScheduledJobInfo};
pub use scheduler::BackupScheduler;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// A configuration backup file on disk.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackupRecord {
    /// File name, `<host>.rsc`
    pub name: String,
    pub last_modified: DateTime<Utc>,
    /// Size in bytes
    pub size: u64,
}

/// A live recurring backup job.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledJobInfo {
    pub id: Uuid,
    pub name: String,
    pub next_run_time: DateTime<Utc>,
}

/// Backup inventory together with the schedule that produces it.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackupInfo {
    pub backups: Vec<BackupRecord>,
    pub backup_interval_minutes: u64,
    pub jobs: Vec<ScheduledJobInfo>,
}

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Result of an on-demand backup.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackupWritten {
    /// Name of the file in the backup directory
    pub written_file: String,
}

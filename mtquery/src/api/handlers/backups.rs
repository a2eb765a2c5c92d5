//! Handlers for configuration backups.

use axum::{Json, extract::State};

use crate::AppState;
use crate::api::models::backups::BackupWritten;
use crate::backup::BackupInfo;
use crate::errors::Result;

#[utoipa::path(
    post,
    path = "/api/v2/backups",
    tag = "backups",
    summary = "Back up the router configuration",
    responses(
        (status = 200, description = "Configuration exported and written", body = BackupWritten),
        (status = 404, description = "Router unreachable or ssh login rejected"),
        (status = 502, description = "Export command failed"),
        (status = 500, description = "Backup could not be written"),
        (status = 503, description = "Another backup is still running")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn trigger_backup(State(state): State<AppState>) -> Result<Json<BackupWritten>> {
    let written_file = state.backups.backup_config().await?;
    Ok(Json(BackupWritten { written_file }))
}

#[utoipa::path(
    get,
    path = "/api/v2/backups",
    tag = "backups",
    summary = "List stored backups",
    responses(
        (status = 200, description = "Stored backups, backup interval and scheduled jobs", body = BackupInfo)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_backup_info(State(state): State<AppState>) -> Result<Json<BackupInfo>> {
    Ok(Json(state.backups.backup_info(&state.scheduler).await))
}

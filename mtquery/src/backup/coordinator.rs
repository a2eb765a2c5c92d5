use chrono::{DateTime, Utc};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::models::{BackupInfo, BackupRecord};
use super::scheduler::BackupScheduler;
use crate::config::{BackupConfig, RouterConfig};
use crate::errors::{Error, Result};
use crate::remote::RemoteExec;

const BACKUP_EXTENSION: &str = "rsc";

fn write_failed(path: &Path) -> impl FnOnce(std::io::Error) -> Error {
    let path = path.to_path_buf();
    move |source| Error::BackupWriteFailed { path, source }
}

/// Exports and stores the configuration of one router.
pub struct BackupCoordinator {
    host: String,
    ssh_port: u16,
    backup_path: PathBuf,
    export_command: String,
    interval: Duration,
    guard_timeout: Duration,
    guard: Mutex<()>,
    remote: Arc<dyn RemoteExec>,
}

impl BackupCoordinator {
    pub fn new(router: &RouterConfig, backup: &BackupConfig, remote: Arc<dyn RemoteExec>) -> Self {
        Self {
            host: router.host.clone(),
            ssh_port: router.ssh_port,
            backup_path: backup.path.clone(),
            export_command: backup.export_command.clone(),
            interval: backup.interval,
            guard_timeout: backup.guard_timeout,
            guard: Mutex::new(()),
            remote,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    pub fn file_name(&self) -> String {
        format!("{}.{BACKUP_EXTENSION}", self.host)
    }

    /// True while an export holds the guard.
    pub fn in_progress(&self) -> bool {
        self.guard.try_lock().is_err()
    }

    /// Export the router configuration and write it to `<backup_path>/<host>.rsc`, replacing
    /// any previous backup. Returns the file name.
    ///
    /// Waits at most the configured guard timeout for a running export to finish.
    #[instrument(skip(self), fields(host = %self.host), err)]
    pub async fn backup_config(&self) -> Result<String> {
        let _guard = tokio::time::timeout(self.guard_timeout, self.guard.lock())
            .await
            .map_err(|_| Error::GuardTimeout {
                host: self.host.clone(),
                waited: self.guard_timeout,
            })?;

        info!("Creating config backup for {}", self.host);
        let mut channel = self.remote.connect(&self.host, self.ssh_port).await?;
        let config = channel.exec(&self.export_command).await?;

        let file_name = self.file_name();
        self.write(&self.backup_path.join(&file_name), &config).await?;
        info!("Wrote {} bytes of config to {}", config.len(), file_name);

        Ok(file_name)
    }

    /// Write through a temporary file in the same directory and rename it into place, so an
    /// interrupted write never truncates the previous backup.
    async fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        tokio::fs::create_dir_all(&self.backup_path)
            .await
            .map_err(write_failed(&self.backup_path))?;

        let staging = path.with_extension(format!("{BACKUP_EXTENSION}.tmp"));
        if let Err(e) = tokio::fs::write(&staging, contents).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(write_failed(&staging)(e));
        }
        tokio::fs::rename(&staging, path).await.map_err(write_failed(path))
    }

    /// Backup files in the backup directory, sorted by name. Fails with `NoBackupsFound` when
    /// the directory is missing, unreadable or holds no backups.
    pub async fn list_backups(&self) -> Result<Vec<BackupRecord>> {
        let not_found = || Error::NoBackupsFound {
            path: self.backup_path.clone(),
        };
        let mut entries = tokio::fs::read_dir(&self.backup_path).await.map_err(|_| not_found())?;

        let mut backups = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|_| not_found())? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(BACKUP_EXTENSION) {
                continue;
            }
            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                Err(e) => {
                    // removed between listing and stat
                    debug!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };
            let last_modified: DateTime<Utc> = match metadata.modified() {
                Ok(modified) => modified.into(),
                Err(e) => {
                    warn!("No modification time for {}: {}", path.display(), e);
                    continue;
                }
            };

            backups.push(BackupRecord {
                name: entry.file_name().to_string_lossy().into_owned(),
                last_modified,
                size: metadata.len(),
            });
        }

        if backups.is_empty() {
            return Err(not_found());
        }
        backups.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(backups)
    }

    /// Backup inventory plus the schedule. A directory without backups yields an empty list.
    pub async fn backup_info(&self, scheduler: &BackupScheduler) -> BackupInfo {
        let backups = self.list_backups().await.unwrap_or_else(|e| {
            info!("{}", e);
            Vec::new()
        });

        BackupInfo {
            backups,
            backup_interval_minutes: self.interval.as_secs() / 60,
            jobs: scheduler.jobs().await,
        }
    }
}

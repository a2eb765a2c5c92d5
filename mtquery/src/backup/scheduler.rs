//! Background scheduler for recurring configuration backups.
//!
//! Each job is a tokio task that waits one interval, runs a backup through the
//! [`BackupCoordinator`] and starts over, until its cancellation token fires. Failed runs are
//! logged and the job keeps its schedule.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::coordinator::BackupCoordinator;
use super::models::ScheduledJobInfo;

struct ScheduledJob {
    name: String,
    next_run: watch::Receiver<DateTime<Utc>>,
    handle: JoinHandle<()>,
}

fn after(now: DateTime<Utc>, interval: Duration) -> DateTime<Utc> {
    now + chrono::Duration::from_std(interval).unwrap_or_else(|_| chrono::Duration::days(365))
}

/// Registry of running backup jobs.
#[derive(Clone, Default)]
pub struct BackupScheduler {
    jobs: Arc<RwLock<HashMap<Uuid, ScheduledJob>>>,
}

impl BackupScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a recurring backup job named `<host>-backup`. The first run happens one interval
    /// from now.
    pub async fn schedule(&self, coordinator: Arc<BackupCoordinator>, shutdown: CancellationToken) -> Uuid {
        let id = Uuid::new_v4();
        let name = format!("{}-backup", coordinator.host());
        let interval = coordinator.interval();
        let (next_tx, next_rx) = watch::channel(after(Utc::now(), interval));

        let job_name = name.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        next_tx.send_replace(after(Utc::now(), interval));
                        match coordinator.backup_config().await {
                            Ok(file) => tracing::debug!("Job {} wrote {}", job_name, file),
                            Err(e) => tracing::error!("Job {} failed: {}", job_name, e),
                        }
                    }
                }
            }

            tracing::info!("Backup job {} has stopped", job_name);
        });

        tracing::info!("Scheduled backup job {} every {:?}", name, interval);
        self.jobs.write().await.insert(
            id,
            ScheduledJob {
                name,
                next_run: next_rx,
                handle,
            },
        );

        id
    }

    /// Jobs whose task is still running, ordered by name.
    pub async fn jobs(&self) -> Vec<ScheduledJobInfo> {
        let jobs = self.jobs.read().await;
        let mut live: Vec<ScheduledJobInfo> = jobs
            .iter()
            .filter(|(_, job)| !job.handle.is_finished())
            .map(|(id, job)| ScheduledJobInfo {
                id: *id,
                name: job.name.clone(),
                next_run_time: *job.next_run.borrow(),
            })
            .collect();
        live.sort_by(|a, b| a.name.cmp(&b.name));
        live
    }

    /// Abort every job immediately.
    pub async fn stop_all(&self) {
        let mut jobs = self.jobs.write().await;
        let count = jobs.len();

        for (id, job) in jobs.drain() {
            job.handle.abort();
            tracing::debug!("Stopped backup job {} ({})", job.name, id);
        }

        if count > 0 {
            tracing::info!("Stopped {} backup jobs", count);
        }
    }

    /// Wait for every job to exit. Jobs exit once their shutdown token is cancelled.
    pub async fn join_all(&self) {
        let jobs: Vec<ScheduledJob> = self.jobs.write().await.drain().map(|(_, job)| job).collect();
        for job in jobs {
            match job.handle.await {
                Err(e) if e.is_panic() => tracing::error!("Backup job {} panicked: {}", job.name, e),
                _ => {}
            }
        }
    }
}

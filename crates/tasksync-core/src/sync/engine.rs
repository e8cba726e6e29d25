//! Sync cycle orchestration.
//!
//! One cycle: take the lease, probe the remote authority, drain the queue in
//! batches, apply every outcome to the record store and queue, release.

use std::time::Duration;

use rusqlite::Connection;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::SyncSettings;
use crate::db::{
    QueueRepository, SqliteQueueRepository, SqliteSyncMetaRepository, SqliteTaskRepository,
    SyncMetaRepository, TaskRepository,
};
use crate::models::{
    Operation, SyncConflict, SyncQueueItem, SyncStatus, TaskFields, TaskVersion, Winner,
};
use crate::services::DatabaseService;
use crate::util::now_millis;
use crate::{Error, Result};

use super::dispatcher::{BatchDispatcher, Dispatched, ItemOutcome};
use super::http::HttpRemote;
use super::remote::RemoteAuthority;
use super::resolver;

/// Summary of one sync cycle.
///
/// `success + failed <= total`; conflicts are a subset of successes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Whether the connectivity probe succeeded
    pub reachable: bool,
    /// Items considered (selected and not skipped by cancellation)
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub conflicts: usize,
    /// Whether remaining batches were skipped, either on cancellation or
    /// because the lease was lost mid-cycle
    pub cancelled: bool,
}

/// Read-only view of sync state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncStatusReport {
    pub pending: usize,
    pub last_sync_at: Option<i64>,
    pub reachable: bool,
}

/// Runs sync cycles for one local store against one remote authority.
pub struct SyncEngine<R> {
    db: DatabaseService,
    dispatcher: BatchDispatcher<R>,
    settings: SyncSettings,
    holder: String,
    cycle_lock: Mutex<()>,
}

impl SyncEngine<HttpRemote> {
    /// Build an engine talking HTTP to `settings.api_base_url`.
    pub fn connect(db: DatabaseService, settings: SyncSettings) -> Result<Self> {
        let remote = HttpRemote::new(&settings).map_err(|error| {
            Error::Config(crate::config::ConfigError::Invalid(error.to_string()))
        })?;
        Self::new(db, remote, settings)
    }
}

impl<R: RemoteAuthority> SyncEngine<R> {
    pub fn new(db: DatabaseService, remote: R, settings: SyncSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            db,
            dispatcher: BatchDispatcher::new(remote, settings.request_timeout),
            settings,
            holder: Uuid::now_v7().to_string(),
            cycle_lock: Mutex::new(()),
        })
    }

    pub const fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub const fn database(&self) -> &DatabaseService {
        &self.db
    }

    /// Run one cycle to completion.
    pub async fn run_cycle(&self) -> Result<SyncReport> {
        self.run_cycle_with_cancel(&CancellationToken::new()).await
    }

    /// Run one cycle, skipping remaining batches once `cancel` fires.
    ///
    /// A batch already sent is always applied in full.
    pub async fn run_cycle_with_cancel(&self, cancel: &CancellationToken) -> Result<SyncReport> {
        let Ok(_cycle) = self.cycle_lock.try_lock() else {
            return Err(Error::SyncInProgress);
        };
        self.acquire_lease().await?;

        let result = self.run_leased(cancel).await;

        if let Err(error) = self.release_lease().await {
            tracing::warn!(%error, "Failed to release sync lease");
        }
        result
    }

    /// Pending count, last completed cycle, and a fresh reachability probe.
    pub async fn status(&self) -> Result<SyncStatusReport> {
        let pending = self.db.pending_count(self.settings.retry_ceiling).await?;
        let last_sync_at = self.db.last_sync_at().await?;
        let reachable = self.probe().await;
        Ok(SyncStatusReport {
            pending,
            last_sync_at,
            reachable,
        })
    }

    async fn probe(&self) -> bool {
        let probe = self.dispatcher.remote().health();
        match tokio::time::timeout(self.settings.probe_timeout, probe).await {
            Ok(Ok(())) => true,
            Ok(Err(error)) => {
                tracing::info!(%error, "Remote authority unreachable");
                false
            }
            Err(_) => {
                tracing::info!(
                    timeout = ?self.settings.probe_timeout,
                    "Remote authority probe timed out"
                );
                false
            }
        }
    }

    async fn acquire_lease(&self) -> Result<()> {
        if self.renew_lease().await? {
            Ok(())
        } else {
            tracing::info!("Sync lease held elsewhere");
            Err(Error::SyncInProgress)
        }
    }

    /// Take or extend the persisted lease for another `lease_ttl`.
    async fn renew_lease(&self) -> Result<bool> {
        let now = now_millis();
        let expires_at = now.saturating_add(duration_millis(self.settings.lease_ttl));
        let db = self.db.lock().await;
        SqliteSyncMetaRepository::new(db.connection())
            .try_acquire_lease(&self.holder, now, expires_at)
    }

    async fn release_lease(&self) -> Result<()> {
        let db = self.db.lock().await;
        SqliteSyncMetaRepository::new(db.connection()).release_lease(&self.holder)
    }

    async fn run_leased(&self, cancel: &CancellationToken) -> Result<SyncReport> {
        if !self.probe().await {
            return Ok(SyncReport::default());
        }

        let pending = {
            let db = self.db.lock().await;
            SqliteQueueRepository::new(db.connection())
                .select_pending(self.settings.retry_ceiling)?
        };
        tracing::info!(pending = pending.len(), "Starting sync cycle");

        let mut report = SyncReport {
            reachable: true,
            ..SyncReport::default()
        };

        for batch in pending.chunks(self.settings.batch_size) {
            if cancel.is_cancelled() {
                tracing::info!(
                    skipped = pending.len() - report.total,
                    "Sync cycle cancelled"
                );
                report.cancelled = true;
                break;
            }
            if !self.renew_lease().await? {
                tracing::warn!(
                    skipped = pending.len() - report.total,
                    "Sync lease taken over, stopping cycle"
                );
                report.cancelled = true;
                break;
            }

            report.total += batch.len();
            let dispatched = self.dispatcher.dispatch(batch).await;
            self.apply_batch(&dispatched, &mut report).await?;
        }

        if !report.cancelled {
            let db = self.db.lock().await;
            SqliteSyncMetaRepository::new(db.connection()).set_last_sync_at(now_millis())?;
        }

        tracing::info!(
            total = report.total,
            success = report.success,
            failed = report.failed,
            conflicts = report.conflicts,
            "Finished sync cycle"
        );
        Ok(report)
    }

    /// Apply one batch's outcomes atomically.
    async fn apply_batch(&self, dispatched: &[Dispatched], report: &mut SyncReport) -> Result<()> {
        let db = self.db.lock().await;
        let tx = db.connection().unchecked_transaction()?;
        let mut tally = *report;

        for Dispatched { item, outcome } in dispatched {
            match outcome {
                ItemOutcome::Accepted {
                    server_id,
                    conflict: None,
                } => {
                    self.apply_accepted(&tx, item, server_id.as_deref(), None)?;
                    tally.success += 1;
                }
                ItemOutcome::Accepted {
                    server_id,
                    conflict: Some(server_version),
                } => {
                    self.apply_accepted(&tx, item, server_id.as_deref(), Some(server_version))?;
                    tally.success += 1;
                    tally.conflicts += 1;
                }
                ItemOutcome::Rejected { reason } => {
                    Self::apply_rejected(&tx, item, reason)?;
                    tally.failed += 1;
                }
                ItemOutcome::TransportFailure { message } => {
                    self.apply_transport_failure(&tx, item, message)?;
                    tally.failed += 1;
                }
            }
        }

        tx.commit()?;
        *report = tally;
        Ok(())
    }

    /// Status follows the queue: `error` while any item for the task is
    /// exhausted, otherwise `synced` only once nothing is left pending.
    fn apply_accepted(
        &self,
        conn: &Connection,
        item: &SyncQueueItem,
        server_id: Option<&str>,
        server_version: Option<&TaskVersion>,
    ) -> Result<()> {
        let queue = SqliteQueueRepository::new(conn);
        let tasks = SqliteTaskRepository::new(conn);
        queue.delete(&item.id)?;

        let Some(local) = tasks.get(&item.task_id)? else {
            tracing::warn!(task_id = %item.task_id, "Accepted item for missing task");
            return Ok(());
        };

        let mut fields = TaskFields {
            server_id: server_id.map(str::to_string),
            last_synced_at: Some(now_millis()),
            sync_error: Some(None),
            ..TaskFields::default()
        };

        if let Some(remote) = server_version {
            let local_version = local.version();
            let winner = resolver::resolve(&local_version, remote);
            SqliteSyncMetaRepository::new(conn).record_conflict(&SyncConflict {
                id: 0,
                task_id: item.task_id,
                local_updated_at: local_version.updated_at,
                remote_updated_at: remote.updated_at,
                winner,
                resolved_at: now_millis(),
                strategy: resolver::STRATEGY.to_string(),
            })?;
            tracing::info!(task_id = %item.task_id, %winner, "Resolved sync conflict");

            match winner {
                Winner::Local => {
                    // A later queued mutation already carries a version at least this new
                    if queue.count_pending_for_task(&item.task_id, self.settings.retry_ceiling)?
                        == 0
                    {
                        queue.insert(&SyncQueueItem::new(Operation::Update, local_version))?;
                    }
                }
                Winner::Remote => {
                    let remote_fields = remote.to_fields();
                    fields = TaskFields {
                        title: remote_fields.title,
                        description: remote_fields.description,
                        completed: remote_fields.completed,
                        is_deleted: remote_fields.is_deleted,
                        created_at: remote_fields.created_at,
                        updated_at: remote_fields.updated_at,
                        ..fields
                    };
                }
            }
        }

        let remaining = queue.count_pending_for_task(&item.task_id, self.settings.retry_ceiling)?;
        let exhausted =
            queue.count_exhausted_for_task(&item.task_id, self.settings.retry_ceiling)?;
        if exhausted > 0 {
            // Keep the exhaustion message visible
            fields.sync_error = None;
        }
        fields.sync_status = Some(if exhausted > 0 {
            SyncStatus::Error
        } else if remaining == 0 {
            SyncStatus::Synced
        } else {
            SyncStatus::Pending
        });

        tasks.update(&item.task_id, &fields)?;
        tracing::debug!(
            task_id = %item.task_id,
            item_id = %item.id,
            server_id = ?server_id,
            remaining,
            exhausted,
            "Applied accepted item"
        );
        Ok(())
    }

    fn apply_rejected(conn: &Connection, item: &SyncQueueItem, reason: &str) -> Result<()> {
        SqliteQueueRepository::new(conn).delete(&item.id)?;
        tracing::warn!(
            task_id = %item.task_id,
            item_id = %item.id,
            operation = %item.operation,
            reason,
            "Remote authority rejected item"
        );
        Self::mark_error(conn, item, reason)
    }

    fn apply_transport_failure(
        &self,
        conn: &Connection,
        item: &SyncQueueItem,
        message: &str,
    ) -> Result<()> {
        let retry_count = SqliteQueueRepository::new(conn).increment_retry(&item.id, message)?;
        if retry_count >= self.settings.retry_ceiling {
            tracing::warn!(
                task_id = %item.task_id,
                item_id = %item.id,
                retry_count,
                error = message,
                "Queue item exhausted its retries"
            );
            Self::mark_error(conn, item, message)
        } else {
            tracing::debug!(item_id = %item.id, retry_count, "Transport failure, will retry");
            Ok(())
        }
    }

    fn mark_error(conn: &Connection, item: &SyncQueueItem, message: &str) -> Result<()> {
        let tasks = SqliteTaskRepository::new(conn);
        if tasks.get(&item.task_id)?.is_none() {
            return Ok(());
        }
        tasks.update(
            &item.task_id,
            &TaskFields {
                sync_status: Some(SyncStatus::Error),
                sync_error: Some(Some(crate::util::compact_text(message))),
                ..TaskFields::default()
            },
        )?;
        Ok(())
    }
}

fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

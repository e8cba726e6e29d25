//! Sync bookkeeping: last completed cycle, the cycle lease, and the conflict log

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT

use crate::error::{Error, Result};
use crate::models::{SyncConflict, TaskId};
use rusqlite::{params, Connection, OptionalExtension};

const LAST_SYNC_AT_KEY: &str = "last_sync_at";

/// Trait for sync bookkeeping storage operations
pub trait SyncMetaRepository {
    /// Timestamp of the last cycle that reached the remote authority
    fn last_sync_at(&self) -> Result<Option<i64>>;

    /// Store the timestamp of a completed cycle
    fn set_last_sync_at(&self, timestamp: i64) -> Result<()>;

    /// Take the cycle lease if it is free or expired. Returns whether it was taken.
    fn try_acquire_lease(&self, holder: &str, now: i64, expires_at: i64) -> Result<bool>;

    /// Give up the lease, if `holder` still owns it
    fn release_lease(&self, holder: &str) -> Result<()>;

    /// Append an entry to the conflict log
    fn record_conflict(&self, conflict: &SyncConflict) -> Result<i64>;

    /// Most recent conflicts first
    fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>>;
}

/// `SQLite` implementation of `SyncMetaRepository`
pub struct SqliteSyncMetaRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSyncMetaRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM sync_meta WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO sync_meta (key, value) VALUES (?, ?)",
            params![key, value],
        )?;
        Ok(())
    }
}

impl SyncMetaRepository for SqliteSyncMetaRepository<'_> {
    fn last_sync_at(&self) -> Result<Option<i64>> {
        self.get_meta(LAST_SYNC_AT_KEY)?
            .map(|value| {
                value
                    .parse()
                    .map_err(|_| Error::Database(format!("corrupt {LAST_SYNC_AT_KEY} '{value}'")))
            })
            .transpose()
    }

    fn set_last_sync_at(&self, timestamp: i64) -> Result<()> {
        self.set_meta(LAST_SYNC_AT_KEY, &timestamp.to_string())
    }

    fn try_acquire_lease(&self, holder: &str, now: i64, expires_at: i64) -> Result<bool> {
        let changed = self.conn.execute(
            "INSERT INTO sync_lease (id, holder, expires_at) VALUES (1, ?1, ?3)
             ON CONFLICT(id) DO UPDATE SET holder = excluded.holder, expires_at = excluded.expires_at
             WHERE sync_lease.expires_at <= ?2 OR sync_lease.holder = ?1",
            params![holder, now, expires_at],
        )?;
        Ok(changed == 1)
    }

    fn release_lease(&self, holder: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM sync_lease WHERE id = 1 AND holder = ?",
            params![holder],
        )?;
        Ok(())
    }

    fn record_conflict(&self, conflict: &SyncConflict) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO sync_conflicts
                (task_id, local_updated_at, remote_updated_at, winner, resolved_at, strategy)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                conflict.task_id.as_str(),
                conflict.local_updated_at,
                conflict.remote_updated_at,
                conflict.winner.as_str(),
                conflict.resolved_at,
                conflict.strategy,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, task_id, local_updated_at, remote_updated_at, winner, resolved_at, strategy
             FROM sync_conflicts
             ORDER BY resolved_at DESC, id DESC
             LIMIT ?",
        )?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(
                |(id, task_id, local_updated_at, remote_updated_at, winner, resolved_at, strategy)| {
                    Ok(SyncConflict {
                        id,
                        task_id: task_id
                            .parse::<TaskId>()
                            .map_err(|error| Error::Database(error.to_string()))?,
                        local_updated_at,
                        remote_updated_at,
                        winner: winner.parse()?,
                        resolved_at,
                        strategy,
                    })
                },
            )
            .collect()
    }
}

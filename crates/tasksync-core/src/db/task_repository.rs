//! Task repository implementation (the record store)

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT

use crate::error::{Error, Result};
use crate::models::{Task, TaskFields, TaskId};
use rusqlite::{params, Connection, OptionalExtension};

const TASK_COLUMNS: &str = "id, title, description, completed, created_at, updated_at, \
     is_deleted, sync_status, server_id, last_synced_at, sync_error";

/// Which tasks a listing should return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskFilter {
    /// Non-deleted tasks
    Active,
    /// Tasks whose status is `pending` or `error`, deleted ones included
    NeedingSync,
    /// Every task, deleted ones included
    All,
}

/// Trait for task storage operations
pub trait TaskRepository {
    /// Insert a new task row
    fn insert(&self, task: &Task) -> Result<()>;

    /// Get a task by ID, including soft-deleted tasks
    fn get(&self, id: &TaskId) -> Result<Option<Task>>;

    /// List tasks matching a filter, most recently updated first
    fn list(&self, filter: TaskFilter) -> Result<Vec<Task>>;

    /// Apply a partial update and return the stored result
    fn update(&self, id: &TaskId, fields: &TaskFields) -> Result<Task>;

    /// List ids of non-deleted tasks starting with a prefix
    fn list_ids_by_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<String>>;
}

/// `SQLite` implementation of `TaskRepository`
pub struct SqliteTaskRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteTaskRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a task from a database row
    fn parse_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
        let id: String = row.get(0)?;
        let status: String = row.get(7)?;
        Ok(Task {
            id: id.parse().map_err(|error| {
                rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(error))
            })?,
            title: row.get(1)?,
            description: row.get(2)?,
            completed: row.get::<_, i32>(3)? != 0,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
            is_deleted: row.get::<_, i32>(6)? != 0,
            sync_status: status.parse().map_err(|error: Error| {
                rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(error))
            })?,
            server_id: row.get(8)?,
            last_synced_at: row.get(9)?,
            sync_error: row.get(10)?,
        })
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn insert(&self, task: &Task) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO tasks ({TASK_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
            ),
            params![
                task.id.as_str(),
                task.title,
                task.description,
                i32::from(task.completed),
                task.created_at,
                task.updated_at,
                i32::from(task.is_deleted),
                task.sync_status.as_str(),
                task.server_id,
                task.last_synced_at,
                task.sync_error,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &TaskId) -> Result<Option<Task>> {
        let task = self
            .conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"),
                params![id.as_str()],
                Self::parse_task,
            )
            .optional()?;
        Ok(task)
    }

    fn list(&self, filter: TaskFilter) -> Result<Vec<Task>> {
        let predicate = match filter {
            TaskFilter::Active => "WHERE is_deleted = 0",
            TaskFilter::NeedingSync => "WHERE sync_status IN ('pending', 'error')",
            TaskFilter::All => "",
        };
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks {predicate} ORDER BY updated_at DESC, id DESC"
        ))?;

        let tasks = stmt
            .query_map([], Self::parse_task)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(tasks)
    }

    fn update(&self, id: &TaskId, fields: &TaskFields) -> Result<Task> {
        let mut task = self
            .get(id)?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        fields.apply_to(&mut task);

        self.conn.execute(
            "UPDATE tasks
             SET title = ?, description = ?, completed = ?, created_at = ?, updated_at = ?,
                 is_deleted = ?, sync_status = ?, server_id = ?, last_synced_at = ?, sync_error = ?
             WHERE id = ?",
            params![
                task.title,
                task.description,
                i32::from(task.completed),
                task.created_at,
                task.updated_at,
                i32::from(task.is_deleted),
                task.sync_status.as_str(),
                task.server_id,
                task.last_synced_at,
                task.sync_error,
                id.as_str(),
            ],
        )?;

        Ok(task)
    }

    fn list_ids_by_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<String>> {
        let escaped = prefix
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let mut stmt = self.conn.prepare(
            "SELECT id FROM tasks
             WHERE is_deleted = 0 AND id LIKE ? ESCAPE '\\'
             ORDER BY updated_at DESC
             LIMIT ?",
        )?;

        let ids = stmt
            .query_map(params![format!("{escaped}%"), limit as i64], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;

        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::SyncStatus;
    use pretty_assertions::assert_eq;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup();
        let repo = SqliteTaskRepository::new(db.connection());

        let task = Task::new("Write report", "quarterly numbers");
        repo.insert(&task).unwrap();

        let fetched = repo.get(&task.id).unwrap().unwrap();
        assert_eq!(fetched, task);
    }

    #[test]
    fn test_get_missing_returns_none() {
        let db = setup();
        let repo = SqliteTaskRepository::new(db.connection());
        assert!(repo.get(&TaskId::new()).unwrap().is_none());
    }

    #[test]
    fn test_list_filters() {
        let db = setup();
        let repo = SqliteTaskRepository::new(db.connection());

        let mut active = Task::new("Active", "");
        active.sync_status = SyncStatus::Synced;
        let mut deleted = Task::new("Deleted", "");
        deleted.is_deleted = true;
        let mut failed = Task::new("Failed", "");
        failed.sync_status = SyncStatus::Error;

        repo.insert(&active).unwrap();
        repo.insert(&deleted).unwrap();
        repo.insert(&failed).unwrap();

        let listed = repo.list(TaskFilter::Active).unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|task| !task.is_deleted));

        let needing = repo.list(TaskFilter::NeedingSync).unwrap();
        let mut titles = needing
            .iter()
            .map(|task| task.title.as_str())
            .collect::<Vec<_>>();
        titles.sort_unstable();
        assert_eq!(titles, vec!["Deleted", "Failed"]);

        assert_eq!(repo.list(TaskFilter::All).unwrap().len(), 3);
    }

    #[test]
    fn test_list_orders_by_updated_at_desc() {
        let db = setup();
        let repo = SqliteTaskRepository::new(db.connection());

        let mut older = Task::new("Older", "");
        older.updated_at = 1_000;
        let mut newer = Task::new("Newer", "");
        newer.updated_at = 2_000;
        repo.insert(&older).unwrap();
        repo.insert(&newer).unwrap();

        let listed = repo.list(TaskFilter::Active).unwrap();
        assert_eq!(listed[0].title, "Newer");
        assert_eq!(listed[1].title, "Older");
    }

    #[test]
    fn test_update_applies_only_given_fields() {
        let db = setup();
        let repo = SqliteTaskRepository::new(db.connection());

        let task = Task::new("Original", "keep me");
        repo.insert(&task).unwrap();

        let updated = repo
            .update(
                &task.id,
                &TaskFields {
                    title: Some("Renamed".to_string()),
                    server_id: Some("42".to_string()),
                    sync_status: Some(SyncStatus::Synced),
                    ..TaskFields::default()
                },
            )
            .unwrap();

        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.description, "keep me");
        assert_eq!(updated.server_id.as_deref(), Some("42"));
        assert_eq!(repo.get(&task.id).unwrap().unwrap(), updated);
    }

    #[test]
    fn test_update_missing_task_fails() {
        let db = setup();
        let repo = SqliteTaskRepository::new(db.connection());

        let err = repo
            .update(&TaskId::new(), &TaskFields::default())
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_list_ids_by_prefix_skips_deleted() {
        let db = setup();
        let repo = SqliteTaskRepository::new(db.connection());

        let visible = Task::new("Visible", "");
        let mut hidden = Task::new("Hidden", "");
        hidden.is_deleted = true;
        repo.insert(&visible).unwrap();
        repo.insert(&hidden).unwrap();

        let prefix = visible.id.as_str()[..8].to_string();
        let ids = repo.list_ids_by_prefix(&prefix, 5).unwrap();
        assert!(ids.contains(&visible.id.as_str()));
        assert!(!ids.contains(&hidden.id.as_str()));
    }
}

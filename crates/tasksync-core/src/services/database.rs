//! Shared database service wrapper used across clients.
//!
//! Every task mutation writes the task row and its queue entry in a single
//! transaction, so the queue can never disagree with the record store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use crate::db::{
    Database, QueueRepository, SqliteQueueRepository, SqliteSyncMetaRepository,
    SqliteTaskRepository, SyncMetaRepository, TaskFilter, TaskRepository,
};
use crate::models::{
    NewTask, Operation, SyncConflict, SyncQueueItem, SyncStatus, Task, TaskChanges, TaskFields,
    TaskId,
};
use crate::util::next_updated_at;
use crate::{Error, Result};

/// Thread-safe service for DB and repository operations.
#[derive(Clone)]
pub struct DatabaseService {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl DatabaseService {
    /// Open a database service at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path)?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory database service (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Path of the backing file, if any.
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Exclusive access to the connection for multi-step sync bookkeeping.
    pub(crate) async fn lock(&self) -> MutexGuard<'_, Database> {
        self.db.lock().await
    }

    /// Create a task and enqueue a `create` item.
    pub async fn create_task(&self, input: NewTask) -> Result<Task> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(Error::InvalidInput("task title cannot be empty".to_string()));
        }

        let mut task = Task::new(title, input.description.unwrap_or_default());
        task.completed = input.completed;

        let db = self.db.lock().await;
        let tx = db.connection().unchecked_transaction()?;
        SqliteTaskRepository::new(&tx).insert(&task)?;
        SqliteQueueRepository::new(&tx)
            .insert(&SyncQueueItem::new(Operation::Create, task.version()))?;
        tx.commit()?;

        tracing::debug!(task_id = %task.id, "Created task");
        Ok(task)
    }

    /// Apply user changes to a live task and enqueue an `update` item.
    pub async fn update_task(&self, id: &TaskId, changes: TaskChanges) -> Result<Task> {
        if changes.is_empty() {
            return Err(Error::InvalidInput("no changes given".to_string()));
        }
        let title = match changes.title {
            Some(title) => {
                let title = title.trim().to_string();
                if title.is_empty() {
                    return Err(Error::InvalidInput("task title cannot be empty".to_string()));
                }
                Some(title)
            }
            None => None,
        };

        let db = self.db.lock().await;
        let tx = db.connection().unchecked_transaction()?;
        let tasks = SqliteTaskRepository::new(&tx);
        let current = Self::live_task(&tasks, id)?;

        let task = tasks.update(
            id,
            &TaskFields {
                title,
                description: changes.description,
                completed: changes.completed,
                updated_at: Some(next_updated_at(current.updated_at)),
                sync_status: Some(SyncStatus::Pending),
                ..TaskFields::default()
            },
        )?;
        SqliteQueueRepository::new(&tx)
            .insert(&SyncQueueItem::new(Operation::Update, task.version()))?;
        tx.commit()?;

        tracing::debug!(task_id = %task.id, "Updated task");
        Ok(task)
    }

    /// Soft-delete a live task and enqueue a `delete` item.
    pub async fn delete_task(&self, id: &TaskId) -> Result<Task> {
        let db = self.db.lock().await;
        let tx = db.connection().unchecked_transaction()?;
        let tasks = SqliteTaskRepository::new(&tx);
        let current = Self::live_task(&tasks, id)?;

        let task = tasks.update(
            id,
            &TaskFields {
                is_deleted: Some(true),
                updated_at: Some(next_updated_at(current.updated_at)),
                sync_status: Some(SyncStatus::Pending),
                ..TaskFields::default()
            },
        )?;
        SqliteQueueRepository::new(&tx)
            .insert(&SyncQueueItem::new(Operation::Delete, task.version()))?;
        tx.commit()?;

        tracing::debug!(task_id = %task.id, "Deleted task");
        Ok(task)
    }

    fn live_task(tasks: &SqliteTaskRepository<'_>, id: &TaskId) -> Result<Task> {
        match tasks.get(id)? {
            Some(task) if !task.is_deleted => Ok(task),
            _ => Err(Error::NotFound(id.to_string())),
        }
    }

    /// Fetch a non-deleted task by id.
    pub async fn get_task(&self, id: &TaskId) -> Result<Option<Task>> {
        let db = self.db.lock().await;
        let task = SqliteTaskRepository::new(db.connection()).get(id)?;
        Ok(task.filter(|task| !task.is_deleted))
    }

    /// List non-deleted tasks, most recently updated first.
    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        let db = self.db.lock().await;
        SqliteTaskRepository::new(db.connection()).list(TaskFilter::Active)
    }

    /// List tasks whose status is `pending` or `error`, including deleted ones.
    pub async fn list_tasks_needing_sync(&self) -> Result<Vec<Task>> {
        let db = self.db.lock().await;
        SqliteTaskRepository::new(db.connection()).list(TaskFilter::NeedingSync)
    }

    /// Resolve a unique task id from a prefix.
    pub async fn resolve_id_prefix(&self, prefix: &str) -> Result<TaskId> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Err(Error::InvalidInput("task id cannot be empty".to_string()));
        }
        if let Ok(id) = prefix.parse::<TaskId>() {
            return Ok(id);
        }

        let db = self.db.lock().await;
        let matches = SqliteTaskRepository::new(db.connection()).list_ids_by_prefix(prefix, 2)?;
        match matches.as_slice() {
            [] => Err(Error::NotFound(prefix.to_string())),
            [id] => id
                .parse()
                .map_err(|error: uuid::Error| Error::Database(error.to_string())),
            _ => Err(Error::InvalidInput(format!(
                "task id prefix '{prefix}' is ambiguous"
            ))),
        }
    }

    /// List recently resolved sync conflicts.
    pub async fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>> {
        let db = self.db.lock().await;
        SqliteSyncMetaRepository::new(db.connection()).list_conflicts(limit)
    }

    /// Queue items that have reached the retry ceiling.
    pub async fn list_exhausted(&self, retry_ceiling: u32) -> Result<Vec<SyncQueueItem>> {
        let db = self.db.lock().await;
        SqliteQueueRepository::new(db.connection()).list_exhausted(retry_ceiling)
    }

    /// Number of queue items still eligible for dispatch.
    pub async fn pending_count(&self, retry_ceiling: u32) -> Result<usize> {
        let db = self.db.lock().await;
        SqliteQueueRepository::new(db.connection()).count_pending(retry_ceiling)
    }

    /// Timestamp of the last cycle that reached the remote authority.
    pub async fn last_sync_at(&self) -> Result<Option<i64>> {
        let db = self.db.lock().await;
        SqliteSyncMetaRepository::new(db.connection()).last_sync_at()
    }
}

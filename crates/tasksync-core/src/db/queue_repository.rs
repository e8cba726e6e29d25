//! Sync queue repository implementation

use crate::error::{Error, Result};
use crate::models::{QueueItemId, SyncQueueItem, TaskId};
use crate::util::now_millis;
use rusqlite::{params, Connection, OptionalExtension};

const QUEUE_COLUMNS: &str =
    "id, task_id, operation, payload, retry_count, error, created_at, updated_at";

/// Trait for sync queue storage operations
pub trait QueueRepository {
    /// Append an item to the queue
    fn insert(&self, item: &SyncQueueItem) -> Result<()>;

    /// Get a queue item by ID
    fn get(&self, id: &QueueItemId) -> Result<Option<SyncQueueItem>>;

    /// Items with `retry_count` below the ceiling, oldest first
    fn select_pending(&self, retry_ceiling: u32) -> Result<Vec<SyncQueueItem>>;

    /// Record a transport failure and return the new retry count
    fn increment_retry(&self, id: &QueueItemId, message: &str) -> Result<u32>;

    /// Remove an item once its outcome is settled
    fn delete(&self, id: &QueueItemId) -> Result<()>;

    /// Number of items still eligible for dispatch
    fn count_pending(&self, retry_ceiling: u32) -> Result<usize>;

    /// Number of dispatchable items for a single task
    fn count_pending_for_task(&self, task_id: &TaskId, retry_ceiling: u32) -> Result<usize>;

    /// Number of items for a single task that reached the retry ceiling
    fn count_exhausted_for_task(&self, task_id: &TaskId, retry_ceiling: u32) -> Result<usize>;

    /// Items that reached the retry ceiling, oldest first
    fn list_exhausted(&self, retry_ceiling: u32) -> Result<Vec<SyncQueueItem>>;
}

/// `SQLite` implementation of `QueueRepository`
pub struct SqliteQueueRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteQueueRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncQueueItem> {
        fn conversion<E>(column: usize, error: E) -> rusqlite::Error
        where
            E: std::error::Error + Send + Sync + 'static,
        {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(error),
            )
        }

        let id: String = row.get(0)?;
        let task_id: String = row.get(1)?;
        let operation: String = row.get(2)?;
        let payload: String = row.get(3)?;

        Ok(SyncQueueItem {
            id: id.parse().map_err(|error| conversion(0, error))?,
            task_id: task_id.parse().map_err(|error| conversion(1, error))?,
            operation: operation
                .parse()
                .map_err(|error: Error| conversion(2, error))?,
            payload: serde_json::from_str(&payload).map_err(|error| conversion(3, error))?,
            retry_count: row.get(4)?,
            error: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn query_items(&self, sql: &str, retry_ceiling: u32) -> Result<Vec<SyncQueueItem>> {
        let mut stmt = self.conn.prepare(sql)?;
        let items = stmt
            .query_map(params![retry_ceiling], Self::parse_item)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }
}

impl QueueRepository for SqliteQueueRepository<'_> {
    fn insert(&self, item: &SyncQueueItem) -> Result<()> {
        let payload = serde_json::to_string(&item.payload)?;
        self.conn.execute(
            &format!("INSERT INTO sync_queue ({QUEUE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"),
            params![
                item.id.as_str(),
                item.task_id.as_str(),
                item.operation.as_str(),
                payload,
                item.retry_count,
                item.error,
                item.created_at,
                item.updated_at,
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &QueueItemId) -> Result<Option<SyncQueueItem>> {
        let item = self
            .conn
            .query_row(
                &format!("SELECT {QUEUE_COLUMNS} FROM sync_queue WHERE id = ?"),
                params![id.as_str()],
                Self::parse_item,
            )
            .optional()?;
        Ok(item)
    }

    fn select_pending(&self, retry_ceiling: u32) -> Result<Vec<SyncQueueItem>> {
        // rowid breaks ties between items enqueued in the same millisecond
        self.query_items(
            &format!(
                "SELECT {QUEUE_COLUMNS} FROM sync_queue
                 WHERE retry_count < ?
                 ORDER BY created_at ASC, rowid ASC"
            ),
            retry_ceiling,
        )
    }

    fn increment_retry(&self, id: &QueueItemId, message: &str) -> Result<u32> {
        let retry_count = self
            .conn
            .query_row(
                "UPDATE sync_queue
                 SET retry_count = retry_count + 1, error = ?, updated_at = ?
                 WHERE id = ?
                 RETURNING retry_count",
                params![message, now_millis(), id.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        retry_count.ok_or_else(|| Error::NotFound(format!("queue item {id}")))
    }

    fn delete(&self, id: &QueueItemId) -> Result<()> {
        self.conn
            .execute("DELETE FROM sync_queue WHERE id = ?", params![id.as_str()])?;
        Ok(())
    }

    fn count_pending(&self, retry_ceiling: u32) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sync_queue WHERE retry_count < ?",
            params![retry_ceiling],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn count_pending_for_task(&self, task_id: &TaskId, retry_ceiling: u32) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sync_queue WHERE task_id = ? AND retry_count < ?",
            params![task_id.as_str(), retry_ceiling],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn count_exhausted_for_task(&self, task_id: &TaskId, retry_ceiling: u32) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sync_queue WHERE task_id = ? AND retry_count >= ?",
            params![task_id.as_str(), retry_ceiling],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn list_exhausted(&self, retry_ceiling: u32) -> Result<Vec<SyncQueueItem>> {
        self.query_items(
            &format!(
                "SELECT {QUEUE_COLUMNS} FROM sync_queue
                 WHERE retry_count >= ?
                 ORDER BY created_at ASC, rowid ASC"
            ),
            retry_ceiling,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, SqliteTaskRepository, TaskRepository};
    use crate::models::{Operation, Task};
    use pretty_assertions::assert_eq;

    fn setup() -> (Database, Task) {
        let db = Database::open_in_memory().unwrap();
        let task = Task::new("Queued task", "");
        SqliteTaskRepository::new(db.connection())
            .insert(&task)
            .unwrap();
        (db, task)
    }

    #[test]
    fn test_insert_and_get_round_trips_payload() {
        let (db, task) = setup();
        let repo = SqliteQueueRepository::new(db.connection());

        let item = SyncQueueItem::new(Operation::Create, task.version());
        repo.insert(&item).unwrap();

        let fetched = repo.get(&item.id).unwrap().unwrap();
        assert_eq!(fetched, item);
    }

    #[test]
    fn test_select_pending_is_fifo_and_respects_ceiling() {
        let (db, task) = setup();
        let repo = SqliteQueueRepository::new(db.connection());

        let mut first = SyncQueueItem::new(Operation::Create, task.version());
        first.created_at = 10;
        let mut second = SyncQueueItem::new(Operation::Update, task.version());
        second.created_at = 20;
        let mut exhausted = SyncQueueItem::new(Operation::Update, task.version());
        exhausted.created_at = 5;
        exhausted.retry_count = 3;

        repo.insert(&second).unwrap();
        repo.insert(&exhausted).unwrap();
        repo.insert(&first).unwrap();

        let pending = repo.select_pending(3).unwrap();
        let ids = pending.iter().map(|item| item.id).collect::<Vec<_>>();
        assert_eq!(ids, vec![first.id, second.id]);

        assert_eq!(repo.count_pending(3).unwrap(), 2);
        assert_eq!(repo.count_pending_for_task(&task.id, 3).unwrap(), 2);

        let exhausted_items = repo.list_exhausted(3).unwrap();
        assert_eq!(exhausted_items.len(), 1);
        assert_eq!(exhausted_items[0].id, exhausted.id);
    }

    #[test]
    fn test_same_millisecond_items_keep_insertion_order() {
        let (db, task) = setup();
        let repo = SqliteQueueRepository::new(db.connection());

        let mut items = Vec::new();
        for operation in [Operation::Create, Operation::Update, Operation::Delete] {
            let mut item = SyncQueueItem::new(operation, task.version());
            item.created_at = 1_000;
            repo.insert(&item).unwrap();
            items.push(item.id);
        }

        let pending = repo
            .select_pending(5)
            .unwrap()
            .into_iter()
            .map(|item| item.id)
            .collect::<Vec<_>>();
        assert_eq!(pending, items);
    }

    #[test]
    fn test_increment_retry_records_error() {
        let (db, task) = setup();
        let repo = SqliteQueueRepository::new(db.connection());

        let item = SyncQueueItem::new(Operation::Create, task.version());
        repo.insert(&item).unwrap();

        assert_eq!(repo.increment_retry(&item.id, "timed out").unwrap(), 1);
        assert_eq!(repo.increment_retry(&item.id, "refused").unwrap(), 2);

        let fetched = repo.get(&item.id).unwrap().unwrap();
        assert_eq!(fetched.retry_count, 2);
        assert_eq!(fetched.error.as_deref(), Some("refused"));
        assert_eq!(fetched.payload, item.payload);
    }

    #[test]
    fn test_increment_retry_missing_item() {
        let (db, _task) = setup();
        let repo = SqliteQueueRepository::new(db.connection());

        let err = repo.increment_retry(&QueueItemId::new(), "x").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_delete_removes_item() {
        let (db, task) = setup();
        let repo = SqliteQueueRepository::new(db.connection());

        let item = SyncQueueItem::new(Operation::Delete, task.version());
        repo.insert(&item).unwrap();
        repo.delete(&item.id).unwrap();

        assert!(repo.get(&item.id).unwrap().is_none());
        assert_eq!(repo.count_pending(5).unwrap(), 0);
    }

    #[test]
    fn test_per_task_counts_split_at_ceiling() {
        let (db, task) = setup();
        let repo = SqliteQueueRepository::new(db.connection());

        let stuck = SyncQueueItem::new(Operation::Create, task.version());
        let fresh = SyncQueueItem::new(Operation::Update, task.version());
        repo.insert(&stuck).unwrap();
        repo.insert(&fresh).unwrap();
        for _ in 0..3 {
            repo.increment_retry(&stuck.id, "HTTP 502").unwrap();
        }

        assert_eq!(repo.count_pending_for_task(&task.id, 3).unwrap(), 1);
        assert_eq!(repo.count_exhausted_for_task(&task.id, 3).unwrap(), 1);
        assert_eq!(repo.count_exhausted_for_task(&task.id, 4).unwrap(), 0);
    }

    #[test]
    fn test_queue_item_requires_existing_task() {
        let (db, _task) = setup();
        let repo = SqliteQueueRepository::new(db.connection());

        let orphan = Task::new("Never stored", "");
        let item = SyncQueueItem::new(Operation::Create, orphan.version());
        assert!(repo.insert(&item).is_err());
    }
}

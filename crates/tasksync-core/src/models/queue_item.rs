//! Sync queue item model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{TaskId, TaskVersion};
use crate::error::Error;

/// Identifier of a queue entry (distinct from the task id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueItemId(Uuid);

impl QueueItemId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for QueueItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QueueItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueItemId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Kind of local mutation carried by a queue item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(Error::Database(format!("unknown queue operation '{other}'"))),
        }
    }
}

/// A pending mutation awaiting propagation to the remote authority.
///
/// The payload is written once; only `retry_count` and `error` change until
/// the item is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncQueueItem {
    pub id: QueueItemId,
    /// Back-reference to the owning task
    pub task_id: TaskId,
    pub operation: Operation,
    /// Snapshot of the task at enqueue time
    pub payload: TaskVersion,
    pub retry_count: u32,
    /// Last failure message
    pub error: Option<String>,
    /// Enqueue timestamp (Unix ms)
    pub created_at: i64,
    /// Last retry bookkeeping timestamp (Unix ms)
    pub updated_at: i64,
}

impl SyncQueueItem {
    /// Create a fresh queue item with a zero retry count
    #[must_use]
    pub fn new(operation: Operation, payload: TaskVersion) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: QueueItemId::new(),
            task_id: payload.id,
            operation,
            payload,
            retry_count: 0,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this item has used up its transport retries
    pub const fn is_exhausted(&self, retry_ceiling: u32) -> bool {
        self.retry_count >= retry_ceiling
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Task;

    #[test]
    fn test_new_item_points_at_payload_task() {
        let task = Task::new("Queued", "");
        let item = SyncQueueItem::new(Operation::Create, task.version());
        assert_eq!(item.task_id, task.id);
        assert_eq!(item.retry_count, 0);
        assert!(item.error.is_none());
        assert!(!item.is_exhausted(5));
    }

    #[test]
    fn test_operation_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Operation::Delete).unwrap(),
            "\"delete\""
        );
        assert_eq!("update".parse::<Operation>().unwrap(), Operation::Update);
        assert!("upsert".parse::<Operation>().is_err());
    }

    #[test]
    fn test_exhaustion_at_ceiling() {
        let task = Task::new("Flaky", "");
        let mut item = SyncQueueItem::new(Operation::Update, task.version());
        item.retry_count = 4;
        assert!(!item.is_exhausted(5));
        item.retry_count = 5;
        assert!(item.is_exhausted(5));
    }
}

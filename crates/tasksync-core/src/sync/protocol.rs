//! Batch exchange payloads shared by the client and the reference server.

use serde::{Deserialize, Serialize};

use crate::models::{Operation, QueueItemId, SyncQueueItem, TaskId, TaskVersion};

/// Body of `POST /sync/batch`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub items: Vec<BatchItem>,
}

impl BatchRequest {
    pub fn from_items(items: &[SyncQueueItem]) -> Self {
        Self {
            items: items.iter().map(BatchItem::from).collect(),
        }
    }
}

/// One queued mutation on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    pub item_id: QueueItemId,
    pub task_id: TaskId,
    pub operation: Operation,
    pub payload: TaskVersion,
}

impl From<&SyncQueueItem> for BatchItem {
    fn from(item: &SyncQueueItem) -> Self {
        Self {
            item_id: item.id,
            task_id: item.task_id,
            operation: item.operation,
            payload: item.payload.clone(),
        }
    }
}

/// Response to a batch exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResponse {
    #[serde(default)]
    pub results: Vec<ItemResult>,
}

/// The remote authority's verdict on one item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemResult {
    Accepted {
        item_id: QueueItemId,
        /// Omitted when the authority has nothing new to assign
        #[serde(default, skip_serializing_if = "Option::is_none")]
        server_id: Option<String>,
        /// Present when the authority kept a version that differs from ours
        #[serde(default, skip_serializing_if = "Option::is_none")]
        server_version: Option<TaskVersion>,
    },
    Rejected {
        item_id: QueueItemId,
        reason: String,
    },
}

impl ItemResult {
    pub const fn item_id(&self) -> QueueItemId {
        match self {
            Self::Accepted { item_id, .. } | Self::Rejected { item_id, .. } => *item_id,
        }
    }
}

//! In-memory authoritative task state for the reference server.

use std::collections::HashMap;

use tasksync_core::sync::{BatchItem, ItemResult};
use tasksync_core::{TaskId, TaskVersion};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct StoredTask {
    server_id: String,
    version: TaskVersion,
}

#[derive(Debug, Default)]
struct StoreState {
    last_server_id: u64,
    tasks: HashMap<TaskId, StoredTask>,
}

impl StoreState {
    fn allocate_server_id(&mut self) -> String {
        self.last_server_id += 1;
        self.last_server_id.to_string()
    }
}

#[derive(Debug, Default)]
pub struct TaskStore {
    state: Mutex<StoreState>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a batch in request order, one verdict per item.
    pub async fn apply(&self, items: Vec<BatchItem>) -> Vec<ItemResult> {
        let mut state = self.state.lock().await;
        items
            .into_iter()
            .map(|item| apply_item(&mut state, item))
            .collect()
    }

    /// Current authoritative version of a task, with its server id.
    pub async fn get(&self, task_id: &TaskId) -> Option<(String, TaskVersion)> {
        let state = self.state.lock().await;
        state
            .tasks
            .get(task_id)
            .map(|stored| (stored.server_id.clone(), stored.version.clone()))
    }

    pub async fn task_count(&self) -> usize {
        self.state.lock().await.tasks.len()
    }

    /// Replace or seed a task version directly, as another client would have.
    pub async fn put(&self, version: TaskVersion) -> String {
        let mut state = self.state.lock().await;
        let server_id = match state.tasks.get(&version.id) {
            Some(existing) => existing.server_id.clone(),
            None => state.allocate_server_id(),
        };
        state.tasks.insert(
            version.id,
            StoredTask {
                server_id: server_id.clone(),
                version,
            },
        );
        server_id
    }
}

fn apply_item(state: &mut StoreState, item: BatchItem) -> ItemResult {
    if let Some(reason) = validate(&item) {
        tracing::info!(item = %item.item_id, task = %item.task_id, reason, "Rejected sync item");
        return ItemResult::Rejected {
            item_id: item.item_id,
            reason: reason.to_string(),
        };
    }

    let Some(stored) = state.tasks.get_mut(&item.task_id) else {
        let server_id = state.allocate_server_id();
        tracing::debug!(task = %item.task_id, server_id = %server_id, "Stored new task");
        state.tasks.insert(
            item.task_id,
            StoredTask {
                server_id: server_id.clone(),
                version: item.payload,
            },
        );
        return ItemResult::Accepted {
            item_id: item.item_id,
            server_id: Some(server_id),
            server_version: None,
        };
    };

    // Missing timestamps sort first, so a stored version without one always loses
    if item.payload.updated_at >= stored.version.updated_at {
        stored.version = item.payload;
        return ItemResult::Accepted {
            item_id: item.item_id,
            server_id: Some(stored.server_id.clone()),
            server_version: None,
        };
    }

    tracing::info!(
        task = %item.task_id,
        incoming = ?item.payload.updated_at,
        stored = ?stored.version.updated_at,
        "Kept newer stored version"
    );
    ItemResult::Accepted {
        item_id: item.item_id,
        server_id: Some(stored.server_id.clone()),
        server_version: Some(stored.version.clone()),
    }
}

fn validate(item: &BatchItem) -> Option<&'static str> {
    if item.payload.id != item.task_id {
        Some("payload id does not match task_id")
    } else if item.payload.title.trim().is_empty() {
        Some("title must not be empty")
    } else {
        None
    }
}

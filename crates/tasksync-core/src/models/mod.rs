//! Data models for tasksync

mod queue_item;
mod sync_conflict;
mod task;

pub use queue_item::{Operation, QueueItemId, SyncQueueItem};
pub use sync_conflict::{SyncConflict, Winner};
pub use task::{NewTask, SyncStatus, Task, TaskChanges, TaskFields, TaskId, TaskVersion};

//! Database layer for tasksync

mod connection;
mod migrations;
mod queue_repository;
mod sync_meta_repository;
mod task_repository;

pub use connection::Database;
pub use queue_repository::{QueueRepository, SqliteQueueRepository};
pub use sync_meta_repository::{SqliteSyncMetaRepository, SyncMetaRepository};
pub use task_repository::{SqliteTaskRepository, TaskFilter, TaskRepository};

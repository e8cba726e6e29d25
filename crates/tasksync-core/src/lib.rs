//! tasksync-core - Core library for tasksync
//!
//! This crate contains the task models, the local record and queue stores,
//! and the sync engine that reconciles them with a remote authority. The CLI
//! and the reference API server are thin layers on top of it.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod sync;
pub mod util;

pub use config::{ConfigError, SyncSettings};
pub use error::{Error, Result};
pub use models::{
    NewTask, Operation, SyncConflict, SyncQueueItem, SyncStatus, Task, TaskChanges, TaskId,
    TaskVersion, Winner,
};
pub use services::DatabaseService;
pub use sync::{HttpRemote, SyncEngine, SyncReport, SyncStatusReport};

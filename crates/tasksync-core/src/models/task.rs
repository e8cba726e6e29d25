//! Task model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;

/// A unique identifier for a task, using UUID v7 (time-sortable)
///
/// Assigned by the client at creation and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Create a new unique task ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Convergence state of a task with the remote authority.
///
/// Derived by the sync engine; never set directly by users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// At least one queued mutation has not been delivered yet
    #[default]
    Pending,
    /// No queued mutations remain and the last exchange succeeded
    Synced,
    /// Rejected by the remote, or retries exhausted
    Error,
}

impl SyncStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synced => "synced",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "synced" => Ok(Self::Synced),
            "error" => Ok(Self::Error),
            other => Err(Error::Database(format!("unknown sync status '{other}'"))),
        }
    }
}

/// A task in the local store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub completed: bool,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms), the conflict-resolution clock
    pub updated_at: i64,
    /// Soft delete flag; deleted tasks stay around for sync propagation
    pub is_deleted: bool,
    pub sync_status: SyncStatus,
    /// Identifier assigned by the remote authority once accepted
    pub server_id: Option<String>,
    /// Last successful reconciliation (Unix ms)
    pub last_synced_at: Option<i64>,
    /// Reason for the last rejection or exhausted retry, cleared on success
    pub sync_error: Option<String>,
}

impl Task {
    /// Create a new pending task with the given title and description
    #[must_use]
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: TaskId::new(),
            title: title.into(),
            description: description.into(),
            completed: false,
            created_at: now,
            updated_at: now,
            is_deleted: false,
            sync_status: SyncStatus::Pending,
            server_id: None,
            last_synced_at: None,
            sync_error: None,
        }
    }

    /// Snapshot of the user-visible fields, as sent to the remote authority
    #[must_use]
    pub fn version(&self) -> TaskVersion {
        TaskVersion {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            completed: self.completed,
            created_at: Some(self.created_at),
            updated_at: Some(self.updated_at),
            is_deleted: self.is_deleted,
        }
    }
}

/// Serialized snapshot of a task exchanged with the remote authority.
///
/// Timestamps are optional because a remote version may omit them; a missing
/// `updated_at` sorts before any present one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskVersion {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<i64>,
    #[serde(default)]
    pub is_deleted: bool,
}

impl TaskVersion {
    /// Field changes that make a local task match this version exactly
    #[must_use]
    pub fn to_fields(&self) -> TaskFields {
        TaskFields {
            title: Some(self.title.clone()),
            description: Some(self.description.clone()),
            completed: Some(self.completed),
            is_deleted: Some(self.is_deleted),
            created_at: self.created_at,
            updated_at: self.updated_at,
            ..TaskFields::default()
        }
    }
}

/// Input for creating a task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// User-editable changes to an existing task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
}

impl TaskChanges {
    pub const fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.completed.is_none()
    }
}

/// Partial update applied by the record store; `None` leaves a column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFields {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
    pub is_deleted: Option<bool>,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
    pub sync_status: Option<SyncStatus>,
    pub server_id: Option<String>,
    pub last_synced_at: Option<i64>,
    /// `Some(None)` clears the stored error
    pub sync_error: Option<Option<String>>,
}

impl TaskFields {
    /// Apply these fields to a task in memory
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            task.description.clone_from(description);
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
        if let Some(is_deleted) = self.is_deleted {
            task.is_deleted = is_deleted;
        }
        if let Some(created_at) = self.created_at {
            task.created_at = created_at;
        }
        if let Some(updated_at) = self.updated_at {
            task.updated_at = updated_at;
        }
        if let Some(status) = self.sync_status {
            task.sync_status = status;
        }
        if let Some(server_id) = &self.server_id {
            task.server_id = Some(server_id.clone());
        }
        if let Some(last_synced_at) = self.last_synced_at {
            task.last_synced_at = Some(last_synced_at);
        }
        if let Some(sync_error) = &self.sync_error {
            task.sync_error.clone_from(sync_error);
        }
    }
}

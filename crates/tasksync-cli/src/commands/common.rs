use std::env;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tasksync_core::models::SyncQueueItem;
use tasksync_core::{DatabaseService, SyncConflict, SyncReport, SyncSettings, Task};

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct TaskListItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub is_deleted: bool,
    pub sync_status: String,
    pub server_id: Option<String>,
    pub sync_error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub last_synced_at: Option<i64>,
    pub relative_time: String,
}

#[derive(Debug, Serialize)]
pub struct SyncConflictItem {
    pub id: i64,
    pub task_id: String,
    pub local_updated_at: Option<i64>,
    pub remote_updated_at: Option<i64>,
    pub winner: String,
    pub resolved_at: i64,
    pub resolved_at_iso: String,
    pub strategy: String,
}

#[derive(Debug, Serialize)]
pub struct FailedItem {
    pub item_id: String,
    pub task_id: String,
    pub operation: String,
    pub retry_count: u32,
    pub error: Option<String>,
    pub created_at: i64,
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("TASKSYNC_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tasksync")
        .join("tasksync.db")
}

pub async fn open_database(path: &Path) -> Result<DatabaseService, CliError> {
    Ok(DatabaseService::open_path(path).await?)
}

pub fn load_sync_settings() -> Result<SyncSettings, CliError> {
    Ok(SyncSettings::from_env()?)
}

pub async fn resolve_task(task_query: &str, db: &DatabaseService) -> Result<Task, CliError> {
    let task_query = normalize_task_identifier(task_query)?;

    let task_id = match db.resolve_id_prefix(&task_query).await {
        Ok(task_id) => task_id,
        Err(tasksync_core::Error::NotFound(_)) => {
            return Err(CliError::TaskNotFound(task_query));
        }
        Err(tasksync_core::Error::InvalidInput(_)) => {
            return Err(CliError::AmbiguousTaskId(format!(
                "ID prefix '{task_query}' is ambiguous"
            )));
        }
        Err(error) => return Err(error.into()),
    };

    db.get_task(&task_id)
        .await?
        .ok_or(CliError::TaskNotFound(task_query))
}

pub fn normalize_task_identifier(id: &str) -> Result<String, CliError> {
    let id = id.trim();
    if id.is_empty() {
        Err(CliError::EmptyTaskId)
    } else {
        Ok(id.to_string())
    }
}

pub fn normalize_title(parts: &[String]) -> Result<String, CliError> {
    let title = parts
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if title.is_empty() {
        Err(CliError::EmptyTitle)
    } else {
        Ok(title)
    }
}

pub fn short_id(id: &str) -> String {
    id.chars().take(13).collect()
}

pub fn format_task_lines(tasks: &[Task]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    tasks
        .iter()
        .map(|task| {
            let id = short_id(&task.id.to_string());
            let check = if task.completed { "[x]" } else { "[ ]" };
            let title = truncate(&task.title, 40);
            let status = task.sync_status.as_str();
            let relative_time = format_relative_time(task.updated_at, now_ms);
            let deleted = if task.is_deleted { "  (deleted)" } else { "" };
            format!("{id:<13}  {check} {title:<40}  {status:<7}  {relative_time}{deleted}")
        })
        .collect()
}

pub fn format_task_details(task: &Task) -> Vec<String> {
    let mut lines = vec![
        format!("id:          {}", task.id),
        format!("title:       {}", task.title),
    ];
    if !task.description.is_empty() {
        lines.push(format!("description: {}", task.description));
    }
    lines.push(format!(
        "completed:   {}",
        if task.completed { "yes" } else { "no" }
    ));
    lines.push(format!("created:     {}", format_sync_timestamp(task.created_at)));
    lines.push(format!("updated:     {}", format_sync_timestamp(task.updated_at)));
    lines.push(format!("sync status: {}", task.sync_status));
    if let Some(server_id) = &task.server_id {
        lines.push(format!("server id:   {server_id}"));
    }
    if let Some(last_synced_at) = task.last_synced_at {
        lines.push(format!("last synced: {}", format_sync_timestamp(last_synced_at)));
    }
    if let Some(error) = &task.sync_error {
        lines.push(format!("sync error:  {error}"));
    }
    lines
}

pub fn task_to_list_item(task: &Task) -> TaskListItem {
    let now_ms = Utc::now().timestamp_millis();
    TaskListItem {
        id: task.id.to_string(),
        title: task.title.clone(),
        description: task.description.clone(),
        completed: task.completed,
        is_deleted: task.is_deleted,
        sync_status: task.sync_status.to_string(),
        server_id: task.server_id.clone(),
        sync_error: task.sync_error.clone(),
        created_at: task.created_at,
        updated_at: task.updated_at,
        last_synced_at: task.last_synced_at,
        relative_time: format_relative_time(task.updated_at, now_ms),
    }
}

pub fn sync_conflict_to_item(conflict: &SyncConflict) -> SyncConflictItem {
    SyncConflictItem {
        id: conflict.id,
        task_id: conflict.task_id.to_string(),
        local_updated_at: conflict.local_updated_at,
        remote_updated_at: conflict.remote_updated_at,
        winner: conflict.winner.to_string(),
        resolved_at: conflict.resolved_at,
        resolved_at_iso: format_sync_timestamp(conflict.resolved_at),
        strategy: conflict.strategy.clone(),
    }
}

pub fn failed_to_item(item: &SyncQueueItem) -> FailedItem {
    FailedItem {
        item_id: item.id.to_string(),
        task_id: item.task_id.to_string(),
        operation: item.operation.to_string(),
        retry_count: item.retry_count,
        error: item.error.clone(),
        created_at: item.created_at,
    }
}

pub fn format_sync_conflict_lines(conflicts: &[SyncConflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            format!(
                "{}  {:<4}  task={}  winner={}  local={} remote={}",
                format_sync_timestamp(conflict.resolved_at),
                conflict.strategy,
                conflict.task_id,
                conflict.winner,
                format_optional_millis(conflict.local_updated_at),
                format_optional_millis(conflict.remote_updated_at),
            )
        })
        .collect()
}

pub fn format_failed_lines(items: &[SyncQueueItem]) -> Vec<String> {
    items
        .iter()
        .map(|item| {
            format!(
                "{:<13}  task={}  {:<6}  retries={}  {}",
                short_id(&item.id.to_string()),
                short_id(&item.task_id.to_string()),
                item.operation,
                item.retry_count,
                item.error.as_deref().unwrap_or("-")
            )
        })
        .collect()
}

pub fn format_sync_report(report: &SyncReport) -> String {
    if !report.reachable {
        return "Server unreachable; nothing was sent".to_string();
    }

    let mut line = format!(
        "Synced {} item(s): {} succeeded, {} failed, {} conflict(s)",
        report.total, report.success, report.failed, report.conflicts
    );
    if report.cancelled {
        line.push_str(" (cancelled)");
    }
    line
}

fn format_optional_millis(value: Option<i64>) -> String {
    value.map_or_else(|| "-".to_string(), |millis| millis.to_string())
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn truncate(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

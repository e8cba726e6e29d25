use std::path::Path;

use tasksync_core::Task;

use crate::commands::common::{format_task_lines, open_database, task_to_list_item, TaskListItem};
use crate::error::CliError;

pub async fn list_tasks(needs_sync: bool, db_path: &Path) -> Result<Vec<Task>, CliError> {
    let db = open_database(db_path).await?;
    if needs_sync {
        Ok(db.list_tasks_needing_sync().await?)
    } else {
        Ok(db.list_tasks().await?)
    }
}

pub async fn run_list(needs_sync: bool, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let tasks = list_tasks(needs_sync, db_path).await?;

    if as_json {
        let json_items = tasks
            .iter()
            .map(task_to_list_item)
            .collect::<Vec<TaskListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if tasks.is_empty() {
        println!("No tasks.");
    } else {
        for line in format_task_lines(&tasks) {
            println!("{line}");
        }
    }

    Ok(())
}

use std::path::Path;

use tasksync_core::NewTask;

use crate::commands::common::{normalize_title, open_database};
use crate::error::CliError;

pub async fn run_add(
    title_parts: &[String],
    description: Option<String>,
    db_path: &Path,
) -> Result<(), CliError> {
    let title = normalize_title(title_parts)?;

    let db = open_database(db_path).await?;
    let task = db
        .create_task(NewTask {
            title,
            description: description.map(|description| description.trim().to_string()),
            completed: false,
        })
        .await?;

    println!("{}", task.id);
    Ok(())
}

use std::path::Path;

use tasksync_core::TaskChanges;

use crate::commands::common::{open_database, resolve_task};
use crate::error::CliError;

/// Flags accepted by `tasksync update`
#[derive(Debug, Default)]
pub struct UpdateArgs {
    pub title: Option<String>,
    pub description: Option<String>,
    pub done: bool,
    pub undone: bool,
}

impl UpdateArgs {
    pub fn into_changes(self) -> Result<TaskChanges, CliError> {
        let title = match self.title {
            Some(title) => {
                let title = title.trim().to_string();
                if title.is_empty() {
                    return Err(CliError::EmptyTitle);
                }
                Some(title)
            }
            None => None,
        };
        let completed = match (self.done, self.undone) {
            (true, _) => Some(true),
            (false, true) => Some(false),
            (false, false) => None,
        };

        let changes = TaskChanges {
            title,
            description: self.description.map(|description| description.trim().to_string()),
            completed,
        };
        if changes.is_empty() {
            Err(CliError::NoChanges)
        } else {
            Ok(changes)
        }
    }
}

pub async fn run_update(id: &str, args: UpdateArgs, db_path: &Path) -> Result<(), CliError> {
    let changes = args.into_changes()?;

    let db = open_database(db_path).await?;
    let task = resolve_task(id, &db).await?;
    let updated = db.update_task(&task.id, changes).await?;

    println!("{}", updated.id);
    Ok(())
}

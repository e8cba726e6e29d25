use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use tasksync_core::{SyncEngine, SyncReport, SyncSettings};
use tokio_util::sync::CancellationToken;

use crate::commands::common::{
    failed_to_item, format_failed_lines, format_sync_conflict_lines, format_sync_report,
    format_sync_timestamp, open_database, sync_conflict_to_item, FailedItem, SyncConflictItem,
};
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct SyncStatusOutput {
    api_base_url: String,
    pending: usize,
    last_sync_at: Option<i64>,
    last_sync_at_iso: Option<String>,
    reachable: bool,
}

/// Run one cycle, or keep cycling every `watch` until Ctrl-C.
///
/// Returns the report of the last cycle that ran.
pub async fn run_sync(
    settings: SyncSettings,
    watch: Option<Duration>,
    db_path: &Path,
) -> Result<SyncReport, CliError> {
    let db = open_database(db_path).await?;
    let engine = SyncEngine::connect(db, settings)?;

    let cancel = CancellationToken::new();
    if watch.is_some() {
        let ctrl_c = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted, finishing the current batch");
                ctrl_c.cancel();
            }
        });
    }

    loop {
        let report = engine.run_cycle_with_cancel(&cancel).await?;
        println!("{}", format_sync_report(&report));

        let Some(interval) = watch else {
            return Ok(report);
        };
        if cancel.is_cancelled() {
            return Ok(report);
        }
        tokio::select! {
            () = cancel.cancelled() => return Ok(report),
            () = tokio::time::sleep(interval) => {}
        }
    }
}

pub async fn run_sync_status(
    settings: SyncSettings,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let api_base_url = settings.api_base_url.clone();
    let db = open_database(db_path).await?;
    let engine = SyncEngine::connect(db, settings)?;
    let status = engine.status().await?;

    if as_json {
        let output = SyncStatusOutput {
            api_base_url,
            pending: status.pending,
            last_sync_at: status.last_sync_at,
            last_sync_at_iso: status.last_sync_at.map(format_sync_timestamp),
            reachable: status.reachable,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Pending:   {}", status.pending);
    println!(
        "Last sync: {}",
        status
            .last_sync_at
            .map_or_else(|| "never".to_string(), format_sync_timestamp)
    );
    println!(
        "Server:    {} ({api_base_url})",
        if status.reachable {
            "reachable"
        } else {
            "unreachable"
        }
    );
    Ok(())
}

pub async fn run_sync_conflicts(
    limit: usize,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let conflicts = db.list_conflicts(limit).await?;

    if as_json {
        let json_items = conflicts
            .iter()
            .map(sync_conflict_to_item)
            .collect::<Vec<SyncConflictItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No sync conflicts recorded.");
        return Ok(());
    }

    for line in format_sync_conflict_lines(&conflicts) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_sync_failed(
    settings: &SyncSettings,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let items = db.list_exhausted(settings.retry_ceiling).await?;

    if as_json {
        let json_items = items.iter().map(failed_to_item).collect::<Vec<FailedItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("No failed queue items.");
        return Ok(());
    }

    for line in format_failed_lines(&items) {
        println!("{line}");
    }
    Ok(())
}

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use tasksync_core::sync::{BatchRequest, BatchResponse, ItemResult};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::store::TaskStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<TaskStore>,
}

impl AppState {
    pub fn from_config(config: Arc<AppConfig>) -> Self {
        Self {
            config,
            store: Arc::new(TaskStore::new()),
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health))
        .route("/sync/batch", post(sync_batch));

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp_millis(),
    })
}

async fn sync_batch(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest>,
) -> Result<Json<BatchResponse>, AppError> {
    let limit = state.config.max_batch_items;
    if request.items.len() > limit {
        return Err(AppError::payload_too_large(format!(
            "batch has {} items, limit is {limit}",
            request.items.len()
        )));
    }

    let mut seen = HashSet::with_capacity(request.items.len());
    if let Some(duplicate) = request.items.iter().find(|item| !seen.insert(item.item_id)) {
        return Err(AppError::bad_request(format!(
            "item {} appears more than once",
            duplicate.item_id
        )));
    }

    let submitted = request.items.len();
    let results = state.store.apply(request.items).await;
    let rejected = results
        .iter()
        .filter(|result| matches!(result, ItemResult::Rejected { .. }))
        .count();
    tracing::info!(endpoint = "sync_batch", submitted, rejected, "Applied sync batch");

    Ok(Json(BatchResponse { results }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use tasksync_core::{Operation, SyncQueueItem, Task};
    use tower::ServiceExt;

    fn test_router(config: AppConfig) -> Router {
        app_router(AppState::from_config(Arc::new(config)))
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn batch_request(items: &[SyncQueueItem]) -> Request<Body> {
        let body = serde_json::to_vec(&BatchRequest::from_items(items)).unwrap();
        Request::post("/api/sync/batch")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let request = Request::get("/api/health").body(Body::empty()).unwrap();
        let (status, body) = send(test_router(AppConfig::default()), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("ok"));
        assert!(body["timestamp"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn batch_returns_one_result_per_item() {
        let task = Task::new("Ship it", "");
        let create = SyncQueueItem::new(Operation::Create, task.version());
        let mut blank = task.version();
        blank.title = String::new();
        let update = SyncQueueItem::new(Operation::Update, blank);

        let (status, body) = send(
            test_router(AppConfig::default()),
            batch_request(&[create.clone(), update.clone()]),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["results"],
            json!([
                {"status": "accepted", "item_id": create.id.to_string(), "server_id": "1"},
                {"status": "rejected", "item_id": update.id.to_string(), "reason": "title must not be empty"},
            ])
        );
    }

    #[tokio::test]
    async fn oversized_batches_are_refused() {
        let config = AppConfig {
            max_batch_items: 1,
            ..AppConfig::default()
        };
        let items: Vec<_> = (0..2)
            .map(|n| SyncQueueItem::new(Operation::Create, Task::new(format!("t{n}"), "").version()))
            .collect();

        let (status, body) = send(test_router(config), batch_request(&items)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(body["error"].as_str().unwrap().contains("limit is 1"));
    }

    #[tokio::test]
    async fn duplicate_item_ids_are_refused() {
        let item = SyncQueueItem::new(Operation::Create, Task::new("twice", "").version());
        let (status, body) = send(
            test_router(AppConfig::default()),
            batch_request(&[item.clone(), item]),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("more than once"));
    }
}

//! HTTP client for the remote authority.

use std::time::Duration;

use crate::config::SyncSettings;
use crate::util::normalize_text_option;

use super::protocol::{BatchRequest, BatchResponse};
use super::remote::{parse_api_error, RemoteAuthority, TransportError, TransportResult};

/// `reqwest`-backed [`RemoteAuthority`] talking JSON to `{base}/health` and
/// `{base}/sync/batch`.
#[derive(Clone)]
pub struct HttpRemote {
    base_url: String,
    probe_timeout: Duration,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpRemote {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpRemote")
            .field("base_url", &self.base_url)
            .field("probe_timeout", &self.probe_timeout)
            .finish_non_exhaustive()
    }
}

impl HttpRemote {
    pub fn new(settings: &SyncSettings) -> TransportResult<Self> {
        let base_url = normalize_endpoint(settings.api_base_url.clone())?;
        Ok(Self {
            base_url,
            probe_timeout: settings.probe_timeout,
            client: reqwest::Client::builder()
                .timeout(settings.request_timeout)
                .build()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn map_send_error(&self, error: reqwest::Error, timeout: Duration) -> TransportError {
        if error.is_timeout() {
            tracing::debug!(base_url = %self.base_url, "Remote probe timed out");
            TransportError::Timeout(timeout)
        } else {
            TransportError::Http(error)
        }
    }
}

impl RemoteAuthority for HttpRemote {
    async fn health(&self) -> TransportResult<()> {
        let response = self
            .client
            .get(self.url("health"))
            .timeout(self.probe_timeout)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|error| self.map_send_error(error, self.probe_timeout))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(TransportError::Api(parse_api_error(status, &body)))
        }
    }

    async fn submit_batch(&self, request: &BatchRequest) -> TransportResult<BatchResponse> {
        let response = self
            .client
            .post(self.url("sync/batch"))
            .header("Accept", "application/json")
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Api(parse_api_error(status, &body)));
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|error| TransportError::InvalidPayload(error.to_string()))
    }
}

fn normalize_endpoint(raw: String) -> TransportResult<String> {
    let endpoint = normalize_text_option(Some(raw)).ok_or_else(|| {
        TransportError::InvalidConfiguration("endpoint must not be empty".to_string())
    })?;
    if crate::util::is_http_url(&endpoint) {
        Ok(endpoint.trim_end_matches('/').to_string())
    } else {
        Err(TransportError::InvalidConfiguration(
            "endpoint must include http:// or https://".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Operation, SyncQueueItem, Task};
    use crate::sync::ItemResult;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn remote_for(server: &MockServer) -> HttpRemote {
        let settings = SyncSettings::default()
            .with_api_base_url(format!("{}/api/", server.uri()))
            .with_probe_timeout(Duration::from_millis(500))
            .with_request_timeout(Duration::from_secs(2));
        HttpRemote::new(&settings).unwrap()
    }

    #[test]
    fn normalize_endpoint_rejects_invalid_values() {
        assert!(normalize_endpoint(String::new()).is_err());
        assert!(normalize_endpoint("api.example.com".to_string()).is_err());
        assert_eq!(
            normalize_endpoint(" https://api.example.com/api/ ".to_string()).unwrap(),
            "https://api.example.com/api"
        );
    }

    #[tokio::test]
    async fn health_succeeds_on_2xx() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
            .expect(1)
            .mount(&server)
            .await;

        remote_for(&server).health().await.unwrap();
    }

    #[tokio::test]
    async fn health_reports_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/health"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = remote_for(&server).health().await.unwrap_err();
        assert!(matches!(err, TransportError::Api(message) if message == "maintenance (503)"));
    }

    #[tokio::test]
    async fn health_times_out_on_slow_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/health"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let err = remote_for(&server).health().await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)));
    }

    #[tokio::test]
    async fn submit_batch_posts_items_and_decodes_results() {
        let server = MockServer::start().await;
        let task = Task::new("Ship it", "");
        let item = SyncQueueItem::new(Operation::Create, task.version());

        Mock::given(method("POST"))
            .and(path("/api/sync/batch"))
            .and(body_partial_json(json!({
                "items": [{ "item_id": item.id.to_string(), "operation": "create" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{ "item_id": item.id.to_string(), "status": "accepted", "server_id": "1" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = remote_for(&server)
            .submit_batch(&BatchRequest::from_items(&[item.clone()]))
            .await
            .unwrap();
        assert_eq!(
            response.results,
            vec![ItemResult::Accepted {
                item_id: item.id,
                server_id: Some("1".to_string()),
                server_version: None,
            }]
        );
    }

    #[tokio::test]
    async fn submit_batch_treats_garbage_body_as_invalid_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/sync/batch"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = remote_for(&server)
            .submit_batch(&BatchRequest { items: Vec::new() })
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidPayload(_)));
    }

    #[test]
    fn debug_hides_client_internals() {
        let remote = HttpRemote::new(&SyncSettings::default()).unwrap();
        let debug = format!("{remote:?}");
        assert!(debug.contains("localhost:3000"));
        assert!(!debug.contains("client"));
    }
}

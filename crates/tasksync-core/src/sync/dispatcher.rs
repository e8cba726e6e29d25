//! Sends queue items to the remote authority and classifies the replies.

use std::collections::HashMap;
use std::time::Duration;

use crate::models::{SyncQueueItem, TaskVersion};

use super::protocol::{BatchRequest, ItemResult};
use super::remote::{RemoteAuthority, TransportError};

/// What happened to one item in a batch exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// The authority applied the mutation. `conflict` carries its own
    /// version when that differs from what we sent.
    Accepted {
        server_id: Option<String>,
        conflict: Option<TaskVersion>,
    },
    /// The authority refused the mutation; retrying will not help
    Rejected { reason: String },
    /// No verdict was obtained; the item stays queued
    TransportFailure { message: String },
}

/// A queue item paired with its outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched {
    pub item: SyncQueueItem,
    pub outcome: ItemOutcome,
}

/// Thin wrapper that exchanges one batch with a [`RemoteAuthority`].
///
/// Holds no state between calls.
#[derive(Debug, Clone)]
pub struct BatchDispatcher<R> {
    remote: R,
    request_timeout: Duration,
}

impl<R: RemoteAuthority> BatchDispatcher<R> {
    pub const fn new(remote: R, request_timeout: Duration) -> Self {
        Self {
            remote,
            request_timeout,
        }
    }

    pub const fn remote(&self) -> &R {
        &self.remote
    }

    /// Submit `items` as a single batch. Always returns one outcome per item,
    /// in input order.
    pub async fn dispatch(&self, items: &[SyncQueueItem]) -> Vec<Dispatched> {
        if items.is_empty() {
            return Vec::new();
        }

        let request = BatchRequest::from_items(items);
        let exchange =
            tokio::time::timeout(self.request_timeout, self.remote.submit_batch(&request)).await;

        let response = match exchange {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => return Self::fail_all(items, &error),
            Err(_) => return Self::fail_all(items, &TransportError::Timeout(self.request_timeout)),
        };

        let mut results: HashMap<_, _> = HashMap::with_capacity(response.results.len());
        for result in response.results {
            let item_id = result.item_id();
            if items.iter().any(|item| item.id == item_id) {
                results.insert(item_id, result);
            } else {
                tracing::warn!(%item_id, "Ignoring result for unknown queue item");
            }
        }

        items
            .iter()
            .map(|item| {
                let outcome = match results.remove(&item.id) {
                    Some(ItemResult::Accepted {
                        server_id,
                        server_version,
                        ..
                    }) => ItemOutcome::Accepted {
                        server_id,
                        conflict: server_version.filter(|version| *version != item.payload),
                    },
                    Some(ItemResult::Rejected { reason, .. }) => ItemOutcome::Rejected { reason },
                    None => ItemOutcome::TransportFailure {
                        message: "no result returned for item".to_string(),
                    },
                };
                Dispatched {
                    item: item.clone(),
                    outcome,
                }
            })
            .collect()
    }

    fn fail_all(items: &[SyncQueueItem], error: &TransportError) -> Vec<Dispatched> {
        let message = error.to_string();
        tracing::warn!(items = items.len(), error = %message, "Batch exchange failed");
        items
            .iter()
            .map(|item| Dispatched {
                item: item.clone(),
                outcome: ItemOutcome::TransportFailure {
                    message: message.clone(),
                },
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Operation, QueueItemId, Task};
    use crate::sync::protocol::BatchResponse;
    use crate::sync::remote::TransportResult;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    /// Replies with whatever the test hands it, or hangs forever.
    #[derive(Clone, Default)]
    struct ScriptedRemote {
        reply: Arc<Mutex<Option<TransportResult<BatchResponse>>>>,
    }

    impl ScriptedRemote {
        fn replying(reply: TransportResult<BatchResponse>) -> Self {
            Self {
                reply: Arc::new(Mutex::new(Some(reply))),
            }
        }
    }

    impl RemoteAuthority for ScriptedRemote {
        async fn health(&self) -> TransportResult<()> {
            Ok(())
        }

        async fn submit_batch(&self, _request: &BatchRequest) -> TransportResult<BatchResponse> {
            let reply = self.reply.lock().unwrap().take();
            match reply {
                Some(reply) => reply,
                None => std::future::pending().await,
            }
        }
    }

    fn items(count: usize) -> Vec<SyncQueueItem> {
        (0..count)
            .map(|index| {
                let task = Task::new(format!("Task {index}"), "");
                SyncQueueItem::new(Operation::Create, task.version())
            })
            .collect()
    }

    #[tokio::test]
    async fn classifies_each_result() {
        let batch = items(3);
        let mut newer = batch[2].payload.clone();
        newer.updated_at = newer.updated_at.map(|at| at + 1);

        let remote = ScriptedRemote::replying(Ok(BatchResponse {
            results: vec![
                ItemResult::Rejected {
                    item_id: batch[1].id,
                    reason: "title required".to_string(),
                },
                ItemResult::Accepted {
                    item_id: batch[0].id,
                    server_id: Some("1".to_string()),
                    // Identical version is not a conflict
                    server_version: Some(batch[0].payload.clone()),
                },
                ItemResult::Accepted {
                    item_id: batch[2].id,
                    server_id: Some("3".to_string()),
                    server_version: Some(newer.clone()),
                },
            ],
        }));
        let dispatcher = BatchDispatcher::new(remote, Duration::from_secs(5));

        let outcomes = dispatcher
            .dispatch(&batch)
            .await
            .into_iter()
            .map(|dispatched| dispatched.outcome)
            .collect::<Vec<_>>();

        assert_eq!(
            outcomes,
            vec![
                ItemOutcome::Accepted {
                    server_id: Some("1".to_string()),
                    conflict: None,
                },
                ItemOutcome::Rejected {
                    reason: "title required".to_string(),
                },
                ItemOutcome::Accepted {
                    server_id: Some("3".to_string()),
                    conflict: Some(newer),
                },
            ]
        );
    }

    #[tokio::test]
    async fn missing_and_unknown_results() {
        let batch = items(2);
        let remote = ScriptedRemote::replying(Ok(BatchResponse {
            results: vec![
                ItemResult::Accepted {
                    item_id: batch[0].id,
                    server_id: Some("1".to_string()),
                    server_version: None,
                },
                ItemResult::Accepted {
                    item_id: QueueItemId::new(),
                    server_id: Some("99".to_string()),
                    server_version: None,
                },
            ],
        }));
        let dispatcher = BatchDispatcher::new(remote, Duration::from_secs(5));

        let dispatched = dispatcher.dispatch(&batch).await;
        assert_eq!(dispatched.len(), 2);
        assert!(matches!(dispatched[0].outcome, ItemOutcome::Accepted { .. }));
        assert!(matches!(
            dispatched[1].outcome,
            ItemOutcome::TransportFailure { .. }
        ));
    }

    #[tokio::test]
    async fn accepted_without_server_id_is_still_accepted() {
        let batch = items(1);
        let remote = ScriptedRemote::replying(Ok(BatchResponse {
            results: vec![ItemResult::Accepted {
                item_id: batch[0].id,
                server_id: None,
                server_version: None,
            }],
        }));
        let dispatcher = BatchDispatcher::new(remote, Duration::from_secs(5));

        let dispatched = dispatcher.dispatch(&batch).await;
        assert_eq!(
            dispatched[0].outcome,
            ItemOutcome::Accepted {
                server_id: None,
                conflict: None,
            }
        );
    }

    #[tokio::test]
    async fn batch_error_fails_every_item() {
        let batch = items(3);
        let remote = ScriptedRemote::replying(Err(TransportError::Api("HTTP 500".to_string())));
        let dispatcher = BatchDispatcher::new(remote, Duration::from_secs(5));

        let dispatched = dispatcher.dispatch(&batch).await;
        assert_eq!(dispatched.len(), 3);
        for (dispatched, item) in dispatched.iter().zip(&batch) {
            assert_eq!(dispatched.item.id, item.id);
            assert!(matches!(
                &dispatched.outcome,
                ItemOutcome::TransportFailure { message } if message.contains("HTTP 500")
            ));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_exchange_times_out() {
        let batch = items(2);
        let dispatcher = BatchDispatcher::new(ScriptedRemote::default(), Duration::from_secs(30));

        let dispatched = dispatcher.dispatch(&batch).await;
        assert!(dispatched.iter().all(|dispatched| matches!(
            &dispatched.outcome,
            ItemOutcome::TransportFailure { message } if message.contains("timed out")
        )));
    }

    #[tokio::test]
    async fn empty_batch_skips_remote() {
        let dispatcher = BatchDispatcher::new(ScriptedRemote::default(), Duration::from_secs(1));
        assert!(dispatcher.dispatch(&[]).await.is_empty());
    }
}

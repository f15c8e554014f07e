//! In-process event bus and the webhook egress sink.
//!
//! Every lifecycle transition is published once on a bounded broadcast
//! channel. Push-channel clients subscribe directly; the webhook dispatcher
//! runs as a background task with its own subscription. Lagged subscribers
//! lose the oldest frames rather than blocking producers.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::database::repositories::WebhookRepository;
use crate::domain::WebhookEvent;

/// Broadcast capacity; doubles as the per-subscriber buffer bound.
const BUS_CAPACITY: usize = 256;

/// Webhook delivery timeout.
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(30);

/// One emitted lifecycle event.
#[derive(Debug, Clone)]
pub struct BusEvent {
    pub event: WebhookEvent,
    pub payload: serde_json::Value,
}

/// Fan-out hub for lifecycle events.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BusEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    /// Publish an event; never blocks and never fails.
    pub fn emit(&self, event: WebhookEvent, payload: &impl Serialize) {
        let payload = match serde_json::to_value(payload) {
            Ok(v) => v,
            Err(e) => {
                warn!("failed to serialize {} payload: {}", event, e);
                return;
            }
        };
        let _ = self.tx.send(BusEvent { event, payload });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Posts matching events to registered webhook URLs.
pub struct WebhookDispatcher {
    repository: Arc<dyn WebhookRepository>,
    client: reqwest::Client,
}

impl WebhookDispatcher {
    pub fn new(repository: Arc<dyn WebhookRepository>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { repository, client }
    }

    /// Spawn the dispatch loop. Delivery is at-most-once: failures are
    /// logged and never retried.
    pub fn start(self, bus: &EventBus, shutdown: CancellationToken) {
        let mut rx = bus.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    received = rx.recv() => match received {
                        Ok(event) => self.dispatch(event).await,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("webhook dispatcher lagged, skipped {} events", skipped);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        });
    }

    async fn dispatch(&self, event: BusEvent) {
        let webhooks = match self.repository.list_by_event(event.event).await {
            Ok(webhooks) => webhooks,
            Err(e) => {
                warn!("failed to load webhooks for {}: {}", event.event, e);
                return;
            }
        };

        for webhook in webhooks {
            let client = self.client.clone();
            let body = serde_json::json!({
                "event": event.event,
                "data": event.payload,
            });
            tokio::spawn(async move {
                match client.post(&webhook.url).json(&body).send().await {
                    Ok(response) if response.status().is_success() => {
                        debug!(
                            "delivered {} webhook (uuid: {})",
                            webhook.event, webhook.uuid
                        );
                    }
                    Ok(response) => {
                        warn!(
                            "webhook {} returned {} (uuid: {})",
                            webhook.url,
                            response.status(),
                            webhook.uuid
                        );
                    }
                    Err(e) => {
                        warn!("failed to deliver webhook to {}: {}", webhook.url, e);
                    }
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Task;

    #[test]
    fn test_emit_reaches_subscriber() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let task = Task::from_new(
            crate::domain::NewTask {
                command: "-i a b".to_string(),
                input_file: "a".to_string(),
                output_file: "b".to_string(),
                ..Default::default()
            },
            "api",
        );
        bus.emit(WebhookEvent::TaskCreated, &task);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.event, WebhookEvent::TaskCreated);
        assert_eq!(event.payload["uuid"], serde_json::json!(task.uuid));
    }

    #[test]
    fn test_emit_without_subscribers_is_fine() {
        let bus = EventBus::new();
        bus.emit(WebhookEvent::TaskDeleted, &serde_json::json!({"uuid": "x"}));
    }

    #[test]
    fn test_lagged_subscriber_drops_oldest() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        for i in 0..(BUS_CAPACITY + 10) {
            bus.emit(WebhookEvent::TaskUpdated, &serde_json::json!({"i": i}));
        }
        // The receiver lags and reports how much it skipped.
        match rx.try_recv() {
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                assert!(skipped >= 10);
            }
            other => panic!("expected lag, got {:?}", other),
        }
    }
}

//! Analytics connector with batched async delivery
//!
//! Sends usage events to a Mixpanel-compatible `/track` endpoint in batches
//! to minimize overhead

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout};

use crate::connector::Connector;
use crate::error::ConnectorError;
use crate::events::AnalyticsEvent;

/// Default analytics collector endpoint
pub const DEFAULT_ANALYTICS_ENDPOINT: &str = "https://api.mixpanel.com/track";

const BATCH_SIZE: usize = 10;
const BATCH_INTERVAL: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);
const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Running batch worker
struct Worker {
    sender: mpsc::UnboundedSender<AnalyticsEvent>,
    task: JoinHandle<()>,
}

/// Analytics connector backed by a background batching task
pub struct MixpanelConnector {
    token: Option<String>,
    endpoint: String,
    debug: bool,
    worker: Mutex<Option<Worker>>,
}

impl MixpanelConnector {
    pub fn new(token: Option<String>, endpoint: impl Into<String>, debug: bool) -> Self {
        Self {
            token,
            endpoint: endpoint.into(),
            debug,
            worker: Mutex::new(None),
        }
    }

    fn worker(&self) -> MutexGuard<'_, Option<Worker>> {
        self.worker.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Background task that batches and sends events
    async fn batch_sender(
        mut rx: mpsc::UnboundedReceiver<AnalyticsEvent>,
        client: Client,
        endpoint: String,
        token: String,
    ) {
        let mut batch: Vec<AnalyticsEvent> = Vec::new();
        let mut tick_interval = interval(BATCH_INTERVAL);

        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(event) => {
                        batch.push(event);

                        if batch.len() >= BATCH_SIZE {
                            Self::send_batch(&client, &endpoint, &token, &batch).await;
                            batch.clear();
                        }
                    }
                    // Sender dropped by close(): final flush
                    None => {
                        Self::send_batch(&client, &endpoint, &token, &batch).await;
                        break;
                    }
                },
                _ = tick_interval.tick() => {
                    if !batch.is_empty() {
                        Self::send_batch(&client, &endpoint, &token, &batch).await;
                        batch.clear();
                    }
                }
            }
        }
    }

    /// Send a batch of events
    async fn send_batch(client: &Client, endpoint: &str, token: &str, events: &[AnalyticsEvent]) {
        if events.is_empty() {
            return;
        }

        let body: Vec<serde_json::Value> = events
            .iter()
            .map(|e| {
                let mut props = e.properties.clone();
                props.insert("token".to_string(), json!(token));
                props.insert("distinct_id".to_string(), json!(e.distinct_id));
                props.insert("time".to_string(), json!(chrono::Utc::now().timestamp()));

                json!({
                    "event": e.event_name,
                    "properties": props
                })
            })
            .collect();

        let result = client
            .post(endpoint)
            .json(&body)
            .send()
            .await
            .and_then(|response| response.error_for_status());

        if let Err(err) = result {
            tracing::debug!(error = %err, events = events.len(), "analytics batch dropped");
        }
    }

    fn print_event(event: &AnalyticsEvent) {
        eprintln!("Telemetry Event (DEBUG MODE - not sent):");
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "event": event.event_name,
                "distinct_id": event.distinct_id,
                "properties": event.properties,
            }))
            .unwrap_or_default()
        );
    }
}

#[async_trait]
impl Connector for MixpanelConnector {
    type Payload = AnalyticsEvent;

    fn name(&self) -> &'static str {
        "analytics"
    }

    async fn connect(&self) -> Result<(), ConnectorError> {
        let mut worker = self.worker();
        // A worker that died is replaced below
        if worker
            .as_ref()
            .is_some_and(|running| !running.sender.is_closed())
        {
            return Ok(());
        }

        // Debug mode never transmits, so it needs neither token nor client
        let (sender, rx) = mpsc::unbounded_channel();
        let task = if self.debug {
            tokio::spawn(async move {
                let mut rx = rx;
                while let Some(event) = rx.recv().await {
                    Self::print_event(&event);
                }
            })
        } else {
            let token = self
                .token
                .clone()
                .ok_or(ConnectorError::NotConfigured("analytics token"))?;
            let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
            let endpoint = self.endpoint.clone();
            tokio::spawn(Self::batch_sender(rx, client, endpoint, token))
        };

        *worker = Some(Worker { sender, task });
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.worker()
            .as_ref()
            .is_some_and(|worker| !worker.sender.is_closed())
    }

    async fn send(&self, event: AnalyticsEvent) -> Result<(), ConnectorError> {
        let worker = self.worker();
        let worker = worker.as_ref().ok_or(ConnectorError::NotConnected)?;
        worker
            .sender
            .send(event)
            .map_err(|_| ConnectorError::QueueClosed)
    }

    async fn close(&self) -> Result<(), ConnectorError> {
        let worker = self.worker().take();
        let Some(Worker { sender, task }) = worker else {
            return Ok(());
        };
        drop(sender);

        match timeout(FLUSH_TIMEOUT, task).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::debug!(error = %err, "analytics worker ended abnormally"),
            Err(_) => tracing::debug!("analytics flush timed out, pending events dropped"),
        }
        Ok(())
    }
}

// Test doubles for connectors and consent
//
// The mocks count every call so tests can assert on exactly which backend
// operations a client performed.

#![allow(dead_code)]

use async_trait::async_trait;
use cli_telemetry::{
    AnalyticsEvent, Backends, ConnectorError, ConsentPrompt, Connector, ErrorReport,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Connector that records calls instead of talking to a backend
pub struct MockConnector<P> {
    connectable: AtomicBool,
    fail_sends: AtomicBool,
    connected: AtomicBool,
    connects: AtomicUsize,
    closes: AtomicUsize,
    sent: Mutex<Vec<P>>,
}

impl<P> MockConnector<P> {
    pub fn new(connectable: bool) -> Arc<Self> {
        Arc::new(Self {
            connectable: AtomicBool::new(connectable),
            fail_sends: AtomicBool::new(false),
            connected: AtomicBool::new(false),
            connects: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn set_connectable(&self, connectable: bool) {
        self.connectable.store(connectable, Ordering::SeqCst);
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl<P: Clone> MockConnector<P> {
    pub fn sent(&self) -> Vec<P> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl<P: Send + 'static> Connector for MockConnector<P> {
    type Payload = P;

    fn name(&self) -> &'static str {
        "mock"
    }

    async fn connect(&self) -> Result<(), ConnectorError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.connectable.load(Ordering::SeqCst) {
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        } else {
            Err(ConnectorError::NotConfigured("mock backend"))
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send(&self, payload: P) -> Result<(), ConnectorError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(ConnectorError::Rejected { status: 500 });
        }
        self.sent.lock().unwrap().push(payload);
        Ok(())
    }

    async fn close(&self) -> Result<(), ConnectorError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// A pair of mocks plus the `Backends` that wraps them
pub struct MockBackends {
    pub analytics: Arc<MockConnector<AnalyticsEvent>>,
    pub errors: Arc<MockConnector<ErrorReport>>,
}

impl MockBackends {
    pub fn new(analytics_up: bool, errors_up: bool) -> Self {
        Self {
            analytics: MockConnector::new(analytics_up),
            errors: MockConnector::new(errors_up),
        }
    }

    pub fn backends(&self) -> Backends {
        Backends {
            analytics: self.analytics.clone(),
            error_reporting: self.errors.clone(),
        }
    }
}

/// Consent source with a fixed answer that counts prompts
pub struct ScriptedConsent {
    interactive: bool,
    answer: bool,
    prompts: AtomicUsize,
}

impl ScriptedConsent {
    pub fn interactive(answer: bool) -> Self {
        Self {
            interactive: true,
            answer,
            prompts: AtomicUsize::new(0),
        }
    }

    pub fn non_interactive() -> Self {
        Self {
            interactive: false,
            answer: false,
            prompts: AtomicUsize::new(0),
        }
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

impl ConsentPrompt for ScriptedConsent {
    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn prompt_yes_no(&self, _message: &str) -> bool {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        self.answer
    }
}

/// Wait until `check` holds, giving background tasks a chance to run
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

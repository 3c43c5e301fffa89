//! Backend connector capability and the client-side handle around it

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::ConnectorError;

/// A telemetry backend
///
/// `connect` must be idempotent: connecting an already connected backend
/// succeeds without opening a second underlying client.
#[async_trait]
pub trait Connector: Send + Sync {
    type Payload: Send + 'static;

    /// Short name used in log lines
    fn name(&self) -> &'static str;

    async fn connect(&self) -> Result<(), ConnectorError>;

    fn is_connected(&self) -> bool;

    async fn send(&self, payload: Self::Payload) -> Result<(), ConnectorError>;

    /// Flush anything buffered and release the underlying client
    async fn close(&self) -> Result<(), ConnectorError>;
}

/// Connection state of one backend, as seen by its owning client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    /// Terminal for the lifetime of the client
    Closed,
}

/// Exclusive, per-client handle on a connector
pub struct ConnectorHandle<P: Send + 'static> {
    connector: Arc<dyn Connector<Payload = P>>,
    closed: bool,
}

impl<P: Send + 'static> ConnectorHandle<P> {
    pub fn new(connector: Arc<dyn Connector<Payload = P>>) -> Self {
        Self {
            connector,
            closed: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        if self.closed {
            ConnectionState::Closed
        } else if self.connector.is_connected() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Attempt one connection; failures are logged, never returned
    pub async fn connect(&self) {
        if self.closed {
            return;
        }
        connect_logged(self.connector.as_ref()).await;
    }

    /// Connected after at most one reconnection attempt?
    pub async fn ensure_connected(&self) -> bool {
        match self.state() {
            ConnectionState::Connected => true,
            ConnectionState::Closed => false,
            ConnectionState::Disconnected => {
                self.connect().await;
                self.is_connected()
            }
        }
    }

    pub async fn send(&self, payload: P) -> Result<(), ConnectorError> {
        if self.closed {
            return Err(ConnectorError::Closed);
        }
        self.connector.send(payload).await
    }

    /// Close a connected backend and mark the handle released
    ///
    /// Safe to call repeatedly; only the first call on a connected backend
    /// reaches `Connector::close`.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if !self.connector.is_connected() {
            return;
        }
        if let Err(err) = self.connector.close().await {
            tracing::warn!(connector = self.connector.name(), error = %err, "failed to close telemetry connector");
        }
    }

    /// Shared reference for work that outlives the current call
    pub fn connector(&self) -> Arc<dyn Connector<Payload = P>> {
        Arc::clone(&self.connector)
    }
}

/// Connect and log the outcome
pub async fn connect_logged<P: Send + 'static>(connector: &dyn Connector<Payload = P>) {
    match connector.connect().await {
        Ok(()) => tracing::debug!(connector = connector.name(), "telemetry connector connected"),
        Err(err) => {
            tracing::warn!(connector = connector.name(), error = %err, "telemetry connector failed to connect")
        }
    }
}

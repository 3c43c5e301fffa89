//! Error taxonomy
//!
//! Only [`TelemetryError`] ever reaches a host application. [`ConnectorError`]
//! describes backend failures, most of which are logged and dropped by the
//! client.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced to the host application
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Writing the consent record failed
    #[error("failed to save telemetry config to {}", path.display())]
    ConfigSave {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A consent update was requested for a config that was never persisted
    #[error("telemetry config has no persistence path")]
    ConfigPath,

    /// The analytics connector rejected an event after connectivity was confirmed
    #[error("failed to track event '{event}'")]
    EventTracking {
        event: String,
        #[source]
        source: ConnectorError,
    },
}

/// Backend connector failures
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("connector is not connected")]
    NotConnected,

    #[error("connector has been closed")]
    Closed,

    #[error("event queue is closed")]
    QueueClosed,

    #[error("http transport error")]
    Http(#[from] reqwest::Error),

    #[error("collector rejected payload with status {status}")]
    Rejected { status: u16 },
}

pub type Result<T> = std::result::Result<T, TelemetryError>;

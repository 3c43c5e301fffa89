//! # cli-telemetry
//!
//! Opt-in usage and error telemetry for command-line tools.
//!
//! ## Privacy Guarantees
//!
//! - **Opt-in**: nothing is sent until the user says yes on a real terminal
//! - **Anonymous**: events carry a random per-installation id, nothing else
//! - **Scrubbed**: property keys containing `key`, `password` or `token` are dropped
//! - **Fail Gracefully**: never crashes, blocks or slows down the host CLI
//! - **Debug Mode**: inspect events before they're sent
//!
//! ## Usage
//!
//! ```no_run
//! use cli_telemetry::{Properties, TelemetryClient};
//!
//! # async fn run() {
//! let mut telemetry = TelemetryClient::initialize("my-tool", None).await;
//!
//! if let Err(err) = telemetry.track_event("command_executed", Properties::new()).await {
//!     tracing::debug!(error = %err, "telemetry event dropped");
//! }
//!
//! telemetry.shutdown().await;
//! # }
//! ```
//!
//! Always call [`TelemetryClient::shutdown`] before exiting: dropping the
//! client cancels error reports that are still in flight. Use
//! [`TelemetryClient::initialize_with_options`] to report the host's own
//! version instead of this library's.
//!
//! ## Opt-Out
//!
//! ```bash
//! # Universal opt-out
//! export DO_NOT_TRACK=1
//!
//! # Per tool
//! export MY_TOOL_TELEMETRY_DISABLED=1
//! ```
//!
//! Hosts can also call [`TelemetryClient::update_consent`] from a
//! `telemetry enable|disable` command.

pub mod client;
pub mod config;
pub mod connector;
pub mod consent;
pub mod error;
pub mod events;
pub mod reporting;
pub mod sanitize;
pub mod transport;

#[cfg(test)]
mod test_http;

pub use client::{Backends, ClientOptions, TelemetryClient};
pub use config::{default_config_path, load_config, update_consent, TelemetryConfig};
pub use connector::{ConnectionState, Connector, ConnectorHandle};
pub use consent::{is_interactive, prompt_yes_no, ConsentPrompt, TerminalConsent};
pub use error::{ConnectorError, Result, TelemetryError};
pub use events::{AnalyticsEvent, ErrorReport, Properties};
pub use sanitize::sanitize;

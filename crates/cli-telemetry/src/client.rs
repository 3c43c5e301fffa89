//! Main telemetry client

use std::env;
use std::error::Error as StdError;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinSet;

use crate::config::{self, load_config, TelemetryConfig};
use crate::connector::{connect_logged, ConnectionState, Connector, ConnectorHandle};
use crate::consent::{ConsentPrompt, TerminalConsent};
use crate::error::{Result, TelemetryError};
use crate::events::{
    enrich_event_properties, scope_error_report, AnalyticsEvent, ErrorReport, HostInfo, Properties,
};
use crate::reporting::ErrorCollectorConnector;
use crate::transport::{MixpanelConnector, DEFAULT_ANALYTICS_ENDPOINT};

/// Upper bound on waiting for in-flight error reports at shutdown
const PENDING_REPORTS_TIMEOUT: Duration = Duration::from_secs(2);

/// Runtime options of a telemetry client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub app_name: String,
    /// Version of the host application, reported with every payload
    ///
    /// Defaults to this library's version until set with
    /// [`with_version`](Self::with_version).
    pub version: String,
    pub analytics_token: Option<String>,
    pub analytics_endpoint: String,
    pub error_endpoint: Option<String>,
    /// Print analytics events instead of sending them
    pub debug: bool,
    /// Telemetry switched off for this process by the environment
    pub disabled_by_env: bool,
}

impl ClientOptions {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            analytics_token: None,
            analytics_endpoint: DEFAULT_ANALYTICS_ENDPOINT.to_string(),
            error_endpoint: None,
            debug: false,
            disabled_by_env: false,
        }
    }

    /// Options with environment variable overrides applied
    ///
    /// - `DO_NOT_TRACK` / `<APP>_TELEMETRY_DISABLED`: off for this process
    /// - `<APP>_TELEMETRY_DEBUG`: print events instead of sending
    /// - `<APP>_TELEMETRY_TOKEN`: analytics project token
    /// - `<APP>_TELEMETRY_ERROR_ENDPOINT`: error collector URL
    pub fn from_env(app_name: impl Into<String>) -> Self {
        let mut options = Self::new(app_name);
        let prefix = env_prefix(&options.app_name);

        options.disabled_by_env = env::var_os("DO_NOT_TRACK").is_some()
            || env::var_os(format!("{}_TELEMETRY_DISABLED", prefix)).is_some();
        options.debug = env::var_os(format!("{}_TELEMETRY_DEBUG", prefix)).is_some();
        options.analytics_token = env::var(format!("{}_TELEMETRY_TOKEN", prefix)).ok();
        options.error_endpoint = env::var(format!("{}_TELEMETRY_ERROR_ENDPOINT", prefix)).ok();

        options
    }

    /// Report `version` as the host version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}

/// `my-tool` -> `MY_TOOL`
fn env_prefix(app_name: &str) -> String {
    app_name.to_uppercase().replace('-', "_")
}

/// The two backends a client dispatches to
pub struct Backends {
    pub analytics: Arc<dyn Connector<Payload = AnalyticsEvent>>,
    pub error_reporting: Arc<dyn Connector<Payload = ErrorReport>>,
}

impl Backends {
    pub fn from_options(options: &ClientOptions) -> Self {
        Self {
            analytics: Arc::new(MixpanelConnector::new(
                options.analytics_token.clone(),
                options.analytics_endpoint.clone(),
                options.debug,
            )),
            error_reporting: Arc::new(ErrorCollectorConnector::new(options.error_endpoint.clone())),
        }
    }
}

/// Main telemetry client
///
/// Owns its consent record and both connector handles. Nothing here ever
/// panics or blocks the host on a backend; the only failure handed back is a
/// rejected [`track_event`](Self::track_event).
pub struct TelemetryClient {
    config: TelemetryConfig,
    options: ClientOptions,
    host: HostInfo,
    analytics: ConnectorHandle<AnalyticsEvent>,
    error_reporting: ConnectorHandle<ErrorReport>,
    pending_reports: JoinSet<()>,
}

impl TelemetryClient {
    /// Create a client for `app_name`, prompting for consent on first run
    ///
    /// Never fails: if the consent record cannot be saved the client comes
    /// back with telemetry disabled. Payloads carry this library's version;
    /// hosts reporting their own use
    /// [`initialize_with_options`](Self::initialize_with_options).
    pub async fn initialize(app_name: &str, custom_config_path: Option<&Path>) -> Self {
        Self::initialize_with_options(ClientOptions::from_env(app_name), custom_config_path).await
    }

    /// [`initialize`](Self::initialize) with host-supplied options
    ///
    /// ```no_run
    /// # use cli_telemetry::{ClientOptions, TelemetryClient};
    /// # async fn run() {
    /// let options = ClientOptions::from_env("my-tool").with_version(env!("CARGO_PKG_VERSION"));
    /// let telemetry = TelemetryClient::initialize_with_options(options, None).await;
    /// # }
    /// ```
    pub async fn initialize_with_options(
        options: ClientOptions,
        custom_config_path: Option<&Path>,
    ) -> Self {
        let backends = Backends::from_options(&options);
        Self::initialize_with(options, custom_config_path, &TerminalConsent, backends).await
    }

    /// [`initialize`](Self::initialize) with explicit options, consent source and backends
    pub async fn initialize_with(
        options: ClientOptions,
        custom_config_path: Option<&Path>,
        consent: &dyn ConsentPrompt,
        backends: Backends,
    ) -> Self {
        let config = match load_config(&options.app_name, custom_config_path, consent) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(error = %err, "telemetry config unavailable, telemetry disabled");
                TelemetryConfig::ephemeral()
            }
        };

        let client = Self::from_config(config, options, backends);
        if client.is_enabled() {
            client.connect_all().await;
        }
        client
    }

    /// Wrap an already loaded config without connecting anything
    pub fn from_config(config: TelemetryConfig, options: ClientOptions, backends: Backends) -> Self {
        let host = HostInfo::detect(&options.app_name, &options.version);

        Self {
            config,
            options,
            host,
            analytics: ConnectorHandle::new(backends.analytics),
            error_reporting: ConnectorHandle::new(backends.error_reporting),
            pending_reports: JoinSet::new(),
        }
    }

    /// Record a usage event
    ///
    /// Dropped silently when telemetry is off or the analytics backend is
    /// still unreachable after one reconnection attempt.
    pub async fn track_event(&mut self, name: &str, properties: Properties) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }

        if !self.analytics.ensure_connected().await {
            tracing::debug!(event = name, "analytics unavailable, event dropped");
            return Ok(());
        }

        let instance_id = self.config.instance_id().to_string();
        let event = AnalyticsEvent {
            event_name: name.to_string(),
            properties: enrich_event_properties(&properties, &instance_id, &self.host),
            distinct_id: instance_id,
        };

        self.analytics
            .send(event)
            .await
            .map_err(|source| TelemetryError::EventTracking {
                event: name.to_string(),
                source,
            })
    }

    /// Report an error without waiting on the network
    ///
    /// Submission happens on a background task of the current Tokio runtime;
    /// failures only show up in logs.
    pub fn track_error(&mut self, error: &(dyn StdError + 'static), context: Properties) {
        if !self.is_enabled() {
            return;
        }

        let Ok(runtime) = Handle::try_current() else {
            tracing::debug!("no async runtime, error report dropped");
            return;
        };

        // Reap finished submissions
        while self.pending_reports.try_join_next().is_some() {}

        let connector = self.error_reporting.connector();
        match self.error_reporting.state() {
            ConnectionState::Closed => {}
            ConnectionState::Disconnected => {
                tracing::debug!("error reporting unavailable, reconnecting in background");
                self.pending_reports.spawn_on(
                    async move { connect_logged(connector.as_ref()).await },
                    &runtime,
                );
            }
            ConnectionState::Connected => {
                let report = scope_error_report(
                    ErrorReport::capture(error),
                    &context,
                    self.config.instance_id(),
                    &self.host,
                );
                self.pending_reports.spawn_on(
                    async move {
                        if let Err(err) = connector.send(report).await {
                            tracing::warn!(error = %err, "failed to submit error report");
                        }
                    },
                    &runtime,
                );
            }
        }
    }

    /// Persist a new consent decision
    ///
    /// Turning telemetry on connects both backends right away.
    pub async fn update_consent(&mut self, enabled: bool) -> Result<()> {
        let was_enabled = self.config.enabled;
        config::update_consent(&mut self.config, enabled)?;

        if !was_enabled && enabled && !self.options.disabled_by_env {
            self.connect_all().await;
        }
        Ok(())
    }

    /// Flush and close both backends
    ///
    /// Call once before the process exits. Further calls do nothing.
    /// Dropping the client without calling this cancels error reports that
    /// are still being submitted.
    pub async fn shutdown(&mut self) {
        let drained = tokio::time::timeout(PENDING_REPORTS_TIMEOUT, async {
            while self.pending_reports.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::debug!("pending error reports abandoned at shutdown");
            self.pending_reports.abort_all();
        }

        self.analytics.close().await;
        self.error_reporting.close().await;
    }

    /// Independent, concurrent connection attempts
    async fn connect_all(&self) {
        tokio::join!(self.analytics.connect(), self.error_reporting.connect());
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    /// Get the instance ID (for status display)
    pub fn instance_id(&self) -> &str {
        self.config.instance_id()
    }

    /// Consent given and not switched off by the environment
    pub fn is_enabled(&self) -> bool {
        self.config.enabled && !self.options.disabled_by_env
    }

    /// Host version attached to every payload
    pub fn version(&self) -> &str {
        &self.host.version
    }

    /// Check if debug mode is enabled
    pub fn is_debug(&self) -> bool {
        self.options.debug
    }

    pub fn analytics_state(&self) -> ConnectionState {
        self.analytics.state()
    }

    pub fn error_reporting_state(&self) -> ConnectionState {
        self.error_reporting.state()
    }
}

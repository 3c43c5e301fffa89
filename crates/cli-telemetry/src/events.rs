//! Telemetry payloads and enrichment

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error as StdError;

use crate::sanitize::sanitize;

/// Free-form event properties / error context
pub type Properties = HashMap<String, serde_json::Value>;

/// Usage event handed to the analytics connector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub event_name: String,
    pub distinct_id: String,
    pub properties: Properties,
}

/// Captured error handed to the error-reporting connector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub timestamp: DateTime<Utc>,

    // Error details
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<String>, // source chain, outermost first

    // Scope
    pub tags: HashMap<String, String>, // app, platform, version
    pub extra: Properties,
}

impl ErrorReport {
    /// Capture `error` and its source chain
    pub fn capture(error: &(dyn StdError + 'static)) -> Self {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }

        Self {
            timestamp: Utc::now(),
            message: error.to_string(),
            causes,
            tags: HashMap::new(),
            extra: Properties::new(),
        }
    }
}

/// Static facts about the running host, attached to every payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    pub app_name: String,
    pub platform: String,
    pub version: String,
    pub runtime_version: String,
}

impl HostInfo {
    pub fn detect(app_name: &str, version: &str) -> Self {
        Self {
            app_name: app_name.to_string(),
            platform: get_os_string(),
            version: version.to_string(),
            runtime_version: get_runtime_version(),
        }
    }
}

/// sanitize(properties) plus distinct_id, platform, version and runtime_version
///
/// Enrichment keys win over caller keys of the same name.
pub fn enrich_event_properties(
    properties: &Properties,
    instance_id: &str,
    host: &HostInfo,
) -> Properties {
    let mut enriched = sanitize(properties);

    enriched.insert(
        "distinct_id".to_string(),
        serde_json::Value::String(instance_id.to_string()),
    );
    enriched.insert(
        "platform".to_string(),
        serde_json::Value::String(host.platform.clone()),
    );
    enriched.insert(
        "version".to_string(),
        serde_json::Value::String(host.version.clone()),
    );
    enriched.insert(
        "runtime_version".to_string(),
        serde_json::Value::String(host.runtime_version.clone()),
    );

    enriched
}

/// Attach the reporting scope: tags plus sanitized context and identity extras
pub fn scope_error_report(
    mut report: ErrorReport,
    context: &Properties,
    instance_id: &str,
    host: &HostInfo,
) -> ErrorReport {
    report.tags.insert("app".to_string(), host.app_name.clone());
    report.tags.insert("platform".to_string(), host.platform.clone());
    report.tags.insert("version".to_string(), host.version.clone());

    let mut extra = sanitize(context);
    extra.insert(
        "platform".to_string(),
        serde_json::Value::String(host.platform.clone()),
    );
    extra.insert(
        "version".to_string(),
        serde_json::Value::String(host.version.clone()),
    );
    extra.insert(
        "instanceId".to_string(),
        serde_json::Value::String(instance_id.to_string()),
    );
    report.extra = extra;

    report
}

/// Get OS string
fn get_os_string() -> String {
    if cfg!(target_os = "linux") {
        "linux".to_string()
    } else if cfg!(target_os = "macos") {
        "macos".to_string()
    } else if cfg!(target_os = "windows") {
        "windows".to_string()
    } else {
        "unknown".to_string()
    }
}

/// Operating system release the binary runs on
fn get_runtime_version() -> String {
    sysinfo::System::long_os_version()
        .or_else(sysinfo::System::os_version)
        .unwrap_or_else(|| "unknown".to_string())
}

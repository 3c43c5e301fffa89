//! Persisted consent record: loading, first-run creation and updates

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use uuid::Uuid;

use crate::consent::ConsentPrompt;
use crate::error::TelemetryError;

/// File name of the consent record inside the per-application directory
const CONFIG_FILE_NAME: &str = "telemetry.json";

/// Consent and identity record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryConfig {
    /// Whether the user agreed to send telemetry
    pub enabled: bool,

    instance_id: String,

    created_at: DateTime<Utc>,

    /// Where this record is persisted (`None` for an ephemeral record)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    config_path: Option<PathBuf>,
}

impl TelemetryConfig {
    /// Create a record with a freshly generated instance id
    pub fn new(enabled: bool, config_path: Option<PathBuf>) -> Self {
        Self {
            enabled,
            instance_id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            config_path,
        }
    }

    /// A disabled record that is never written to disk
    pub fn ephemeral() -> Self {
        Self::new(false, None)
    }

    /// Stable anonymous identifier of this installation
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}

/// Default location of the consent record for `app_name`
///
/// `<config dir>/<app>/telemetry.json`, or `~/.<app>/telemetry.json` on
/// platforms without a config directory.
pub fn default_config_path(app_name: &str) -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join(app_name).join(CONFIG_FILE_NAME);
    }

    dirs::home_dir()
        .unwrap_or_default()
        .join(format!(".{}", app_name))
        .join(CONFIG_FILE_NAME)
}

/// Load the consent record, creating one on first run
///
/// An existing record that cannot be read or parsed is treated as absent.
/// First-run creation depends on the consent source:
/// - non-interactive: a disabled record that is not persisted
/// - interactive: the user is prompted and the answer is persisted
pub fn load_config(
    app_name: &str,
    custom_path: Option<&Path>,
    consent: &dyn ConsentPrompt,
) -> std::result::Result<TelemetryConfig, TelemetryError> {
    let path = custom_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_config_path(app_name));

    if path.exists() {
        match read_config(&path) {
            Ok(config) => return Ok(config),
            Err(err) => {
                tracing::warn!(error = %format!("{:#}", err), "ignoring unreadable telemetry config");
            }
        }
    }

    if !consent.is_interactive() {
        tracing::debug!("non-interactive session, telemetry disabled");
        return Ok(TelemetryConfig::ephemeral());
    }

    let message = format!(
        "Help improve {} by sending anonymous usage data and error reports? (y/N)",
        app_name
    );
    let enabled = consent.prompt_yes_no(&message);

    let config = TelemetryConfig::new(enabled, Some(path.clone()));
    save_config(&config, &path)?;

    Ok(config)
}

/// Change consent and rewrite the record at its persistence path
///
/// The in-memory record only changes once the write succeeded.
pub fn update_consent(
    config: &mut TelemetryConfig,
    enabled: bool,
) -> std::result::Result<(), TelemetryError> {
    let path = config
        .config_path
        .clone()
        .ok_or(TelemetryError::ConfigPath)?;

    let mut updated = config.clone();
    updated.enabled = enabled;
    save_config(&updated, &path)?;

    *config = updated;
    Ok(())
}

/// Read an existing record; `configPath` is replaced by the path actually read
fn read_config(path: &Path) -> Result<TelemetryConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;

    let mut config: TelemetryConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.display()))?;

    anyhow::ensure!(
        !config.instance_id.trim().is_empty(),
        "Config has an empty instanceId: {}",
        path.display()
    );

    config.config_path = Some(path.to_path_buf());
    Ok(config)
}

/// Write the record atomically (temp file in the same directory, then rename)
fn save_config(config: &TelemetryConfig, path: &Path) -> std::result::Result<(), TelemetryError> {
    write_atomically(config, path).map_err(|source| TelemetryError::ConfigSave {
        path: path.to_path_buf(),
        source,
    })
}

fn write_atomically(config: &TelemetryConfig, path: &Path) -> io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let content = serde_json::to_string_pretty(config)?;

    let mut file = NamedTempFile::new_in(parent)?;
    file.write_all(content.as_bytes())?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|err| err.error)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tempfile::TempDir;

    struct FixedConsent {
        interactive: bool,
        answer: bool,
        prompts: Cell<u32>,
    }

    impl FixedConsent {
        fn new(interactive: bool, answer: bool) -> Self {
            Self {
                interactive,
                answer,
                prompts: Cell::new(0),
            }
        }
    }

    impl ConsentPrompt for FixedConsent {
        fn is_interactive(&self) -> bool {
            self.interactive
        }

        fn prompt_yes_no(&self, _message: &str) -> bool {
            self.prompts.set(self.prompts.get() + 1);
            self.answer
        }
    }

    #[test]
    fn test_new_config_has_unique_instance_id() {
        let a = TelemetryConfig::new(true, None);
        let b = TelemetryConfig::new(true, None);
        assert_ne!(a.instance_id(), b.instance_id());
        assert!(Uuid::parse_str(a.instance_id()).is_ok());
    }

    #[test]
    fn test_serialized_field_names() {
        let config = TelemetryConfig::new(true, Some(PathBuf::from("/tmp/t.json")));
        let value = serde_json::to_value(&config).unwrap();
        let object = value.as_object().unwrap();

        assert_eq!(object["enabled"], serde_json::Value::Bool(true));
        assert!(object["instanceId"].is_string());
        assert!(object["createdAt"].is_string());
        assert_eq!(object["configPath"], "/tmp/t.json");
    }

    #[test]
    fn test_non_interactive_first_run_is_ephemeral() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tool").join("telemetry.json");
        let consent = FixedConsent::new(false, true);

        let config = load_config("tool", Some(&path), &consent).unwrap();

        assert!(!config.enabled);
        assert!(config.config_path().is_none());
        assert!(!path.exists());
        assert_eq!(consent.prompts.get(), 0);
    }

    #[test]
    fn test_interactive_first_run_persists_answer() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("dir").join("telemetry.json");
        let consent = FixedConsent::new(true, false);

        let config = load_config("tool", Some(&path), &consent).unwrap();

        assert!(!config.enabled);
        assert_eq!(config.config_path(), Some(path.as_path()));
        assert!(path.exists());
        assert_eq!(consent.prompts.get(), 1);
    }

    #[test]
    fn test_corrupted_config_is_treated_as_absent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("telemetry.json");
        fs::write(&path, "{ not json").unwrap();

        let consent = FixedConsent::new(true, true);
        let config = load_config("tool", Some(&path), &consent).unwrap();

        assert!(config.enabled);
        assert_eq!(consent.prompts.get(), 1);

        let reloaded = load_config("tool", Some(&path), &consent).unwrap();
        assert_eq!(reloaded, config);
        assert_eq!(consent.prompts.get(), 1);
    }

    #[test]
    fn test_empty_instance_id_is_treated_as_absent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("telemetry.json");
        fs::write(
            &path,
            r#"{"enabled": true, "instanceId": "", "createdAt": "2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        let consent = FixedConsent::new(false, true);
        let config = load_config("tool", Some(&path), &consent).unwrap();

        assert!(!config.enabled);
        assert!(!config.instance_id().is_empty());
    }

    #[test]
    fn test_loaded_config_path_points_at_file_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("telemetry.json");
        fs::write(
            &path,
            r#"{
  "enabled": true,
  "instanceId": "1b4e28ba-2fa1-11d2-883f-0016d3cca427",
  "createdAt": "2024-01-01T00:00:00Z",
  "configPath": "/somewhere/else.json"
}"#,
        )
        .unwrap();

        let config = read_config(&path).unwrap();
        assert!(config.enabled);
        assert_eq!(config.instance_id(), "1b4e28ba-2fa1-11d2-883f-0016d3cca427");
        assert_eq!(config.config_path(), Some(path.as_path()));
    }

    #[test]
    fn test_update_consent_requires_path() {
        let mut config = TelemetryConfig::ephemeral();
        let result = update_consent(&mut config, true);

        assert!(matches!(result, Err(TelemetryError::ConfigPath)));
        assert!(!config.enabled);
    }

    #[test]
    fn test_update_consent_rewrites_record() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("telemetry.json");
        let mut config = TelemetryConfig::new(false, Some(path.clone()));
        save_config(&config, &path).unwrap();

        update_consent(&mut config, true).unwrap();
        assert!(config.enabled);

        let on_disk = read_config(&path).unwrap();
        assert_eq!(on_disk, config);
    }

    #[test]
    fn test_save_failure_is_config_save_error() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("file");
        fs::write(&blocker, "not a directory").unwrap();
        let path = blocker.join("telemetry.json");

        let consent = FixedConsent::new(true, true);
        let result = load_config("tool", Some(&path), &consent);

        assert!(matches!(result, Err(TelemetryError::ConfigSave { .. })));
    }

    #[test]
    fn test_default_config_path_is_keyed_by_app() {
        let path = default_config_path("my-tool");
        assert!(path.ends_with("telemetry.json"));
        assert!(path.to_string_lossy().contains("my-tool"));
    }
}

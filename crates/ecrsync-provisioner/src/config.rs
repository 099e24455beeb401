use std::path::Path;
use std::time::Duration;

use ecrsync_core::ImageTagMutability;
use serde::{Deserialize, Serialize};

use crate::error::ReconcileError;

/// Current config version. Bump this when adding fields or changing shape.
/// Each bump requires a corresponding entry in [`migrate`].
const CURRENT_VERSION: u32 = 1;

const DEFAULT_CREATE_FOLLOWUP_REQUEUE_SECS: u64 = 10;

/// Immutable settings handed to every reconcile pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Schema version. Missing or 0 = pre-versioned config.
    #[serde(default)]
    pub config_version: u32,
    /// Owning account, written into status when the remote does not say.
    pub account_id: String,
    pub region: String,
    /// Sent when the desired snapshot leaves scan-on-push unset.
    #[serde(default)]
    pub default_scan_on_push: bool,
    /// Sent when the desired snapshot leaves tag mutability unset.
    #[serde(default)]
    pub default_image_tag_mutability: ImageTagMutability,
    /// Remote error codes that mark a repository terminally failed.
    /// Empty: every failure is retryable.
    #[serde(default)]
    pub terminal_error_codes: Vec<String>,
    /// Requeue delay after a post-create policy update fails.
    #[serde(default = "default_create_followup_requeue_secs")]
    pub create_followup_requeue_secs: u64,
}

fn default_create_followup_requeue_secs() -> u64 {
    DEFAULT_CREATE_FOLLOWUP_REQUEUE_SECS
}

impl ReconcilerConfig {
    pub fn new(account_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            config_version: CURRENT_VERSION,
            account_id: account_id.into(),
            region: region.into(),
            default_scan_on_push: false,
            default_image_tag_mutability: ImageTagMutability::default(),
            terminal_error_codes: Vec::new(),
            create_followup_requeue_secs: DEFAULT_CREATE_FOLLOWUP_REQUEUE_SECS,
        }
    }

    /// Read a JSON config file, running migrations before deserializing.
    pub fn load(path: &Path) -> Result<Self, ReconcileError> {
        let contents = std::fs::read_to_string(path)?;

        let json: serde_json::Value = serde_json::from_str(&contents)?;
        let on_disk_version = match json.get("config_version").and_then(|v| v.as_u64()) {
            None => 0,
            Some(v) => u32::try_from(v).map_err(|_| {
                ReconcileError::InvalidConfig(format!("config_version {v} is out of range"))
            })?,
        };

        let migrated = migrate(json, on_disk_version)?;
        let config: ReconcilerConfig = serde_json::from_value(migrated)?;
        config.validate()?;

        tracing::debug!(path = %path.display(), version = config.config_version, "config loaded");
        Ok(config)
    }

    /// Write the config atomically (tmp + rename), stamped with the current version.
    pub fn save(&self, path: &Path) -> Result<(), ReconcileError> {
        let mut stamped = self.clone();
        stamped.config_version = CURRENT_VERSION;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&stamped)?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json.as_bytes())?;
        std::fs::rename(&tmp_path, path)?;

        tracing::info!(path = %path.display(), "config saved");
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ReconcileError> {
        if self.account_id.trim().is_empty() {
            return Err(ReconcileError::InvalidConfig("account_id is empty".into()));
        }
        if self.region.trim().is_empty() {
            return Err(ReconcileError::InvalidConfig("region is empty".into()));
        }
        Ok(())
    }

    pub fn create_followup_requeue(&self) -> Duration {
        Duration::from_secs(self.create_followup_requeue_secs)
    }
}

/// Run sequential migrations from `from_version` up to [`CURRENT_VERSION`].
fn migrate(
    mut json: serde_json::Value,
    from_version: u32,
) -> Result<serde_json::Value, ReconcileError> {
    if from_version > CURRENT_VERSION {
        return Err(ReconcileError::InvalidConfig(format!(
            "config_version {from_version} is newer than this build supports ({CURRENT_VERSION})"
        )));
    }

    // v0 → v1: terminal error codes became explicit
    if from_version < 1 {
        let obj = json
            .as_object_mut()
            .ok_or_else(|| ReconcileError::InvalidConfig("config is not a JSON object".into()))?;
        obj.entry("terminal_error_codes")
            .or_insert(serde_json::Value::Array(Vec::new()));
        obj.insert(
            "config_version".to_string(),
            serde_json::Value::Number(1.into()),
        );
        tracing::info!("migrated config v0 → v1 (added terminal_error_codes)");
    }

    Ok(json)
}

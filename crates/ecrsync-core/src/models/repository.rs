use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::models::Tag;

/// Full desired or observed state of one container-image repository.
///
/// A snapshot is a plain value. Each reconcile pass clones the previous
/// observation, mutates its own copy, and hands it back to the caller,
/// which stores it as the new latest state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub spec: RepositorySpec,
    #[serde(default)]
    pub status: RepositoryStatus,
}

impl Repository {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            spec: RepositorySpec {
                name: name.into(),
                ..Default::default()
            },
            status: RepositoryStatus::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn arn(&self) -> Option<&str> {
        self.status.arn.as_deref()
    }

    /// Registry holding the repository: the requested one, else the observed one.
    pub fn registry_id(&self) -> Option<&str> {
        self.spec
            .registry_id
            .as_deref()
            .or(self.status.registry_id.as_deref())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.terminal.as_ref().is_some_and(|c| c.status)
    }
}

/// Caller-settable attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositorySpec {
    /// Identity key. Set once at creation and never changed; an empty name
    /// means the identity is not known yet.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_scanning_configuration: Option<ImageScanningConfiguration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_tag_mutability: Option<ImageTagMutability>,
    /// Create-only at the remote side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_configuration: Option<EncryptionConfiguration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle_policy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageScanningConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_on_push: Option<bool>,
}

impl ImageScanningConfiguration {
    pub fn scan_on_push(enabled: bool) -> Self {
        Self {
            scan_on_push: Some(enabled),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionConfiguration {
    /// e.g. "AES256" or "KMS"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kms_key: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImageTagMutability {
    #[default]
    Mutable,
    Immutable,
}

impl ImageTagMutability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mutable => "MUTABLE",
            Self::Immutable => "IMMUTABLE",
        }
    }
}

impl fmt::Display for ImageTagMutability {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageTagMutability {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MUTABLE" => Ok(Self::Mutable),
            "IMMUTABLE" => Ok(Self::Immutable),
            other => Err(CoreError::InvalidTagMutability(other.to_string())),
        }
    }
}

/// Fields populated only by the remote system, plus the engine's own
/// conditions. Callers never supply these.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositoryStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<jiff::Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced: Option<Condition>,
    /// At most one terminal condition; `None` means not terminally failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal: Option<Condition>,
    /// Desired spec that hit the terminal error. Retries stay off until the
    /// desired spec differs from it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_spec: Option<Box<RepositorySpec>>,
}

/// A boolean with an optional human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub status: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Condition {
    pub fn truthy() -> Self {
        Self {
            status: true,
            message: None,
        }
    }

    pub fn falsy(message: impl Into<String>) -> Self {
        Self {
            status: false,
            message: Some(message.into()),
        }
    }
}

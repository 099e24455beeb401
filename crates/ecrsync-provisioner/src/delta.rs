//! Field-by-field comparison of two snapshots.

use std::fmt;

use ecrsync_core::{equal_strings, equal_tags, Repository, RepositorySpec};
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::ReconcilerConfig;

/// A comparable top-level attribute of a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FieldPath {
    ImageScanningConfiguration,
    ImageTagMutability,
    EncryptionConfiguration,
    LifecyclePolicy,
    Policy,
    Tags,
}

impl FieldPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ImageScanningConfiguration => "Spec.ImageScanningConfiguration",
            Self::ImageTagMutability => "Spec.ImageTagMutability",
            Self::EncryptionConfiguration => "Spec.EncryptionConfiguration",
            Self::LifecyclePolicy => "Spec.LifecyclePolicy",
            Self::Policy => "Spec.Policy",
            Self::Tags => "Spec.Tags",
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured before/after for a single attribute that differs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub path: FieldPath,
    /// What the latest observation has
    pub old: Value,
    /// What the desired snapshot wants
    pub new: Value,
}

/// Sparse set of differing attributes for one reconcile pass.
///
/// Holds at most one entry per path. Built once, consumed once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    changes: Vec<FieldChange>,
}

impl ChangeSet {
    /// Record a difference. A second record for the same path replaces the first.
    pub fn add(&mut self, path: FieldPath, old: Value, new: Value) {
        let change = FieldChange { path, old, new };
        match self.changes.iter_mut().find(|c| c.path == path) {
            Some(existing) => *existing = change,
            None => self.changes.push(change),
        }
    }

    pub fn different_at(&self, path: FieldPath) -> bool {
        self.changes.iter().any(|c| c.path == path)
    }

    pub fn get(&self, path: FieldPath) -> Option<&FieldChange> {
        self.changes.iter().find(|c| c.path == path)
    }

    pub fn paths(&self) -> Vec<FieldPath> {
        self.changes.iter().map(|c| c.path).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldChange> {
        self.changes.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }
}

/// Attributes covered by the generic comparison. Tags are excluded: they
/// need order-independent comparison and go through [`tags_pre_compare`].
const GENERIC_FIELDS: [FieldPath; 5] = [
    FieldPath::ImageScanningConfiguration,
    FieldPath::ImageTagMutability,
    FieldPath::EncryptionConfiguration,
    FieldPath::LifecyclePolicy,
    FieldPath::Policy,
];

const DEFAULT_ENCRYPTION_TYPE: &str = "AES256";

/// Compare desired against latest with the tag pre-compare step installed.
pub fn diff(desired: &Repository, latest: &Repository, config: &ReconcilerConfig) -> ChangeSet {
    diff_with(desired, latest, config, tags_pre_compare)
}

/// Compare desired against latest, running `pre_compare` first so it can
/// inject differences the generic comparison cannot see.
pub fn diff_with<F>(
    desired: &Repository,
    latest: &Repository,
    config: &ReconcilerConfig,
    pre_compare: F,
) -> ChangeSet
where
    F: FnOnce(&mut ChangeSet, &RepositorySpec, &RepositorySpec),
{
    let mut changes = ChangeSet::default();
    pre_compare(&mut changes, &desired.spec, &latest.spec);

    for path in GENERIC_FIELDS {
        if let Some((old, new)) = compare_field(path, &desired.spec, &latest.spec, config) {
            changes.add(path, old, new);
        }
    }

    changes
}

/// Adds a `Tags` change when the two tag sets differ in any order.
pub fn tags_pre_compare(changes: &mut ChangeSet, desired: &RepositorySpec, latest: &RepositorySpec) {
    if !equal_tags(&latest.tags, &desired.tags) {
        changes.add(FieldPath::Tags, json!(latest.tags), json!(desired.tags));
    }
}

/// `(old, new)` when the attribute differs, `None` when equal.
///
/// Config-like attributes compare by effective value: an unset desired
/// value means the remote default.
fn compare_field(
    path: FieldPath,
    desired: &RepositorySpec,
    latest: &RepositorySpec,
    config: &ReconcilerConfig,
) -> Option<(Value, Value)> {
    match path {
        FieldPath::ImageScanningConfiguration => {
            let scan = |spec: &RepositorySpec| {
                spec.image_scanning_configuration
                    .as_ref()
                    .and_then(|c| c.scan_on_push)
                    .unwrap_or(config.default_scan_on_push)
            };
            let (old, new) = (scan(latest), scan(desired));
            (old != new).then(|| (json!({"scan_on_push": old}), json!({"scan_on_push": new})))
        }
        FieldPath::ImageTagMutability => {
            let mutability = |spec: &RepositorySpec| {
                spec.image_tag_mutability
                    .unwrap_or(config.default_image_tag_mutability)
            };
            let (old, new) = (mutability(latest), mutability(desired));
            (old != new).then(|| (json!(old), json!(new)))
        }
        FieldPath::EncryptionConfiguration => {
            let encryption = |spec: &RepositorySpec| {
                let cfg = spec.encryption_configuration.as_ref();
                let kind = cfg
                    .and_then(|c| c.encryption_type.as_deref())
                    .filter(|t| !t.is_empty())
                    .unwrap_or(DEFAULT_ENCRYPTION_TYPE)
                    .to_string();
                let kms_key = cfg.and_then(|c| c.kms_key.clone());
                (kind, kms_key)
            };
            let (old, new) = (encryption(latest), encryption(desired));
            let same = old.0 == new.0 && equal_strings(old.1.as_deref(), new.1.as_deref());
            (!same).then(|| {
                (
                    json!({"encryption_type": old.0, "kms_key": old.1}),
                    json!({"encryption_type": new.0, "kms_key": new.1}),
                )
            })
        }
        FieldPath::LifecyclePolicy => compare_policy(
            latest.lifecycle_policy.as_deref(),
            desired.lifecycle_policy.as_deref(),
        ),
        FieldPath::Policy => compare_policy(latest.policy.as_deref(), desired.policy.as_deref()),
        FieldPath::Tags => None,
    }
}

fn compare_policy(old: Option<&str>, new: Option<&str>) -> Option<(Value, Value)> {
    (!equal_policies(old, new)).then(|| (json!(old), json!(new)))
}

/// Policy documents are equal when their text is equal under blank-vs-nil
/// rules, or when both parse to the same JSON value. The remote re-formats
/// policy text, so whitespace alone never counts as a change.
pub fn equal_policies(a: Option<&str>, b: Option<&str>) -> bool {
    if equal_strings(a, b) {
        return true;
    }
    match (a, b) {
        (Some(a), Some(b)) => {
            match (
                serde_json::from_str::<Value>(a),
                serde_json::from_str::<Value>(b),
            ) {
                (Ok(a), Ok(b)) => a == b,
                _ => false,
            }
        }
        _ => false,
    }
}

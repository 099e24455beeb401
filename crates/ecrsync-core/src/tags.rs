//! Order-independent comparison of tag sets.

use std::collections::HashSet;

use crate::models::Tag;

/// Result of comparing an old tag set against a new one.
///
/// Every key lands in at most one bucket. Removed entries carry only the
/// key; the remote untag call never needs the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagDelta {
    pub added: Vec<Tag>,
    pub updated: Vec<Tag>,
    pub removed: Vec<String>,
}

impl TagDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    /// Added and updated tags together, in that order. The tagging API is
    /// idempotent on re-add, so both go through the same call.
    pub fn upserts(&self) -> Vec<Tag> {
        self.added.iter().chain(&self.updated).cloned().collect()
    }
}

/// Blank-vs-nil equality: an absent value equals an absent value or the
/// empty string; otherwise plain string equality.
pub fn equal_strings(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (None, None) => true,
        (None, Some(v)) | (Some(v), None) => v.is_empty(),
        (Some(a), Some(b)) => a == b,
    }
}

/// Partition `new` against `old` by key.
///
/// Each bucket keeps the iteration order of its source slice. Duplicate
/// keys after the first occurrence are ignored.
pub fn compute_tags_delta(old: &[Tag], new: &[Tag]) -> TagDelta {
    let mut delta = TagDelta::default();
    let mut visited: HashSet<&str> = HashSet::new();

    for old_tag in old {
        if !visited.insert(old_tag.key.as_str()) {
            continue;
        }
        match new.iter().find(|t| t.key == old_tag.key) {
            Some(new_tag) => {
                if !equal_strings(old_tag.value.as_deref(), new_tag.value.as_deref()) {
                    delta.updated.push(new_tag.clone());
                }
            }
            None => delta.removed.push(old_tag.key.clone()),
        }
    }

    for new_tag in new {
        if visited.insert(new_tag.key.as_str()) {
            delta.added.push(new_tag.clone());
        }
    }

    delta
}

/// True when two tag sets hold the same keys with equal values, in any order.
pub fn equal_tags(a: &[Tag], b: &[Tag]) -> bool {
    compute_tags_delta(a, b).is_empty()
}

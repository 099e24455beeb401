use serde::{Deserialize, Serialize};

/// A single Key/Value tag. A tag list is a set keyed by `key`; its order
/// carries no meaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }

    /// Tag with no value at all (distinct encoding from an empty string,
    /// but compared as equal to it).
    pub fn without_value(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }
}

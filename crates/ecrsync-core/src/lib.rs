//! ecrsync-core
//!
//! Pure domain types for container-repository reconciliation: the repository
//! snapshot, its tag set, and the order-independent tag delta.
//! No AWS SDK dependency; this is the shared vocabulary of the engine.

pub mod annotations;
pub mod error;
pub mod models;
pub mod tags;

pub use crate::error::CoreError;
pub use crate::models::{
    Condition, EncryptionConfiguration, ImageScanningConfiguration, ImageTagMutability,
    Repository, RepositorySpec, RepositoryStatus, Tag,
};
pub use crate::tags::{compute_tags_delta, equal_strings, equal_tags, TagDelta};

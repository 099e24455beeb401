//! ecrsync-provisioner
//!
//! Reconciliation engine that drives a container-image repository (and its
//! policies and tags) toward a declared desired state.
//!
//! Public API:
//! - `reconcile()`: create, or read → diff → converge one repository
//! - `delete()`: remove a repository, tolerating one that is already gone
//! - `diff()`: sparse per-field change set between desired and observed
//! - `converge()`: push a change set to the remote in a fixed order
//! - `reconstruct()`: rebuild a snapshot from raw describe output
//! - `update_conditions()`: fold a pass error into the terminal condition
//!
//! The remote service sits behind [`RepositoryApi`]. The optional `aws`
//! feature provides an implementation backed by the ECR SDK.

pub mod api;
#[cfg(feature = "aws")]
pub mod aws;
pub mod config;
pub mod context;
pub mod converge;
pub mod delta;
pub mod error;
pub mod read;
pub mod reconcile;

pub use crate::api::{ApiError, RemoteRepository, RepositoryApi};
pub use crate::config::ReconcilerConfig;
pub use crate::context::ReconcileContext;
pub use crate::converge::{converge, requires_remote_calls, CONVERGENCE_ORDER};
pub use crate::delta::{diff, diff_with, ChangeSet, FieldChange, FieldPath};
pub use crate::error::ReconcileError;
pub use crate::read::{read_one, reconstruct, Lookup};
pub use crate::reconcile::{delete, reconcile, update_conditions, ReconcileOutcome, SyncState};

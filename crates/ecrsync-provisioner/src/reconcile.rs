//! Entry points called once per reconcile pass.

use std::time::Duration;

use ecrsync_core::{Condition, Repository};
use serde_json::{json, Value};

use crate::api::{
    CreateRepositoryRequest, DeleteRepositoryRequest, RepositoryRef, CREATE_REPOSITORY,
    DELETE_REPOSITORY,
};
use crate::config::ReconcilerConfig;
use crate::context::ReconcileContext;
use crate::converge::{converge, requires_remote_calls};
use crate::delta::{diff, ChangeSet, FieldPath};
use crate::error::ReconcileError;
use crate::read::{merge_status, read_one, set_status_defaults};

/// Where a pass ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Nothing differed; no remote mutation issued.
    InSync,
    /// Nothing differed and the repository stays terminally failed.
    Terminal,
    /// Created, including any post-create policy calls.
    Created,
    /// Created, but the post-create policy calls failed. Retry later.
    CreatePending,
    /// Differences were pushed to the remote.
    Converged,
}

#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    /// Snapshot to persist as the new latest observed state.
    pub repository: Repository,
    pub requeue_after: Option<Duration>,
    pub state: SyncState,
}

impl ReconcileOutcome {
    fn done(repository: Repository, state: SyncState) -> Self {
        Self {
            repository,
            requeue_after: None,
            state,
        }
    }
}

/// Drive one repository toward `desired`.
///
/// `latest == None` means create. Otherwise the repository is read back
/// from the remote; if it is gone it is created again, else the
/// differences are converged. A repository that failed terminally is left
/// alone, without any remote call, until the desired spec changes.
pub async fn reconcile(
    ctx: &ReconcileContext<'_>,
    desired: &Repository,
    latest: Option<&Repository>,
) -> Result<ReconcileOutcome, ReconcileError> {
    if desired.name().is_empty() {
        return Err(ReconcileError::MissingField("spec.name"));
    }

    let Some(latest) = latest else {
        return create(ctx, desired).await;
    };

    if retry_blocked(desired, latest, ctx.config) {
        tracing::info!(
            repository = %desired.name(),
            "terminal failure for this desired state, not retrying"
        );
        return Ok(ReconcileOutcome::done(latest.clone(), SyncState::Terminal));
    }

    let base = Repository {
        spec: desired.spec.clone(),
        status: latest.status.clone(),
    };
    let observed = match read_one(ctx, &base).await {
        Ok(observed) => observed,
        Err(ReconcileError::NotFound(_)) => {
            tracing::info!(repository = %desired.name(), "repository missing remotely, recreating");
            return create(ctx, desired).await;
        }
        Err(e) => return Err(e),
    };

    update(ctx, desired, &observed).await
}

/// True when `latest` is terminally failed and `desired` still asks for the
/// spec that failed.
fn retry_blocked(desired: &Repository, latest: &Repository, config: &ReconcilerConfig) -> bool {
    if !latest.is_terminal() {
        return false;
    }
    latest.status.terminal_spec.as_deref().is_some_and(|failed| {
        let failed = Repository {
            spec: failed.clone(),
            ..Repository::default()
        };
        diff(desired, &failed, config).is_empty()
    })
}

async fn update(
    ctx: &ReconcileContext<'_>,
    desired: &Repository,
    observed: &Repository,
) -> Result<ReconcileOutcome, ReconcileError> {
    let changes = diff(desired, observed, ctx.config);

    if !requires_remote_calls(&changes) {
        if changes.different_at(FieldPath::EncryptionConfiguration) {
            tracing::warn!(
                repository = %desired.name(),
                "encryption configuration differs but can only be set at creation; leaving it"
            );
        }
        let mut repo = observed.clone();
        if repo.is_terminal() {
            tracing::debug!(repository = %repo.name(), "no changes; terminal condition stays");
            return Ok(ReconcileOutcome::done(repo, SyncState::Terminal));
        }
        repo.status.synced = Some(Condition::truthy());
        tracing::debug!(repository = %repo.name(), "repository in sync");
        return Ok(ReconcileOutcome::done(repo, SyncState::InSync));
    }

    tracing::info!(
        repository = %desired.name(),
        fields = ?changes.paths(),
        "converging repository"
    );
    let mut updated = converge(ctx, desired, observed, &changes).await?;
    updated.status = observed.status.clone();
    updated.status.terminal = None;
    updated.status.terminal_spec = None;
    updated.status.synced = Some(Condition::truthy());

    Ok(ReconcileOutcome::done(updated, SyncState::Converged))
}

/// Create the repository, then apply the policies the create call cannot carry.
///
/// If those follow-up calls fail the repository still counts as created:
/// it is marked not-synced and requeued, and the next pass pushes the
/// policies through the normal diff path.
async fn create(
    ctx: &ReconcileContext<'_>,
    desired: &Repository,
) -> Result<ReconcileOutcome, ReconcileError> {
    let spec = &desired.spec;
    let req = CreateRepositoryRequest {
        repository_name: spec.name.clone(),
        registry_id: spec.registry_id.clone(),
        image_tag_mutability: spec.image_tag_mutability,
        image_scanning_configuration: spec.image_scanning_configuration.clone(),
        encryption_configuration: spec.encryption_configuration.clone(),
        tags: spec.tags.clone(),
    };

    tracing::info!(repository = %spec.name, "creating repository");
    ctx.checkpoint(CREATE_REPOSITORY)?;
    let created = ctx.api.create_repository(req).await?;

    let mut repo = desired.clone();
    merge_status(&mut repo, &created);
    set_status_defaults(&mut repo, ctx.config);
    repo.status.terminal = None;
    repo.status.terminal_spec = None;
    tracing::info!(
        repository = %repo.name(),
        arn = repo.arn().unwrap_or_default(),
        "repository created"
    );

    let followup = create_followup(&repo);
    if followup.is_empty() {
        repo.status.synced = Some(Condition::truthy());
        return Ok(ReconcileOutcome::done(repo, SyncState::Created));
    }

    let mut fresh = repo.clone();
    fresh.spec.policy = None;
    fresh.spec.lifecycle_policy = None;

    match converge(ctx, &repo, &fresh, &followup).await {
        Ok(mut converged) => {
            converged.status = repo.status;
            converged.status.synced = Some(Condition::truthy());
            Ok(ReconcileOutcome::done(converged, SyncState::Created))
        }
        Err(e) => {
            tracing::warn!(
                repository = %repo.name(),
                error = %e,
                "post-create policy update failed, will retry"
            );
            repo.status.synced = Some(Condition::falsy(format!("pending: {e}")));
            Ok(ReconcileOutcome {
                repository: repo,
                requeue_after: Some(ctx.config.create_followup_requeue()),
                state: SyncState::CreatePending,
            })
        }
    }
}

/// Policy fields set on a brand-new repository.
fn create_followup(repo: &Repository) -> ChangeSet {
    let mut changes = ChangeSet::default();
    let non_empty = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());

    if non_empty(&repo.spec.lifecycle_policy) {
        changes.add(
            FieldPath::LifecyclePolicy,
            Value::Null,
            json!(repo.spec.lifecycle_policy),
        );
    }
    if non_empty(&repo.spec.policy) {
        changes.add(FieldPath::Policy, Value::Null, json!(repo.spec.policy));
    }
    changes
}

/// Remove the repository. A repository that is already gone is not an error.
pub async fn delete(
    ctx: &ReconcileContext<'_>,
    repo: &Repository,
    force: bool,
) -> Result<(), ReconcileError> {
    tracing::info!(repository = %repo.name(), force, "deleting repository");
    ctx.checkpoint(DELETE_REPOSITORY)?;

    match ctx
        .api
        .delete_repository(DeleteRepositoryRequest {
            repository: RepositoryRef::of(repo),
            force,
        })
        .await
    {
        Ok(()) => Ok(()),
        Err(e) if e.is_repository_not_found() => {
            tracing::debug!(repository = %repo.name(), "repository already deleted");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Fold the result of a pass into the conditions of `repo`, the desired
/// snapshot that was reconciled.
///
/// A terminal error sets the terminal condition and records `repo.spec` as
/// the spec that failed; [`reconcile`] will not retry it. Any other error
/// clears a previous terminal condition and marks the snapshot not synced,
/// keeping its message. Returns `None` when nothing changed.
pub fn update_conditions(
    repo: &Repository,
    err: Option<&ReconcileError>,
    config: &ReconcilerConfig,
) -> Option<Repository> {
    let mut updated = repo.clone();

    match err {
        Some(e) if e.is_terminal(config) => {
            let message = e.to_string();
            updated.status.terminal = Some(Condition {
                status: true,
                message: Some(message.clone()),
            });
            updated.status.synced = Some(Condition::falsy(message));
            updated.status.terminal_spec = Some(Box::new(repo.spec.clone()));
        }
        Some(_) => {
            updated.status.terminal = None;
            updated.status.terminal_spec = None;
            let message = repo.status.synced.as_ref().and_then(|c| c.message.clone());
            updated.status.synced = Some(Condition {
                status: false,
                message,
            });
        }
        None => {
            updated.status.terminal = None;
            updated.status.terminal_spec = None;
        }
    }

    (updated != *repo).then_some(updated)
}

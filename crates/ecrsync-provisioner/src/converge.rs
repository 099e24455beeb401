//! Pushes a change set to the remote, one call per changed attribute.
//!
//! The remote has a separate call for each attribute and none of them are
//! transactional, so steps always run in [`CONVERGENCE_ORDER`] and the first
//! failure aborts the rest. Re-running the sequence after a partial failure
//! re-issues only what still differs.

use ecrsync_core::{compute_tags_delta, Repository};

use crate::api::{
    PutImageScanningConfigurationRequest, PutImageTagMutabilityRequest, PutLifecyclePolicyRequest,
    RepositoryRef, SetRepositoryPolicyRequest, TagResourceRequest, UntagResourceRequest,
    DELETE_LIFECYCLE_POLICY, DELETE_REPOSITORY_POLICY, PUT_IMAGE_SCANNING_CONFIGURATION,
    PUT_IMAGE_TAG_MUTABILITY, PUT_LIFECYCLE_POLICY, SET_REPOSITORY_POLICY, TAG_RESOURCE,
    UNTAG_RESOURCE,
};
use crate::context::ReconcileContext;
use crate::delta::{ChangeSet, FieldPath};
use crate::error::ReconcileError;

/// Structural config settles before policy text, and tags go last.
pub const CONVERGENCE_ORDER: [FieldPath; 5] = [
    FieldPath::ImageScanningConfiguration,
    FieldPath::ImageTagMutability,
    FieldPath::LifecyclePolicy,
    FieldPath::Policy,
    FieldPath::Tags,
];

/// True when at least one change maps to a remote call. An encryption
/// difference alone does not.
pub fn requires_remote_calls(changes: &ChangeSet) -> bool {
    CONVERGENCE_ORDER.iter().any(|path| changes.different_at(*path))
}

/// Issue one remote call per changed attribute and return the updated snapshot.
///
/// The per-attribute calls are write-only, so the result is `desired`
/// unchanged; the caller carries observed status over.
pub async fn converge(
    ctx: &ReconcileContext<'_>,
    desired: &Repository,
    latest: &Repository,
    changes: &ChangeSet,
) -> Result<Repository, ReconcileError> {
    if changes.different_at(FieldPath::EncryptionConfiguration) {
        tracing::warn!(
            repository = %desired.name(),
            "encryption configuration differs but can only be set at creation; leaving it"
        );
    }

    let mut updated = desired.clone();
    for path in CONVERGENCE_ORDER {
        if !changes.different_at(path) {
            continue;
        }
        tracing::debug!(repository = %desired.name(), field = %path, "converging field");

        updated = match path {
            FieldPath::ImageScanningConfiguration => {
                update_image_scanning_configuration(ctx, updated).await?
            }
            FieldPath::ImageTagMutability => update_image_tag_mutability(ctx, updated).await?,
            FieldPath::LifecyclePolicy => update_lifecycle_policy(ctx, updated).await?,
            FieldPath::Policy => update_repository_policy(ctx, updated).await?,
            FieldPath::Tags => {
                sync_repository_tags(ctx, latest, &updated).await?;
                updated
            }
            FieldPath::EncryptionConfiguration => updated,
        };
    }

    Ok(updated)
}

async fn update_image_scanning_configuration(
    ctx: &ReconcileContext<'_>,
    desired: Repository,
) -> Result<Repository, ReconcileError> {
    // No "reset" at the remote: an unset value sends the default.
    let scan_on_push = desired
        .spec
        .image_scanning_configuration
        .as_ref()
        .and_then(|c| c.scan_on_push)
        .unwrap_or(ctx.config.default_scan_on_push);

    ctx.checkpoint(PUT_IMAGE_SCANNING_CONFIGURATION)?;
    ctx.api
        .put_image_scanning_configuration(PutImageScanningConfigurationRequest {
            repository: RepositoryRef::of(&desired),
            scan_on_push,
        })
        .await?;

    tracing::info!(repository = %desired.name(), scan_on_push, "image scanning configuration updated");
    Ok(desired)
}

async fn update_image_tag_mutability(
    ctx: &ReconcileContext<'_>,
    desired: Repository,
) -> Result<Repository, ReconcileError> {
    let image_tag_mutability = desired
        .spec
        .image_tag_mutability
        .unwrap_or(ctx.config.default_image_tag_mutability);

    ctx.checkpoint(PUT_IMAGE_TAG_MUTABILITY)?;
    ctx.api
        .put_image_tag_mutability(PutImageTagMutabilityRequest {
            repository: RepositoryRef::of(&desired),
            image_tag_mutability,
        })
        .await?;

    tracing::info!(
        repository = %desired.name(),
        mutability = %image_tag_mutability,
        "image tag mutability updated"
    );
    Ok(desired)
}

async fn update_lifecycle_policy(
    ctx: &ReconcileContext<'_>,
    desired: Repository,
) -> Result<Repository, ReconcileError> {
    // The remote has no "unset": an empty policy means delete it.
    let Some(text) = desired
        .spec
        .lifecycle_policy
        .clone()
        .filter(|t| !t.is_empty())
    else {
        return delete_lifecycle_policy(ctx, desired).await;
    };

    ctx.checkpoint(PUT_LIFECYCLE_POLICY)?;
    ctx.api
        .put_lifecycle_policy(PutLifecyclePolicyRequest {
            repository: RepositoryRef::of(&desired),
            lifecycle_policy_text: text,
        })
        .await?;

    tracing::info!(repository = %desired.name(), "lifecycle policy updated");
    Ok(desired)
}

async fn delete_lifecycle_policy(
    ctx: &ReconcileContext<'_>,
    desired: Repository,
) -> Result<Repository, ReconcileError> {
    ctx.checkpoint(DELETE_LIFECYCLE_POLICY)?;
    match ctx
        .api
        .delete_lifecycle_policy(RepositoryRef::of(&desired))
        .await
    {
        Ok(()) => tracing::info!(repository = %desired.name(), "lifecycle policy deleted"),
        Err(e) if e.is_lifecycle_policy_not_found() => {
            tracing::debug!(repository = %desired.name(), "lifecycle policy already absent");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(desired)
}

async fn update_repository_policy(
    ctx: &ReconcileContext<'_>,
    desired: Repository,
) -> Result<Repository, ReconcileError> {
    let Some(text) = desired.spec.policy.clone().filter(|t| !t.is_empty()) else {
        return delete_repository_policy(ctx, desired).await;
    };

    ctx.checkpoint(SET_REPOSITORY_POLICY)?;
    ctx.api
        .set_repository_policy(SetRepositoryPolicyRequest {
            repository: RepositoryRef::of(&desired),
            policy_text: text,
        })
        .await?;

    tracing::info!(repository = %desired.name(), "repository policy updated");
    Ok(desired)
}

async fn delete_repository_policy(
    ctx: &ReconcileContext<'_>,
    desired: Repository,
) -> Result<Repository, ReconcileError> {
    ctx.checkpoint(DELETE_REPOSITORY_POLICY)?;
    match ctx
        .api
        .delete_repository_policy(RepositoryRef::of(&desired))
        .await
    {
        Ok(()) => tracing::info!(repository = %desired.name(), "repository policy deleted"),
        Err(e) if e.is_repository_policy_not_found() => {
            tracing::debug!(repository = %desired.name(), "repository policy already absent");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(desired)
}

/// At most one untag call with every removed key, then at most one tag call
/// carrying added and updated tags together.
async fn sync_repository_tags(
    ctx: &ReconcileContext<'_>,
    latest: &Repository,
    desired: &Repository,
) -> Result<(), ReconcileError> {
    let delta = compute_tags_delta(&latest.spec.tags, &desired.spec.tags);
    let arn = latest
        .arn()
        .or(desired.arn())
        .ok_or(ReconcileError::MissingField("status.arn"))?
        .to_string();

    if !delta.removed.is_empty() {
        ctx.checkpoint(UNTAG_RESOURCE)?;
        ctx.api
            .untag_resource(UntagResourceRequest {
                resource_arn: arn.clone(),
                tag_keys: delta.removed.clone(),
            })
            .await?;
        tracing::info!(repository = %desired.name(), removed = delta.removed.len(), "tags removed");
    }

    let upserts = delta.upserts();
    if !upserts.is_empty() {
        let count = upserts.len();
        ctx.checkpoint(TAG_RESOURCE)?;
        ctx.api
            .tag_resource(TagResourceRequest {
                resource_arn: arn,
                tags: upserts,
            })
            .await?;
        tracing::info!(repository = %desired.name(), upserted = count, "tags applied");
    }

    Ok(())
}

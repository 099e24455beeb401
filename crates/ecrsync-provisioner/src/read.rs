//! Rebuild a snapshot from what the remote reports.

use ecrsync_core::Repository;

use crate::api::{
    DescribeRepositoriesRequest, RemoteRepository, RepositoryRef, DESCRIBE_REPOSITORIES,
    GET_LIFECYCLE_POLICY, GET_REPOSITORY_POLICY, LIST_TAGS_FOR_RESOURCE,
};
use crate::config::ReconcilerConfig;
use crate::context::ReconcileContext;
use crate::error::ReconcileError;

/// Outcome of matching describe output against a base snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found(Box<Repository>),
    /// The remote returned no candidates at all.
    Empty,
    /// Candidates came back, but none carried the base snapshot's identity.
    NoMatch { candidates: usize },
}

impl Lookup {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// `None` for both flavours of "does not exist remotely".
    pub fn into_option(self) -> Option<Repository> {
        match self {
            Self::Found(repo) => Some(*repo),
            Self::Empty | Self::NoMatch { .. } => None,
        }
    }
}

/// Find the candidate matching `base` and merge it into a copy of `base`.
///
/// When `base` already has a name, candidates with any other name are
/// discarded; a differently-named repository in the same registry must
/// never be adopted.
pub fn reconstruct(
    base: &Repository,
    candidates: &[RemoteRepository],
    config: &ReconcilerConfig,
) -> Lookup {
    if candidates.is_empty() {
        return Lookup::Empty;
    }

    let identity = base.name();
    let matching = candidates
        .iter()
        .find(|c| identity.is_empty() || c.repository_name.as_deref() == Some(identity));
    let Some(candidate) = matching else {
        return Lookup::NoMatch {
            candidates: candidates.len(),
        };
    };

    let mut repo = base.clone();
    merge_status(&mut repo, candidate);
    merge_spec(&mut repo, candidate);
    set_status_defaults(&mut repo, config);
    Lookup::Found(Box::new(repo))
}

/// Status-only fields are always taken from the remote.
pub(crate) fn merge_status(repo: &mut Repository, remote: &RemoteRepository) {
    repo.status.created_at = remote.created_at;
    repo.status.arn = remote.repository_arn.clone();
    repo.status.registry_id = remote.registry_id.clone();
    repo.status.repository_uri = remote.repository_uri.clone();
}

/// Settable fields are only overwritten when the remote carries a value.
fn merge_spec(repo: &mut Repository, remote: &RemoteRepository) {
    if let Some(name) = remote.repository_name.as_deref().filter(|n| !n.is_empty()) {
        repo.spec.name = name.to_string();
    }
    if let Some(mutability) = remote.image_tag_mutability {
        repo.spec.image_tag_mutability = Some(mutability);
    }
    if let Some(scanning) = &remote.image_scanning_configuration {
        repo.spec.image_scanning_configuration = Some(scanning.clone());
    }
    if let Some(encryption) = &remote.encryption_configuration {
        repo.spec.encryption_configuration = Some(encryption.clone());
    }
}

pub(crate) fn set_status_defaults(repo: &mut Repository, config: &ReconcilerConfig) {
    repo.status
        .owner_account_id
        .get_or_insert_with(|| config.account_id.clone());
    repo.status
        .region
        .get_or_insert_with(|| config.region.clone());
}

/// Describe the repository, merge the match into `base`, then load the
/// fields describe does not return: access policy, lifecycle policy, tags.
pub async fn read_one(
    ctx: &ReconcileContext<'_>,
    base: &Repository,
) -> Result<Repository, ReconcileError> {
    let name = base.name().to_string();
    let req = DescribeRepositoriesRequest {
        registry_id: base.registry_id().map(String::from),
        repository_names: if name.is_empty() {
            vec![]
        } else {
            vec![name.clone()]
        },
    };

    ctx.checkpoint(DESCRIBE_REPOSITORIES)?;
    let candidates = match ctx.api.describe_repositories(req).await {
        Ok(candidates) => candidates,
        Err(e) if e.is_repository_not_found() => return Err(ReconcileError::NotFound(name)),
        Err(e) => return Err(e.into()),
    };

    let mut repo = match reconstruct(base, &candidates, ctx.config) {
        Lookup::Found(repo) => *repo,
        Lookup::Empty => {
            tracing::debug!(repository = %name, "describe returned no repositories");
            return Err(ReconcileError::NotFound(name));
        }
        Lookup::NoMatch { candidates } => {
            tracing::debug!(repository = %name, candidates, "no candidate matched repository name");
            return Err(ReconcileError::NotFound(name));
        }
    };

    set_additional_fields(ctx, &mut repo).await?;
    Ok(repo)
}

/// A missing policy reads as empty. A value from an earlier observation is
/// never kept when the remote says there is none.
async fn set_additional_fields(
    ctx: &ReconcileContext<'_>,
    repo: &mut Repository,
) -> Result<(), ReconcileError> {
    ctx.checkpoint(GET_REPOSITORY_POLICY)?;
    repo.spec.policy = match ctx
        .api
        .get_repository_policy(RepositoryRef::of(repo))
        .await
    {
        Ok(text) => Some(text),
        Err(e) if e.is_repository_policy_not_found() => None,
        Err(e) => return Err(e.into()),
    };

    ctx.checkpoint(GET_LIFECYCLE_POLICY)?;
    repo.spec.lifecycle_policy = match ctx.api.get_lifecycle_policy(RepositoryRef::of(repo)).await {
        Ok(text) => Some(text),
        Err(e) if e.is_lifecycle_policy_not_found() => None,
        Err(e) => return Err(e.into()),
    };

    let arn = repo
        .arn()
        .ok_or(ReconcileError::MissingField("status.arn"))?
        .to_string();
    ctx.checkpoint(LIST_TAGS_FOR_RESOURCE)?;
    repo.spec.tags = ctx.api.list_tags_for_resource(arn).await?;

    tracing::debug!(repository = %repo.name(), tags = repo.spec.tags.len(), "repository read");
    Ok(())
}

//! Boundary to the remote registry service.
//!
//! One method per remote verb. Requests are flat values built from snapshot
//! fields; failures come back classified as [`ApiError`].

use std::future::Future;
use std::pin::Pin;

use ecrsync_core::{
    EncryptionConfiguration, ImageScanningConfiguration, ImageTagMutability, Repository, Tag,
};
use thiserror::Error;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// Operation names, used for logging and cancellation checkpoints.
pub const DESCRIBE_REPOSITORIES: &str = "DescribeRepositories";
pub const CREATE_REPOSITORY: &str = "CreateRepository";
pub const DELETE_REPOSITORY: &str = "DeleteRepository";
pub const PUT_IMAGE_SCANNING_CONFIGURATION: &str = "PutImageScanningConfiguration";
pub const PUT_IMAGE_TAG_MUTABILITY: &str = "PutImageTagMutability";
pub const GET_LIFECYCLE_POLICY: &str = "GetLifecyclePolicy";
pub const PUT_LIFECYCLE_POLICY: &str = "PutLifecyclePolicy";
pub const DELETE_LIFECYCLE_POLICY: &str = "DeleteLifecyclePolicy";
pub const GET_REPOSITORY_POLICY: &str = "GetRepositoryPolicy";
pub const SET_REPOSITORY_POLICY: &str = "SetRepositoryPolicy";
pub const DELETE_REPOSITORY_POLICY: &str = "DeleteRepositoryPolicy";
pub const LIST_TAGS_FOR_RESOURCE: &str = "ListTagsForResource";
pub const TAG_RESOURCE: &str = "TagResource";
pub const UNTAG_RESOURCE: &str = "UntagResource";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("repository not found: {0}")]
    RepositoryNotFound(String),

    #[error("repository policy not found: {0}")]
    RepositoryPolicyNotFound(String),

    #[error("lifecycle policy not found: {0}")]
    LifecyclePolicyNotFound(String),

    #[error("{code}: {message}")]
    Service { code: String, message: String },

    #[error("transport error: {0}")]
    Transport(String),
}

impl ApiError {
    pub fn is_repository_not_found(&self) -> bool {
        matches!(self, Self::RepositoryNotFound(_))
    }

    pub fn is_repository_policy_not_found(&self) -> bool {
        matches!(self, Self::RepositoryPolicyNotFound(_))
    }

    pub fn is_lifecycle_policy_not_found(&self) -> bool {
        matches!(self, Self::LifecyclePolicyNotFound(_))
    }

    /// Service error code as the remote reports it.
    pub fn code(&self) -> &str {
        match self {
            Self::RepositoryNotFound(_) => "RepositoryNotFoundException",
            Self::RepositoryPolicyNotFound(_) => "RepositoryPolicyNotFoundException",
            Self::LifecyclePolicyNotFound(_) => "LifecyclePolicyNotFoundException",
            Self::Service { code, .. } => code,
            Self::Transport(_) => "TransportError",
        }
    }
}

/// Addresses one repository in one registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRef {
    pub registry_id: Option<String>,
    pub repository_name: String,
}

impl RepositoryRef {
    pub fn of(repo: &Repository) -> Self {
        Self {
            registry_id: repo.registry_id().map(String::from),
            repository_name: repo.name().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescribeRepositoriesRequest {
    pub registry_id: Option<String>,
    pub repository_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRepositoryRequest {
    pub repository_name: String,
    pub registry_id: Option<String>,
    pub image_tag_mutability: Option<ImageTagMutability>,
    pub image_scanning_configuration: Option<ImageScanningConfiguration>,
    pub encryption_configuration: Option<EncryptionConfiguration>,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRepositoryRequest {
    pub repository: RepositoryRef,
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutImageScanningConfigurationRequest {
    pub repository: RepositoryRef,
    pub scan_on_push: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutImageTagMutabilityRequest {
    pub repository: RepositoryRef,
    pub image_tag_mutability: ImageTagMutability,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutLifecyclePolicyRequest {
    pub repository: RepositoryRef,
    pub lifecycle_policy_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetRepositoryPolicyRequest {
    pub repository: RepositoryRef,
    pub policy_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagResourceRequest {
    pub resource_arn: String,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UntagResourceRequest {
    pub resource_arn: String,
    pub tag_keys: Vec<String>,
}

/// One repository as the remote describes it. Every field is optional
/// because the remote may omit any of them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteRepository {
    pub repository_name: Option<String>,
    pub registry_id: Option<String>,
    pub repository_arn: Option<String>,
    pub repository_uri: Option<String>,
    pub created_at: Option<jiff::Timestamp>,
    pub image_tag_mutability: Option<ImageTagMutability>,
    pub image_scanning_configuration: Option<ImageScanningConfiguration>,
    pub encryption_configuration: Option<EncryptionConfiguration>,
}

/// The remote registry service.
///
/// Methods return boxed futures for dyn compatibility.
pub trait RepositoryApi: Send + Sync {
    /// List repositories matching the filter. May return several candidates.
    fn describe_repositories(
        &self,
        req: DescribeRepositoriesRequest,
    ) -> BoxFuture<'_, Result<Vec<RemoteRepository>, ApiError>>;

    fn create_repository(
        &self,
        req: CreateRepositoryRequest,
    ) -> BoxFuture<'_, Result<RemoteRepository, ApiError>>;

    fn delete_repository(&self, req: DeleteRepositoryRequest) -> BoxFuture<'_, Result<(), ApiError>>;

    fn put_image_scanning_configuration(
        &self,
        req: PutImageScanningConfigurationRequest,
    ) -> BoxFuture<'_, Result<(), ApiError>>;

    fn put_image_tag_mutability(
        &self,
        req: PutImageTagMutabilityRequest,
    ) -> BoxFuture<'_, Result<(), ApiError>>;

    /// Lifecycle policy text. `LifecyclePolicyNotFound` when none is set.
    fn get_lifecycle_policy(&self, repository: RepositoryRef)
    -> BoxFuture<'_, Result<String, ApiError>>;

    fn put_lifecycle_policy(
        &self,
        req: PutLifecyclePolicyRequest,
    ) -> BoxFuture<'_, Result<(), ApiError>>;

    fn delete_lifecycle_policy(&self, repository: RepositoryRef)
    -> BoxFuture<'_, Result<(), ApiError>>;

    /// Access policy text. `RepositoryPolicyNotFound` when none is set.
    fn get_repository_policy(&self, repository: RepositoryRef)
    -> BoxFuture<'_, Result<String, ApiError>>;

    fn set_repository_policy(
        &self,
        req: SetRepositoryPolicyRequest,
    ) -> BoxFuture<'_, Result<(), ApiError>>;

    fn delete_repository_policy(
        &self,
        repository: RepositoryRef,
    ) -> BoxFuture<'_, Result<(), ApiError>>;

    fn list_tags_for_resource(&self, resource_arn: String)
    -> BoxFuture<'_, Result<Vec<Tag>, ApiError>>;

    fn tag_resource(&self, req: TagResourceRequest) -> BoxFuture<'_, Result<(), ApiError>>;

    fn untag_resource(&self, req: UntagResourceRequest) -> BoxFuture<'_, Result<(), ApiError>>;
}

//! In-memory registry used by the integration tests.
//!
//! Records every call, applies mutations to its own state so that a second
//! pass observes the first pass's effects, and can be told to fail a given
//! operation.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use ecrsync_core::{
    EncryptionConfiguration, ImageScanningConfiguration, ImageTagMutability, Repository, Tag,
};
use ecrsync_provisioner::api::{
    self, ApiError, BoxFuture, CreateRepositoryRequest, DeleteRepositoryRequest,
    DescribeRepositoriesRequest, PutImageScanningConfigurationRequest,
    PutImageTagMutabilityRequest, PutLifecyclePolicyRequest, RemoteRepository, RepositoryApi,
    RepositoryRef, SetRepositoryPolicyRequest, TagResourceRequest, UntagResourceRequest,
};
use ecrsync_provisioner::ReconcilerConfig;
use tokio_util::sync::CancellationToken;

pub const ACCOUNT: &str = "123456789012";
pub const REGION: &str = "us-west-2";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

pub fn config() -> ReconcilerConfig {
    ReconcilerConfig::new(ACCOUNT, REGION)
}

pub fn arn_for(name: &str) -> String {
    format!("arn:aws:ecr:{REGION}:{ACCOUNT}:repository/{name}")
}

/// Desired snapshot with every optional attribute unset.
pub fn desired(name: &str) -> Repository {
    Repository::new(name)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Describe(DescribeRepositoriesRequest),
    Create(CreateRepositoryRequest),
    Delete(DeleteRepositoryRequest),
    PutScanning(PutImageScanningConfigurationRequest),
    PutMutability(PutImageTagMutabilityRequest),
    GetLifecyclePolicy(RepositoryRef),
    PutLifecyclePolicy(PutLifecyclePolicyRequest),
    DeleteLifecyclePolicy(RepositoryRef),
    GetPolicy(RepositoryRef),
    SetPolicy(SetRepositoryPolicyRequest),
    DeletePolicy(RepositoryRef),
    ListTags(String),
    Tag(TagResourceRequest),
    Untag(UntagResourceRequest),
}

impl Call {
    pub fn op(&self) -> &'static str {
        match self {
            Self::Describe(_) => api::DESCRIBE_REPOSITORIES,
            Self::Create(_) => api::CREATE_REPOSITORY,
            Self::Delete(_) => api::DELETE_REPOSITORY,
            Self::PutScanning(_) => api::PUT_IMAGE_SCANNING_CONFIGURATION,
            Self::PutMutability(_) => api::PUT_IMAGE_TAG_MUTABILITY,
            Self::GetLifecyclePolicy(_) => api::GET_LIFECYCLE_POLICY,
            Self::PutLifecyclePolicy(_) => api::PUT_LIFECYCLE_POLICY,
            Self::DeleteLifecyclePolicy(_) => api::DELETE_LIFECYCLE_POLICY,
            Self::GetPolicy(_) => api::GET_REPOSITORY_POLICY,
            Self::SetPolicy(_) => api::SET_REPOSITORY_POLICY,
            Self::DeletePolicy(_) => api::DELETE_REPOSITORY_POLICY,
            Self::ListTags(_) => api::LIST_TAGS_FOR_RESOURCE,
            Self::Tag(_) => api::TAG_RESOURCE,
            Self::Untag(_) => api::UNTAG_RESOURCE,
        }
    }

    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            Self::Describe(_) | Self::GetLifecyclePolicy(_) | Self::GetPolicy(_) | Self::ListTags(_)
        )
    }
}

/// Remote-side state of one repository.
#[derive(Debug, Clone)]
pub struct StoredRepository {
    pub name: String,
    pub scan_on_push: bool,
    pub mutability: ImageTagMutability,
    pub encryption: EncryptionConfiguration,
    pub policy: Option<String>,
    pub lifecycle_policy: Option<String>,
    pub tags: Vec<Tag>,
}

impl StoredRepository {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            scan_on_push: false,
            mutability: ImageTagMutability::Mutable,
            encryption: EncryptionConfiguration {
                encryption_type: Some("AES256".into()),
                kms_key: None,
            },
            policy: None,
            lifecycle_policy: None,
            tags: Vec::new(),
        }
    }

    fn describe(&self) -> RemoteRepository {
        RemoteRepository {
            repository_name: Some(self.name.clone()),
            registry_id: Some(ACCOUNT.to_string()),
            repository_arn: Some(arn_for(&self.name)),
            repository_uri: Some(format!(
                "{ACCOUNT}.dkr.ecr.{REGION}.amazonaws.com/{}",
                self.name
            )),
            created_at: jiff::Timestamp::from_second(1_700_000_000).ok(),
            image_tag_mutability: Some(self.mutability),
            image_scanning_configuration: Some(ImageScanningConfiguration::scan_on_push(
                self.scan_on_push,
            )),
            encryption_configuration: Some(self.encryption.clone()),
        }
    }
}

#[derive(Default)]
struct Inner {
    repos: Vec<StoredRepository>,
    /// Returned ahead of the real matches by every describe call.
    strays: Vec<RemoteRepository>,
    calls: Vec<Call>,
    failures: HashMap<&'static str, ApiError>,
    /// Cancelled right after the named call succeeds.
    cancel_after: Option<(&'static str, CancellationToken)>,
}

#[derive(Default)]
pub struct FakeRegistry {
    inner: Mutex<Inner>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repository(repo: StoredRepository) -> Self {
        let fake = Self::new();
        fake.inner.lock().unwrap().repos.push(repo);
        fake
    }

    pub fn add_stray(&self, remote: RemoteRepository) {
        self.inner.lock().unwrap().strays.push(remote);
    }

    /// Make every call to `op` fail with `err` until [`FakeRegistry::heal`].
    pub fn fail(&self, op: &'static str, err: ApiError) {
        self.inner.lock().unwrap().failures.insert(op, err);
    }

    /// Cancel `token` once a call to `op` has been applied.
    pub fn cancel_after(&self, op: &'static str, token: CancellationToken) {
        self.inner.lock().unwrap().cancel_after = Some((op, token));
    }

    pub fn heal(&self) {
        self.inner.lock().unwrap().failures.clear();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn ops(&self) -> Vec<&'static str> {
        self.calls().iter().map(Call::op).collect()
    }

    pub fn mutations(&self) -> Vec<&'static str> {
        self.calls()
            .iter()
            .filter(|c| c.is_mutation())
            .map(Call::op)
            .collect()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().unwrap().calls.clear();
    }

    pub fn stored(&self, name: &str) -> Option<StoredRepository> {
        self.inner
            .lock()
            .unwrap()
            .repos
            .iter()
            .find(|r| r.name == name)
            .cloned()
    }

    pub fn remove(&self, name: &str) {
        self.inner.lock().unwrap().repos.retain(|r| r.name != name);
    }

    /// Record the call, then either fail it or run `apply` on the state.
    fn handle<T>(
        &self,
        call: Call,
        apply: impl FnOnce(&mut Inner) -> Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        let op = call.op();
        inner.calls.push(call);
        if let Some(err) = inner.failures.get(op) {
            return Err(err.clone());
        }
        let result = apply(&mut *inner);
        if let Some((_, token)) = inner.cancel_after.as_ref().filter(|(o, _)| *o == op) {
            if result.is_ok() {
                token.cancel();
            }
        }
        result
    }

    fn with_repo<T>(
        &self,
        call: Call,
        name: &str,
        apply: impl FnOnce(&mut StoredRepository) -> Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        let name = name.to_string();
        self.handle(call, move |inner| {
            let repo = inner
                .repos
                .iter_mut()
                .find(|r| r.name == name)
                .ok_or_else(|| ApiError::RepositoryNotFound(name.clone()))?;
            apply(repo)
        })
    }

    fn with_arn<T>(
        &self,
        call: Call,
        arn: &str,
        apply: impl FnOnce(&mut StoredRepository) -> Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        let arn = arn.to_string();
        self.handle(call, move |inner| {
            let repo = inner
                .repos
                .iter_mut()
                .find(|r| arn_for(&r.name) == arn)
                .ok_or_else(|| ApiError::Service {
                    code: "InvalidParameterException".into(),
                    message: format!("no repository with arn {arn}"),
                })?;
            apply(repo)
        })
    }
}

impl RepositoryApi for FakeRegistry {
    fn describe_repositories(
        &self,
        req: DescribeRepositoriesRequest,
    ) -> BoxFuture<'_, Result<Vec<RemoteRepository>, ApiError>> {
        let names = req.repository_names.clone();
        let result = self.handle(Call::Describe(req), move |inner| {
            let mut found: Vec<RemoteRepository> = inner.strays.clone();
            let matches: Vec<RemoteRepository> = inner
                .repos
                .iter()
                .filter(|r| names.is_empty() || names.contains(&r.name))
                .map(StoredRepository::describe)
                .collect();
            if !names.is_empty() && matches.is_empty() && found.is_empty() {
                return Err(ApiError::RepositoryNotFound(names.join(",")));
            }
            found.extend(matches);
            Ok(found)
        });
        Box::pin(async move { result })
    }

    fn create_repository(
        &self,
        req: CreateRepositoryRequest,
    ) -> BoxFuture<'_, Result<RemoteRepository, ApiError>> {
        let result = self.handle(Call::Create(req.clone()), move |inner| {
            if inner.repos.iter().any(|r| r.name == req.repository_name) {
                return Err(ApiError::Service {
                    code: "RepositoryAlreadyExistsException".into(),
                    message: req.repository_name.clone(),
                });
            }
            let mut repo = StoredRepository::new(&req.repository_name);
            repo.mutability = req.image_tag_mutability.unwrap_or_default();
            repo.scan_on_push = req
                .image_scanning_configuration
                .and_then(|c| c.scan_on_push)
                .unwrap_or(false);
            if let Some(encryption) = req.encryption_configuration {
                repo.encryption = encryption;
            }
            repo.tags = req.tags;
            let remote = repo.describe();
            inner.repos.push(repo);
            Ok(remote)
        });
        Box::pin(async move { result })
    }

    fn delete_repository(&self, req: DeleteRepositoryRequest) -> BoxFuture<'_, Result<(), ApiError>> {
        let name = req.repository.repository_name.clone();
        let result = self.handle(Call::Delete(req), move |inner| {
            let before = inner.repos.len();
            inner.repos.retain(|r| r.name != name);
            if inner.repos.len() == before {
                return Err(ApiError::RepositoryNotFound(name));
            }
            Ok(())
        });
        Box::pin(async move { result })
    }

    fn put_image_scanning_configuration(
        &self,
        req: PutImageScanningConfigurationRequest,
    ) -> BoxFuture<'_, Result<(), ApiError>> {
        let name = req.repository.repository_name.clone();
        let scan_on_push = req.scan_on_push;
        let result = self.with_repo(Call::PutScanning(req), &name, move |repo| {
            repo.scan_on_push = scan_on_push;
            Ok(())
        });
        Box::pin(async move { result })
    }

    fn put_image_tag_mutability(
        &self,
        req: PutImageTagMutabilityRequest,
    ) -> BoxFuture<'_, Result<(), ApiError>> {
        let name = req.repository.repository_name.clone();
        let mutability = req.image_tag_mutability;
        let result = self.with_repo(Call::PutMutability(req), &name, move |repo| {
            repo.mutability = mutability;
            Ok(())
        });
        Box::pin(async move { result })
    }

    fn get_lifecycle_policy(
        &self,
        repository: RepositoryRef,
    ) -> BoxFuture<'_, Result<String, ApiError>> {
        let name = repository.repository_name.clone();
        let result = self.with_repo(Call::GetLifecyclePolicy(repository), &name, |repo| {
            repo.lifecycle_policy
                .clone()
                .ok_or_else(|| ApiError::LifecyclePolicyNotFound(repo.name.clone()))
        });
        Box::pin(async move { result })
    }

    fn put_lifecycle_policy(
        &self,
        req: PutLifecyclePolicyRequest,
    ) -> BoxFuture<'_, Result<(), ApiError>> {
        let name = req.repository.repository_name.clone();
        let text = req.lifecycle_policy_text.clone();
        let result = self.with_repo(Call::PutLifecyclePolicy(req), &name, move |repo| {
            repo.lifecycle_policy = Some(text);
            Ok(())
        });
        Box::pin(async move { result })
    }

    fn delete_lifecycle_policy(
        &self,
        repository: RepositoryRef,
    ) -> BoxFuture<'_, Result<(), ApiError>> {
        let name = repository.repository_name.clone();
        let result = self.with_repo(Call::DeleteLifecyclePolicy(repository), &name, |repo| {
            repo.lifecycle_policy
                .take()
                .map(|_| ())
                .ok_or_else(|| ApiError::LifecyclePolicyNotFound(repo.name.clone()))
        });
        Box::pin(async move { result })
    }

    fn get_repository_policy(
        &self,
        repository: RepositoryRef,
    ) -> BoxFuture<'_, Result<String, ApiError>> {
        let name = repository.repository_name.clone();
        let result = self.with_repo(Call::GetPolicy(repository), &name, |repo| {
            repo.policy
                .clone()
                .ok_or_else(|| ApiError::RepositoryPolicyNotFound(repo.name.clone()))
        });
        Box::pin(async move { result })
    }

    fn set_repository_policy(
        &self,
        req: SetRepositoryPolicyRequest,
    ) -> BoxFuture<'_, Result<(), ApiError>> {
        let name = req.repository.repository_name.clone();
        let text = req.policy_text.clone();
        let result = self.with_repo(Call::SetPolicy(req), &name, move |repo| {
            repo.policy = Some(text);
            Ok(())
        });
        Box::pin(async move { result })
    }

    fn delete_repository_policy(
        &self,
        repository: RepositoryRef,
    ) -> BoxFuture<'_, Result<(), ApiError>> {
        let name = repository.repository_name.clone();
        let result = self.with_repo(Call::DeletePolicy(repository), &name, |repo| {
            repo.policy
                .take()
                .map(|_| ())
                .ok_or_else(|| ApiError::RepositoryPolicyNotFound(repo.name.clone()))
        });
        Box::pin(async move { result })
    }

    fn list_tags_for_resource(
        &self,
        resource_arn: String,
    ) -> BoxFuture<'_, Result<Vec<Tag>, ApiError>> {
        let arn = resource_arn.clone();
        let result = self.with_arn(Call::ListTags(resource_arn), &arn, |repo| Ok(repo.tags.clone()));
        Box::pin(async move { result })
    }

    fn tag_resource(&self, req: TagResourceRequest) -> BoxFuture<'_, Result<(), ApiError>> {
        let arn = req.resource_arn.clone();
        let tags = req.tags.clone();
        let result = self.with_arn(Call::Tag(req), &arn, move |repo| {
            for tag in tags {
                match repo.tags.iter_mut().find(|t| t.key == tag.key) {
                    Some(existing) => existing.value = tag.value,
                    None => repo.tags.push(tag),
                }
            }
            Ok(())
        });
        Box::pin(async move { result })
    }

    fn untag_resource(&self, req: UntagResourceRequest) -> BoxFuture<'_, Result<(), ApiError>> {
        let arn = req.resource_arn.clone();
        let keys = req.tag_keys.clone();
        let result = self.with_arn(Call::Untag(req), &arn, move |repo| {
            repo.tags.retain(|t| !keys.contains(&t.key));
            Ok(())
        });
        Box::pin(async move { result })
    }
}

/// Snapshot of a stored repository as a previous pass would have persisted it.
pub fn observed(stored: &StoredRepository) -> Repository {
    let remote = stored.describe();
    let mut repo = Repository::new(&stored.name);
    repo.spec.image_tag_mutability = Some(stored.mutability);
    repo.spec.image_scanning_configuration =
        Some(ImageScanningConfiguration::scan_on_push(stored.scan_on_push));
    repo.spec.encryption_configuration = Some(stored.encryption.clone());
    repo.spec.policy = stored.policy.clone();
    repo.spec.lifecycle_policy = stored.lifecycle_policy.clone();
    repo.spec.tags = stored.tags.clone();
    repo.status.arn = remote.repository_arn;
    repo.status.registry_id = remote.registry_id;
    repo.status.repository_uri = remote.repository_uri;
    repo.status.created_at = remote.created_at;
    repo.status.owner_account_id = Some(ACCOUNT.to_string());
    repo.status.region = Some(REGION.to_string());
    repo
}

//! [`RepositoryApi`] backed by the AWS ECR SDK.

use aws_sdk_ecr::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_ecr::Client;
use ecrsync_core::{
    EncryptionConfiguration, ImageScanningConfiguration, ImageTagMutability, Tag,
};

use crate::api::{
    ApiError, BoxFuture, CreateRepositoryRequest, DeleteRepositoryRequest,
    DescribeRepositoriesRequest, PutImageScanningConfigurationRequest,
    PutImageTagMutabilityRequest, PutLifecyclePolicyRequest, RemoteRepository, RepositoryApi,
    RepositoryRef, SetRepositoryPolicyRequest, TagResourceRequest, UntagResourceRequest,
};
use crate::error::format_err_chain;

pub struct EcrApi {
    client: Client,
}

impl EcrApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the default credential chain.
    pub async fn from_env(region: &str) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .load()
            .await;
        Self::new(Client::new(&config))
    }
}

/// Classify an SDK failure that has no dedicated not-found meaning.
fn api_error<E, R>(err: &SdkError<E, R>) -> ApiError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match err.as_service_error() {
        Some(se) => ApiError::Service {
            code: se.code().unwrap_or("Unknown").to_string(),
            message: se.message().unwrap_or_default().to_string(),
        },
        None => ApiError::Transport(format_err_chain(err)),
    }
}

fn remote_from_sdk(repo: &aws_sdk_ecr::types::Repository) -> RemoteRepository {
    RemoteRepository {
        repository_name: repo.repository_name().map(String::from),
        registry_id: repo.registry_id().map(String::from),
        repository_arn: repo.repository_arn().map(String::from),
        repository_uri: repo.repository_uri().map(String::from),
        created_at: repo
            .created_at()
            .and_then(|t| jiff::Timestamp::new(t.secs(), t.subsec_nanos() as i32).ok()),
        image_tag_mutability: repo
            .image_tag_mutability()
            .and_then(|m| m.as_str().parse::<ImageTagMutability>().ok()),
        image_scanning_configuration: repo
            .image_scanning_configuration()
            .map(|c| ImageScanningConfiguration::scan_on_push(c.scan_on_push())),
        encryption_configuration: repo.encryption_configuration().map(|e| {
            EncryptionConfiguration {
                encryption_type: Some(e.encryption_type().as_str().to_string()),
                kms_key: e.kms_key().map(String::from),
            }
        }),
    }
}

fn sdk_mutability(m: ImageTagMutability) -> aws_sdk_ecr::types::ImageTagMutability {
    aws_sdk_ecr::types::ImageTagMutability::from(m.as_str())
}

fn sdk_tags(tags: &[Tag]) -> Result<Vec<aws_sdk_ecr::types::Tag>, ApiError> {
    tags.iter()
        .map(|t| {
            aws_sdk_ecr::types::Tag::builder()
                .key(&t.key)
                .value(t.value.clone().unwrap_or_default())
                .build()
                .map_err(|e| ApiError::Transport(format_err_chain(&e)))
        })
        .collect()
}

impl RepositoryApi for EcrApi {
    fn describe_repositories(
        &self,
        req: DescribeRepositoriesRequest,
    ) -> BoxFuture<'_, Result<Vec<RemoteRepository>, ApiError>> {
        Box::pin(async move {
            let name = req.repository_names.join(",");
            let resp = self
                .client
                .describe_repositories()
                .set_registry_id(req.registry_id)
                .set_repository_names(
                    (!req.repository_names.is_empty()).then_some(req.repository_names),
                )
                .send()
                .await
                .map_err(|e| {
                    let not_found = e
                        .as_service_error()
                        .is_some_and(|se| se.is_repository_not_found_exception());
                    if not_found {
                        ApiError::RepositoryNotFound(name)
                    } else {
                        api_error(&e)
                    }
                })?;
            Ok(resp.repositories().iter().map(remote_from_sdk).collect())
        })
    }

    fn create_repository(
        &self,
        req: CreateRepositoryRequest,
    ) -> BoxFuture<'_, Result<RemoteRepository, ApiError>> {
        Box::pin(async move {
            let encryption = match req.encryption_configuration {
                Some(cfg) => Some(
                    aws_sdk_ecr::types::EncryptionConfiguration::builder()
                        .encryption_type(aws_sdk_ecr::types::EncryptionType::from(
                            cfg.encryption_type.as_deref().unwrap_or("AES256"),
                        ))
                        .set_kms_key(cfg.kms_key)
                        .build()
                        .map_err(|e| ApiError::Transport(format_err_chain(&e)))?,
                ),
                None => None,
            };
            let scanning = req.image_scanning_configuration.map(|c| {
                aws_sdk_ecr::types::ImageScanningConfiguration::builder()
                    .set_scan_on_push(c.scan_on_push)
                    .build()
            });
            let tags = sdk_tags(&req.tags)?;

            let resp = self
                .client
                .create_repository()
                .repository_name(&req.repository_name)
                .set_registry_id(req.registry_id)
                .set_image_tag_mutability(req.image_tag_mutability.map(sdk_mutability))
                .set_image_scanning_configuration(scanning)
                .set_encryption_configuration(encryption)
                .set_tags((!tags.is_empty()).then_some(tags))
                .send()
                .await
                .map_err(|e| api_error(&e))?;

            Ok(resp
                .repository()
                .map(remote_from_sdk)
                .unwrap_or_default())
        })
    }

    fn delete_repository(&self, req: DeleteRepositoryRequest) -> BoxFuture<'_, Result<(), ApiError>> {
        Box::pin(async move {
            let name = req.repository.repository_name.clone();
            self.client
                .delete_repository()
                .repository_name(&req.repository.repository_name)
                .set_registry_id(req.repository.registry_id)
                .force(req.force)
                .send()
                .await
                .map_err(|e| {
                    let not_found = e
                        .as_service_error()
                        .is_some_and(|se| se.is_repository_not_found_exception());
                    if not_found {
                        ApiError::RepositoryNotFound(name)
                    } else {
                        api_error(&e)
                    }
                })?;
            Ok(())
        })
    }

    fn put_image_scanning_configuration(
        &self,
        req: PutImageScanningConfigurationRequest,
    ) -> BoxFuture<'_, Result<(), ApiError>> {
        Box::pin(async move {
            self.client
                .put_image_scanning_configuration()
                .repository_name(&req.repository.repository_name)
                .set_registry_id(req.repository.registry_id)
                .image_scanning_configuration(
                    aws_sdk_ecr::types::ImageScanningConfiguration::builder()
                        .scan_on_push(req.scan_on_push)
                        .build(),
                )
                .send()
                .await
                .map_err(|e| api_error(&e))?;
            Ok(())
        })
    }

    fn put_image_tag_mutability(
        &self,
        req: PutImageTagMutabilityRequest,
    ) -> BoxFuture<'_, Result<(), ApiError>> {
        Box::pin(async move {
            self.client
                .put_image_tag_mutability()
                .repository_name(&req.repository.repository_name)
                .set_registry_id(req.repository.registry_id)
                .image_tag_mutability(sdk_mutability(req.image_tag_mutability))
                .send()
                .await
                .map_err(|e| api_error(&e))?;
            Ok(())
        })
    }

    fn get_lifecycle_policy(
        &self,
        repository: RepositoryRef,
    ) -> BoxFuture<'_, Result<String, ApiError>> {
        Box::pin(async move {
            let name = repository.repository_name.clone();
            let resp = self
                .client
                .get_lifecycle_policy()
                .repository_name(&repository.repository_name)
                .set_registry_id(repository.registry_id)
                .send()
                .await
                .map_err(|e| {
                    let not_found = e
                        .as_service_error()
                        .is_some_and(|se| se.is_lifecycle_policy_not_found_exception());
                    if not_found {
                        ApiError::LifecyclePolicyNotFound(name)
                    } else {
                        api_error(&e)
                    }
                })?;
            Ok(resp.lifecycle_policy_text().unwrap_or_default().to_string())
        })
    }

    fn put_lifecycle_policy(
        &self,
        req: PutLifecyclePolicyRequest,
    ) -> BoxFuture<'_, Result<(), ApiError>> {
        Box::pin(async move {
            self.client
                .put_lifecycle_policy()
                .repository_name(&req.repository.repository_name)
                .set_registry_id(req.repository.registry_id)
                .lifecycle_policy_text(req.lifecycle_policy_text)
                .send()
                .await
                .map_err(|e| api_error(&e))?;
            Ok(())
        })
    }

    fn delete_lifecycle_policy(
        &self,
        repository: RepositoryRef,
    ) -> BoxFuture<'_, Result<(), ApiError>> {
        Box::pin(async move {
            let name = repository.repository_name.clone();
            self.client
                .delete_lifecycle_policy()
                .repository_name(&repository.repository_name)
                .set_registry_id(repository.registry_id)
                .send()
                .await
                .map_err(|e| {
                    let not_found = e
                        .as_service_error()
                        .is_some_and(|se| se.is_lifecycle_policy_not_found_exception());
                    if not_found {
                        ApiError::LifecyclePolicyNotFound(name)
                    } else {
                        api_error(&e)
                    }
                })?;
            Ok(())
        })
    }

    fn get_repository_policy(
        &self,
        repository: RepositoryRef,
    ) -> BoxFuture<'_, Result<String, ApiError>> {
        Box::pin(async move {
            let name = repository.repository_name.clone();
            let resp = self
                .client
                .get_repository_policy()
                .repository_name(&repository.repository_name)
                .set_registry_id(repository.registry_id)
                .send()
                .await
                .map_err(|e| {
                    let not_found = e
                        .as_service_error()
                        .is_some_and(|se| se.is_repository_policy_not_found_exception());
                    if not_found {
                        ApiError::RepositoryPolicyNotFound(name)
                    } else {
                        api_error(&e)
                    }
                })?;
            Ok(resp.policy_text().unwrap_or_default().to_string())
        })
    }

    fn set_repository_policy(
        &self,
        req: SetRepositoryPolicyRequest,
    ) -> BoxFuture<'_, Result<(), ApiError>> {
        Box::pin(async move {
            self.client
                .set_repository_policy()
                .repository_name(&req.repository.repository_name)
                .set_registry_id(req.repository.registry_id)
                .policy_text(req.policy_text)
                .send()
                .await
                .map_err(|e| api_error(&e))?;
            Ok(())
        })
    }

    fn delete_repository_policy(
        &self,
        repository: RepositoryRef,
    ) -> BoxFuture<'_, Result<(), ApiError>> {
        Box::pin(async move {
            let name = repository.repository_name.clone();
            self.client
                .delete_repository_policy()
                .repository_name(&repository.repository_name)
                .set_registry_id(repository.registry_id)
                .send()
                .await
                .map_err(|e| {
                    let not_found = e
                        .as_service_error()
                        .is_some_and(|se| se.is_repository_policy_not_found_exception());
                    if not_found {
                        ApiError::RepositoryPolicyNotFound(name)
                    } else {
                        api_error(&e)
                    }
                })?;
            Ok(())
        })
    }

    fn list_tags_for_resource(
        &self,
        resource_arn: String,
    ) -> BoxFuture<'_, Result<Vec<Tag>, ApiError>> {
        Box::pin(async move {
            let resp = self
                .client
                .list_tags_for_resource()
                .resource_arn(resource_arn)
                .send()
                .await
                .map_err(|e| api_error(&e))?;
            Ok(resp
                .tags()
                .iter()
                .map(|t| Tag::new(t.key(), t.value()))
                .collect())
        })
    }

    fn tag_resource(&self, req: TagResourceRequest) -> BoxFuture<'_, Result<(), ApiError>> {
        Box::pin(async move {
            let tags = sdk_tags(&req.tags)?;
            self.client
                .tag_resource()
                .resource_arn(req.resource_arn)
                .set_tags(Some(tags))
                .send()
                .await
                .map_err(|e| api_error(&e))?;
            Ok(())
        })
    }

    fn untag_resource(&self, req: UntagResourceRequest) -> BoxFuture<'_, Result<(), ApiError>> {
        Box::pin(async move {
            self.client
                .untag_resource()
                .resource_arn(req.resource_arn)
                .set_tag_keys(Some(req.tag_keys))
                .send()
                .await
                .map_err(|e| api_error(&e))?;
            Ok(())
        })
    }
}

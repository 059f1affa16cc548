//! S3-compatible storage (AWS S3, Cloudflare R2, MinIO, ...)

use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::types::ObjectCannedAcl;

use super::{ObjectStore, PutObject, StorageError, build_http_client};
use crate::config::{AddressingStyle, StorageConfig};

/// Storage backed by an S3-compatible bucket
pub struct S3Storage {
    client: S3Client,
    bucket: String,
}

impl S3Storage {
    /// Build the client once at startup
    ///
    /// No network traffic happens here; use [`ObjectStore::probe`] to verify
    /// connectivity.
    pub fn new(config: &StorageConfig) -> Self {
        use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};

        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "bytego-static",
        );

        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .http_client(build_http_client())
            .region(Region::new(config.region.clone()))
            .endpoint_url(&config.endpoint)
            .credentials_provider(credentials)
            .force_path_style(config.addressing_style == AddressingStyle::Path)
            .build();

        Self {
            client: S3Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

fn storage_error<E>(err: SdkError<E>) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let message = DisplayErrorContext(&err).to_string();
    let code = match &err {
        SdkError::ServiceError(service) => service.err().code().unwrap_or("ServiceError"),
        SdkError::TimeoutError(_) => "Timeout",
        SdkError::DispatchFailure(_) => "DispatchFailure",
        SdkError::ResponseError(_) => "ResponseError",
        SdkError::ConstructionFailure(_) => "ConstructionFailure",
        _ => "Unknown",
    };
    StorageError::new(code, message)
}

#[async_trait]
impl ObjectStore for S3Storage {
    async fn put_object(&self, object: PutObject) -> Result<(), StorageError> {
        use aws_sdk_s3::primitives::ByteStream;

        let content_length = i64::try_from(object.content_length)
            .map_err(|_| StorageError::new("InvalidLength", "object too large"))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&object.key)
            .body(ByteStream::from(object.body))
            .content_length(content_length)
            .content_type(&object.content_type)
            .set_acl(object.acl.as_deref().map(ObjectCannedAcl::from))
            .send()
            .await
            .map_err(storage_error)?;

        Ok(())
    }

    async fn probe(&self) -> Result<(), StorageError> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(storage_error)?;
        Ok(())
    }
}

//! Upload service
//!
//! Runs one upload end to end: authenticate the caller, read the file,
//! name it, store it and build its public URL.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::auth::{AuthDecision, AuthGate};
use crate::error::{AppError, ValidationError};
use crate::metrics::{UPLOAD_BYTES_TOTAL, UPLOAD_DURATION_SECONDS, UPLOADS_TOTAL};
use crate::naming::KeyGenerator;
use crate::storage::{DEFAULT_CONTENT_TYPE, ObjectStore, PutObject};

/// File received from the client
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Filename as sent by the client
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Where the uploaded file comes from
///
/// The file is only read once the caller has been authenticated, so an
/// unauthenticated client never gets its body consumed.
#[async_trait]
pub trait FileSource: Send {
    /// Read the `file` part, `None` if the request has none
    async fn read_file(self) -> Result<Option<UploadedFile>, AppError>;
}

#[async_trait]
impl FileSource for Option<UploadedFile> {
    async fn read_file(self) -> Result<Option<UploadedFile>, AppError> {
        Ok(self)
    }
}

/// Successful upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    pub key: String,
    pub size: u64,
    pub content_type: String,
    pub url: String,
}

/// Upload orchestration
pub struct UploadService {
    auth: Arc<AuthGate>,
    keys: Arc<KeyGenerator>,
    storage: Arc<dyn ObjectStore>,
    /// Public URL base without trailing slash
    public_base: String,
    acl: Option<String>,
}

impl UploadService {
    pub fn new(
        auth: Arc<AuthGate>,
        keys: Arc<KeyGenerator>,
        storage: Arc<dyn ObjectStore>,
        public_base: &str,
        acl: Option<String>,
    ) -> Self {
        Self {
            auth,
            keys,
            storage,
            public_base: public_base.trim_end_matches('/').to_string(),
            acl: acl.filter(|value| !value.trim().is_empty()),
        }
    }

    /// Public URL for an object key
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base, key)
    }

    /// Authenticate `ip` with the presented secret
    pub async fn authorize(&self, ip: &str, secret: Option<&str>) -> Result<(), AppError> {
        let secret = secret.ok_or(AppError::MissingAuthHeader)?;
        if !self.auth.is_configured() {
            return Err(AppError::SecretNotConfigured);
        }

        match self.auth.check(ip, Some(secret)).await? {
            AuthDecision::Allowed => Ok(()),
            AuthDecision::Denied { .. } => Err(AppError::InvalidKey),
            AuthDecision::Banned { remaining_minutes } => {
                Err(AppError::Banned { remaining_minutes })
            }
        }
    }

    /// Handle one upload request
    ///
    /// # Errors
    /// Authentication, validation and storage failures; see [`AppError`].
    pub async fn handle_upload<F>(
        &self,
        ip: &str,
        secret: Option<&str>,
        source: F,
    ) -> Result<StoredUpload, AppError>
    where
        F: FileSource,
    {
        let started = std::time::Instant::now();
        let result = self.run(ip, secret, source).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(err) => err.kind(),
        };
        UPLOADS_TOTAL.with_label_values(&[outcome]).inc();
        UPLOAD_DURATION_SECONDS
            .with_label_values(&[outcome])
            .observe(started.elapsed().as_secs_f64());

        result
    }

    async fn run<F>(&self, ip: &str, secret: Option<&str>, source: F) -> Result<StoredUpload, AppError>
    where
        F: FileSource,
    {
        self.authorize(ip, secret).await?;

        let file = source.read_file().await?.ok_or(ValidationError::NoFile)?;
        if file.filename.trim().is_empty() {
            return Err(ValidationError::EmptyFilename.into());
        }

        let key = self.keys.generate(&file.filename, &file.data);
        let size = file.data.len() as u64;
        let content_type = file
            .content_type
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        self.storage
            .put_object(PutObject {
                key: key.clone(),
                body: file.data,
                content_length: size,
                content_type: content_type.clone(),
                acl: self.acl.clone(),
            })
            .await?;

        UPLOAD_BYTES_TOTAL.inc_by(size as f64);
        let url = self.public_url(&key);
        tracing::info!(key = %key, size, ip = %ip, "Upload success");

        Ok(StoredUpload {
            key,
            size,
            content_type,
            url,
        })
    }
}

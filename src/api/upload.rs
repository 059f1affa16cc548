//! Upload endpoint

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::multipart::{MultipartError, MultipartRejection},
    extract::{DefaultBodyLimit, Multipart, Request, State},
    http::{StatusCode, header::CONTENT_LENGTH},
    middleware::{self, Next},
    response::Response,
    routing::post,
};
use bytes::BytesMut;
use serde::Serialize;

use crate::AppState;
use crate::auth::{ClientIp, SharedSecret};
use crate::error::{AppError, ValidationError};
use crate::service::{FileSource, UploadedFile};

/// Multipart field carrying the file
pub const FILE_FIELD: &str = "file";

/// Successful upload response
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub msg: &'static str,
    pub url: String,
}

/// Multipart request body, read lazily
pub struct MultipartFile {
    multipart: Option<Multipart>,
    max_bytes: u64,
}

impl MultipartFile {
    pub fn new(multipart: Result<Multipart, MultipartRejection>, max_bytes: u64) -> Self {
        let multipart = match multipart {
            Ok(multipart) => Some(multipart),
            Err(rejection) => {
                tracing::debug!(error = %rejection, "Request body is not multipart");
                None
            }
        };
        Self {
            multipart,
            max_bytes,
        }
    }
}

fn multipart_error(err: MultipartError, max_bytes: u64) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge { max_bytes }
    } else {
        ValidationError::Malformed(err.body_text()).into()
    }
}

#[async_trait]
impl FileSource for MultipartFile {
    async fn read_file(self) -> Result<Option<UploadedFile>, AppError> {
        let max_bytes = self.max_bytes;
        let Some(mut multipart) = self.multipart else {
            return Ok(None);
        };

        while let Some(mut field) = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error(e, max_bytes))?
        {
            if field.name() != Some(FILE_FIELD) {
                continue;
            }

            let filename = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().map(ToOwned::to_owned);

            let mut data = BytesMut::new();
            while let Some(chunk) = field
                .chunk()
                .await
                .map_err(|e| multipart_error(e, max_bytes))?
            {
                if (data.len() + chunk.len()) as u64 > max_bytes {
                    return Err(AppError::PayloadTooLarge { max_bytes });
                }
                data.extend_from_slice(&chunk);
            }

            return Ok(Some(UploadedFile {
                filename,
                content_type,
                data: data.freeze(),
            }));
        }

        Ok(None)
    }
}

/// POST /upload
pub async fn upload(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    SharedSecret(secret): SharedSecret,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let source = MultipartFile::new(multipart, state.config.upload.max_size_bytes());
    let stored = state
        .uploads
        .handle_upload(&ip, secret.as_deref(), source)
        .await?;

    Ok(Json(UploadResponse {
        msg: "success",
        url: stored.url,
    }))
}

/// Refuse bodies whose declared length is over the limit before reading them
async fn reject_oversized(
    State(max_bytes): State<u64>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let declared = request
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok());

    if declared.is_some_and(|length| length > max_bytes) {
        return Err(AppError::PayloadTooLarge { max_bytes });
    }

    Ok(next.run(request).await)
}

/// Create upload router
///
/// Exposes `POST /upload` with the body limit taken from `upload.max_size_mb`.
pub fn upload_router(max_bytes: u64) -> Router<AppState> {
    let body_limit = usize::try_from(max_bytes).unwrap_or(usize::MAX);

    Router::new().route(
        "/upload",
        post(upload)
            .layer(DefaultBodyLimit::max(body_limit))
            .layer(middleware::from_fn_with_state(max_bytes, reject_oversized)),
    )
}

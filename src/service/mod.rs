//! Service layer
//!
//! Business logic independent of the HTTP framework.

mod upload;

pub use upload::{FileSource, StoredUpload, UploadService, UploadedFile};

//! Upload pipeline: validation, raw storage, extraction, summarization with retries, persistence.

mod retry;
mod service;
pub mod types;

pub use service::{UploadApi, UploadService};
pub use types::{DEFAULT_RETRIES, UploadError, UploadOutcome, UploadRequest};

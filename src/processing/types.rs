//! Request, outcome and error types for the upload pipeline.

use crate::{extraction::ExtractionError, repository::Document, repository::RepositoryError};
use thiserror::Error;

/// Longest filename the `documents.filename` column accepts.
pub const MAX_FILENAME_CHARS: usize = 255;

/// Retry budget applied when the client does not send one.
pub const DEFAULT_RETRIES: i64 = 1;

/// One multipart upload, as handed over by the HTTP layer.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Client-declared filename; its suffix selects the extractor.
    pub filename: String,
    /// Raw file bytes.
    pub data: Vec<u8>,
    /// Length preset name; empty means `medium`.
    pub length: String,
    /// Additional summarization attempts after the first; negatives count as zero.
    pub retries: i64,
}

/// Result of a successful upload.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    /// Persisted document, summary included when one was produced.
    pub document: Document,
    /// Explanation when the summary is missing.
    pub message: Option<String>,
    /// Summarization attempts made.
    pub attempts: u64,
}

/// Errors that abort an upload before a document is persisted.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Request was malformed or empty.
    #[error("{0}")]
    Validation(String),
    /// Uploaded bytes could not be turned into text.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    /// Raw bytes could not be written to the upload store.
    #[error("Failed to store upload: {0}")]
    StorageWrite(#[source] std::io::Error),
    /// Repository rejected the insert or read.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    /// Unexpected runtime failure, such as a panicked worker.
    #[error("{0}")]
    Internal(String),
}

//! Upload service coordinating storage, extraction, summarization and persistence.

use crate::{
    config::Config,
    extraction::{DocumentExtractor, TextExtractor},
    metrics::{MetricsSnapshot, UploadMetrics},
    processing::{
        retry::{Attempts, retry_immediately},
        types::{MAX_FILENAME_CHARS, UploadError, UploadOutcome, UploadRequest},
    },
    repository::{Document, DocumentRepository, NewDocument, RepositoryError, SqlDocumentRepository},
    storage::{DiskUploadStore, UploadStore},
    summarization::{LengthPreset, SummarizationClient, Summarizer},
};
use async_trait::async_trait;
use std::sync::Arc;

/// Runs the upload pipeline: validate, store, extract, summarize with retries, persist.
///
/// All collaborators are shared handles, so one service instance serves every request.
/// A document is written exactly once, after summarization has either succeeded or exhausted
/// its retry budget; earlier failures leave the repository untouched.
pub struct UploadService {
    store: Arc<dyn UploadStore>,
    extractor: Arc<dyn TextExtractor>,
    summarizer: Arc<dyn Summarizer>,
    repository: Arc<dyn DocumentRepository>,
    metrics: Arc<UploadMetrics>,
}

/// Abstraction over the upload pipeline used by the HTTP surface.
#[async_trait]
pub trait UploadApi: Send + Sync {
    /// Process one upload end to end.
    async fn upload(&self, request: UploadRequest) -> Result<UploadOutcome, UploadError>;

    /// Fetch a stored document.
    async fn document(&self, id: i64) -> Result<Option<Document>, UploadError>;

    /// Most recent documents first.
    async fn documents(&self, limit: u32) -> Result<Vec<Document>, UploadError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl UploadService {
    /// Assemble a service from explicit collaborators.
    pub fn new(
        store: Arc<dyn UploadStore>,
        extractor: Arc<dyn TextExtractor>,
        summarizer: Arc<dyn Summarizer>,
        repository: Arc<dyn DocumentRepository>,
    ) -> Self {
        Self {
            store,
            extractor,
            summarizer,
            repository,
            metrics: Arc::new(UploadMetrics::new()),
        }
    }

    /// Connect the configured database, create the schema and wire the default collaborators.
    ///
    /// The summarization model is not contacted here; it loads on the first upload.
    pub async fn from_config(config: &Config) -> Result<Self, RepositoryError> {
        tracing::info!(database = %config.database.describe(), "Connecting document repository");
        let repository =
            SqlDocumentRepository::connect(&config.database, config.db_max_connections).await?;
        repository.ensure_schema().await?;

        Ok(Self::new(
            Arc::new(DiskUploadStore::new(config.upload_dir.clone())),
            Arc::new(DocumentExtractor::new()),
            Arc::new(SummarizationClient::from_config(config)),
            Arc::new(repository),
        ))
    }

    async fn extract(&self, data: Vec<u8>, filename: &str) -> Result<String, UploadError> {
        let extractor = Arc::clone(&self.extractor);
        let name = filename.to_string();
        let text = tokio::task::spawn_blocking(move || extractor.extract(&data, &name))
            .await
            .map_err(|error| UploadError::Internal(format!("extraction task failed: {error}")))?;

        text.map_err(|error| {
            tracing::warn!(filename, %error, "Text extraction failed");
            UploadError::Extraction(error)
        })
    }
}

fn validate(request: &UploadRequest) -> Result<(String, LengthPreset), UploadError> {
    let filename = request.filename.trim();
    if filename.is_empty() {
        return Err(UploadError::Validation("Filename is required".into()));
    }
    if filename.chars().count() > MAX_FILENAME_CHARS {
        return Err(UploadError::Validation(format!(
            "Filename exceeds {MAX_FILENAME_CHARS} characters"
        )));
    }

    let preset = if request.length.trim().is_empty() {
        LengthPreset::default()
    } else {
        request
            .length
            .parse()
            .map_err(|error: crate::summarization::SummarizationError| {
                UploadError::Validation(error.to_string())
            })?
    };

    if request.data.is_empty() {
        return Err(UploadError::Validation("Uploaded file is empty".into()));
    }

    Ok((filename.to_string(), preset))
}

#[async_trait]
impl UploadApi for UploadService {
    async fn upload(&self, request: UploadRequest) -> Result<UploadOutcome, UploadError> {
        let (filename, preset) = validate(&request)?;
        let UploadRequest { data, retries, .. } = request;
        tracing::info!(%filename, %preset, retries, bytes = data.len(), "Upload received");

        let stored_at = self.store.save(&filename, &data).await.map_err(|error| {
            tracing::error!(%filename, %error, "Failed to store upload");
            UploadError::StorageWrite(error)
        })?;
        tracing::debug!(%filename, path = %stored_at.display(), "Upload stored");

        let content = self.extract(data, &filename).await?;
        tracing::debug!(%filename, chars = content.len(), "Text extracted");

        let summarizer = self.summarizer.as_ref();
        let text = content.as_str();
        let Attempts { result, attempts } =
            retry_immediately(retries, || summarizer.summarize(text, preset)).await;

        let (summary, message) = match result {
            Ok(summary) => (Some(summary), None),
            Err(error) => {
                tracing::warn!(%filename, attempts, %error, "Summarization failed; storing without summary");
                (
                    None,
                    Some(format!("Summarization failed after {attempts} attempts: {error}")),
                )
            }
        };

        let document = self
            .repository
            .create(NewDocument {
                filename: filename.clone(),
                content,
                summary,
            })
            .await
            .map_err(|error| {
                tracing::error!(%filename, %error, "Failed to persist document");
                UploadError::Repository(error)
            })?;

        self.metrics
            .record_document(attempts, document.summary.is_some());
        tracing::info!(
            id = document.id,
            %filename,
            attempts,
            summarized = document.summary.is_some(),
            "Document stored"
        );

        Ok(UploadOutcome {
            document,
            message,
            attempts,
        })
    }

    async fn document(&self, id: i64) -> Result<Option<Document>, UploadError> {
        Ok(self.repository.get(id).await?)
    }

    async fn documents(&self, limit: u32) -> Result<Vec<Document>, UploadError> {
        Ok(self.repository.list(limit).await?)
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

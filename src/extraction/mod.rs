//! Plain-text extraction for uploaded documents.
//!
//! Dispatch is driven by the declared filename suffix (`.pdf`, `.docx`, `.txt`, case-insensitive).
//! Every path trims the final text and reports an empty result as [`ExtractionError::EmptyContent`],
//! which callers treat differently from a parser failure.

mod docx;
mod pdf;
mod text;

pub use pdf::{ContentStreamScan, PageTextStrategy, PdfStrategy, StrategyError};

use std::fmt;
use thiserror::Error;

/// Document formats accepted by the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Portable Document Format.
    Pdf,
    /// Office Open XML word-processing document.
    Docx,
    /// Plain text, UTF-8 or ISO-8859-1.
    Text,
}

impl FileKind {
    /// Detect the format from a filename suffix, ignoring case.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let lower = filename.to_lowercase();
        if lower.ends_with(".pdf") {
            Some(Self::Pdf)
        } else if lower.ends_with(".docx") {
            Some(Self::Docx)
        } else if lower.ends_with(".txt") {
            Some(Self::Text)
        } else {
            None
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pdf => write!(f, "PDF"),
            Self::Docx => write!(f, "DOCX"),
            Self::Text => write!(f, "Text"),
        }
    }
}

/// Errors raised while turning uploaded bytes into text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Filename suffix is not one of the supported formats.
    #[error("Unsupported file type '{filename}'; supported: .pdf, .docx, .txt")]
    UnsupportedType {
        /// Declared filename of the rejected upload.
        filename: String,
    },
    /// The format parser rejected the payload.
    #[error("{kind} extraction failed: {reason}")]
    ExtractionFailed {
        /// Format that was being parsed.
        kind: FileKind,
        /// Diagnostic message from the underlying parser.
        reason: String,
    },
    /// Parsing succeeded but produced no text once trimmed.
    #[error("No extractable text found in the uploaded file")]
    EmptyContent,
}

impl ExtractionError {
    pub(crate) fn failed(kind: FileKind, reason: impl fmt::Display) -> Self {
        Self::ExtractionFailed {
            kind,
            reason: reason.to_string(),
        }
    }
}

/// Seam used by the upload pipeline to turn bytes into text.
pub trait TextExtractor: Send + Sync {
    /// Extract trimmed, non-empty text from `data` using `filename` to pick the format.
    fn extract(&self, data: &[u8], filename: &str) -> Result<String, ExtractionError>;
}

/// Default extractor: lopdf-backed PDF strategies, zip/XML for DOCX, UTF-8 with Latin-1 fallback
/// for text.
pub struct DocumentExtractor {
    pdf_strategies: Vec<Box<dyn PdfStrategy>>,
}

impl DocumentExtractor {
    /// Build an extractor with the standard PDF strategy order.
    pub fn new() -> Self {
        Self::with_pdf_strategies(vec![
            Box::new(PageTextStrategy),
            Box::new(ContentStreamScan),
        ])
    }

    /// Build an extractor trying the given PDF strategies in order.
    pub fn with_pdf_strategies(pdf_strategies: Vec<Box<dyn PdfStrategy>>) -> Self {
        Self { pdf_strategies }
    }
}

impl Default for DocumentExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl TextExtractor for DocumentExtractor {
    fn extract(&self, data: &[u8], filename: &str) -> Result<String, ExtractionError> {
        let kind =
            FileKind::from_filename(filename).ok_or_else(|| ExtractionError::UnsupportedType {
                filename: filename.to_string(),
            })?;
        tracing::debug!(%kind, bytes = data.len(), filename, "Extracting text");

        let text = match kind {
            FileKind::Pdf => pdf::extract(data, &self.pdf_strategies)?,
            FileKind::Docx => docx::extract(data)?,
            FileKind::Text => text::decode(data),
        };

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ExtractionError::EmptyContent);
        }
        Ok(trimmed.to_string())
    }
}

/// Extract text with the default [`DocumentExtractor`].
pub fn extract_text(data: &[u8], filename: &str) -> Result<String, ExtractionError> {
    DocumentExtractor::new().extract(data, filename)
}

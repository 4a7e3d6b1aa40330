//! PDF extraction strategies.
//!
//! Strategies run in order; the first one producing non-blank text wins. Both shipped strategies
//! parse the file with lopdf but read text differently: [`PageTextStrategy`] uses lopdf's
//! font-aware page text extraction, [`ContentStreamScan`] walks raw content-stream operators and
//! copes with fonts lopdf cannot decode.

use super::{ExtractionError, FileKind, text::latin1};
use lopdf::{Document, Object, ObjectId, content::Content};
use thiserror::Error;

/// Failure reported by a single PDF strategy.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct StrategyError(pub String);

impl From<lopdf::Error> for StrategyError {
    fn from(error: lopdf::Error) -> Self {
        Self(error.to_string())
    }
}

/// One way of pulling text out of PDF bytes.
pub trait PdfStrategy: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Return the document text, pages joined with newlines.
    fn extract(&self, data: &[u8]) -> Result<String, StrategyError>;
}

/// Per-page text extraction through lopdf's document model.
pub struct PageTextStrategy;

impl PdfStrategy for PageTextStrategy {
    fn name(&self) -> &'static str {
        "page-text"
    }

    fn extract(&self, data: &[u8]) -> Result<String, StrategyError> {
        let document = Document::load_mem(data)?;
        let pages: Vec<String> = document
            .get_pages()
            .keys()
            .map(|&number| match document.extract_text(&[number]) {
                Ok(text) => text.trim_end().to_string(),
                Err(error) => {
                    tracing::warn!(page = number, %error, "Failed to extract page text; skipping");
                    String::new()
                }
            })
            .collect();
        Ok(pages.join("\n"))
    }
}

/// Scan of text-showing operators (`Tj`, `TJ`, `'`, `"`) in each page's content stream.
pub struct ContentStreamScan;

impl PdfStrategy for ContentStreamScan {
    fn name(&self) -> &'static str {
        "content-stream"
    }

    fn extract(&self, data: &[u8]) -> Result<String, StrategyError> {
        let document = Document::load_mem(data)?;
        let pages: Vec<String> = document
            .get_pages()
            .into_iter()
            .map(|(number, page_id)| match scan_page(&document, page_id) {
                Ok(text) => text,
                Err(error) => {
                    tracing::warn!(page = number, %error, "Failed to scan page content; skipping");
                    String::new()
                }
            })
            .collect();
        Ok(pages.join("\n"))
    }
}

pub(super) fn extract(
    data: &[u8],
    strategies: &[Box<dyn PdfStrategy>],
) -> Result<String, ExtractionError> {
    let mut last_error: Option<StrategyError> = None;
    let mut produced_blank = false;

    for strategy in strategies {
        match strategy.extract(data) {
            Ok(text) if !text.trim().is_empty() => {
                tracing::debug!(strategy = strategy.name(), chars = text.len(), "PDF text extracted");
                return Ok(text);
            }
            Ok(_) => {
                tracing::debug!(strategy = strategy.name(), "PDF strategy produced no text");
                produced_blank = true;
            }
            Err(error) => {
                tracing::debug!(strategy = strategy.name(), %error, "PDF strategy failed");
                last_error = Some(error);
            }
        }
    }

    if produced_blank {
        return Err(ExtractionError::EmptyContent);
    }
    let reason = last_error
        .map(|error| error.to_string())
        .unwrap_or_else(|| "no extraction strategy configured".to_string());
    Err(ExtractionError::failed(FileKind::Pdf, reason))
}

fn scan_page(document: &Document, page_id: ObjectId) -> Result<String, StrategyError> {
    let raw = document.get_page_content(page_id)?;
    let content = Content::decode(&raw)?;
    let mut text = String::new();

    for operation in &content.operations {
        match operation.operator.as_str() {
            "Tj" => push_strings(&mut text, &operation.operands),
            "'" | "\"" => {
                text.push('\n');
                push_strings(&mut text, &operation.operands);
            }
            "TJ" => {
                for operand in &operation.operands {
                    if let Object::Array(items) = operand {
                        for item in items {
                            match item {
                                Object::String(bytes, _) => text.push_str(&decode_pdf_string(bytes)),
                                // Large negative kerning is how many producers encode a word gap.
                                Object::Integer(offset) if *offset < -200 => text.push(' '),
                                Object::Real(offset) if *offset < -200.0 => text.push(' '),
                                _ => {}
                            }
                        }
                    }
                }
            }
            "Td" | "TD" => {
                if !text.ends_with(char::is_whitespace) && !text.is_empty() {
                    text.push(' ');
                }
            }
            "T*" | "ET" => text.push('\n'),
            _ => {}
        }
    }

    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n"))
}

fn push_strings(text: &mut String, operands: &[Object]) {
    for operand in operands {
        if let Object::String(bytes, _) = operand {
            text.push_str(&decode_pdf_string(bytes));
        }
    }
}

fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
        return char::decode_utf16(units)
            .map(|unit| unit.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect();
    }
    latin1(bytes)
}

use super::{ExtractionError, FileKind};
use quick_xml::{events::Event, reader::Reader};
use std::io::{Cursor, Read};

const DOCUMENT_PART: &str = "word/document.xml";

/// Extract paragraph text from a DOCX archive, one line per `w:p`, in document order.
pub(super) fn extract(data: &[u8]) -> Result<String, ExtractionError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))
        .map_err(|error| ExtractionError::failed(FileKind::Docx, format!("invalid archive: {error}")))?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .map_err(|error| {
            ExtractionError::failed(FileKind::Docx, format!("missing {DOCUMENT_PART}: {error}"))
        })?
        .read_to_string(&mut xml)
        .map_err(|error| ExtractionError::failed(FileKind::Docx, error))?;

    let paragraphs = paragraphs(&xml)?;
    tracing::debug!(paragraphs = paragraphs.len(), "DOCX paragraphs parsed");
    Ok(paragraphs.join("\n"))
}

fn paragraphs(xml: &str) -> Result<Vec<String>, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;
    // Depth inside text boxes and compatibility fallbacks; their paragraphs are not body text.
    let mut skipped = 0usize;

    loop {
        let event = reader.read_event().map_err(|error| {
            ExtractionError::failed(
                FileKind::Docx,
                format!("malformed XML at byte {}: {error}", reader.buffer_position()),
            )
        })?;
        match event {
            Event::Start(element) if is_skipped(element.name().as_ref()) => skipped += 1,
            Event::End(element) if is_skipped(element.name().as_ref()) => {
                skipped = skipped.saturating_sub(1)
            }
            Event::Eof => break,
            _ if skipped > 0 => {}
            Event::Start(element) => match element.name().as_ref() {
                b"w:p" => current = Some(String::new()),
                b"w:t" => in_text = true,
                _ => {}
            },
            Event::Empty(element) => match element.name().as_ref() {
                b"w:p" => paragraphs.push(String::new()),
                b"w:tab" => push(&mut current, "\t"),
                b"w:br" | b"w:cr" => push(&mut current, "\n"),
                _ => {}
            },
            Event::End(element) => match element.name().as_ref() {
                b"w:p" => paragraphs.extend(current.take()),
                b"w:t" => in_text = false,
                _ => {}
            },
            Event::Text(text) if in_text => {
                let value = text
                    .unescape()
                    .map_err(|error| ExtractionError::failed(FileKind::Docx, error))?;
                push(&mut current, &value);
            }
            _ => {}
        }
    }

    Ok(paragraphs)
}

fn is_skipped(name: &[u8]) -> bool {
    matches!(name, b"w:txbxContent" | b"mc:Fallback")
}

fn push(current: &mut Option<String>, value: &str) {
    if let Some(paragraph) = current.as_mut() {
        paragraph.push_str(value);
    }
}

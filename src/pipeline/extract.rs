//! Text extraction: PDF or DOCX bytes → plain text.
//!
//! ## Why spawn_blocking?
//!
//! Both decoders are synchronous and CPU-bound. A 10 MiB PDF can take long
//! enough to stall a Tokio worker, so decoding runs on the blocking pool.
//! It also contains decoder panics: `pdf-extract` is known to panic on some
//! malformed inputs, and a panic inside `spawn_blocking` surfaces as a
//! `JoinError` that we report as [`FlashcardError::ExtractionFailed`] instead
//! of tearing down the caller.
//!
//! ## DOCX
//!
//! A `.docx` file is a zip container; the body lives in `word/document.xml`.
//! We walk that XML and keep only the text runs (`<w:t>`), turning
//! `<w:tab/>` into a tab, `<w:br/>` into a newline and each paragraph
//! (`<w:p>`) into one line. All styling is dropped.

use crate::document::{DocumentFormat, ExtractedText, UploadedDocument};
use crate::error::FlashcardError;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};
use tracing::debug;

/// Zip entry holding the main body of a DOCX document.
const DOCX_BODY_PART: &str = "word/document.xml";

/// Extract plain text from an uploaded document.
///
/// The media type is checked first; unsupported types fail with
/// [`FlashcardError::UnsupportedFormat`] without touching the bytes. Decode
/// failures are fatal and not retried. The document content is never logged.
pub async fn extract(document: UploadedDocument) -> Result<ExtractedText, FlashcardError> {
    let format = document.format()?;
    let bytes = document.bytes;
    debug!("Extracting {} document ({} bytes)", format, bytes.len());

    let text = tokio::task::spawn_blocking(move || extract_blocking(format, &bytes))
        .await
        .map_err(|e| FlashcardError::ExtractionFailed {
            format: format.label(),
            detail: format!("decoder aborted: {}", e),
        })??;

    debug!("Extracted {} characters of {} text", text.chars().count(), format);
    Ok(ExtractedText { text, format })
}

/// Blocking implementation of text extraction.
pub fn extract_blocking(format: DocumentFormat, bytes: &[u8]) -> Result<String, FlashcardError> {
    match format {
        DocumentFormat::Pdf => extract_pdf(bytes),
        DocumentFormat::Docx => extract_docx(bytes),
    }
}

/// Concatenate the text of every page in document order, whitespace as
/// emitted by the decoder.
fn extract_pdf(bytes: &[u8]) -> Result<String, FlashcardError> {
    if !bytes.starts_with(b"%PDF") {
        let magic: Vec<u8> = bytes.iter().take(4).copied().collect();
        return Err(FlashcardError::ExtractionFailed {
            format: DocumentFormat::Pdf.label(),
            detail: format!("missing %PDF header (first bytes: {:?})", magic),
        });
    }

    pdf_extract::extract_text_from_mem(bytes).map_err(|e| FlashcardError::ExtractionFailed {
        format: DocumentFormat::Pdf.label(),
        detail: e.to_string(),
    })
}

fn extract_docx(bytes: &[u8]) -> Result<String, FlashcardError> {
    let fail = |detail: String| FlashcardError::ExtractionFailed {
        format: DocumentFormat::Docx.label(),
        detail,
    };

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| fail(format!("not a zip container: {}", e)))?;

    let mut xml = String::new();
    archive
        .by_name(DOCX_BODY_PART)
        .map_err(|e| fail(format!("missing {}: {}", DOCX_BODY_PART, e)))?
        .read_to_string(&mut xml)
        .map_err(|e| fail(format!("unreadable {}: {}", DOCX_BODY_PART, e)))?;

    docx_body_text(&xml).map_err(fail)
}

/// Walk `word/document.xml` and collect paragraph text, one line per `<w:p>`.
fn docx_body_text(xml: &str) -> Result<String, String> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    // <w:tab/> inside <w:pPr><w:tabs> is a tab-stop definition, not content.
    let mut in_props = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"pPr" => in_props = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" if !in_props => current.push('\t'),
                b"br" | b"cr" => current.push('\n'),
                b"p" => paragraphs.push(String::new()),
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"pPr" => in_props = false,
                b"p" => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let text = t.unescape().map_err(|e| {
                    format!("bad text at byte {}: {}", reader.buffer_position(), e)
                })?;
                current.push_str(&text);
            }
            Ok(Event::CData(c)) if in_text => {
                current.push_str(&String::from_utf8_lossy(&c));
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "invalid XML at byte {}: {}",
                    reader.buffer_position(),
                    e
                ))
            }
            _ => {}
        }
    }

    // Text outside any paragraph (malformed but seen in the wild).
    if !current.is_empty() {
        paragraphs.push(current);
    }

    Ok(paragraphs.join("\n"))
}

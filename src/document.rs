//! Uploaded documents and the formats the extractor accepts.
//!
//! An [`UploadedDocument`] lives only for the duration of one extraction call.
//! Its media type is checked against exactly two values; anything else is
//! rejected before a single byte is decoded.

use crate::error::FlashcardError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Media type of PDF documents.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// Media type of OOXML word-processing documents (`.docx`).
pub const DOCX_MEDIA_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Default upload cap: 10 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// A document format the extractor can decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
}

impl DocumentFormat {
    /// Match a declared media type exactly. Parameters such as `; charset=`
    /// are not stripped here; the boundary layer does that.
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        match media_type {
            PDF_MEDIA_TYPE => Some(DocumentFormat::Pdf),
            DOCX_MEDIA_TYPE => Some(DocumentFormat::Docx),
            _ => None,
        }
    }

    /// Guess the format from a file extension (case-insensitive).
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "docx" => Some(DocumentFormat::Docx),
            _ => None,
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => PDF_MEDIA_TYPE,
            DocumentFormat::Docx => DOCX_MEDIA_TYPE,
        }
    }

    /// Short human label, used in error messages.
    pub fn label(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "PDF",
            DocumentFormat::Docx => "DOCX",
        }
    }

    /// Tag given to sets generated from this format.
    pub fn set_tag(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "PDF",
            DocumentFormat::Docx => "Document",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Binary content plus the media type it was declared with.
#[derive(Clone)]
pub struct UploadedDocument {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

impl UploadedDocument {
    pub fn new(bytes: impl Into<Vec<u8>>, media_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            media_type: media_type.into(),
        }
    }

    /// Resolve the declared media type to a supported format.
    pub fn format(&self) -> Result<DocumentFormat, FlashcardError> {
        DocumentFormat::from_media_type(&self.media_type).ok_or_else(|| {
            FlashcardError::UnsupportedFormat {
                media_type: self.media_type.clone(),
            }
        })
    }

    /// Enforce the upload size cap. Called by boundary layers, not the
    /// extractor.
    pub fn check_size(&self, limit: usize) -> Result<(), FlashcardError> {
        if self.bytes.len() > limit {
            return Err(FlashcardError::DocumentTooLarge {
                size: self.bytes.len(),
                limit,
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// Content is never printed.
impl fmt::Debug for UploadedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedDocument")
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .field("media_type", &self.media_type)
            .finish()
    }
}

/// Plain text produced by the extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub format: DocumentFormat,
}

impl ExtractedText {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    /// True when the document contained no visible text.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

//! Input resolution: turn a user-supplied path or URL into an
//! [`UploadedDocument`].
//!
//! Extraction works on bytes in memory, so nothing is written to disk. The
//! media type comes from, in order: an explicit override, the server's
//! `Content-Type` (URLs only, when it names a supported format), then the
//! file extension. The upload size cap is enforced here, before any decoding.

use crate::document::{DocumentFormat, UploadedDocument};
use crate::error::FlashcardError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Media type used when nothing better is known. Always rejected by
/// [`UploadedDocument::format`].
const UNKNOWN_MEDIA_TYPE: &str = "application/octet-stream";

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to an in-memory document.
///
/// # Arguments
/// * `media_type` — explicit media type; skips detection when set
/// * `timeout_secs` — download timeout for URL inputs
/// * `max_bytes` — upload cap; larger inputs fail with
///   [`FlashcardError::DocumentTooLarge`]
pub async fn resolve_input(
    input: &str,
    media_type: Option<&str>,
    timeout_secs: u64,
    max_bytes: usize,
) -> Result<UploadedDocument, FlashcardError> {
    let document = if is_url(input) {
        download_url(input, media_type, timeout_secs, max_bytes).await?
    } else {
        read_local(input, media_type, max_bytes).await?
    };
    document.check_size(max_bytes)?;
    Ok(document)
}

/// Media type implied by a path's extension.
fn media_type_from_path(path: &Path) -> &'static str {
    DocumentFormat::from_path(path)
        .map(|f| f.media_type())
        .unwrap_or(UNKNOWN_MEDIA_TYPE)
}

/// Strip parameters (`; charset=…`) and normalise case.
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

async fn read_local(
    path_str: &str,
    media_type: Option<&str>,
    max_bytes: usize,
) -> Result<UploadedDocument, FlashcardError> {
    let path = PathBuf::from(path_str);

    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|e| FlashcardError::InputNotFound {
            path: path.clone(),
            reason: e.to_string(),
        })?;
    if !metadata.is_file() {
        return Err(FlashcardError::InputNotFound {
            path,
            reason: "not a regular file".into(),
        });
    }
    if metadata.len() > max_bytes as u64 {
        return Err(FlashcardError::DocumentTooLarge {
            size: metadata.len() as usize,
            limit: max_bytes,
        });
    }

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| FlashcardError::InputNotFound {
            path: path.clone(),
            reason: e.to_string(),
        })?;

    let media_type = media_type
        .map(str::to_string)
        .unwrap_or_else(|| media_type_from_path(&path).to_string());

    debug!("Read local document: {} ({} bytes, {})", path.display(), bytes.len(), media_type);
    Ok(UploadedDocument::new(bytes, media_type))
}

async fn download_url(
    url: &str,
    media_type: Option<&str>,
    timeout_secs: u64,
    max_bytes: usize,
) -> Result<UploadedDocument, FlashcardError> {
    info!("Downloading document from: {}", url);

    let download_err = |reason: String| FlashcardError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| download_err(e.to_string()))?;

    let mut response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            download_err(format!("timed out after {}s", timeout_secs))
        } else {
            download_err(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(download_err(format!("HTTP {}", response.status())));
    }

    if let Some(len) = response.content_length() {
        if len > max_bytes as u64 {
            return Err(FlashcardError::DocumentTooLarge {
                size: len as usize,
                limit: max_bytes,
            });
        }
    }

    let header_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(essence);

    let media_type = match media_type {
        Some(explicit) => explicit.to_string(),
        None => detect_remote_media_type(url, header_type.as_deref()),
    };

    // Content-Length may be absent or wrong; the cap is enforced per chunk.
    let capacity = response.content_length().unwrap_or(0).min(max_bytes as u64) as usize;
    let mut bytes = Vec::with_capacity(capacity);
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| download_err(e.to_string()))?
    {
        let received = bytes.len() + chunk.len();
        if received > max_bytes {
            return Err(FlashcardError::DocumentTooLarge {
                size: received,
                limit: max_bytes,
            });
        }
        bytes.extend_from_slice(&chunk);
    }

    info!("Downloaded {} bytes ({})", bytes.len(), media_type);
    Ok(UploadedDocument::new(bytes, media_type))
}

/// Pick the media type for a download: a supported `Content-Type` wins,
/// then the URL's file extension, then whatever the server said.
fn detect_remote_media_type(url: &str, header_type: Option<&str>) -> String {
    if let Some(ct) = header_type {
        if DocumentFormat::from_media_type(ct).is_some() {
            return ct.to_string();
        }
    }

    if let Some(name) = url_filename(url) {
        if let Some(format) = DocumentFormat::from_path(&name) {
            return format.media_type().to_string();
        }
    }

    header_type.unwrap_or(UNKNOWN_MEDIA_TYPE).to_string()
}

/// Last path segment of a URL, if it looks like a filename.
fn url_filename(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    (!last.is_empty() && last.contains('.')).then(|| last.to_string())
}

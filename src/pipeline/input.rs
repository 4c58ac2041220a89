//! Input resolution: turn a user-supplied path or URL into a local document
//! and work out what kind of document it is.
//!
//! pdfium needs a file-system path, so URLs are downloaded into a `TempDir`
//! that lives as long as the [`ResolvedInput`]. The document kind is sniffed
//! from the leading bytes (`%PDF` or a known image signature) rather than
//! trusted from the file name.

use crate::error::DocExtractError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// The two document shapes the extractor accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Image,
}

impl DocumentKind {
    /// Classify a declared MIME type. Only `application/pdf` and `image/*`
    /// are accepted.
    pub fn from_mime(mime: &str) -> Result<Self, DocExtractError> {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if essence == "application/pdf" {
            Ok(DocumentKind::Pdf)
        } else if essence.starts_with("image/") {
            Ok(DocumentKind::Image)
        } else {
            Err(DocExtractError::UnsupportedFileType(mime.to_string()))
        }
    }

    /// Classify a document by its leading bytes.
    pub fn sniff(header: &[u8]) -> Option<Self> {
        if header.starts_with(b"%PDF") {
            Some(DocumentKind::Pdf)
        } else if image::guess_format(header).is_ok() {
            Some(DocumentKind::Image)
        } else {
            None
        }
    }
}

/// A document available on the local file system.
pub enum ResolvedInput {
    /// Input was already a local file.
    Local { path: PathBuf, kind: DocumentKind },
    /// Input was a URL; the `TempDir` keeps the download alive.
    Downloaded {
        path: PathBuf,
        kind: DocumentKind,
        _temp_dir: TempDir,
    },
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local { path, .. } => path,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }

    pub fn kind(&self) -> DocumentKind {
        match self {
            ResolvedInput::Local { kind, .. } => *kind,
            ResolvedInput::Downloaded { kind, .. } => *kind,
        }
    }
}

pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve `input` to a local PDF or image.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, DocExtractError> {
    if input.trim().is_empty() {
        return Err(DocExtractError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(Path::new(input))
    }
}

/// Validate a local file and sniff its kind.
pub fn resolve_local(path: &Path) -> Result<ResolvedInput, DocExtractError> {
    let path = path.to_path_buf();
    if !path.exists() {
        return Err(DocExtractError::FileNotFound { path });
    }

    let mut header = [0u8; 16];
    let read = match std::fs::File::open(&path) {
        Ok(mut f) => f.read(&mut header).unwrap_or(0),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(DocExtractError::PermissionDenied { path });
        }
        Err(_) => return Err(DocExtractError::FileNotFound { path }),
    };

    let kind = DocumentKind::sniff(&header[..read]).ok_or_else(|| {
        DocExtractError::UnsupportedFileType(format!(
            "{} (not a PDF or a recognised image)",
            path.display()
        ))
    })?;

    debug!("Resolved local {:?}: {}", kind, path.display());
    Ok(ResolvedInput::Local { path, kind })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, DocExtractError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| DocExtractError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            DocExtractError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            DocExtractError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(DocExtractError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| DocExtractError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let kind = DocumentKind::sniff(&bytes).ok_or_else(|| {
        DocExtractError::UnsupportedFileType(format!("{} (not a PDF or a recognised image)", url))
    })?;

    let temp_dir = TempDir::new().map_err(|e| DocExtractError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(filename_from_url(url, kind));
    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| DocExtractError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded {} bytes to: {}", bytes.len(), file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        kind,
        _temp_dir: temp_dir,
    })
}

/// Last URL path segment when it looks like a file name, else a generic name.
fn filename_from_url(url: &str, kind: DocumentKind) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut s| s.next_back().map(str::to_string))
        })
        .filter(|last| !last.is_empty() && last.contains('.'))
        .unwrap_or_else(|| match kind {
            DocumentKind::Pdf => "downloaded.pdf".to_string(),
            DocumentKind::Image => "downloaded.img".to_string(),
        })
}

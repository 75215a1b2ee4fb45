//! Input resolution: normalise a user-supplied path or URL to a local file.
//!
//! URL inputs are downloaded into a `TempDir` owned by the returned
//! [`ResolvedInput`]; dropping it deletes the download, whichever way the
//! conversion ends. The [`StreamInfo`] recorded here (extension from the
//! path or URL, MIME type from `Content-Type`) is what the converter checks
//! against the accepted formats.

use crate::error::PdfSightError;
use crate::source::StreamInfo;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// The resolved input: either a local path or a downloaded temp file.
pub enum ResolvedInput {
    /// Input was already a local file.
    Local { path: PathBuf, info: StreamInfo },
    /// Input was a URL; the PDF lives in a temp directory until this is dropped.
    Downloaded {
        path: PathBuf,
        info: StreamInfo,
        _temp_dir: TempDir,
    },
}

impl ResolvedInput {
    /// Path to the document regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local { path, .. } => path,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }

    pub fn stream_info(&self) -> &StreamInfo {
        match self {
            ResolvedInput::Local { info, .. } => info,
            ResolvedInput::Downloaded { info, .. } => info,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local file.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, PdfSightError> {
    if input.trim().is_empty() {
        return Err(PdfSightError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

/// Reject documents that do not start with the `%PDF` magic.
pub fn check_magic(bytes: &[u8], path: &Path) -> Result<(), PdfSightError> {
    if bytes.starts_with(b"%PDF") {
        return Ok(());
    }
    let mut magic = [0u8; 4];
    let n = bytes.len().min(4);
    magic[..n].copy_from_slice(&bytes[..n]);
    Err(PdfSightError::NotAPdf {
        path: path.to_path_buf(),
        magic,
    })
}

fn resolve_local(path_str: &str) -> Result<ResolvedInput, PdfSightError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(PdfSightError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(PdfSightError::PermissionDenied { path });
        }
        Err(_) => return Err(PdfSightError::FileNotFound { path }),
    }

    debug!("Resolved local input: {}", path.display());
    let info = StreamInfo::from_path(&path);
    Ok(ResolvedInput::Local { path, info })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, PdfSightError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| PdfSightError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            PdfSightError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            PdfSightError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(PdfSightError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let mimetype = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let filename = filename_from_url(url);

    let temp_dir = TempDir::new().map_err(|e| PdfSightError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);

    let bytes = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            PdfSightError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            PdfSightError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| PdfSightError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded {} bytes to: {}", bytes.len(), file_path.display());

    let mut info = StreamInfo::from_path(&file_path);
    info.mimetype = mimetype;
    Ok(ResolvedInput::Downloaded {
        path: file_path,
        info,
        _temp_dir: temp_dir,
    })
}

/// Last path segment of the URL if it looks like a file name.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }
    "downloaded".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn test_filename_from_url() {
        assert_eq!(filename_from_url("https://a.org/papers/x.pdf"), "x.pdf");
        assert_eq!(filename_from_url("https://a.org/papers/x.pdf?dl=1"), "x.pdf");
        assert_eq!(filename_from_url("https://a.org/download"), "downloaded");
    }

    #[test]
    fn test_check_magic() {
        let p = Path::new("x.pdf");
        assert!(check_magic(b"%PDF-1.7\n", p).is_ok());
        match check_magic(b"PK", p) {
            Err(PdfSightError::NotAPdf { magic, .. }) => assert_eq!(magic, [b'P', b'K', 0, 0]),
            other => panic!("expected NotAPdf, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let err = resolve_input("/definitely/not/here.pdf", 5).await.err().unwrap();
        assert!(matches!(err, PdfSightError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn empty_input_is_invalid() {
        let err = resolve_input("  ", 5).await.err().unwrap();
        assert!(matches!(err, PdfSightError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn local_file_carries_stream_info() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Report.PDF");
        std::fs::write(&path, b"%PDF-1.4").unwrap();

        let resolved = resolve_input(path.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(resolved.path(), path);
        assert_eq!(resolved.stream_info().extension.as_deref(), Some(".PDF"));
    }
}

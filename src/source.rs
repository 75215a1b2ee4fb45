//! The PDF byte stream shared by every pipeline stage, and the metadata that
//! decides whether a stream is ours to convert at all.
//!
//! Text extraction, image detection and image extraction all read the same
//! stream. [`PdfSource`] makes that safe: every read starts from offset 0 and
//! the cursor is put back where the caller left it before control returns,
//! whether the read succeeded or not.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::warn;

/// MIME type prefixes accepted by [`accepts`].
pub const ACCEPTED_MIME_TYPE_PREFIXES: &[&str] = &["application/pdf", "application/x-pdf"];

/// File extensions accepted by [`accepts`].
pub const ACCEPTED_FILE_EXTENSIONS: &[&str] = &[".pdf"];

/// Hints about where a stream came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamInfo {
    /// e.g. `application/pdf`
    pub mimetype: Option<String>,
    /// Extension including the leading dot, e.g. `.pdf`
    pub extension: Option<String>,
    pub filename: Option<String>,
}

impl StreamInfo {
    /// Derive extension and file name from a path. The MIME type is left unset.
    pub fn from_path(path: &Path) -> Self {
        Self {
            mimetype: None,
            extension: path
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy())),
            filename: path.file_name().map(|n| n.to_string_lossy().into_owned()),
        }
    }

    /// Metadata for a stream known to be a PDF.
    pub fn pdf() -> Self {
        Self {
            mimetype: Some("application/pdf".to_string()),
            extension: Some(".pdf".to_string()),
            filename: None,
        }
    }
}

/// Whether a stream described by `info` is a PDF this converter handles.
///
/// Extension wins over MIME type; both comparisons ignore case.
pub fn accepts(info: &StreamInfo) -> bool {
    let extension = info.extension.as_deref().unwrap_or("").to_lowercase();
    if ACCEPTED_FILE_EXTENSIONS.contains(&extension.as_str()) {
        return true;
    }

    let mimetype = info.mimetype.as_deref().unwrap_or("").to_lowercase();
    ACCEPTED_MIME_TYPE_PREFIXES
        .iter()
        .any(|prefix| mimetype.starts_with(prefix))
}

/// A seekable PDF byte stream.
#[derive(Debug)]
pub struct PdfSource<R> {
    inner: R,
}

impl PdfSource<File> {
    /// Open a file on disk.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        File::open(path).map(Self::new)
    }
}

impl<R: Read + Seek> PdfSource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Read the whole document from offset 0.
    ///
    /// The cursor is restored to its position before the call on every exit
    /// path. A failure to restore is reported only if the read itself
    /// succeeded; otherwise the read error wins.
    pub fn read_all(&mut self) -> io::Result<Vec<u8>> {
        let original = self.inner.stream_position()?;

        let result = self.read_from_start();
        let restored = self.inner.seek(SeekFrom::Start(original));

        match (result, restored) {
            (Ok(bytes), Ok(_)) => Ok(bytes),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(_)) => Err(e),
            (Err(e), Err(seek_err)) => {
                warn!("Could not restore stream cursor after failed read: {}", seek_err);
                Err(e)
            }
        }
    }

    /// Current cursor position.
    pub fn position(&mut self) -> io::Result<u64> {
        self.inner.stream_position()
    }

    /// Give the underlying stream back.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Mutable access for callers that need to reposition the stream.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    fn read_from_start(&mut self) -> io::Result<Vec<u8>> {
        self.inner.seek(SeekFrom::Start(0))?;
        let mut buf = Vec::new();
        self.inner.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn accepts_pdf_extension_any_case() {
        let info = StreamInfo {
            extension: Some(".PDF".into()),
            ..Default::default()
        };
        assert!(accepts(&info));
    }

    #[test]
    fn accepts_mime_prefixes() {
        for mime in ["application/pdf", "application/x-pdf", "Application/PDF; charset=binary"] {
            let info = StreamInfo {
                mimetype: Some(mime.into()),
                ..Default::default()
            };
            assert!(accepts(&info), "{mime} should be accepted");
        }
    }

    #[test]
    fn rejects_other_formats() {
        let info = StreamInfo {
            mimetype: Some("image/png".into()),
            extension: Some(".png".into()),
            filename: Some("scan.png".into()),
        };
        assert!(!accepts(&info));
        assert!(!accepts(&StreamInfo::default()));
    }

    #[test]
    fn stream_info_from_path() {
        let info = StreamInfo::from_path(Path::new("/tmp/report.pdf"));
        assert_eq!(info.extension.as_deref(), Some(".pdf"));
        assert_eq!(info.filename.as_deref(), Some("report.pdf"));
        assert!(accepts(&info));
    }

    #[test]
    fn read_all_restores_cursor() {
        let mut source = PdfSource::new(Cursor::new(b"%PDF-1.7 body".to_vec()));
        source.get_mut().seek(SeekFrom::Start(5)).unwrap();

        let bytes = source.read_all().unwrap();
        assert_eq!(bytes, b"%PDF-1.7 body");
        assert_eq!(source.position().unwrap(), 5);
    }

    #[test]
    fn read_all_from_start_leaves_cursor_at_zero() {
        let mut source = PdfSource::new(Cursor::new(vec![1u8, 2, 3]));
        source.read_all().unwrap();
        source.read_all().unwrap();
        assert_eq!(source.position().unwrap(), 0);
    }

    struct FailingReader {
        pos: u64,
    }

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk went away"))
        }
    }

    impl Seek for FailingReader {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            if let SeekFrom::Start(p) = pos {
                self.pos = p;
            }
            Ok(self.pos)
        }
    }

    #[test]
    fn read_all_restores_cursor_on_error() {
        let mut source = PdfSource::new(FailingReader { pos: 7 });
        assert!(source.read_all().is_err());
        assert_eq!(source.position().unwrap(), 7);
    }
}

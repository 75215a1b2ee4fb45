//! Base text layer.
//!
//! Every conversion starts here, and this is the only stage whose failure
//! ends the conversion. The default [`PdfExtractText`] uses the pure-Rust
//! `pdf-extract` crate; callers with a better extractor plug it in through
//! [`TextExtractor`].

use crate::error::PdfSightError;
use tracing::debug;

/// Produces the plain-text body of a PDF.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, pdf: &[u8]) -> Result<String, PdfSightError>;
}

/// [`TextExtractor`] backed by `pdf-extract`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractText;

impl TextExtractor for PdfExtractText {
    fn extract(&self, pdf: &[u8]) -> Result<String, PdfSightError> {
        // pdf-extract panics on some malformed documents.
        let result = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(pdf));

        match result {
            Ok(Ok(text)) => {
                debug!("Extracted {} chars of text", text.len());
                Ok(text)
            }
            Ok(Err(e)) => Err(PdfSightError::TextExtraction {
                detail: e.to_string(),
            }),
            Err(_) => Err(PdfSightError::TextExtraction {
                detail: "text extractor panicked on a malformed PDF".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_is_a_text_extraction_error() {
        let err = PdfExtractText.extract(b"this is not a pdf").unwrap_err();
        assert!(matches!(err, PdfSightError::TextExtraction { .. }));
    }
}

//! Conversion results.

use serde::{Deserialize, Serialize};

/// One image description, tied to where the image sits in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caption {
    /// 1-based page number.
    pub page: usize,
    /// 1-based image position on the page.
    pub index: usize,
    pub text: String,
}

/// Everything a conversion produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    /// The final Markdown document.
    pub markdown: String,
    /// Captions appended to the base text, in document order.
    pub captions: Vec<Caption>,
    pub stats: ConversionStats,
}

/// What happened during a conversion, and how long it took.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// A captioner was resolved, so image enrichment was attempted.
    pub captioning_requested: bool,
    /// The presence check ran (captioning requested and smart detection on).
    pub detection_ran: bool,
    /// Outcome of the presence check; `None` when it did not run.
    pub images_detected: Option<bool>,
    /// Backend that produced the extracted images.
    pub backend: Option<String>,
    pub images_extracted: usize,
    /// Significant images dropped because they could not be decoded or encoded.
    pub images_skipped: usize,
    pub images_captioned: usize,
    pub images_failed: usize,
    /// Characters in the base text layer.
    pub text_chars: usize,
    pub text_duration_ms: u64,
    pub image_duration_ms: u64,
    pub caption_duration_ms: u64,
    pub total_duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_serialises_to_json() {
        let result = ConversionResult {
            markdown: "# Doc".into(),
            captions: vec![Caption {
                page: 1,
                index: 2,
                text: "A map.".into(),
            }],
            stats: ConversionStats {
                captioning_requested: true,
                images_detected: Some(true),
                backend: Some("lopdf".into()),
                ..Default::default()
            },
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["captions"][0]["index"], 2);
        assert_eq!(json["stats"]["backend"], "lopdf");
        assert_eq!(json["stats"]["images_detected"], true);

        let back: ConversionResult = serde_json::from_value(json).unwrap();
        assert_eq!(back.captions, result.captions);
        assert_eq!(back.stats, result.stats);
    }
}

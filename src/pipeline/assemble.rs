//! Markdown assembly: base text layer plus an "Images in PDF" appendix.

use crate::output::Caption;
use std::fmt::Write as _;

/// Heading that introduces the caption appendix.
pub const IMAGES_HEADING: &str = "## Images in PDF";

/// Append `captions` to `base`.
///
/// With no captions the base text is returned unchanged. Otherwise each
/// caption gets a running `### Image N` heading (numbered over the captions
/// actually present, so gaps left by failed images close up) followed by its
/// page/image coordinates.
pub fn assemble_markdown(base: &str, captions: &[Caption]) -> String {
    if captions.is_empty() {
        return base.to_string();
    }

    let mut out = String::with_capacity(
        base.len() + 32 + captions.iter().map(|c| c.text.len() + 48).sum::<usize>(),
    );
    out.push_str(base);
    out.push_str("\n\n");
    out.push_str(IMAGES_HEADING);
    out.push_str("\n\n");

    for (i, caption) in captions.iter().enumerate() {
        // Writing to a String cannot fail.
        let _ = write!(
            out,
            "### Image {}\n\n**Page {}, Image {}:**\n{}\n\n",
            i + 1,
            caption.page,
            caption.index,
            caption.text
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caption(page: usize, index: usize, text: &str) -> Caption {
        Caption {
            page,
            index,
            text: text.to_string(),
        }
    }

    #[test]
    fn no_captions_returns_base_verbatim() {
        assert_eq!(assemble_markdown("Hello\n", &[]), "Hello\n");
        assert_eq!(assemble_markdown("", &[]), "");
    }

    #[test]
    fn exact_layout() {
        let md = assemble_markdown("Body", &[caption(2, 1, "A chart.")]);
        assert_eq!(
            md,
            "Body\n\n## Images in PDF\n\n### Image 1\n\n**Page 2, Image 1:**\nA chart.\n\n"
        );
    }

    #[test]
    fn numbering_is_running_not_positional() {
        let md = assemble_markdown(
            "T",
            &[caption(1, 1, "first"), caption(3, 2, "third")],
        );
        assert!(md.contains("### Image 1\n\n**Page 1, Image 1:**\nfirst"));
        assert!(md.contains("### Image 2\n\n**Page 3, Image 2:**\nthird"));
        assert!(!md.contains("### Image 3"));
    }
}

//! Captioning prompts.
//!
//! Callers can override the prompt via [`crate::config::ConversionConfig::prompt`];
//! the constants here are used only when no override is provided.

/// Default instruction sent with every image.
pub const DEFAULT_CAPTION_PROMPT: &str = "Write a detailed caption for this image.";

/// A richer alternative for documents where images carry data: text in the
/// image, charts and tables, layout, notable visual elements.
pub const DETAILED_DESCRIPTION_PROMPT: &str = "Describe this image in detail. Include: \
1) all text that appears in the image; \
2) any charts, tables or data and what they show; \
3) the overall layout and design; \
4) any other important visual elements. \
Be accurate, thorough and easy to understand.";

/// Combine a user instruction with the base prompt.
///
/// The user's text comes first so it frames the request; the base prompt
/// still asks for the caption itself. A blank instruction leaves the base
/// prompt unchanged.
pub fn with_instruction(instruction: &str, base: &str) -> String {
    let instruction = instruction.trim();
    if instruction.is_empty() {
        base.to_string()
    } else {
        format!("{}\n\n{}", instruction, base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_is_prepended() {
        assert_eq!(
            with_instruction("Answer in French.", DEFAULT_CAPTION_PROMPT),
            "Answer in French.\n\nWrite a detailed caption for this image."
        );
    }

    #[test]
    fn blank_instruction_is_ignored() {
        assert_eq!(with_instruction("  \n", DEFAULT_CAPTION_PROMPT), DEFAULT_CAPTION_PROMPT);
    }
}

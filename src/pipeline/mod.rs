//! Pipeline stages for PDF-to-Markdown conversion.
//!
//! Each submodule implements exactly one transformation step and is testable
//! on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ text ──▶ detect ──▶ extract ──▶ caption ──▶ assemble
//! (URL/path) (base)  (gate)    (PNG)       (LLM)       (Markdown)
//! ```
//!
//! 1. [`input`]   : canonicalise the user-supplied path or URL to a local file
//! 2. [`text`]    : base text layer; the only stage whose failure is fatal
//! 3. [`detect`]  : cheap "any significant image?" check over the backends
//! 4. [`extract`] : decode every significant image and PNG-[`encode`] it
//! 5. [`caption`] : describe each image, sequentially, tolerating failures;
//!    [`postprocess`] cleans what the model wrote
//! 6. [`assemble`]: append the captions to the base text
//!
//! [`filter`] holds the significance predicate shared by 3 and 4.

pub mod assemble;
pub mod caption;
pub mod detect;
pub mod encode;
pub mod extract;
pub mod filter;
pub mod input;
pub mod postprocess;
pub mod text;

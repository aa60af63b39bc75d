//! Pipeline stages for DOCX-to-Markdown conversion.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. substitute a different extractor) without
//! touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ simplify
//! (bytes)   (DOCX→HTML)  (HTML→Markdown)
//!              │
//!              └──▶ inline (per embedded image: bytes → data URL)
//! ```
//!
//! 1. [`input`]    — read the user-selected file into a byte buffer and
//!    validate the ZIP signature
//! 2. [`extract`]  — decode the WordprocessingML parts into an HTML string,
//!    awaiting [`inline`] once per embedded image in document order
//! 3. [`inline`]   — base64-wrap image bytes as a self-contained data URL
//! 4. [`simplify`] — convert the HTML to Markdown with override rules
//!    (headings render ATX-style; tables become pipe grids padded by blank
//!    lines; pre blocks become fenced literal blocks of their raw text)

pub mod extract;
pub mod inline;
pub mod input;
pub mod simplify;

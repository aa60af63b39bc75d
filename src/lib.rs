//! # docx2md
//!
//! Convert DOCX documents to clean Markdown, entirely in-process.
//!
//! ## Why this crate?
//!
//! Most DOCX converters shell out to LibreOffice or pandoc, or scatter the
//! document's images into a sidecar directory next to the output. This crate
//! does neither: it decodes the WordprocessingML package itself (ZIP +
//! XML), turns it into structural HTML, simplifies that to Markdown, and
//! inlines every embedded image as a `data:` URL. The result is one
//! self-contained string you can store, paste, or serve anywhere plain text
//! goes.
//!
//! ## Pipeline Overview
//!
//! ```text
//! DOCX
//!  │
//!  ├─ 1. Input     read the file, check the ZIP magic
//!  ├─ 2. Extract   ZIP + WordprocessingML → HTML, images → data URLs
//!  ├─ 3. Simplify  HTML → Markdown (tables padded, pre fenced verbatim)
//!  └─ 4. Deliver   store in the session / export document.md / clipboard
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docx2md::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!     let output = convert("report.docx", &config).await?;
//!     println!("{}", output.markdown);
//!     eprintln!(
//!         "{} images inlined in {}ms",
//!         output.stats.inlined_images, output.stats.total_duration_ms
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## What maps to what
//!
//! | DOCX construct | Markdown |
//! |----------------|----------|
//! | Heading styles / outline levels | `#`–`######` ATX headings |
//! | Bullet and numbered lists (incl. nesting) | `*` / `1.` lists |
//! | Tables (incl. merged cells) | GFM pipe tables, blank-line padded |
//! | Code-styled paragraphs | fenced blocks, whitespace-exact |
//! | Embedded images (DrawingML and VML) | `![alt](data:…;base64,…)` |
//! | Bold / italic / strikethrough | `**` / `*` / `~~` |
//! | Superscript / subscript | flattened to plain text |
//! | Hyperlinks and bookmarks | `[text](target)` |
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docx2md` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! docx2md = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod export;
pub mod notify;
pub mod pipeline;
pub mod progress;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, DEFAULT_CODE_BLOCK_STYLES};
pub use convert::{
    convert, convert_bytes, convert_sync, convert_to_file, inspect, ConversionOutput,
    ConversionStats,
};
pub use error::Docx2MdError;
pub use export::{EXPORT_FILE_NAME, EXPORT_MIME};
pub use notify::{Notification, NotificationCenter, NotificationKind};
pub use pipeline::extract::{DocxExtractor, DocxInfo, StructuralExtractor};
pub use pipeline::inline::{DataUrlInliner, ImageInliner, ImageInlinerRef, InlinedImage};
pub use pipeline::simplify::{HtmlMarkdownSimplifier, MarkupSimplifier};
pub use progress::{NoopProgressObserver, ProgressObserver, ProgressSink, SyntheticProgress};
pub use session::{parse_dropped_paths, Session};

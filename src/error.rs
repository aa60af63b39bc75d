//! Error types for the docx2md library.
//!
//! A single error enum covers the whole pipeline because every failure here
//! is recoverable in the same way: report it, keep the application alive, and
//! let the user retry with the same or a different file. There is no partial
//! success to model — a conversion either yields Markdown or it does not.
//!
//! The user-facing variants fall into four groups:
//!
//! * **Precondition** — [`NoFileSelected`](Docx2MdError::NoFileSelected),
//!   [`ConversionInFlight`](Docx2MdError::ConversionInFlight): the request
//!   was refused before the pipeline started. Not a pipeline failure; the
//!   stored result is left untouched.
//! * **Input** — the file is missing, unreadable, or not a DOCX container.
//! * **Pipeline** — extraction, image encoding, or simplification failed.
//!   These clear any previously stored result.
//! * **Export** — the clipboard or output file could not be written. The
//!   stored result survives so the user can retry the export.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the docx2md library.
#[derive(Debug, Error)]
pub enum Docx2MdError {
    // ── Precondition errors ───────────────────────────────────────────────
    /// Conversion was requested with no file selected.
    #[error("No file selected.\nPick a .docx file to convert.")]
    NoFileSelected,

    /// An action was refused because a conversion is still running.
    #[error("A conversion is already in progress.\nWait for it to finish, then try again.")]
    ConversionInFlight,

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("DOCX file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a DOCX (ZIP) container.
    #[error("File is not a valid DOCX: '{path}'\nFirst bytes: {magic:?}\nDOCX files start with the ZIP signature PK\\x03\\x04.")]
    NotADocx { path: PathBuf, magic: [u8; 4] },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// The document could not be decoded into structural markup.
    ///
    /// Covers a corrupt ZIP container, a missing or malformed
    /// `word/document.xml`, and any other WordprocessingML shape the
    /// extractor cannot make sense of.
    #[error("Could not extract document structure: {detail}\nThe file may be corrupt or not a WordprocessingML document.")]
    ExtractionFailed { detail: String },

    /// An embedded image could not be read or encoded as a data URL.
    #[error("Could not encode embedded image: {detail}")]
    EncodingFailed { detail: String },

    /// The structural markup could not be converted to Markdown.
    #[error("Could not simplify document markup: {detail}")]
    SimplificationFailed { detail: String },

    // ── Export errors ─────────────────────────────────────────────────────
    /// Clipboard write was denied or failed.
    #[error("Export failed: {detail}\nThe stored result is intact; retry the export.")]
    ExportFailed { detail: String },

    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Docx2MdError {
    /// True for failures that clear the session's stored result.
    ///
    /// Precondition and export errors leave the last successful result in
    /// place; pipeline and input failures wipe it.
    pub fn clears_result(&self) -> bool {
        !matches!(
            self,
            Docx2MdError::NoFileSelected
                | Docx2MdError::ConversionInFlight
                | Docx2MdError::ExportFailed { .. }
                | Docx2MdError::OutputWriteFailed { .. }
        )
    }
}

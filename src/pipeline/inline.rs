//! Image inlining: embedded image bytes → self-contained data URL.
//!
//! Every image in the final Markdown must be self-contained; the converter
//! never writes image files next to the export and never leaves an external
//! `src` path in the output. A `data:` URL carries the MIME type and the
//! base64 payload in one string, so the single exported `document.md` remains
//! portable on its own.
//!
//! ## Content-type resolution
//!
//! The document usually declares a type for each media part. When it does
//! not, the format is sniffed from the image's magic bytes; if that fails
//! too, `application/octet-stream` keeps the URL well-formed. Renderers
//! ignore a wrong label more gracefully than a missing one.

use crate::error::Docx2MdError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::sync::Arc;
use tracing::debug;

/// Fallback MIME type when neither declaration nor sniffing yields one.
pub const MIME_OCTET_STREAM: &str = "application/octet-stream";

/// A single inlined image, as returned by an [`ImageInliner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlinedImage {
    /// Value usable directly as an image source (the data URL).
    pub src: String,
    /// MIME type the data URL was labelled with.
    pub content_type: String,
}

/// Shared handle to an image inliner, as passed to extractors.
pub type ImageInlinerRef = Arc<dyn ImageInliner>;

/// Converts one embedded binary image into a self-contained textual source.
///
/// The extractor invokes this once per image it encounters, in document
/// order; zero, one, or many times per document. Implementations must not
/// fail silently — any error aborts the enclosing extraction as
/// [`Docx2MdError::EncodingFailed`]. No side effects beyond producing the
/// string: no disk writes, no network calls.
#[async_trait]
pub trait ImageInliner: Send + Sync {
    /// Produce a source string for the given image bytes.
    ///
    /// `declared_content_type` is the MIME type the document claims for this
    /// image, when it claims one.
    async fn inline(
        &self,
        bytes: &[u8],
        declared_content_type: Option<&str>,
    ) -> Result<InlinedImage, Docx2MdError>;
}

/// Default inliner: `data:{mime};base64,{payload}`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DataUrlInliner;

#[async_trait]
impl ImageInliner for DataUrlInliner {
    async fn inline(
        &self,
        bytes: &[u8],
        declared_content_type: Option<&str>,
    ) -> Result<InlinedImage, Docx2MdError> {
        if bytes.is_empty() {
            return Err(Docx2MdError::EncodingFailed {
                detail: "image resource is empty".into(),
            });
        }

        let content_type = resolve_content_type(bytes, declared_content_type);
        let payload = STANDARD.encode(bytes);
        debug!(
            "Inlined {} byte image as {} ({} bytes base64)",
            bytes.len(),
            content_type,
            payload.len()
        );

        Ok(InlinedImage {
            src: format!("data:{content_type};base64,{payload}"),
            content_type,
        })
    }
}

/// Resolve the MIME label for an image: declared type wins, then magic-byte
/// sniffing, then [`MIME_OCTET_STREAM`].
pub fn resolve_content_type(bytes: &[u8], declared: Option<&str>) -> String {
    if let Some(ct) = declared {
        let ct = ct.trim();
        if !ct.is_empty() {
            return ct.to_string();
        }
    }
    match image::guess_format(bytes) {
        Ok(format) => format.to_mime_type().to_string(),
        Err(_) => MIME_OCTET_STREAM.to_string(),
    }
}

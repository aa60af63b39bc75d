//! Conversion entry points.
//!
//! ## Why two phases?
//!
//! The pipeline runs structural extraction first and markup simplification
//! second, with nothing carried between them except the structural markup
//! string. That seam is what makes the capability traits in
//! [`crate::config::ConversionConfig`] worth having: either phase can be
//! replaced without the other noticing, and tests can drive one phase with
//! a canned stand-in for the other.

use crate::config::ConversionConfig;
use crate::error::Docx2MdError;
use crate::pipeline::extract::{self, DocxExtractor, DocxInfo, StructuralExtractor};
use crate::pipeline::inline::{DataUrlInliner, ImageInliner, ImageInlinerRef, InlinedImage};
use crate::pipeline::input;
use crate::pipeline::simplify::{HtmlMarkdownSimplifier, MarkupSimplifier};
use crate::progress::SyntheticProgress;
use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Result of a successful conversion.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    /// The produced Markdown, exactly as a caller should display or export
    /// it.
    pub markdown: String,
    pub stats: ConversionStats,
}

/// Timing and volume figures for one conversion.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionStats {
    /// Images embedded as data URLs in the output.
    pub inlined_images: usize,
    pub markdown_bytes: usize,
    pub extract_duration_ms: u64,
    pub simplify_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Convert a `.docx` file on disk to Markdown.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// - [`Docx2MdError::FileNotFound`] / [`Docx2MdError::PermissionDenied`]
///   when the path can't be read
/// - [`Docx2MdError::NotADocx`] when the file doesn't start with a ZIP
///   local-file header
/// - [`Docx2MdError::ExtractionFailed`] / [`Docx2MdError::EncodingFailed`] /
///   [`Docx2MdError::SimplificationFailed`] for pipeline failures
pub async fn convert(
    path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Docx2MdError> {
    let path = path.as_ref();
    info!("Starting conversion: {}", path.display());
    let bytes = input::load_docx(path).await?;
    convert_bytes(&bytes, config).await
}

/// Convert in-memory `.docx` bytes to Markdown.
///
/// Use this when the document comes from an upload, a database, or a drag
/// and drop rather than a file the library should open itself. The bytes
/// are not magic-checked here; a non-ZIP buffer surfaces as
/// [`Docx2MdError::ExtractionFailed`].
pub async fn convert_bytes(
    bytes: &[u8],
    config: &ConversionConfig,
) -> Result<ConversionOutput, Docx2MdError> {
    let total_start = Instant::now();

    // ── Step 1: Resolve capabilities ─────────────────────────────────────
    let extractor: Arc<dyn StructuralExtractor> = match &config.extractor {
        Some(e) => Arc::clone(e),
        None => Arc::new(DocxExtractor::new(config.code_block_styles.clone())),
    };
    let simplifier: Arc<dyn MarkupSimplifier> = match &config.simplifier {
        Some(s) => Arc::clone(s),
        None => Arc::new(HtmlMarkdownSimplifier),
    };
    let inliner: ImageInlinerRef = match &config.inliner {
        Some(i) => Arc::clone(i),
        None => Arc::new(DataUrlInliner),
    };
    let inliner = Arc::new(CountingInliner::new(inliner));

    // The handle settles on every exit path: `finish` below on success, the
    // drop impl on any `?` return.
    let progress = config.progress_observer.as_ref().map(|obs| {
        SyntheticProgress::start(
            Arc::clone(obs),
            Duration::from_millis(config.progress_tick_ms),
            config.progress_cap,
        )
    });

    // ── Step 2: Extract structural markup ────────────────────────────────
    let extract_start = Instant::now();
    let html = extractor
        .extract(bytes, Arc::clone(&inliner) as ImageInlinerRef)
        .await?;
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;
    let inlined_images = inliner.count();
    info!(
        "Extracted {} bytes of structural markup ({} images inlined) in {}ms",
        html.len(),
        inlined_images,
        extract_duration_ms
    );

    // ── Step 3: Simplify to Markdown ─────────────────────────────────────
    let simplify_start = Instant::now();
    let mut markdown = simplifier.simplify(&html)?;
    let simplify_duration_ms = simplify_start.elapsed().as_millis() as u64;
    debug!(
        "Simplified to {} bytes of Markdown in {}ms",
        markdown.len(),
        simplify_duration_ms
    );

    // ── Step 4: Optional front matter ────────────────────────────────────
    if config.include_metadata {
        if let Some(front) = format_yaml_front_matter(&extract::read_core_properties(bytes)) {
            markdown = format!("{front}{markdown}");
        }
    }

    if let Some(p) = progress {
        p.finish();
    }

    let stats = ConversionStats {
        inlined_images,
        markdown_bytes: markdown.len(),
        extract_duration_ms,
        simplify_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!("Conversion complete in {}ms", stats.total_duration_ms);

    Ok(ConversionOutput { markdown, stats })
}

/// Convert a `.docx` file and write the Markdown to `output_path`.
///
/// The write goes through [`crate::export::write_markdown_file`], so the
/// file on disk is byte-identical to `ConversionOutput::markdown`.
pub async fn convert_to_file(
    path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionStats, Docx2MdError> {
    let output = convert(path, config).await?;
    crate::export::write_markdown_file(&output.markdown, output_path.as_ref()).await?;
    Ok(output.stats)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally; don't call it from inside
/// an async context.
pub fn convert_sync(
    path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Docx2MdError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Docx2MdError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(convert(path, config))
}

/// Read document facts (core properties plus element counts) without
/// converting content.
pub async fn inspect(path: impl AsRef<Path>) -> Result<DocxInfo, Docx2MdError> {
    let bytes = input::load_docx(path.as_ref()).await?;
    extract::inspect_docx(&bytes)
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Delegates to the configured inliner and counts successful inlinings, so
/// the stats report how many images actually made it into the output.
struct CountingInliner {
    inner: ImageInlinerRef,
    count: AtomicUsize,
}

impl CountingInliner {
    fn new(inner: ImageInlinerRef) -> Self {
        Self {
            inner,
            count: AtomicUsize::new(0),
        }
    }

    fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ImageInliner for CountingInliner {
    async fn inline(
        &self,
        bytes: &[u8],
        declared_content_type: Option<&str>,
    ) -> Result<InlinedImage, Docx2MdError> {
        let image = self.inner.inline(bytes, declared_content_type).await?;
        self.count.fetch_add(1, Ordering::Relaxed);
        Ok(image)
    }
}

/// Format core properties as YAML front matter, or None when the package
/// declared none of them.
fn format_yaml_front_matter(props: &extract::CoreProperties) -> Option<String> {
    if props.title.is_none() && props.creator.is_none() && props.modified.is_none() {
        return None;
    }

    let quote = |v: &str| format!("\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\""));
    let mut yaml = String::from("---\n");
    if let Some(ref t) = props.title {
        yaml.push_str(&format!("title: {}\n", quote(t)));
    }
    if let Some(ref c) = props.creator {
        yaml.push_str(&format!("creator: {}\n", quote(c)));
    }
    if let Some(ref m) = props.modified {
        yaml.push_str(&format!("modified: {}\n", quote(m)));
    }
    yaml.push_str("---\n\n");
    Some(yaml)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn front_matter_skipped_without_properties() {
        let props = extract::CoreProperties::default();
        assert_eq!(format_yaml_front_matter(&props), None);
    }

    #[test]
    fn front_matter_lists_present_properties() {
        let props = extract::CoreProperties {
            title: Some("Quarterly Report".into()),
            creator: Some("R. Author".into()),
            modified: None,
        };
        let yaml = format_yaml_front_matter(&props).unwrap();
        assert_eq!(
            yaml,
            "---\ntitle: \"Quarterly Report\"\ncreator: \"R. Author\"\n---\n\n"
        );
    }

    #[test]
    fn front_matter_escapes_quotes() {
        let props = extract::CoreProperties {
            title: Some("A \"quoted\" title".into()),
            creator: None,
            modified: None,
        };
        let yaml = format_yaml_front_matter(&props).unwrap();
        assert!(yaml.contains("title: \"A \\\"quoted\\\" title\""), "got: {yaml}");
    }
}

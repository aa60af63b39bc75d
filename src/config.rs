//! Configuration types for DOCX-to-Markdown conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs across call sites, serialise the scalar parts
//! for logging, and diff two runs to understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A ten-field constructor is unreadable and breaks on every new field. The
//! builder lets callers set only what they care about and rely on documented
//! defaults for the rest.

use crate::error::Docx2MdError;
use crate::pipeline::extract::StructuralExtractor;
use crate::pipeline::inline::ImageInliner;
use crate::pipeline::simplify::MarkupSimplifier;
use crate::progress::ProgressObserver;
use std::fmt;
use std::sync::Arc;

/// Paragraph style ids treated as code blocks by the default extractor.
///
/// `HTMLPreformatted` is the id Word assigns to its built-in
/// "HTML Preformatted" style; the others are the names people actually give
/// their hand-made code styles.
pub const DEFAULT_CODE_BLOCK_STYLES: &[&str] =
    &["Code", "CodeBlock", "SourceCode", "HTMLPreformatted"];

/// Configuration for a DOCX-to-Markdown conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use docx2md::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .include_metadata(true)
///     .code_block_style("Listing")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Paragraph style ids rendered as fenced code blocks.
    /// Default: [`DEFAULT_CODE_BLOCK_STYLES`].
    ///
    /// WordprocessingML has no native "code block" concept; authors mark code
    /// with a named paragraph style. Consecutive paragraphs carrying one of
    /// these styles merge into a single fenced block, so multi-line listings
    /// survive as one literal region.
    pub code_block_styles: Vec<String>,

    /// Include YAML front-matter with document metadata. Default: false.
    ///
    /// When set, the core properties (title, creator, modified) read from
    /// `docProps/core.xml` are emitted ahead of the Markdown body.
    pub include_metadata: bool,

    /// How long a transient notification stays visible, in milliseconds.
    /// Range: 250–60 000. Default: 2500.
    pub notification_ttl_ms: u64,

    /// Synthetic progress tick interval in milliseconds. Range: 20–2000.
    /// Default: 120.
    ///
    /// The conversion reports no real progress, so the indicator advances on
    /// this fixed interval with small randomized increments. Shorter ticks
    /// look smoother; they change nothing about the conversion itself.
    pub progress_tick_ms: u64,

    /// Percent value the synthetic indicator saturates at while the pipeline
    /// is still running. Range: 50.0–99.0. Default: 90.0.
    ///
    /// The jump from this cap to 100 happens only when the pipeline actually
    /// resolves, so the bar never claims completion early.
    pub progress_cap: f32,

    /// Pre-constructed structural extractor. If None, the built-in
    /// WordprocessingML extractor is used.
    pub extractor: Option<Arc<dyn StructuralExtractor>>,

    /// Pre-constructed markup simplifier. If None, the built-in
    /// HTML-to-Markdown simplifier is used.
    pub simplifier: Option<Arc<dyn MarkupSimplifier>>,

    /// Pre-constructed image inliner. If None, the built-in data-URL inliner
    /// is used.
    pub inliner: Option<Arc<dyn ImageInliner>>,

    /// Observer for synthetic progress events. If None, no progress is
    /// reported.
    pub progress_observer: Option<Arc<dyn ProgressObserver>>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            code_block_styles: DEFAULT_CODE_BLOCK_STYLES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            include_metadata: false,
            notification_ttl_ms: 2500,
            progress_tick_ms: 120,
            progress_cap: 90.0,
            extractor: None,
            simplifier: None,
            inliner: None,
            progress_observer: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("code_block_styles", &self.code_block_styles)
            .field("include_metadata", &self.include_metadata)
            .field("notification_ttl_ms", &self.notification_ttl_ms)
            .field("progress_tick_ms", &self.progress_tick_ms)
            .field("progress_cap", &self.progress_cap)
            .field(
                "extractor",
                &self.extractor.as_ref().map(|_| "<dyn StructuralExtractor>"),
            )
            .field(
                "simplifier",
                &self.simplifier.as_ref().map(|_| "<dyn MarkupSimplifier>"),
            )
            .field("inliner", &self.inliner.as_ref().map(|_| "<dyn ImageInliner>"))
            .field(
                "progress_observer",
                &self.progress_observer.as_ref().map(|_| "<dyn ProgressObserver>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    /// Replace the whole set of code-block style ids.
    pub fn code_block_styles(mut self, styles: Vec<String>) -> Self {
        self.config.code_block_styles = styles;
        self
    }

    /// Add one style id to the code-block set.
    pub fn code_block_style(mut self, style: impl Into<String>) -> Self {
        self.config.code_block_styles.push(style.into());
        self
    }

    pub fn include_metadata(mut self, v: bool) -> Self {
        self.config.include_metadata = v;
        self
    }

    pub fn notification_ttl_ms(mut self, ms: u64) -> Self {
        self.config.notification_ttl_ms = ms.clamp(250, 60_000);
        self
    }

    pub fn progress_tick_ms(mut self, ms: u64) -> Self {
        self.config.progress_tick_ms = ms.clamp(20, 2000);
        self
    }

    pub fn progress_cap(mut self, cap: f32) -> Self {
        self.config.progress_cap = cap.clamp(50.0, 99.0);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn StructuralExtractor>) -> Self {
        self.config.extractor = Some(extractor);
        self
    }

    pub fn simplifier(mut self, simplifier: Arc<dyn MarkupSimplifier>) -> Self {
        self.config.simplifier = Some(simplifier);
        self
    }

    pub fn inliner(mut self, inliner: Arc<dyn ImageInliner>) -> Self {
        self.config.inliner = Some(inliner);
        self
    }

    pub fn progress_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.config.progress_observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Docx2MdError> {
        let c = &self.config;
        if c.code_block_styles.iter().any(|s| s.trim().is_empty()) {
            return Err(Docx2MdError::InvalidConfig(
                "Code-block style ids must be non-empty".into(),
            ));
        }
        if !(50.0..=99.0).contains(&c.progress_cap) {
            return Err(Docx2MdError::InvalidConfig(format!(
                "Progress cap must be 50–99, got {}",
                c.progress_cap
            )));
        }
        Ok(self.config)
    }
}

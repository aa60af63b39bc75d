//! Structural extraction: DOCX bytes → structural markup (HTML).
//!
//! A DOCX is a ZIP package of XML parts. The parts this stage reads:
//!
//! | Part                              | Purpose                              |
//! |-----------------------------------|--------------------------------------|
//! | `word/document.xml`               | body content (required)              |
//! | `word/styles.xml`                 | style ids → outline levels           |
//! | `word/numbering.xml`              | list definitions (bullet vs decimal) |
//! | `word/_rels/document.xml.rels`    | relationship ids → media/link targets|
//! | `word/media/*`                    | embedded image bytes                 |
//!
//! Only `word/document.xml` is required; every other part degrades to an
//! empty default so documents written by minimal producers still convert.
//!
//! ## Two phases
//!
//! The DOM walk is synchronous; the image inliner is async. The walk first
//! collects an ordered list of pieces (HTML fragments and raw image
//! resources), then the inliner is awaited once per image piece, in document
//! order. This keeps the XML cursor types out of the async state machine and
//! guarantees the callback ordering the orchestrator promises.

use crate::config::DEFAULT_CODE_BLOCK_STYLES;
use crate::error::Docx2MdError;
use crate::pipeline::inline::ImageInlinerRef;
use async_trait::async_trait;
use roxmltree::Node;
use serde::Serialize;
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};
use tracing::{debug, warn};
use zip::ZipArchive;

// WordprocessingML and DrawingML namespaces.
const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const A_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const WP_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const V_NS: &str = "urn:schemas-microsoft-com:vml";
const O_NS: &str = "urn:schemas-microsoft-com:office:office";

/// Decodes a source document byte buffer into structural markup (HTML),
/// invoking the image inliner for each embedded image it encounters.
///
/// Implementations report failure with a descriptive error; the orchestrator
/// maps it to a user-visible message. The inliner must be called in document
/// order, zero or more times, and any inliner error aborts the extraction.
#[async_trait]
pub trait StructuralExtractor: Send + Sync {
    async fn extract(
        &self,
        bytes: &[u8],
        inliner: ImageInlinerRef,
    ) -> Result<String, Docx2MdError>;
}

/// Built-in WordprocessingML extractor.
///
/// Produces a flat HTML document fragment: `h1`–`h6` for styled headings,
/// `p` for body text with `strong`/`em`/`del`/`sub`/`sup` runs, `a` for
/// hyperlinks, `ul`/`ol`/`li` for numbered paragraphs, `table`/`tr`/`td`
/// grids, `blockquote` for quote styles, `pre` for code-styled paragraphs,
/// and `img` with the inliner's `src` for embedded pictures. Underline has
/// no Markdown counterpart and is dropped.
#[derive(Debug, Clone)]
pub struct DocxExtractor {
    code_block_styles: Vec<String>,
}

impl Default for DocxExtractor {
    fn default() -> Self {
        Self {
            code_block_styles: DEFAULT_CODE_BLOCK_STYLES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl DocxExtractor {
    /// Extractor treating the given paragraph style ids as code blocks.
    pub fn new(code_block_styles: Vec<String>) -> Self {
        Self { code_block_styles }
    }

    /// Phase one: decode the package and walk the body into ordered pieces.
    fn collect_pieces(&self, bytes: &[u8]) -> Result<Vec<Piece>, Docx2MdError> {
        let mut archive =
            ZipArchive::new(Cursor::new(bytes)).map_err(|e| Docx2MdError::ExtractionFailed {
                detail: format!("not a readable ZIP container: {e}"),
            })?;

        let document_xml = read_part(&mut archive, "word/document.xml").ok_or_else(|| {
            Docx2MdError::ExtractionFailed {
                detail: "word/document.xml is missing".into(),
            }
        })?;

        let styles = match read_part(&mut archive, "word/styles.xml") {
            Some(xml) => parse_styles(&xml).unwrap_or_else(|e| {
                warn!("Ignoring malformed word/styles.xml: {e}");
                HashMap::new()
            }),
            None => HashMap::new(),
        };

        let numbering = match read_part(&mut archive, "word/numbering.xml") {
            Some(xml) => parse_numbering(&xml).unwrap_or_else(|e| {
                warn!("Ignoring malformed word/numbering.xml: {e}");
                NumberingDefs::default()
            }),
            None => NumberingDefs::default(),
        };

        let rels = match read_part(&mut archive, "word/_rels/document.xml.rels") {
            Some(xml) => parse_relationships(&xml).unwrap_or_else(|e| {
                warn!("Ignoring malformed document relationships: {e}");
                HashMap::new()
            }),
            None => HashMap::new(),
        };

        debug!(
            "Decoded package: {} styles, {} relationships",
            styles.len(),
            rels.len()
        );

        let doc = roxmltree::Document::parse(&document_xml).map_err(|e| {
            Docx2MdError::ExtractionFailed {
                detail: format!("word/document.xml is not well-formed XML: {e}"),
            }
        })?;

        let body = doc
            .root_element()
            .children()
            .find(|n| n.has_tag_name((W_NS, "body")))
            .ok_or_else(|| Docx2MdError::ExtractionFailed {
                detail: "document has no body element".into(),
            })?;

        let mut walker = BodyWalker {
            styles: &styles,
            numbering: &numbering,
            rels: &rels,
            code_styles: &self.code_block_styles,
            pieces: Vec::new(),
            buf: String::new(),
            list_stack: Vec::new(),
            code_lines: Vec::new(),
        };
        walker.walk_body(body, &mut archive)?;
        Ok(walker.finish())
    }
}

#[async_trait]
impl StructuralExtractor for DocxExtractor {
    async fn extract(
        &self,
        bytes: &[u8],
        inliner: ImageInlinerRef,
    ) -> Result<String, Docx2MdError> {
        let pieces = self.collect_pieces(bytes)?;

        // Phase two: await the inliner per image, in document order.
        let mut html = String::new();
        let mut images = 0usize;
        for piece in pieces {
            match piece {
                Piece::Html(fragment) => html.push_str(&fragment),
                Piece::Image {
                    data,
                    content_type,
                    alt,
                } => {
                    images += 1;
                    let inlined = inliner.inline(&data, content_type.as_deref()).await?;
                    html.push_str(&format!(
                        "<img src=\"{}\" alt=\"{}\" />",
                        inlined.src,
                        escape_attr(&alt)
                    ));
                }
            }
        }

        debug!(
            "Extracted {} bytes of structural markup ({} images inlined)",
            html.len(),
            images
        );
        Ok(html)
    }
}

// ── Ordered output pieces ────────────────────────────────────────────────

/// One unit of extractor output. Image pieces split the HTML stream at the
/// exact position the image occupies, so phase two can stitch the inlined
/// `img` element back in place.
enum Piece {
    Html(String),
    Image {
        data: Vec<u8>,
        content_type: Option<String>,
        alt: String,
    },
}

// ── Auxiliary part models ────────────────────────────────────────────────

#[derive(Debug, Default, Clone)]
struct StyleInfo {
    /// 0-based outline level from the style definition.
    outline_level: Option<u8>,
    name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Bullet,
    Numbered,
}

impl ListKind {
    fn tag(self) -> &'static str {
        match self {
            ListKind::Bullet => "ul",
            ListKind::Numbered => "ol",
        }
    }
}

/// List definitions from `word/numbering.xml`: numId → abstract definition,
/// abstract definition → per-level format.
#[derive(Debug, Default)]
struct NumberingDefs {
    nums: HashMap<String, String>,
    abstracts: HashMap<String, HashMap<u32, ListKind>>,
}

impl NumberingDefs {
    /// Kind for a `(numId, ilvl)` pair. Numbered paragraphs referencing
    /// definitions this package does not carry fall back to bullets, which
    /// is what Word itself renders for a dangling numId.
    fn kind_for(&self, num_id: &str, ilvl: u32) -> ListKind {
        self.nums
            .get(num_id)
            .and_then(|abs| self.abstracts.get(abs))
            .and_then(|levels| levels.get(&ilvl))
            .copied()
            .unwrap_or(ListKind::Bullet)
    }
}

// ── Part readers ─────────────────────────────────────────────────────────

/// Read one ZIP part to a string, releasing the archive borrow before any
/// XML parsing starts. Missing or unreadable parts yield `None`.
fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Option<String> {
    let mut file = archive.by_name(name).ok()?;
    let mut content = String::new();
    file.read_to_string(&mut content).ok()?;
    Some(content)
}

fn read_media<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    part: &str,
) -> Result<Vec<u8>, Docx2MdError> {
    let mut file = archive
        .by_name(part)
        .map_err(|e| Docx2MdError::EncodingFailed {
            detail: format!("image part '{part}' not found in package: {e}"),
        })?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| Docx2MdError::EncodingFailed {
            detail: format!("could not read image part '{part}': {e}"),
        })?;
    Ok(bytes)
}

/// Map a relationship target to its package part name. Targets are normally
/// relative to `word/`; absolute targets carry a leading slash.
fn media_part_name(target: &str) -> String {
    let trimmed = target.trim_start_matches('/');
    if trimmed.starts_with("word/") {
        trimmed.to_string()
    } else {
        format!("word/{trimmed}")
    }
}

/// Declared MIME type from the media file extension, when recognised.
fn mime_from_media_path(target: &str) -> Option<&'static str> {
    let ext = target.rsplit('.').next()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "webp" => Some("image/webp"),
        "tif" | "tiff" => Some("image/tiff"),
        "svg" => Some("image/svg+xml"),
        "ico" => Some("image/x-icon"),
        "emf" => Some("image/x-emf"),
        "wmf" => Some("image/x-wmf"),
        _ => None,
    }
}

/// Parse `word/styles.xml` into styleId → [`StyleInfo`].
fn parse_styles(xml: &str) -> Result<HashMap<String, StyleInfo>, roxmltree::Error> {
    let doc = roxmltree::Document::parse(xml)?;
    let mut styles = HashMap::new();

    for style in doc
        .descendants()
        .filter(|n| n.has_tag_name((W_NS, "style")))
    {
        let Some(id) = style.attribute((W_NS, "styleId")) else {
            continue;
        };
        let name = style
            .children()
            .find(|n| n.has_tag_name((W_NS, "name")))
            .and_then(|n| n.attribute((W_NS, "val")))
            .map(str::to_string);
        let outline_level = style
            .descendants()
            .find(|n| n.has_tag_name((W_NS, "outlineLvl")))
            .and_then(|n| n.attribute((W_NS, "val")))
            .and_then(|v| v.parse::<u8>().ok())
            .filter(|lvl| *lvl <= 8);
        styles.insert(
            id.to_string(),
            StyleInfo {
                outline_level,
                name,
            },
        );
    }
    Ok(styles)
}

/// Parse `word/numbering.xml` into [`NumberingDefs`].
fn parse_numbering(xml: &str) -> Result<NumberingDefs, roxmltree::Error> {
    let doc = roxmltree::Document::parse(xml)?;
    let mut defs = NumberingDefs::default();

    for abstract_num in doc
        .descendants()
        .filter(|n| n.has_tag_name((W_NS, "abstractNum")))
    {
        let Some(abs_id) = abstract_num.attribute((W_NS, "abstractNumId")) else {
            continue;
        };
        let mut levels = HashMap::new();
        for lvl in abstract_num
            .children()
            .filter(|n| n.has_tag_name((W_NS, "lvl")))
        {
            let Some(ilvl) = lvl
                .attribute((W_NS, "ilvl"))
                .and_then(|v| v.parse::<u32>().ok())
            else {
                continue;
            };
            let kind = lvl
                .children()
                .find(|n| n.has_tag_name((W_NS, "numFmt")))
                .and_then(|n| n.attribute((W_NS, "val")))
                .map_or(ListKind::Bullet, |fmt| match fmt {
                    "bullet" | "none" => ListKind::Bullet,
                    _ => ListKind::Numbered,
                });
            levels.insert(ilvl, kind);
        }
        defs.abstracts.insert(abs_id.to_string(), levels);
    }

    for num in doc.descendants().filter(|n| n.has_tag_name((W_NS, "num"))) {
        let Some(num_id) = num.attribute((W_NS, "numId")) else {
            continue;
        };
        let Some(abs_id) = num
            .children()
            .find(|n| n.has_tag_name((W_NS, "abstractNumId")))
            .and_then(|n| n.attribute((W_NS, "val")))
        else {
            continue;
        };
        defs.nums.insert(num_id.to_string(), abs_id.to_string());
    }
    Ok(defs)
}

/// Parse `word/_rels/document.xml.rels` into Id → Target.
///
/// Relationship attributes carry no namespace prefix, unlike the
/// WordprocessingML parts.
fn parse_relationships(xml: &str) -> Result<HashMap<String, String>, roxmltree::Error> {
    let doc = roxmltree::Document::parse(xml)?;
    let mut rels = HashMap::new();
    for rel in doc
        .descendants()
        .filter(|n| n.tag_name().name() == "Relationship")
    {
        if let (Some(id), Some(target)) = (rel.attribute("Id"), rel.attribute("Target")) {
            rels.insert(id.to_string(), target.to_string());
        }
    }
    Ok(rels)
}

// ── Body walker ──────────────────────────────────────────────────────────

struct BodyWalker<'a> {
    styles: &'a HashMap<String, StyleInfo>,
    numbering: &'a NumberingDefs,
    rels: &'a HashMap<String, String>,
    code_styles: &'a [String],
    pieces: Vec<Piece>,
    buf: String,
    list_stack: Vec<ListKind>,
    /// Consecutive code-styled paragraphs pending merge into one `pre`.
    code_lines: Vec<String>,
}

impl<'a> BodyWalker<'a> {
    fn raw(&mut self, s: &str) {
        self.buf.push_str(s);
    }

    fn text(&mut self, s: &str) {
        self.buf.push_str(&escape_html(s));
    }

    fn emit_image(&mut self, data: Vec<u8>, content_type: Option<String>, alt: String) {
        if !self.buf.is_empty() {
            self.pieces.push(Piece::Html(std::mem::take(&mut self.buf)));
        }
        self.pieces.push(Piece::Image {
            data,
            content_type,
            alt,
        });
    }

    fn finish(mut self) -> Vec<Piece> {
        self.flush_code();
        self.sync_lists(None);
        if !self.buf.is_empty() {
            self.pieces.push(Piece::Html(std::mem::take(&mut self.buf)));
        }
        self.pieces
    }

    fn walk_body<R: Read + Seek>(
        &mut self,
        body: Node<'_, '_>,
        archive: &mut ZipArchive<R>,
    ) -> Result<(), Docx2MdError> {
        for child in body.children().filter(Node::is_element) {
            if child.has_tag_name((W_NS, "p")) {
                self.paragraph(child, archive)?;
            } else if child.has_tag_name((W_NS, "tbl")) {
                self.flush_code();
                self.sync_lists(None);
                self.table(child, archive)?;
            }
            // sectPr and the rest of the section furniture carry no content.
        }
        Ok(())
    }

    fn paragraph<R: Read + Seek>(
        &mut self,
        p: Node<'_, '_>,
        archive: &mut ZipArchive<R>,
    ) -> Result<(), Docx2MdError> {
        let ppr = p.children().find(|n| n.has_tag_name((W_NS, "pPr")));
        let style_id = ppr
            .and_then(|pr| pr.children().find(|n| n.has_tag_name((W_NS, "pStyle"))))
            .and_then(|n| n.attribute((W_NS, "val")));

        // Code paragraphs merge into one literal block, blank lines included,
        // so they are handled before the emptiness check.
        if let Some(id) = style_id {
            if self.code_styles.iter().any(|s| s == id) {
                self.sync_lists(None);
                self.code_lines.push(plain_text(p));
                return Ok(());
            }
        }
        self.flush_code();

        if !paragraph_has_content(p) {
            return Ok(());
        }

        if let Some(level) = self.heading_level(style_id, ppr) {
            self.sync_lists(None);
            self.raw(&format!("<h{level}>"));
            self.inline_content(p, archive)?;
            self.raw(&format!("</h{level}>\n"));
            return Ok(());
        }

        let num = ppr
            .and_then(|pr| pr.children().find(|n| n.has_tag_name((W_NS, "numPr"))))
            .and_then(|num_pr| {
                let num_id = num_pr
                    .children()
                    .find(|n| n.has_tag_name((W_NS, "numId")))
                    .and_then(|n| n.attribute((W_NS, "val")))?;
                let ilvl = num_pr
                    .children()
                    .find(|n| n.has_tag_name((W_NS, "ilvl")))
                    .and_then(|n| n.attribute((W_NS, "val")))
                    .and_then(|v| v.parse::<u32>().ok())
                    .unwrap_or(0);
                Some((self.numbering.kind_for(num_id, ilvl), ilvl as usize))
            });

        if let Some((kind, level)) = num {
            self.sync_lists(Some((kind, level)));
            self.raw("<li>");
            self.inline_content(p, archive)?;
            self.raw("</li>\n");
            return Ok(());
        }
        self.sync_lists(None);

        if matches!(style_id, Some("Quote" | "IntenseQuote" | "BlockQuote")) {
            self.raw("<blockquote><p>");
            self.inline_content(p, archive)?;
            self.raw("</p></blockquote>\n");
            return Ok(());
        }

        self.raw("<p>");
        self.inline_content(p, archive)?;
        self.raw("</p>\n");
        Ok(())
    }

    /// Heading level (1–6) for a paragraph, if any.
    ///
    /// Resolution order: the style's outline level, a `Heading N`/`Title`
    /// style id or name, then an outline level set directly on the
    /// paragraph. Levels past 6 clamp to 6. `outlineLvl` only carries 0–8
    /// in OOXML; 9 is Word's "body text" marker, so anything past 8 is
    /// ignored rather than clamped into a heading.
    fn heading_level(&self, style_id: Option<&str>, ppr: Option<Node<'_, '_>>) -> Option<u8> {
        if let Some(id) = style_id {
            if let Some(info) = self.styles.get(id) {
                if let Some(lvl) = info.outline_level {
                    return Some((lvl + 1).min(6));
                }
                if let Some(level) = heading_by_name(info.name.as_deref().unwrap_or(id)) {
                    return Some(level);
                }
            }
            if let Some(level) = heading_by_name(id) {
                return Some(level);
            }
        }
        ppr.and_then(|pr| {
            pr.children()
                .find(|n| n.has_tag_name((W_NS, "outlineLvl")))
                .and_then(|n| n.attribute((W_NS, "val")))
                .and_then(|v| v.parse::<u8>().ok())
                .filter(|lvl| *lvl <= 8)
                .map(|lvl| (lvl + 1).min(6))
        })
    }

    /// Open/close list elements until the stack matches the target depth and
    /// kind. `None` closes everything.
    fn sync_lists(&mut self, target: Option<(ListKind, usize)>) {
        let (kind, depth) = match target {
            Some((kind, level)) => (Some(kind), level + 1),
            None => (None, 0),
        };
        while self.list_stack.len() > depth {
            let closed = self.list_stack.pop().unwrap();
            self.raw(&format!("</{}>\n", closed.tag()));
        }
        if let Some(kind) = kind {
            if self.list_stack.len() == depth && self.list_stack.last() != Some(&kind) {
                let closed = self.list_stack.pop().unwrap();
                self.raw(&format!("</{}>\n", closed.tag()));
            }
            while self.list_stack.len() < depth {
                self.raw(&format!("<{}>\n", kind.tag()));
                self.list_stack.push(kind);
            }
        }
    }

    fn flush_code(&mut self) {
        if self.code_lines.is_empty() {
            return;
        }
        let joined = self.code_lines.join("\n");
        self.code_lines.clear();
        self.raw("<pre>");
        self.text(&joined);
        self.raw("</pre>\n");
    }

    /// Render the inline content of a paragraph-level node: runs,
    /// hyperlinks, and the containers Word wraps them in.
    fn inline_content<R: Read + Seek>(
        &mut self,
        node: Node<'_, '_>,
        archive: &mut ZipArchive<R>,
    ) -> Result<(), Docx2MdError> {
        for child in node.children().filter(Node::is_element) {
            let name = child.tag_name().name();
            match name {
                "r" => self.run(child, archive)?,
                "hyperlink" => {
                    let href = child
                        .attribute((R_NS, "id"))
                        .and_then(|id| {
                            let target = self.rels.get(id);
                            if target.is_none() {
                                warn!("Hyperlink relationship '{id}' not found; keeping text");
                            }
                            target.cloned()
                        })
                        .or_else(|| {
                            child
                                .attribute((W_NS, "anchor"))
                                .map(|a| format!("#{a}"))
                        });
                    match href {
                        Some(href) => {
                            self.raw(&format!("<a href=\"{}\">", escape_attr(&href)));
                            self.inline_content(child, archive)?;
                            self.raw("</a>");
                        }
                        None => self.inline_content(child, archive)?,
                    }
                }
                // Tracked insertions and content controls keep their runs;
                // tracked deletions vanish.
                "ins" | "smartTag" | "sdt" | "sdtContent" => {
                    self.inline_content(child, archive)?;
                }
                "del" => {}
                _ => {}
            }
        }
        Ok(())
    }

    fn run<R: Read + Seek>(
        &mut self,
        run: Node<'_, '_>,
        archive: &mut ZipArchive<R>,
    ) -> Result<(), Docx2MdError> {
        let rpr = run.children().find(|n| n.has_tag_name((W_NS, "rPr")));
        let bold = rpr.map(|pr| flag_on(pr, "b")).unwrap_or(false);
        let italic = rpr.map(|pr| flag_on(pr, "i")).unwrap_or(false);
        let strike = rpr.map(|pr| flag_on(pr, "strike")).unwrap_or(false);
        let vert = rpr
            .and_then(|pr| pr.children().find(|n| n.has_tag_name((W_NS, "vertAlign"))))
            .and_then(|n| n.attribute((W_NS, "val")));

        let mut close = Vec::new();
        if bold {
            self.raw("<strong>");
            close.push("</strong>");
        }
        if italic {
            self.raw("<em>");
            close.push("</em>");
        }
        if strike {
            self.raw("<del>");
            close.push("</del>");
        }
        match vert {
            Some("superscript") => {
                self.raw("<sup>");
                close.push("</sup>");
            }
            Some("subscript") => {
                self.raw("<sub>");
                close.push("</sub>");
            }
            _ => {}
        }

        for child in run.children().filter(Node::is_element) {
            match child.tag_name().name() {
                "t" => {
                    if let Some(text) = child.text() {
                        self.text(text);
                    }
                }
                "br" => self.raw("<br />"),
                "tab" => self.raw("\t"),
                "noBreakHyphen" => self.raw("-"),
                "drawing" => self.drawing_image(child, archive)?,
                "pict" | "object" => self.vml_image(child, archive)?,
                _ => {}
            }
        }

        for tag in close.into_iter().rev() {
            self.raw(tag);
        }
        Ok(())
    }

    /// DrawingML picture: `a:blip` names the relationship, `wp:docPr`
    /// carries the alternative text.
    fn drawing_image<R: Read + Seek>(
        &mut self,
        drawing: Node<'_, '_>,
        archive: &mut ZipArchive<R>,
    ) -> Result<(), Docx2MdError> {
        let Some(blip) = drawing
            .descendants()
            .find(|n| n.has_tag_name((A_NS, "blip")))
        else {
            return Ok(());
        };
        let Some(rel_id) = blip.attribute((R_NS, "embed")) else {
            // r:link images live outside the package; there are no bytes to
            // inline, so the picture is dropped rather than left external.
            warn!("Skipping linked (non-embedded) image");
            return Ok(());
        };
        let alt = drawing
            .descendants()
            .find(|n| n.has_tag_name((WP_NS, "docPr")))
            .and_then(|n| n.attribute("descr").or_else(|| n.attribute("name")))
            .unwrap_or("")
            .to_string();
        self.resolve_image(rel_id, alt, archive)
    }

    /// Legacy VML picture: `v:imagedata` names the relationship.
    fn vml_image<R: Read + Seek>(
        &mut self,
        pict: Node<'_, '_>,
        archive: &mut ZipArchive<R>,
    ) -> Result<(), Docx2MdError> {
        let Some(imagedata) = pict
            .descendants()
            .find(|n| n.has_tag_name((V_NS, "imagedata")))
        else {
            return Ok(());
        };
        let Some(rel_id) = imagedata.attribute((R_NS, "id")) else {
            return Ok(());
        };
        let alt = imagedata
            .attribute((O_NS, "title"))
            .unwrap_or("")
            .to_string();
        self.resolve_image(rel_id, alt, archive)
    }

    fn resolve_image<R: Read + Seek>(
        &mut self,
        rel_id: &str,
        alt: String,
        archive: &mut ZipArchive<R>,
    ) -> Result<(), Docx2MdError> {
        let target = self
            .rels
            .get(rel_id)
            .ok_or_else(|| Docx2MdError::EncodingFailed {
                detail: format!("image relationship '{rel_id}' not found"),
            })?;
        let part = media_part_name(target);
        let data = read_media(archive, &part)?;
        let content_type = mime_from_media_path(target).map(str::to_string);
        self.emit_image(data, content_type, alt);
        Ok(())
    }

    fn table<R: Read + Seek>(
        &mut self,
        tbl: Node<'_, '_>,
        archive: &mut ZipArchive<R>,
    ) -> Result<(), Docx2MdError> {
        self.raw("<table>\n");
        for row in tbl.children().filter(|n| n.has_tag_name((W_NS, "tr"))) {
            self.raw("<tr>");
            for cell in row.children().filter(|n| n.has_tag_name((W_NS, "tc"))) {
                let tcpr = cell.children().find(|n| n.has_tag_name((W_NS, "tcPr")));
                let merged_continuation = tcpr
                    .and_then(|pr| pr.children().find(|n| n.has_tag_name((W_NS, "vMerge"))))
                    .is_some_and(|m| m.attribute((W_NS, "val")) != Some("restart"));
                if merged_continuation {
                    self.raw("<td></td>");
                    continue;
                }
                let span = tcpr
                    .and_then(|pr| pr.children().find(|n| n.has_tag_name((W_NS, "gridSpan"))))
                    .and_then(|n| n.attribute((W_NS, "val")))
                    .and_then(|v| v.parse::<usize>().ok())
                    .unwrap_or(1);
                if span > 1 {
                    self.raw(&format!("<td colspan=\"{span}\">"));
                } else {
                    self.raw("<td>");
                }
                for content in cell.children().filter(Node::is_element) {
                    if content.has_tag_name((W_NS, "p")) {
                        if paragraph_has_content(content) {
                            self.raw("<p>");
                            self.inline_content(content, archive)?;
                            self.raw("</p>");
                        }
                    } else if content.has_tag_name((W_NS, "tbl")) {
                        self.table(content, archive)?;
                    }
                }
                self.raw("</td>");
            }
            self.raw("</tr>\n");
        }
        self.raw("</table>\n");
        Ok(())
    }
}

/// `Heading1`–`Heading9` ids, `heading N` names, and `Title` map to levels;
/// levels past 6 clamp to 6.
fn heading_by_name(name: &str) -> Option<u8> {
    let lower = name.to_ascii_lowercase();
    if lower == "title" {
        return Some(1);
    }
    let level: u8 = lower.strip_prefix("heading")?.trim().parse().ok()?;
    if (1..=9).contains(&level) {
        Some(level.min(6))
    } else {
        None
    }
}

/// Toggle properties like `w:b` are on when present unless `w:val` turns
/// them off.
fn flag_on(rpr: Node<'_, '_>, name: &str) -> bool {
    match rpr.children().find(|n| n.has_tag_name((W_NS, name))) {
        Some(el) => !matches!(el.attribute((W_NS, "val")), Some("0" | "false" | "none")),
        None => false,
    }
}

/// True when the paragraph contributes anything visible: text, a break, or
/// a picture.
fn paragraph_has_content(p: Node<'_, '_>) -> bool {
    p.descendants().any(|n| {
        if n.has_tag_name((W_NS, "t")) {
            n.text().is_some_and(|t| !t.is_empty())
        } else {
            n.has_tag_name((W_NS, "br"))
                || n.has_tag_name((A_NS, "blip"))
                || n.has_tag_name((V_NS, "imagedata"))
        }
    })
}

/// Raw text of a paragraph with breaks and tabs preserved; used for code
/// blocks where whitespace is load-bearing.
fn plain_text(p: Node<'_, '_>) -> String {
    let mut out = String::new();
    for n in p.descendants() {
        if n.has_tag_name((W_NS, "t")) {
            if let Some(t) = n.text() {
                out.push_str(t);
            }
        } else if n.has_tag_name((W_NS, "br")) {
            out.push('\n');
        } else if n.has_tag_name((W_NS, "tab")) {
            out.push('\t');
        }
    }
    out
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

fn escape_attr(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

// ── Inspection ───────────────────────────────────────────────────────────

/// Document facts gathered without converting: core properties and content
/// counts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DocxInfo {
    pub title: Option<String>,
    pub creator: Option<String>,
    pub modified: Option<String>,
    pub paragraph_count: usize,
    pub table_count: usize,
    pub image_count: usize,
}

/// Core properties from `docProps/core.xml`, all optional.
#[derive(Debug, Clone, Default)]
pub struct CoreProperties {
    pub title: Option<String>,
    pub creator: Option<String>,
    pub modified: Option<String>,
}

/// Read the core properties part; a package without one yields empty
/// properties rather than an error.
pub fn read_core_properties(bytes: &[u8]) -> CoreProperties {
    let Ok(mut archive) = ZipArchive::new(Cursor::new(bytes)) else {
        return CoreProperties::default();
    };
    let Some(xml) = read_part(&mut archive, "docProps/core.xml") else {
        return CoreProperties::default();
    };
    let Ok(doc) = roxmltree::Document::parse(&xml) else {
        return CoreProperties::default();
    };

    // dc:title, dc:creator, dcterms:modified; matched by local name since
    // producers disagree on prefixes.
    let text_of = |local: &str| {
        doc.descendants()
            .find(|n| n.tag_name().name() == local)
            .and_then(|n| n.text())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    };
    CoreProperties {
        title: text_of("title"),
        creator: text_of("creator"),
        modified: text_of("modified"),
    }
}

/// Inspect a DOCX byte buffer: core properties plus paragraph, table, and
/// image counts. Does not invoke the inliner and does not convert.
pub fn inspect_docx(bytes: &[u8]) -> Result<DocxInfo, Docx2MdError> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| Docx2MdError::ExtractionFailed {
            detail: format!("not a readable ZIP container: {e}"),
        })?;
    let document_xml = read_part(&mut archive, "word/document.xml").ok_or_else(|| {
        Docx2MdError::ExtractionFailed {
            detail: "word/document.xml is missing".into(),
        }
    })?;
    let doc = roxmltree::Document::parse(&document_xml).map_err(|e| {
        Docx2MdError::ExtractionFailed {
            detail: format!("word/document.xml is not well-formed XML: {e}"),
        }
    })?;

    let mut info = DocxInfo::default();
    for n in doc.descendants() {
        if n.has_tag_name((W_NS, "p")) {
            info.paragraph_count += 1;
        } else if n.has_tag_name((W_NS, "tbl")) {
            info.table_count += 1;
        } else if (n.has_tag_name((A_NS, "blip")) && n.attribute((R_NS, "embed")).is_some())
            || (n.has_tag_name((V_NS, "imagedata")) && n.attribute((R_NS, "id")).is_some())
        {
            info.image_count += 1;
        }
    }

    let props = read_core_properties(bytes);
    info.title = props.title;
    info.creator = props.creator;
    info.modified = props.modified;
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::inline::DataUrlInliner;
    use std::io::Write;
    use std::sync::Arc;

    const DOC_HEAD: &str = concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main""#,
        r#" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships""#,
        r#" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main""#,
        r#" xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing">"#,
        "<w:body>"
    );
    const DOC_TAIL: &str = "</w:body></w:document>";

    fn docx_from_parts(parts: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        for (name, bytes) in parts {
            writer.start_file(name.to_string(), options).unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn docx_with_body(body: &str) -> Vec<u8> {
        let document = format!("{DOC_HEAD}{body}{DOC_TAIL}");
        docx_from_parts(&[("word/document.xml", document.as_bytes())])
    }

    async fn extract_default(bytes: &[u8]) -> String {
        DocxExtractor::default()
            .extract(bytes, Arc::new(DataUrlInliner))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn plain_paragraph_becomes_p() {
        let docx = docx_with_body("<w:p><w:r><w:t>Hello world</w:t></w:r></w:p>");
        let html = extract_default(&docx).await;
        assert_eq!(html, "<p>Hello world</p>\n");
    }

    #[tokio::test]
    async fn bold_and_italic_runs() {
        let docx = docx_with_body(concat!(
            "<w:p>",
            "<w:r><w:rPr><w:b/></w:rPr><w:t>bold</w:t></w:r>",
            "<w:r><w:rPr><w:i/></w:rPr><w:t>italic</w:t></w:r>",
            "<w:r><w:rPr><w:b w:val=\"false\"/></w:rPr><w:t>plain</w:t></w:r>",
            "</w:p>"
        ));
        let html = extract_default(&docx).await;
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("<em>italic</em>"));
        assert!(html.contains(">plain<") || html.contains("plain</p>"));
        assert!(!html.contains("<strong>plain"));
    }

    #[tokio::test]
    async fn heading_via_styles_part() {
        let styles = concat!(
            r#"<?xml version="1.0"?>"#,
            r#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
            r#"<w:style w:type="paragraph" w:styleId="Heading1">"#,
            r#"<w:name w:val="heading 1"/><w:pPr><w:outlineLvl w:val="0"/></w:pPr>"#,
            "</w:style></w:styles>"
        );
        let document = format!(
            "{DOC_HEAD}{}{DOC_TAIL}",
            concat!(
                "<w:p><w:pPr><w:pStyle w:val=\"Heading1\"/></w:pPr>",
                "<w:r><w:t>Top</w:t></w:r></w:p>"
            )
        );
        let docx = docx_from_parts(&[
            ("word/document.xml", document.as_bytes()),
            ("word/styles.xml", styles.as_bytes()),
        ]);
        let html = extract_default(&docx).await;
        assert_eq!(html, "<h1>Top</h1>\n");
    }

    #[tokio::test]
    async fn heading_style_id_recognised_without_styles_part() {
        let docx = docx_with_body(concat!(
            "<w:p><w:pPr><w:pStyle w:val=\"Heading3\"/></w:pPr>",
            "<w:r><w:t>Deep</w:t></w:r></w:p>"
        ));
        let html = extract_default(&docx).await;
        assert_eq!(html, "<h3>Deep</h3>\n");
    }

    #[tokio::test]
    async fn outline_level_past_eight_is_body_text() {
        // 9 is Word's "body text" value; 255 is plain garbage. Neither may
        // become a heading (or overflow the +1).
        for val in ["9", "255"] {
            let docx = docx_with_body(&format!(
                concat!(
                    "<w:p><w:pPr><w:outlineLvl w:val=\"{}\"/></w:pPr>",
                    "<w:r><w:t>prose</w:t></w:r></w:p>"
                ),
                val
            ));
            let html = extract_default(&docx).await;
            assert_eq!(html, "<p>prose</p>\n", "outlineLvl {val}");
        }
    }

    #[tokio::test]
    async fn style_outline_level_past_eight_is_body_text() {
        let styles = concat!(
            r#"<?xml version="1.0"?>"#,
            r#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
            r#"<w:style w:type="paragraph" w:styleId="Loud">"#,
            r#"<w:name w:val="Loud"/><w:pPr><w:outlineLvl w:val="255"/></w:pPr>"#,
            "</w:style></w:styles>"
        );
        let document = format!(
            "{DOC_HEAD}{}{DOC_TAIL}",
            concat!(
                "<w:p><w:pPr><w:pStyle w:val=\"Loud\"/></w:pPr>",
                "<w:r><w:t>prose</w:t></w:r></w:p>"
            )
        );
        let docx = docx_from_parts(&[
            ("word/document.xml", document.as_bytes()),
            ("word/styles.xml", styles.as_bytes()),
        ]);
        let html = extract_default(&docx).await;
        assert_eq!(html, "<p>prose</p>\n");
    }

    #[tokio::test]
    async fn deep_outline_level_clamps_to_h6() {
        let docx = docx_with_body(concat!(
            "<w:p><w:pPr><w:outlineLvl w:val=\"8\"/></w:pPr>",
            "<w:r><w:t>Deepest</w:t></w:r></w:p>"
        ));
        let html = extract_default(&docx).await;
        assert_eq!(html, "<h6>Deepest</h6>\n");
    }

    #[tokio::test]
    async fn bullet_list_without_numbering_part() {
        let docx = docx_with_body(concat!(
            "<w:p><w:pPr><w:numPr><w:ilvl w:val=\"0\"/><w:numId w:val=\"1\"/></w:numPr></w:pPr>",
            "<w:r><w:t>first</w:t></w:r></w:p>",
            "<w:p><w:pPr><w:numPr><w:ilvl w:val=\"0\"/><w:numId w:val=\"1\"/></w:numPr></w:pPr>",
            "<w:r><w:t>second</w:t></w:r></w:p>",
            "<w:p><w:r><w:t>after</w:t></w:r></w:p>"
        ));
        let html = extract_default(&docx).await;
        assert!(html.starts_with("<ul>"), "got: {html}");
        assert!(html.contains("<li>first</li>"));
        assert!(html.contains("<li>second</li>"));
        assert!(html.contains("</ul>\n<p>after</p>"));
    }

    #[tokio::test]
    async fn decimal_numbering_becomes_ol() {
        let numbering = concat!(
            r#"<?xml version="1.0"?>"#,
            r#"<w:numbering xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
            r#"<w:abstractNum w:abstractNumId="0">"#,
            r#"<w:lvl w:ilvl="0"><w:numFmt w:val="decimal"/></w:lvl>"#,
            "</w:abstractNum>",
            r#"<w:num w:numId="5"><w:abstractNumId w:val="0"/></w:num>"#,
            "</w:numbering>"
        );
        let document = format!(
            "{DOC_HEAD}{}{DOC_TAIL}",
            concat!(
                "<w:p><w:pPr><w:numPr><w:ilvl w:val=\"0\"/><w:numId w:val=\"5\"/></w:numPr></w:pPr>",
                "<w:r><w:t>one</w:t></w:r></w:p>"
            )
        );
        let docx = docx_from_parts(&[
            ("word/document.xml", document.as_bytes()),
            ("word/numbering.xml", numbering.as_bytes()),
        ]);
        let html = extract_default(&docx).await;
        assert!(html.starts_with("<ol>"), "got: {html}");
        assert!(html.contains("<li>one</li>"));
    }

    #[tokio::test]
    async fn code_paragraphs_merge_into_one_pre() {
        let docx = docx_with_body(concat!(
            "<w:p><w:pPr><w:pStyle w:val=\"Code\"/></w:pPr>",
            "<w:r><w:t>fn main() {</w:t></w:r></w:p>",
            "<w:p><w:pPr><w:pStyle w:val=\"Code\"/></w:pPr>",
            "<w:r><w:t>    body();</w:t></w:r></w:p>",
            "<w:p><w:pPr><w:pStyle w:val=\"Code\"/></w:pPr>",
            "<w:r><w:t>}</w:t></w:r></w:p>"
        ));
        let html = extract_default(&docx).await;
        assert_eq!(html, "<pre>fn main() {\n    body();\n}</pre>\n");
    }

    #[tokio::test]
    async fn table_grid() {
        let docx = docx_with_body(concat!(
            "<w:tbl><w:tr>",
            "<w:tc><w:p><w:r><w:t>a</w:t></w:r></w:p></w:tc>",
            "<w:tc><w:p><w:r><w:t>b</w:t></w:r></w:p></w:tc>",
            "</w:tr><w:tr>",
            "<w:tc><w:p><w:r><w:t>c</w:t></w:r></w:p></w:tc>",
            "<w:tc><w:p><w:r><w:t>d</w:t></w:r></w:p></w:tc>",
            "</w:tr></w:tbl>"
        ));
        let html = extract_default(&docx).await;
        assert!(html.contains("<table>"));
        assert!(html.contains("<td><p>a</p></td>"));
        assert!(html.contains("<td><p>d</p></td>"));
    }

    #[tokio::test]
    async fn embedded_image_is_inlined_with_alt() {
        let rels = concat!(
            r#"<?xml version="1.0"?>"#,
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
            r#"<Relationship Id="rId7" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/image1.png"/>"#,
            "</Relationships>"
        );
        let body = concat!(
            "<w:p><w:r><w:drawing><wp:inline>",
            r#"<wp:docPr id="1" name="Picture 1" descr="a red dot"/>"#,
            "<a:graphic><a:graphicData><pic:pic xmlns:pic=\"http://schemas.openxmlformats.org/drawingml/2006/picture\">",
            r#"<pic:blipFill><a:blip r:embed="rId7"/></pic:blipFill>"#,
            "</pic:pic></a:graphicData></a:graphic>",
            "</wp:inline></w:drawing></w:r></w:p>"
        );
        let document = format!("{DOC_HEAD}{body}{DOC_TAIL}");
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3];
        let docx = docx_from_parts(&[
            ("word/document.xml", document.as_bytes()),
            ("word/_rels/document.xml.rels", rels.as_bytes()),
            ("word/media/image1.png", &png),
        ]);
        let html = extract_default(&docx).await;
        assert!(
            html.contains("<img src=\"data:image/png;base64,"),
            "got: {html}"
        );
        assert!(html.contains("alt=\"a red dot\""));
    }

    #[tokio::test]
    async fn missing_media_part_is_an_encoding_failure() {
        let rels = concat!(
            r#"<?xml version="1.0"?>"#,
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
            r#"<Relationship Id="rId7" Type="t" Target="media/gone.png"/>"#,
            "</Relationships>"
        );
        let body = concat!(
            "<w:p><w:r><w:drawing><wp:inline>",
            "<a:graphic><a:graphicData>",
            r#"<a:blip r:embed="rId7"/>"#,
            "</a:graphicData></a:graphic>",
            "</wp:inline></w:drawing></w:r></w:p>"
        );
        let document = format!("{DOC_HEAD}{body}{DOC_TAIL}");
        let docx = docx_from_parts(&[
            ("word/document.xml", document.as_bytes()),
            ("word/_rels/document.xml.rels", rels.as_bytes()),
        ]);
        let err = DocxExtractor::default()
            .extract(&docx, Arc::new(DataUrlInliner))
            .await
            .unwrap_err();
        assert!(matches!(err, Docx2MdError::EncodingFailed { .. }));
    }

    #[tokio::test]
    async fn hyperlink_resolves_relationship_target() {
        let rels = concat!(
            r#"<?xml version="1.0"?>"#,
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
            r#"<Relationship Id="rId3" Type="t" Target="https://example.com/"/>"#,
            "</Relationships>"
        );
        let body = concat!(
            "<w:p><w:hyperlink r:id=\"rId3\">",
            "<w:r><w:t>link text</w:t></w:r>",
            "</w:hyperlink></w:p>"
        );
        let document = format!("{DOC_HEAD}{body}{DOC_TAIL}");
        let docx = docx_from_parts(&[
            ("word/document.xml", document.as_bytes()),
            ("word/_rels/document.xml.rels", rels.as_bytes()),
        ]);
        let html = extract_default(&docx).await;
        assert_eq!(
            html,
            "<p><a href=\"https://example.com/\">link text</a></p>\n"
        );
    }

    #[tokio::test]
    async fn missing_document_part_is_extraction_failure() {
        let docx = docx_from_parts(&[("word/other.xml", b"<x/>")]);
        let err = DocxExtractor::default()
            .extract(&docx, Arc::new(DataUrlInliner))
            .await
            .unwrap_err();
        match err {
            Docx2MdError::ExtractionFailed { detail } => {
                assert!(detail.contains("word/document.xml"), "got: {detail}");
            }
            other => panic!("expected ExtractionFailed, got: {other}"),
        }
    }

    #[tokio::test]
    async fn text_is_html_escaped() {
        let docx = docx_with_body("<w:p><w:r><w:t>a &lt; b &amp; c</w:t></w:r></w:p>");
        let html = extract_default(&docx).await;
        assert_eq!(html, "<p>a &lt; b &amp; c</p>\n");
    }

    #[test]
    fn inspect_counts_and_properties() {
        let core = concat!(
            r#"<?xml version="1.0"?>"#,
            r#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties""#,
            r#" xmlns:dc="http://purl.org/dc/elements/1.1/""#,
            r#" xmlns:dcterms="http://purl.org/dc/terms/">"#,
            "<dc:title>Quarterly Report</dc:title>",
            "<dc:creator>Jo Author</dc:creator>",
            r#"<dcterms:modified>2024-03-01T10:00:00Z</dcterms:modified>"#,
            "</cp:coreProperties>"
        );
        let body = concat!(
            "<w:p><w:r><w:t>one</w:t></w:r></w:p>",
            "<w:p><w:r><w:t>two</w:t></w:r></w:p>",
            "<w:tbl><w:tr><w:tc><w:p><w:r><w:t>cell</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"
        );
        let document = format!("{DOC_HEAD}{body}{DOC_TAIL}");
        let docx = docx_from_parts(&[
            ("word/document.xml", document.as_bytes()),
            ("docProps/core.xml", core.as_bytes()),
        ]);
        let info = inspect_docx(&docx).unwrap();
        assert_eq!(info.title.as_deref(), Some("Quarterly Report"));
        assert_eq!(info.creator.as_deref(), Some("Jo Author"));
        assert_eq!(info.paragraph_count, 3);
        assert_eq!(info.table_count, 1);
        assert_eq!(info.image_count, 0);
    }
}

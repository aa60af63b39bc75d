//! Markup simplification: structural markup (HTML) → Markdown.
//!
//! Conversion is delegated to `html2md`, with per-node-type override rules
//! layered on top:
//!
//! * **`h1`–`h6`** — every heading renders in ATX style (`# Title`).
//!   html2md's stock handler writes the first two levels as Setext
//!   underlines, which the rest of the pipeline never wants.
//! * **`table`** — the table renders as a GFM pipe grid and the whole block
//!   is wrapped in blank-line padding, so the grid never glues itself to
//!   surrounding paragraphs.
//! * **`pre`** — the element's raw text content becomes a fenced literal
//!   block, reproduced whitespace-exact with no Markdown escaping inside
//!   the fence.
//!
//! ## Why placeholders for `pre`?
//!
//! The converter normalises whitespace globally on its way out: runs of
//! blank lines collapse and document edges are trimmed. That is right for
//! prose and fatal for literal blocks. Each `pre` therefore emits an opaque
//! single-line token during conversion; the raw text is substituted back
//! only after every whitespace pass has run. Tokens carry a per-call random
//! nonce so document text can never collide with one.

use crate::error::Docx2MdError;
use html2md::{parse_html_custom, StructuredPrinter, TagHandler, TagHandlerFactory};
use markup5ever_rcdom::{Handle, NodeData};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;

/// Converts structural markup text into lightweight markup text.
///
/// Implementations carry the heading/table/pre override rules; anything
/// else about the rendering is theirs to choose.
pub trait MarkupSimplifier: Send + Sync {
    fn simplify(&self, html: &str) -> Result<String, Docx2MdError>;
}

/// Built-in HTML-to-Markdown simplifier.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlMarkdownSimplifier;

impl MarkupSimplifier for HtmlMarkdownSimplifier {
    fn simplify(&self, html: &str) -> Result<String, Docx2MdError> {
        if html.trim().is_empty() {
            return Ok(String::new());
        }

        let nonce: u64 = rand::random();
        let store: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));

        let mut handlers: HashMap<String, Box<dyn TagHandlerFactory>> = HashMap::new();
        for level in 1..=6 {
            handlers.insert(format!("h{level}"), Box::new(AtxHeadingFactory { level }));
        }
        handlers.insert("table".to_string(), Box::new(GfmTableFactory));
        handlers.insert(
            "pre".to_string(),
            Box::new(PreservePreFactory {
                store: Rc::clone(&store),
                nonce,
            }),
        );

        let converted = parse_html_custom(html, &handlers);

        // Whitespace normalisation runs while literal blocks are still
        // tokens; the restore afterwards is what keeps them byte-exact.
        let tidied = trim_trailing_whitespace(&collapse_blank_lines(&converted));
        let restored = restore_pre_blocks(tidied, &store.borrow(), nonce)?;

        if restored.trim().is_empty() {
            return Ok(String::new());
        }
        let markdown = ensure_final_newline(&restored);
        debug!(
            "Simplified {} bytes of markup into {} bytes of Markdown",
            html.len(),
            markdown.len()
        );
        Ok(markdown)
    }
}

// ── Override rule: headings ──────────────────────────────────────────────

struct AtxHeadingFactory {
    level: usize,
}

impl TagHandlerFactory for AtxHeadingFactory {
    fn instantiate(&self) -> Box<dyn TagHandler> {
        Box::new(AtxHeadingHandler { level: self.level })
    }
}

/// Writes the `#` prefix before the heading's children render and closes
/// the block afterwards. Inline markup inside the heading still goes
/// through the regular handlers.
struct AtxHeadingHandler {
    level: usize,
}

impl TagHandler for AtxHeadingHandler {
    fn handle(&mut self, _tag: &Handle, printer: &mut StructuredPrinter) {
        printer.append_str("\n\n");
        printer.append_str(&"#".repeat(self.level));
        printer.append_str(" ");
    }

    fn after_handle(&mut self, printer: &mut StructuredPrinter) {
        printer.append_str("\n\n");
    }

    fn skip_descendants(&self) -> bool {
        false
    }
}

// ── Override rule: tables ────────────────────────────────────────────────

struct GfmTableFactory;

impl TagHandlerFactory for GfmTableFactory {
    fn instantiate(&self) -> Box<dyn TagHandler> {
        Box::new(GfmTableHandler)
    }
}

/// Renders the whole table subtree itself and pads it with blank lines.
struct GfmTableHandler;

impl TagHandler for GfmTableHandler {
    fn handle(&mut self, tag: &Handle, printer: &mut StructuredPrinter) {
        let table = render_table(tag);
        if table.is_empty() {
            return;
        }
        printer.append_str("\n\n");
        printer.append_str(&table);
        printer.append_str("\n\n");
    }

    fn after_handle(&mut self, _printer: &mut StructuredPrinter) {}

    fn skip_descendants(&self) -> bool {
        true
    }
}

/// GFM pipe grid: first row is the header, a separator row follows, and
/// every row is padded to the widest row. Cells flatten to single-line text
/// with `|` escaped.
fn render_table(table: &Handle) -> String {
    let mut rows: Vec<Vec<String>> = Vec::new();
    collect_rows(table, &mut rows);
    rows.retain(|r| !r.is_empty());
    if rows.is_empty() {
        return String::new();
    }

    let width = rows.iter().map(Vec::len).max().unwrap_or(1);
    for row in &mut rows {
        row.resize(width, String::new());
    }

    let mut out = String::new();
    out.push_str(&row_line(&rows[0]));
    out.push('\n');
    out.push_str(&format!("|{}", " --- |".repeat(width)));
    for row in &rows[1..] {
        out.push('\n');
        out.push_str(&row_line(row));
    }
    out
}

fn row_line(cells: &[String]) -> String {
    format!("| {} |", cells.join(" | "))
}

/// Rows of this table only; nested tables contribute to their own grid via
/// the cell text, not extra rows here.
fn collect_rows(handle: &Handle, rows: &mut Vec<Vec<String>>) {
    for child in handle.children.borrow().iter() {
        if let NodeData::Element { ref name, .. } = child.data {
            match name.local.as_ref() {
                "tr" => rows.push(collect_cells(child)),
                "thead" | "tbody" | "tfoot" => collect_rows(child, rows),
                _ => {}
            }
        }
    }
}

fn collect_cells(row: &Handle) -> Vec<String> {
    let mut cells = Vec::new();
    for child in row.children.borrow().iter() {
        if let NodeData::Element {
            ref name,
            ref attrs,
            ..
        } = child.data
        {
            let local = name.local.as_ref();
            if local == "td" || local == "th" {
                cells.push(cell_text(child));
                let span = attrs
                    .borrow()
                    .iter()
                    .find(|a| a.name.local.as_ref() == "colspan")
                    .and_then(|a| a.value.parse::<usize>().ok())
                    .unwrap_or(1);
                for _ in 1..span {
                    cells.push(String::new());
                }
            }
        }
    }
    cells
}

fn cell_text(cell: &Handle) -> String {
    let mut raw = String::new();
    push_cell_text(cell, &mut raw);
    let flattened = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    flattened.replace('|', "\\|")
}

fn push_cell_text(handle: &Handle, out: &mut String) {
    match handle.data {
        NodeData::Text { ref contents } => out.push_str(&contents.borrow()),
        NodeData::Element {
            ref name,
            ref attrs,
            ..
        } => {
            match name.local.as_ref() {
                "img" => {
                    let attrs = attrs.borrow();
                    let find = |key: &str| {
                        attrs
                            .iter()
                            .find(|a| a.name.local.as_ref() == key)
                            .map(|a| a.value.to_string())
                            .unwrap_or_default()
                    };
                    out.push_str(&format!("![{}]({})", find("alt"), find("src")));
                    return;
                }
                "br" | "p" | "div" | "li" | "tr" | "td" | "th" | "table" => out.push(' '),
                _ => {}
            }
            for child in handle.children.borrow().iter() {
                push_cell_text(child, out);
            }
        }
        _ => {
            for child in handle.children.borrow().iter() {
                push_cell_text(child, out);
            }
        }
    }
}

// ── Override rule: preformatted blocks ───────────────────────────────────

struct PreservePreFactory {
    store: Rc<RefCell<Vec<String>>>,
    nonce: u64,
}

impl TagHandlerFactory for PreservePreFactory {
    fn instantiate(&self) -> Box<dyn TagHandler> {
        Box::new(PreservePreHandler {
            store: Rc::clone(&self.store),
            nonce: self.nonce,
        })
    }
}

/// Stores the element's raw text and leaves a token where the fenced block
/// will be substituted back.
struct PreservePreHandler {
    store: Rc<RefCell<Vec<String>>>,
    nonce: u64,
}

impl TagHandler for PreservePreHandler {
    fn handle(&mut self, tag: &Handle, printer: &mut StructuredPrinter) {
        let raw = collect_raw_text(tag);
        let mut store = self.store.borrow_mut();
        let index = store.len();
        store.push(raw);
        printer.append_str("\n\n");
        printer.append_str(&pre_token(self.nonce, index));
        printer.append_str("\n\n");
    }

    fn after_handle(&mut self, _printer: &mut StructuredPrinter) {}

    fn skip_descendants(&self) -> bool {
        true
    }
}

fn pre_token(nonce: u64, index: usize) -> String {
    format!("\u{F8FF}pre-{nonce:016x}-{index}\u{F8FF}")
}

/// Text content of the subtree with no formatting applied; `br` elements
/// count as line breaks.
fn collect_raw_text(handle: &Handle) -> String {
    let mut out = String::new();
    push_raw_text(handle, &mut out);
    out
}

fn push_raw_text(handle: &Handle, out: &mut String) {
    if let NodeData::Text { ref contents } = handle.data {
        out.push_str(&contents.borrow());
        return;
    }
    if let NodeData::Element { ref name, .. } = handle.data {
        if name.local.as_ref() == "br" {
            out.push('\n');
        }
    }
    for child in handle.children.borrow().iter() {
        push_raw_text(child, out);
    }
}

fn restore_pre_blocks(
    mut text: String,
    blocks: &[String],
    nonce: u64,
) -> Result<String, Docx2MdError> {
    for (index, raw) in blocks.iter().enumerate() {
        let token = pre_token(nonce, index);
        if !text.contains(&token) {
            return Err(Docx2MdError::SimplificationFailed {
                detail: "a literal block placeholder vanished during conversion".into(),
            });
        }
        text = text.replace(&token, &format!("```\n{raw}\n```"));
    }
    Ok(text)
}

// ── Tidy passes ──────────────────────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

fn ensure_final_newline(input: &str) -> String {
    format!("{}\n", input.trim_end_matches('\n'))
}

//! Single-result conversion session.
//!
//! A [`Session`] models the interactive surface of the converter: one
//! selected file, one busy flag, one stored "last successful result", a
//! displayed preview text, and the notification stack. Front ends (the
//! bundled CLI, a GUI, a web handler) render from this state and drive it
//! through the transition methods.
//!
//! ## Why explicit transitions?
//!
//! `begin_conversion` / `complete_conversion` / `fail_conversion` separate
//! the state machine from the async pipeline work, so the gating rules can
//! be tested synchronously and a front end that runs the pipeline on its
//! own task can still report the outcome back. [`Session::convert`] wires
//! the three together for callers who don't need that split.
//!
//! State rules, enforced here rather than by each front end:
//! * while busy, convert and export actions are refused
//!   ([`Docx2MdError::ConversionInFlight`]);
//! * a pipeline failure clears the stored result and the preview, so a
//!   stale success can never be exported after a failure;
//! * precondition and export errors leave the stored result alone
//!   (see [`Docx2MdError::clears_result`]).

use crate::config::ConversionConfig;
use crate::error::Docx2MdError;
use crate::export;
use crate::notify::NotificationCenter;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Session state for one interactive converter surface.
#[derive(Debug)]
pub struct Session {
    config: ConversionConfig,
    selected: Option<PathBuf>,
    busy: bool,
    /// The single stored result; `None` until a conversion succeeds.
    last_markdown: Option<String>,
    /// What the front end currently shows. Tracks the stored result but may
    /// be edited by the user afterwards.
    displayed: String,
    notifications: NotificationCenter,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(ConversionConfig::default())
    }
}

impl Session {
    pub fn new(config: ConversionConfig) -> Self {
        let ttl = Duration::from_millis(config.notification_ttl_ms);
        Self {
            config,
            selected: None,
            busy: false,
            last_markdown: None,
            displayed: String::new(),
            notifications: NotificationCenter::new(ttl),
        }
    }

    // ── File selection ───────────────────────────────────────────────────

    /// Select the file the next conversion will read.
    pub fn select_file(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        let name = file_name(&path);
        self.notifications.info(format!("Selected {name}"));
        self.selected = Some(path);
    }

    /// Accept a dropped/pasted line of paths; the first one wins.
    ///
    /// Returns the selected path, or `None` when the line held nothing
    /// usable.
    pub fn accept_drop(&mut self, line: &str) -> Option<&Path> {
        let mut paths = parse_dropped_paths(line);
        if paths.is_empty() {
            return None;
        }
        if paths.len() > 1 {
            warn!("Dropped {} files; taking the first", paths.len());
        }
        self.select_file(paths.remove(0));
        self.selected.as_deref()
    }

    pub fn selected_file(&self) -> Option<&Path> {
        self.selected.as_deref()
    }

    // ── State accessors ──────────────────────────────────────────────────

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// The stored result, if the last conversion succeeded.
    pub fn last_markdown(&self) -> Option<&str> {
        self.last_markdown.as_deref()
    }

    /// Text an export would use: the stored result, falling back to the
    /// displayed preview.
    pub fn export_text(&self) -> &str {
        match self.last_markdown {
            Some(ref md) => md,
            None => &self.displayed,
        }
    }

    /// Whether export actions should be offered right now.
    pub fn can_export(&self) -> bool {
        !self.busy && !self.export_text().is_empty()
    }

    pub fn displayed_text(&self) -> &str {
        &self.displayed
    }

    /// Replace the preview text, e.g. after the user edited it.
    pub fn set_displayed_text(&mut self, text: impl Into<String>) {
        self.displayed = text.into();
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    pub fn notifications_mut(&mut self) -> &mut NotificationCenter {
        &mut self.notifications
    }

    // ── Conversion transitions ───────────────────────────────────────────

    /// Enter the busy state and hand back the path to convert.
    ///
    /// Refused while busy or without a selection; neither refusal touches
    /// the stored result.
    pub fn begin_conversion(&mut self) -> Result<PathBuf, Docx2MdError> {
        if self.busy {
            return Err(Docx2MdError::ConversionInFlight);
        }
        let Some(path) = self.selected.clone() else {
            let err = Docx2MdError::NoFileSelected;
            self.notifications.error(summary(&err));
            return Err(err);
        };
        self.busy = true;
        self.notifications
            .info(format!("Converting {}...", file_name(&path)));
        Ok(path)
    }

    /// Store a successful result and leave the busy state.
    pub fn complete_conversion(&mut self, markdown: String) -> &str {
        self.busy = false;
        self.displayed = markdown.clone();
        self.last_markdown = Some(markdown);
        self.notifications.success("Conversion complete");
        self.last_markdown.as_deref().unwrap_or_default()
    }

    /// Leave the busy state after a failure.
    ///
    /// Pipeline failures wipe the stored result and the preview; see
    /// [`Docx2MdError::clears_result`].
    pub fn fail_conversion(&mut self, err: &Docx2MdError) {
        self.busy = false;
        if err.clears_result() {
            self.last_markdown = None;
            self.displayed.clear();
        }
        warn!("Conversion failed: {err}");
        self.notifications.error(summary(err));
    }

    /// Run one conversion on the selected file.
    pub async fn convert(&mut self) -> Result<&str, Docx2MdError> {
        let path = self.begin_conversion()?;
        match crate::convert::convert(&path, &self.config).await {
            Ok(output) => Ok(self.complete_conversion(output.markdown)),
            Err(err) => {
                self.fail_conversion(&err);
                Err(err)
            }
        }
    }

    // ── Exports ──────────────────────────────────────────────────────────

    /// Write the export text to `output`, or to the default location
    /// (`document.md` next to the selected file, else in the working
    /// directory). Returns the path written.
    pub async fn export_file(
        &mut self,
        output: Option<&Path>,
    ) -> Result<PathBuf, Docx2MdError> {
        if self.busy {
            return Err(Docx2MdError::ConversionInFlight);
        }
        let target = match output {
            Some(p) => p.to_path_buf(),
            None => self.default_export_path(),
        };
        let text = self.export_text().to_owned();
        self.notifications.info("Export started");
        match export::write_markdown_file(&text, &target).await {
            Ok(()) => {
                self.notifications
                    .success(format!("Saved {}", target.display()));
                Ok(target)
            }
            Err(err) => {
                self.notifications.error(summary(&err));
                Err(err)
            }
        }
    }

    /// Place the export text on the system clipboard.
    pub async fn copy_to_clipboard(&mut self) -> Result<(), Docx2MdError> {
        if self.busy {
            return Err(Docx2MdError::ConversionInFlight);
        }
        let text = self.export_text().to_owned();
        match export::copy_to_clipboard(&text).await {
            Ok(()) => {
                self.notifications.success("Copied to clipboard");
                Ok(())
            }
            Err(err) => {
                self.notifications.error(format!("Copy failed: {}", summary(&err)));
                Err(err)
            }
        }
    }

    fn default_export_path(&self) -> PathBuf {
        match self.selected.as_deref().and_then(Path::parent) {
            Some(dir) => dir.join(export::EXPORT_FILE_NAME),
            None => PathBuf::from(export::EXPORT_FILE_NAME),
        }
    }

    // ── Reset ────────────────────────────────────────────────────────────

    /// Drop the selection, the stored result, and the preview; return to
    /// idle. Does not cancel a pipeline already running elsewhere.
    pub fn clear(&mut self) {
        self.busy = false;
        self.selected = None;
        self.last_markdown = None;
        self.displayed.clear();
        self.notifications.info("Cleared");
    }
}

/// First display line of an error, for compact notification text.
fn summary(err: &Docx2MdError) -> String {
    err.to_string()
        .lines()
        .next()
        .unwrap_or_default()
        .to_string()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ── Dropped-line parsing ─────────────────────────────────────────────────

/// Parse a dropped/pasted line into file paths.
///
/// Terminals paste drag-and-drop as one line of whitespace-separated paths,
/// shell-quoted when they contain spaces. Handles single/double quotes,
/// backslash escapes, and a `file://` prefix.
pub fn parse_dropped_paths(line: &str) -> Vec<PathBuf> {
    split_quoted(line)
        .into_iter()
        .map(|token| {
            let token = token.strip_prefix("file://").unwrap_or(&token);
            PathBuf::from(token)
        })
        .collect()
}

fn split_quoted(line: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for ch in line.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => current.push(ch),
            None => match ch {
                '\\' => escaped = true,
                '\'' | '"' => quote = Some(ch),
                c if c.is_whitespace() => {
                    if !current.is_empty() {
                        out.push(std::mem::take(&mut current));
                    }
                }
                c => current.push(c),
            },
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NotificationKind;

    #[test]
    fn begin_without_selection_is_refused_and_harmless() {
        let mut session = Session::default();
        session.complete_conversion("# Earlier\n".into());

        let err = session.begin_conversion().unwrap_err();
        assert!(matches!(err, Docx2MdError::NoFileSelected));
        assert!(!session.is_busy());
        assert_eq!(session.export_text(), "# Earlier\n");
        assert!(session.can_export());
        let last = session.notifications().entries().last().unwrap();
        assert_eq!(last.kind, NotificationKind::Error);
        assert!(last.message.contains("No file selected"), "got: {}", last.message);
    }

    #[test]
    fn busy_gate_refuses_second_start_and_exports() {
        let mut session = Session::default();
        session.select_file("/tmp/report.docx");
        session.begin_conversion().unwrap();
        assert!(session.is_busy());
        assert!(!session.can_export());

        assert!(matches!(
            session.begin_conversion(),
            Err(Docx2MdError::ConversionInFlight)
        ));
    }

    #[tokio::test]
    async fn exports_are_refused_while_busy() {
        let mut session = Session::default();
        session.select_file("/tmp/report.docx");
        session.begin_conversion().unwrap();

        assert!(matches!(
            session.export_file(None).await,
            Err(Docx2MdError::ConversionInFlight)
        ));
        assert!(matches!(
            session.copy_to_clipboard().await,
            Err(Docx2MdError::ConversionInFlight)
        ));
    }

    #[test]
    fn failure_clears_a_prior_success() {
        let mut session = Session::default();
        session.select_file("/tmp/report.docx");
        session.begin_conversion().unwrap();
        session.complete_conversion("# Old result\n".into());
        assert!(session.can_export());

        session.begin_conversion().unwrap();
        session.fail_conversion(&Docx2MdError::ExtractionFailed {
            detail: "bad xml".into(),
        });

        assert!(!session.is_busy());
        assert_eq!(session.export_text(), "");
        assert_eq!(session.last_markdown(), None);
        assert!(!session.can_export());
    }

    #[test]
    fn export_failure_keeps_the_stored_result() {
        let mut session = Session::default();
        session.complete_conversion("# Keep me\n".into());

        session.fail_conversion(&Docx2MdError::ExportFailed {
            detail: "clipboard denied".into(),
        });

        assert_eq!(session.export_text(), "# Keep me\n");
        assert!(session.can_export());
    }

    #[test]
    fn clear_resets_everything() {
        let mut session = Session::default();
        session.select_file("/tmp/report.docx");
        session.complete_conversion("# Result\n".into());

        session.clear();

        assert_eq!(session.selected_file(), None);
        assert_eq!(session.last_markdown(), None);
        assert_eq!(session.export_text(), "");
        assert!(!session.can_export());
        assert!(!session.is_busy());
        let last = session.notifications().entries().last().unwrap();
        assert_eq!(last.message, "Cleared");
    }

    #[test]
    fn displayed_text_is_the_export_fallback() {
        let mut session = Session::default();
        session.set_displayed_text("hand-edited text");
        assert_eq!(session.export_text(), "hand-edited text");
        assert!(session.can_export());
    }

    #[tokio::test]
    async fn export_file_writes_the_displayed_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("document.md");
        let mut session = Session::default();
        session.set_displayed_text("edited preview\n");

        let written = session.export_file(Some(&out)).await.unwrap();

        assert_eq!(written, out);
        assert_eq!(
            tokio::fs::read_to_string(&out).await.unwrap(),
            "edited preview\n"
        );
        let last = session.notifications().entries().last().unwrap();
        assert_eq!(last.kind, NotificationKind::Success);
    }

    #[test]
    fn default_export_path_sits_next_to_the_input() {
        let mut session = Session::default();
        session.select_file("/data/in/report.docx");
        assert_eq!(
            session.default_export_path(),
            PathBuf::from("/data/in/document.md")
        );
    }

    #[test]
    fn dropped_line_takes_the_first_path() {
        let mut session = Session::default();
        let picked = session
            .accept_drop("'/tmp/My Report.docx' /tmp/other.docx")
            .unwrap();
        assert_eq!(picked, Path::new("/tmp/My Report.docx"));
    }

    #[test]
    fn dropped_line_parsing_handles_quotes_and_prefixes() {
        assert_eq!(
            parse_dropped_paths("file:///tmp/a.docx"),
            vec![PathBuf::from("/tmp/a.docx")]
        );
        assert_eq!(
            parse_dropped_paths(r#""C:\docs\b.docx""#),
            vec![PathBuf::from(r"C:\docs\b.docx")]
        );
        assert_eq!(
            parse_dropped_paths(r"/tmp/with\ space.docx"),
            vec![PathBuf::from("/tmp/with space.docx")]
        );
        assert!(parse_dropped_paths("   ").is_empty());
    }
}

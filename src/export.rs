//! Export surfaces for a stored conversion result.
//!
//! Two destinations: a Markdown file on disk and the system clipboard. Both
//! take the text to export as-is; deciding *which* text (the stored result
//! or whatever the caller currently displays) belongs to
//! [`crate::session::Session`].

use crate::error::Docx2MdError;
use std::path::Path;
use tracing::{debug, info};

/// File name the export uses when the caller doesn't pick one.
pub const EXPORT_FILE_NAME: &str = "document.md";

/// Media type of the exported artifact.
///
/// The filesystem has no slot for this, but the contract matters to
/// callers forwarding the export over HTTP or into the CLI's JSON envelope.
pub const EXPORT_MIME: &str = "text/markdown;charset=utf-8";

/// Write `text` to `path` byte-for-byte, creating missing parent
/// directories.
///
/// The written file has exactly the bytes of `text`: no trailing newline is
/// added and none is removed, so the artifact stays identical to what the
/// caller displayed. The write is atomic (temp file + rename) so a crash
/// never leaves a partial export behind.
pub async fn write_markdown_file(text: &str, path: &Path) -> Result<(), Docx2MdError> {
    let write_err = |source: std::io::Error| Docx2MdError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, text.as_bytes())
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

    info!("Exported {} bytes to {}", text.len(), path.display());
    Ok(())
}

/// Place `text` on the system clipboard.
///
/// Clipboard access is blocking and platform-dependent, so it runs on the
/// blocking pool. Empty text is allowed; it clears the clipboard.
pub async fn copy_to_clipboard(text: &str) -> Result<(), Docx2MdError> {
    let owned = text.to_owned();
    let len = owned.len();
    tokio::task::spawn_blocking(move || -> Result<(), Docx2MdError> {
        let mut clipboard = arboard::Clipboard::new().map_err(|e| Docx2MdError::ExportFailed {
            detail: format!("clipboard unavailable: {e}"),
        })?;
        clipboard
            .set_text(owned)
            .map_err(|e| Docx2MdError::ExportFailed {
                detail: format!("clipboard write failed: {e}"),
            })
    })
    .await
    .map_err(|e| Docx2MdError::ExportFailed {
        detail: format!("clipboard task failed: {e}"),
    })??;
    debug!("Copied {} bytes to the clipboard", len);
    Ok(())
}

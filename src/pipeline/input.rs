//! Source loading: read a user-selected file fully into a byte buffer.
//!
//! ## Why read the whole file into memory?
//!
//! A DOCX is a ZIP archive, and ZIP puts its central directory at the end,
//! so the container cannot be decoded as a forward-only stream. Documents a
//! person picks interactively are small; one owned buffer per conversion is
//! the model the rest of the pipeline assumes (the buffer belongs to the
//! active request and is dropped when it completes). We validate the ZIP
//! local-file-header signature (`PK\x03\x04`) before handing bytes onward so
//! a PDF or text file renamed to `.docx` fails with a clear message rather
//! than a ZIP error from deep inside extraction.

use crate::error::Docx2MdError;
use std::path::Path;
use tracing::debug;

/// ZIP local-file-header signature; every DOCX starts with it.
pub const DOCX_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// Check whether the buffer starts with the ZIP signature.
pub fn docx_magic_ok(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && bytes[..4] == DOCX_MAGIC
}

/// Validate the ZIP signature, naming the offending file on failure.
pub fn validate_docx_magic(path: &Path, bytes: &[u8]) -> Result<(), Docx2MdError> {
    if docx_magic_ok(bytes) {
        return Ok(());
    }
    let mut magic = [0u8; 4];
    let n = bytes.len().min(4);
    magic[..n].copy_from_slice(&bytes[..n]);
    Err(Docx2MdError::NotADocx {
        path: path.to_path_buf(),
        magic,
    })
}

/// Read the file at `path` fully into memory and validate the ZIP signature.
pub async fn load_docx(path: &Path) -> Result<Vec<u8>, Docx2MdError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => Docx2MdError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => Docx2MdError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;

    validate_docx_magic(path, &bytes)?;
    debug!("Loaded {} bytes from {}", bytes.len(), path.display());
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_accepts_zip_signature() {
        assert!(docx_magic_ok(b"PK\x03\x04rest of archive"));
        assert!(!docx_magic_ok(b"%PDF-1.7"));
        assert!(!docx_magic_ok(b"PK"));
        assert!(!docx_magic_ok(b""));
    }

    #[test]
    fn validate_reports_observed_magic() {
        let err = validate_docx_magic(Path::new("fake.docx"), b"%PDF-1.7").unwrap_err();
        match err {
            Docx2MdError::NotADocx { path, magic } => {
                assert_eq!(path, Path::new("fake.docx"));
                assert_eq!(&magic, b"%PDF");
            }
            other => panic!("expected NotADocx, got: {other}"),
        }
    }

    #[test]
    fn validate_pads_short_input() {
        let err = validate_docx_magic(Path::new("tiny.docx"), b"PK").unwrap_err();
        match err {
            Docx2MdError::NotADocx { magic, .. } => assert_eq!(magic, [0x50, 0x4B, 0, 0]),
            other => panic!("expected NotADocx, got: {other}"),
        }
    }

    #[tokio::test]
    async fn load_missing_file_is_not_found() {
        let err = load_docx(Path::new("/definitely/not/here.docx"))
            .await
            .unwrap_err();
        assert!(matches!(err, Docx2MdError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn load_rejects_wrong_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.docx");
        std::fs::write(&path, b"just some text").unwrap();
        let err = load_docx(&path).await.unwrap_err();
        assert!(matches!(err, Docx2MdError::NotADocx { .. }));
    }
}

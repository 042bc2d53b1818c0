//! Input validation: make sure the path names a readable PDF before pdfium
//! ever sees it.
//!
//! pdfium reports every open failure as an opaque "format error". Checking
//! existence, permissions and the `%PDF` magic bytes up front gives callers
//! a precise DocumentRead error instead.

use crate::error::InvoiceError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Validate a local PDF path and return it as an owned `PathBuf`.
pub fn resolve_input(path: impl AsRef<Path>) -> Result<PathBuf, InvoiceError> {
    let path = path.as_ref().to_path_buf();

    if !path.is_file() {
        return Err(InvoiceError::FileNotFound { path });
    }

    let mut file = match std::fs::File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(InvoiceError::PermissionDenied { path });
        }
        Err(_) => return Err(InvoiceError::FileNotFound { path }),
    };

    // Short files are rejected too: nothing under four bytes can be a PDF.
    let mut magic = [0u8; 4];
    let mut read = 0;
    while read < magic.len() {
        match file.read(&mut magic[read..]) {
            Ok(0) => break,
            Ok(n) => read += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(InvoiceError::CorruptPdf {
                    path,
                    detail: format!("read failed: {e}"),
                })
            }
        }
    }
    if &magic[..read] != b"%PDF" {
        return Err(InvoiceError::NotAPdf {
            path,
            magic: magic[..read].to_vec(),
        });
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}

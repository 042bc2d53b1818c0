//! Error types for the edgequake-invoice library.
//!
//! Every failure is fatal for a single-shot extraction, so there is one error
//! type, [`InvoiceError`]. Its variants are fine-grained (so messages can carry
//! an actionable hint) and each one belongs to exactly one [`ErrorKind`]:
//!
//! | Kind | Raised when | Exit code |
//! |------|-------------|-----------|
//! | [`ErrorKind::DocumentRead`] | file missing, unreadable, not a PDF, locked | 1 |
//! | [`ErrorKind::Render`] | pdfium unavailable, zero pages, page render/encode failed | 1 |
//! | [`ErrorKind::ServiceUnavailable`] | transport, timeout, auth or HTTP failure | 2 |
//! | [`ErrorKind::SchemaViolation`] | reply cannot be mapped onto the Invoice schema | 2 |
//! | [`ErrorKind::Config`] | invalid or missing configuration | 2 |

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of an [`InvoiceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DocumentRead,
    Render,
    ServiceUnavailable,
    SchemaViolation,
    Config,
}

impl ErrorKind {
    /// Process exit code for this kind: `1` for document problems, `2` for
    /// everything on the service side of the pipeline.
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::DocumentRead | ErrorKind::Render => 1,
            ErrorKind::ServiceUnavailable | ErrorKind::SchemaViolation | ErrorKind::Config => 2,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::DocumentRead => "DocumentReadError",
            ErrorKind::Render => "RenderError",
            ErrorKind::ServiceUnavailable => "ServiceUnavailableError",
            ErrorKind::SchemaViolation => "SchemaViolationError",
            ErrorKind::Config => "ConfigError",
        };
        f.write_str(name)
    }
}

/// All errors returned by the edgequake-invoice library.
#[derive(Debug, Error)]
pub enum InvoiceError {
    // ── Document errors ───────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: Vec<u8> },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    // ── Render errors ─────────────────────────────────────────────────────
    /// The document opened but has no page to rasterise.
    #[error("PDF '{path}' has no pages; nothing to rasterise")]
    NoPages { path: PathBuf },

    /// pdfium-render returned an error for the first page.
    #[error("Rasterisation of page 1 failed: {detail}")]
    RasterisationFailed { detail: String },

    /// The rendered bitmap could not be PNG-encoded.
    #[error("Image encoding failed: {detail}")]
    EncodingFailed { detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium (or pass --pdfium-lib) to use a specific copy,\n\
or install pdfium where the system loader can find it.\n\
Pre-built libraries: https://github.com/bblanchon/pdfium-binaries/releases"
    )]
    PdfiumBindingFailed(String),

    // ── Service errors ────────────────────────────────────────────────────
    /// The completion endpoint could not be reached.
    #[error("Completion service at '{endpoint}' is unavailable: {reason}")]
    ServiceUnavailable { endpoint: String, reason: String },

    /// The completion call exceeded the configured timeout.
    #[error("Completion service call timed out after {secs}s ('{endpoint}')\nIncrease --api-timeout.")]
    ServiceTimeout { endpoint: String, secs: u64 },

    /// The service rejected the credential (401/403).
    #[error("Authentication error from '{endpoint}': {detail}\nCheck AZURE_OPENAI_API_KEY.")]
    AuthError { endpoint: String, detail: String },

    /// Any other non-success HTTP status.
    #[error("Completion service returned HTTP {status}: {body}")]
    ServiceRejected { status: u16, body: String },

    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Schema errors ─────────────────────────────────────────────────────
    /// The reply could not be mapped onto the Invoice schema.
    #[error("Response does not match the Invoice schema: {detail}")]
    SchemaViolation { detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or backend validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl InvoiceError {
    /// The category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            InvoiceError::FileNotFound { .. }
            | InvoiceError::PermissionDenied { .. }
            | InvoiceError::NotAPdf { .. }
            | InvoiceError::CorruptPdf { .. }
            | InvoiceError::PasswordRequired { .. }
            | InvoiceError::WrongPassword { .. } => ErrorKind::DocumentRead,

            InvoiceError::NoPages { .. }
            | InvoiceError::RasterisationFailed { .. }
            | InvoiceError::EncodingFailed { .. }
            | InvoiceError::PdfiumBindingFailed(_) => ErrorKind::Render,

            InvoiceError::ServiceUnavailable { .. }
            | InvoiceError::ServiceTimeout { .. }
            | InvoiceError::AuthError { .. }
            | InvoiceError::ServiceRejected { .. }
            | InvoiceError::ProviderNotConfigured { .. } => ErrorKind::ServiceUnavailable,

            InvoiceError::SchemaViolation { .. } => ErrorKind::SchemaViolation,

            InvoiceError::InvalidConfig(_) => ErrorKind::Config,
        }
    }

    /// Shorthand for `self.kind().exit_code()`.
    pub fn exit_code(&self) -> u8 {
        self.kind().exit_code()
    }

    pub(crate) fn schema(detail: impl Into<String>) -> Self {
        InvoiceError::SchemaViolation {
            detail: detail.into(),
        }
    }
}

//! # edgequake-invoice
//!
//! Extract structured invoice data from a scanned PDF using a Vision Language
//! Model.
//!
//! Page 1 of the PDF is rasterised with pdfium, encoded as a base64 PNG and
//! sent, together with a fixed extraction prompt and a JSON Schema of the
//! [`Invoice`] record, to a vision-capable completion service. The JSON the
//! service returns is mapped onto [`Invoice`], where every field is optional
//! and `None` means the model could not see it.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    validate path and %PDF magic bytes
//!  ├─ 2. Render   rasterise page 1 via pdfium (spawn_blocking)
//!  ├─ 3. Encode   PNG → base64 EncodedPage
//!  ├─ 4. Service  one structured completion call (no retry)
//!  └─ 5. Map      service JSON → Invoice (lenient scalar coercion)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_invoice::{build_service, extract_invoice, render_report};
//! use edgequake_invoice::{AzureConfig, ExtractionConfig, ServiceBackend};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let azure = AzureConfig::new(
//!         std::env::var("AZURE_OPENAI_ENDPOINT")?,
//!         std::env::var("AZURE_OPENAI_API_KEY")?,
//!     );
//!     let service = build_service(&ServiceBackend::Azure(azure))?;
//!     let output = extract_invoice("0001.pdf", &ExtractionConfig::default(), service.as_ref()).await?;
//!     print!("{}", render_report(&output.invoice));
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `invoice-extract` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod schema;
pub mod service;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{AzureConfig, ExtractionConfig, ExtractionConfigBuilder, ServiceBackend, StructuredOutputMode};
pub use error::{ErrorKind, InvoiceError};
pub use extract::{extract_from_page, extract_invoice, extract_invoice_sync, rasterize};
pub use model::{Address, CareProvider, Invoice, Service};
pub use output::{render_report, ExtractionOutput, ExtractionStats};
pub use pipeline::encode::EncodedPage;
pub use schema::{map_invoice, SchemaDescriptor};
pub use service::{build_service, StructuredRequest, VisionCompletionService};

//! Extraction entry points.
//!
//! ```text
//! PDF ──▶ rasterize ──▶ EncodedPage ──▶ extract_from_page ──▶ Invoice
//!         (page 1)      (base64 PNG)    (one service call)
//! ```
//!
//! Both stages run strictly one after the other. The service is called exactly
//! once; there is no retry, and no partial result is ever returned.

use crate::config::ExtractionConfig;
use crate::error::InvoiceError;
use crate::model::Invoice;
use crate::output::{ExtractionOutput, ExtractionStats};
use crate::pipeline::encode::{self, EncodedPage};
use crate::pipeline::{input, render};
use crate::prompts::{DEFAULT_SYSTEM_PROMPT, EXTRACTION_TEMPERATURE, USER_INSTRUCTION};
use crate::schema::{map_invoice, SchemaDescriptor};
use crate::service::{StructuredRequest, VisionCompletionService};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Rasterise page 1 of `pdf_path` into a base64 PNG.
///
/// # Errors
/// - DocumentRead errors for missing/unreadable/non-PDF/locked files
/// - Render errors when pdfium is unavailable, the document has no pages,
///   or the page cannot be rendered or encoded
pub async fn rasterize(
    pdf_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<EncodedPage, InvoiceError> {
    let path = input::resolve_input(pdf_path)?;
    let image = render::render_first_page(&path, config).await?;
    encode::encode_page(&image).map_err(|e| InvoiceError::EncodingFailed {
        detail: e.to_string(),
    })
}

/// Build the request sent for `page`.
pub fn build_request(page: &EncodedPage, config: &ExtractionConfig) -> StructuredRequest {
    StructuredRequest {
        system_prompt: config
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        user_text: USER_INSTRUCTION.to_string(),
        image: page.clone(),
        schema: SchemaDescriptor::invoice(),
        temperature: EXTRACTION_TEMPERATURE,
        max_tokens: config.max_tokens,
    }
}

/// Send one encoded page to `service` and map the reply onto an [`Invoice`].
pub async fn extract_from_page(
    page: &EncodedPage,
    config: &ExtractionConfig,
    service: &dyn VisionCompletionService,
) -> Result<Invoice, InvoiceError> {
    let request = build_request(page, config);

    debug!("extraction state: NotStarted → InFlight ({})", service.name());
    let payload = match service.complete(&request).await {
        Ok(p) => p,
        Err(e) => {
            warn!("extraction state: InFlight → Failed ({})", e.kind());
            return Err(e);
        }
    };

    match map_invoice(&payload) {
        Ok(invoice) => {
            debug!(
                "extraction state: InFlight → Succeeded ({} services)",
                invoice.service_count()
            );
            if invoice.is_empty() {
                warn!("Model returned no values for any invoice field");
            }
            Ok(invoice)
        }
        Err(e) => {
            warn!("extraction state: InFlight → Failed ({})", e.kind());
            Err(e)
        }
    }
}

/// Extract an invoice from the first page of a PDF.
///
/// This is the primary entry point for the library.
///
/// # Example
/// ```rust,no_run
/// use edgequake_invoice::{build_service, extract_invoice, AzureConfig, ExtractionConfig, ServiceBackend};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = ServiceBackend::Azure(AzureConfig::new(
///     "https://my-resource.openai.azure.com",
///     "my-key",
/// ));
/// let service = build_service(&backend)?;
/// let output = extract_invoice("0001.pdf", &ExtractionConfig::default(), service.as_ref()).await?;
/// println!("{:?}", output.invoice.total_amount);
/// # Ok(())
/// # }
/// ```
pub async fn extract_invoice(
    pdf_path: impl AsRef<Path>,
    config: &ExtractionConfig,
    service: &dyn VisionCompletionService,
) -> Result<ExtractionOutput, InvoiceError> {
    let total_start = Instant::now();
    let pdf_path = pdf_path.as_ref();
    info!("Starting extraction: {}", pdf_path.display());

    // ── Stage 1: Rasterise ───────────────────────────────────────────────
    let render_start = Instant::now();
    let page = rasterize(pdf_path, config).await?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;
    info!(
        "Rasterised page 1 ({}x{} px) in {}ms",
        page.width, page.height, render_duration_ms
    );

    // ── Stage 2: Extract ─────────────────────────────────────────────────
    let service_start = Instant::now();
    let invoice = extract_from_page(&page, config, service).await?;
    let service_duration_ms = service_start.elapsed().as_millis() as u64;

    let stats = ExtractionStats {
        service: service.name().to_string(),
        image_width: page.width,
        image_height: page.height,
        encoded_bytes: page.encoded_len(),
        render_duration_ms,
        service_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!("Extraction complete in {}ms", stats.total_duration_ms);

    Ok(ExtractionOutput { invoice, stats })
}

/// Synchronous wrapper around [`extract_invoice`].
///
/// Creates a current-thread tokio runtime internally.
pub fn extract_invoice_sync(
    pdf_path: impl AsRef<Path>,
    config: &ExtractionConfig,
    service: &dyn VisionCompletionService,
) -> Result<ExtractionOutput, InvoiceError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| InvoiceError::InvalidConfig(format!("Failed to create tokio runtime: {e}")))?
        .block_on(extract_invoice(pdf_path, config, service))
}

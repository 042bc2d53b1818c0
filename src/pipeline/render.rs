//! PDF rasterisation: render page 1 to a `DynamicImage` via pdfium.
//!
//! pdfium keeps thread-local state and blocks, so all of it runs inside
//! `tokio::task::spawn_blocking`.
//!
//! Only the first page is rendered. Later pages are counted and logged but
//! never rasterised.

use crate::config::ExtractionConfig;
use crate::error::InvoiceError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Rasterise the first page of a PDF.
pub async fn render_first_page(
    pdf_path: &Path,
    config: &ExtractionConfig,
) -> Result<DynamicImage, InvoiceError> {
    let path = pdf_path.to_path_buf();
    let dpi = config.dpi;
    let max_pixels = config.max_rendered_pixels;
    let password = config.password.clone();
    let lib_path = config.pdfium_lib_path.clone();

    tokio::task::spawn_blocking(move || {
        render_first_page_blocking(&path, dpi, max_pixels, password.as_deref(), lib_path.as_deref())
    })
    .await
    .map_err(|e| InvoiceError::RasterisationFailed {
        detail: format!("render task panicked: {e}"),
    })?
}

/// Bind to pdfium, either at an explicit path or through the system loader.
///
/// A directory is accepted too; the platform library name is appended.
pub fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, InvoiceError> {
    let bindings = match lib_path {
        Some(p) => {
            let file = platform_library_path(p);
            debug!("Binding pdfium from {}", file.display());
            Pdfium::bind_to_library(&file)
        }
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| InvoiceError::PdfiumBindingFailed(e.to_string()))?;

    Ok(Pdfium::new(bindings))
}

fn platform_library_path(p: &Path) -> PathBuf {
    if p.is_dir() {
        p.join(format!(
            "{}pdfium{}",
            std::env::consts::DLL_PREFIX,
            std::env::consts::DLL_SUFFIX
        ))
    } else {
        p.to_path_buf()
    }
}

/// Blocking implementation of page rendering.
fn render_first_page_blocking(
    pdf_path: &Path,
    dpi: u32,
    max_pixels: u32,
    password: Option<&str>,
    lib_path: Option<&Path>,
) -> Result<DynamicImage, InvoiceError> {
    let pdfium = bind_pdfium(lib_path)?;

    let document = pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                InvoiceError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                InvoiceError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            InvoiceError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    if total_pages == 0 {
        return Err(InvoiceError::NoPages {
            path: pdf_path.to_path_buf(),
        });
    }
    if total_pages > 1 {
        warn!(
            "Only page 1 is extracted; ignoring {} further page(s)",
            total_pages - 1
        );
    }

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(dpi as f32 / 72.0)
        .set_maximum_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let page = pages.get(0).map_err(|e| InvoiceError::RasterisationFailed {
        detail: format!("{:?}", e),
    })?;

    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| InvoiceError::RasterisationFailed {
            detail: format!("{:?}", e),
        })?;

    let image = bitmap.as_image();
    if image.width() == 0 || image.height() == 0 {
        return Err(InvoiceError::RasterisationFailed {
            detail: "pdfium produced an empty bitmap".into(),
        });
    }
    debug!(
        "Rendered page 1 at {} DPI → {}x{} px",
        dpi,
        image.width(),
        image.height()
    );

    Ok(image)
}

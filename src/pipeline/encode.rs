//! Image encoding: `DynamicImage` → base64 PNG wrapped in [`EncodedPage`].
//!
//! Vision APIs accept images as base64 data URIs inside the JSON request
//! body. PNG keeps the scan lossless, so digits in amounts and dates are not
//! smeared by compression artefacts.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// A rasterised page ready to embed in a completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPage {
    /// Standard (padded) base64 of the PNG bytes.
    pub base64: String,
    /// Always `image/png`.
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
}

impl EncodedPage {
    /// `data:image/png;base64,…` URI for an `image_url` content part.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64)
    }

    /// Length of the base64 payload in bytes.
    pub fn encoded_len(&self) -> usize {
        self.base64.len()
    }
}

/// Encode a rasterised page as a base64 PNG.
pub fn encode_page(img: &DynamicImage) -> Result<EncodedPage, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded image → {} bytes base64", b64.len());

    Ok(EncodedPage {
        base64: b64,
        mime_type: "image/png".to_string(),
        width: img.width(),
        height: img.height(),
    })
}

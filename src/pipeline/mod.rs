//! Rasterizer stages.
//!
//! ```text
//! input ──▶ render ──▶ encode
//! (path)    (pdfium)   (base64 PNG)
//! ```
//!
//! 1. [`input`]  — check the path is a readable file starting with `%PDF`
//! 2. [`render`] — rasterise page 1; runs in `spawn_blocking` because pdfium
//!    is not async-safe
//! 3. [`encode`] — PNG-encode and base64-wrap the image for the request body
//!
//! [`crate::extract::rasterize`] runs the three in order.

pub mod encode;
pub mod input;
pub mod render;

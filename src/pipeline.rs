//! End-to-end build: encode, render, overlay, flatten.

use crate::error::Result;
use crate::logo::{self, LogoSpec, OcclusionBudget};
use crate::qrcode::{QrCode, QrCodeEcc, Version};
use crate::render::{self, RenderOptions};
use image::RgbImage;
use tracing::info;

/// Builds an opaque QR Code image for `payload`.
///
/// Runs [`QrCode::encode`], [`render::render`], then [`logo::overlay`] when a logo is
/// given, and finally flattens the result onto white. The first failing stage's error is
/// returned as-is.
///
/// # Example
///
/// ```rust
/// use qrmark::pipeline::build;
/// use qrmark::qrcode::QrCodeEcc;
/// use qrmark::render::RenderOptions;
///
/// let img = build(b"https://example.com", QrCodeEcc::Medium, &RenderOptions::default(), None, None)
///     .unwrap();
/// assert_eq!(img.width(), img.height());
/// ```
pub fn build(
    payload: &[u8],
    level: QrCodeEcc,
    options: &RenderOptions,
    version: Option<Version>,
    logo: Option<&LogoSpec>,
) -> Result<RgbImage> {
    let qr = QrCode::encode(payload, level, version)?;
    let mut image = render::render(&qr, options)?;
    if let Some(spec) = logo {
        let budget = OcclusionBudget::new(&qr, options)?;
        image = logo::overlay(&image, spec, &budget)?;
    }
    let image = logo::flatten(&image);
    info!(
        version = qr.version().value(),
        %level,
        mask = qr.mask().value(),
        width = image.width(),
        logo = logo.is_some(),
        "built QR code"
    );
    Ok(image)
}

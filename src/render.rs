//! Rasterizes a [`QrCode`] into an RGBA pixel buffer.

use crate::error::{QrError, Result};
use crate::qrcode::QrCode;
use image::{ImageBuffer, Rgba, RgbaImage};
use tracing::debug;

pub const DARK: Rgba<u8> = Rgba([0, 0, 0, 255]);
pub const LIGHT: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Largest RGBA buffer [`render`] will allocate, in bytes (1 GiB).
pub const MAX_IMAGE_BYTES: u64 = 1 << 30;

/// Pixel geometry of a rendered symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Pixels per module edge; must be at least 1.
    pub module_size: u32,
    /// Light quiet zone around the symbol, in modules.
    pub border: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            module_size: 10,
            border: 4,
        }
    }
}

impl RenderOptions {
    pub fn new(module_size: u32, border: u32) -> Self {
        Self {
            module_size,
            border,
        }
    }

    /// Side length in pixels of a rendered symbol with `modules` modules per side,
    /// border included.
    ///
    /// Fails with [`QrError::InvalidDimensions`] when the side overflows a `u32` or the
    /// RGBA buffer would exceed [`MAX_IMAGE_BYTES`].
    pub fn image_side(&self, modules: u32) -> Result<u32> {
        self.validate()?;
        let side = self
            .border
            .checked_mul(2)
            .and_then(|b| b.checked_add(modules))
            .and_then(|m| m.checked_mul(self.module_size))
            .ok_or_else(|| {
                QrError::InvalidDimensions(format!(
                    "{modules} modules with a {}-module border at {} px per module overflows",
                    self.border, self.module_size
                ))
            })?;
        let bytes = u64::from(side) * u64::from(side) * 4;
        if bytes > MAX_IMAGE_BYTES {
            return Err(QrError::InvalidDimensions(format!(
                "a {side}x{side} px image needs {bytes} bytes, more than the {MAX_IMAGE_BYTES} allowed"
            )));
        }
        Ok(side)
    }

    /// Side length in pixels of the symbol itself, border excluded.
    pub fn symbol_side(&self, modules: u32) -> Result<u32> {
        self.validate()?;
        modules.checked_mul(self.module_size).ok_or_else(|| {
            QrError::InvalidDimensions(format!(
                "{modules} modules at {} px per module overflows",
                self.module_size
            ))
        })
    }

    fn validate(&self) -> Result<()> {
        if self.module_size < 1 {
            return Err(QrError::InvalidDimensions(
                "module size must be at least 1 px".to_string(),
            ));
        }
        Ok(())
    }
}

/// Converts a QR Code into an opaque black-on-white image.
///
/// Every module becomes a `module_size` square block, surrounded by `border` light
/// modules on each side. The output depends only on the arguments.
///
/// # Errors
///
/// Returns [`QrError::InvalidDimensions`] if `module_size` is 0 or the image side would
/// not fit in a `u32`.
///
/// # Example
///
/// ```rust
/// use qrmark::qrcode::{QrCode, QrCodeEcc};
/// use qrmark::render::{render, RenderOptions};
///
/// let qr = QrCode::encode(b"Hello, World!", QrCodeEcc::Low, None).unwrap();
/// let img = render(&qr, &RenderOptions::default()).unwrap();
/// assert_eq!(img.dimensions(), (290, 290));
/// ```
pub fn render(qr: &QrCode, options: &RenderOptions) -> Result<RgbaImage> {
    let side = options.image_side(qr.size() as u32)?;
    let border = options.border as i64;
    let module_size = options.module_size;

    let img = ImageBuffer::from_fn(side, side, |x, y| {
        let qr_x = i64::from(x / module_size) - border;
        let qr_y = i64::from(y / module_size) - border;
        let dark = i32::try_from(qr_x)
            .ok()
            .zip(i32::try_from(qr_y).ok())
            .is_some_and(|(qx, qy)| qr.get_module(qx, qy));
        if dark {
            DARK
        } else {
            LIGHT
        }
    });
    debug!(
        side,
        modules = qr.size(),
        module_size,
        border = options.border,
        "rendered symbol"
    );
    Ok(img)
}

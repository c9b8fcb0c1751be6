//! Logo overlay: resize, backing plate, centered alpha compositing.
//!
//! A logo hides the modules underneath it, so the symbol only survives if the error
//! correction can rebuild them. [`OcclusionBudget`] maps the plate onto the module grid
//! and [`overlay`] refuses it with [`QrError::LogoTooLarge`] when it would:
//!
//! - cover more than the level's [safe-occlusion percentage](QrCodeEcc::safe_occlusion_percent)
//!   of the symbol area,
//! - touch the quiet zone or any module a reader needs to locate the grid, or
//! - hide more codewords of any one block than Reed-Solomon can correct.
//!
//! Every module the plate touches, even partially, counts as lost.
//!
//! | Step | How |
//! |---|---|
//! | Decode | `image::ImageReader` with content sniffing |
//! | Resize | `image::imageops::resize`, `Lanczos3`, shorter side = target |
//! | Plate | white at alpha 220, logo pasted with its own alpha as mask |
//! | Composite | Porter-Duff "over" at the floor-centered position |

use crate::error::{Occlusion, QrError, Result};
use crate::qrcode::{ModuleLayout, ModuleRole, QrCode, QrCodeEcc};
use crate::render::RenderOptions;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageError, ImageReader, Rgb, RgbImage, Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default length of the logo's shorter side, in pixels.
pub const DEFAULT_LOGO_SIZE: u32 = 64;
/// Default plate margin around the logo, in pixels.
pub const DEFAULT_PLATE_PADDING: u32 = 6;

/// Backing plate color: white at ~86% opacity.
pub const PLATE_COLOR: Rgba<u8> = Rgba([255, 255, 255, 220]);

/// Where the logo pixels come from.
#[derive(Debug, Clone)]
pub enum LogoSource {
    /// An image file, decoded when the overlay is applied.
    File(PathBuf),
    /// An image already in memory.
    Image(DynamicImage),
}

/// A logo to place at the center of a rendered symbol.
#[derive(Debug, Clone)]
pub struct LogoSpec {
    pub source: LogoSource,
    /// Target length of the logo's shorter side, in pixels.
    pub target_size: u32,
    /// Plate margin around the resized logo on every side, in pixels.
    pub padding: u32,
}

impl LogoSpec {
    /// A logo read from `path`, with default size and padding.
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            source: LogoSource::File(path.into()),
            target_size: DEFAULT_LOGO_SIZE,
            padding: DEFAULT_PLATE_PADDING,
        }
    }

    /// A logo from an in-memory image, with default size and padding.
    pub fn from_image(image: DynamicImage) -> Self {
        Self {
            source: LogoSource::Image(image),
            target_size: DEFAULT_LOGO_SIZE,
            padding: DEFAULT_PLATE_PADDING,
        }
    }

    /// Sets the length of the resized logo's shorter side.
    pub fn with_target_size(mut self, target_size: u32) -> Self {
        self.target_size = target_size;
        self
    }

    /// Sets the plate margin around the logo.
    pub fn with_padding(mut self, padding: u32) -> Self {
        self.padding = padding;
        self
    }

    fn load(&self) -> Result<RgbaImage> {
        match &self.source {
            LogoSource::File(path) => load_logo(path),
            LogoSource::Image(image) => Ok(image.to_rgba8()),
        }
    }
}

/// How much of one rendered symbol a plate may hide.
#[derive(Debug, Clone)]
pub struct OcclusionBudget {
    level: QrCodeEcc,
    layout: ModuleLayout,
    module_size: u32,
    border: u32,
}

impl OcclusionBudget {
    /// Budget for `qr` rendered with `options`.
    ///
    /// Fails with [`QrError::InvalidDimensions`] for options [`render`](crate::render::render)
    /// would reject.
    pub fn new(qr: &QrCode, options: &RenderOptions) -> Result<Self> {
        options.symbol_side(qr.size() as u32)?;
        Ok(Self {
            level: qr.error_correction_level(),
            layout: qr.layout(),
            module_size: options.module_size,
            border: options.border,
        })
    }

    pub fn level(&self) -> QrCodeEcc {
        self.level
    }

    /// Largest plate area, in square pixels, this budget accepts.
    ///
    /// The base is the symbol itself, quiet zone excluded.
    pub fn limit(&self) -> u64 {
        let side = u64::from(self.module_size) * self.layout.size() as u64;
        side * side * u64::from(self.level.safe_occlusion_percent()) / 100
    }

    /// Checks a `plate` (width, height) whose top-left corner sits at `origin` in image
    /// pixels, quiet zone included.
    ///
    /// # Errors
    ///
    /// [`QrError::LogoTooLarge`] naming the first limit the plate breaks.
    pub fn check(&self, origin: (i64, i64), plate: (u32, u32)) -> Result<()> {
        let (width, height) = plate;
        let reject = |occlusion: Occlusion| {
            warn!(level = %self.level, width, height, %occlusion, "logo plate refused");
            Err(QrError::LogoTooLarge {
                level: self.level,
                width,
                height,
                occlusion,
            })
        };

        let plate_area = u64::from(width) * u64::from(height);
        let limit = self.limit();
        if plate_area > limit {
            return reject(Occlusion::Area { plate_area, limit });
        }
        if plate_area == 0 {
            return Ok(());
        }

        let mut hidden = vec![false; self.layout.codeword_count()];
        for y in self.covered_modules(origin.1, height) {
            for x in self.covered_modules(origin.0, width) {
                match self.layout.role(x, y) {
                    // Outside the symbol is quiet zone.
                    Some(ModuleRole::Locator) | None => return reject(Occlusion::Locator),
                    Some(ModuleRole::Codeword(k)) => hidden[k] = true,
                    Some(ModuleRole::Alignment | ModuleRole::Remainder) => {}
                }
            }
        }

        let mut per_block = vec![0usize; self.layout.block_count()];
        for k in (0..hidden.len()).filter(|&k| hidden[k]) {
            per_block[self.layout.block_of(k)] += 1;
        }
        let correctable = self.layout.correctable_per_block();
        if let Some((block, &count)) = per_block.iter().enumerate().max_by_key(|&(_, n)| *n) {
            if count > correctable {
                return reject(Occlusion::Codewords {
                    block,
                    hidden: count,
                    correctable,
                });
            }
            debug!(worst_block = block, hidden = count, correctable, "plate within budget");
        }
        Ok(())
    }

    /// Module indices, along one axis, touched by `len` pixels starting at pixel `start`.
    fn covered_modules(&self, start: i64, len: u32) -> std::ops::RangeInclusive<i32> {
        let size = i64::from(self.module_size);
        let border = i64::from(self.border);
        let first = start.div_euclid(size) - border;
        let last = (start + i64::from(len) - 1).div_euclid(size) - border;
        let clamp = |m: i64| m.clamp(-1, self.layout.size() as i64) as i32;
        clamp(first)..=clamp(last)
    }
}

/// Loads a logo from disk as RGBA.
///
/// # Errors
///
/// - [`QrError::LogoNotFound`] if nothing exists at `path`.
/// - [`QrError::UnsupportedImageFormat`] if the file cannot be decoded.
pub fn load_logo(path: &Path) -> Result<RgbaImage> {
    if !path.exists() {
        return Err(QrError::LogoNotFound(path.to_path_buf()));
    }
    let unsupported = |reason: String| QrError::UnsupportedImageFormat {
        path: path.to_path_buf(),
        reason,
    };
    let image = ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| match e {
            ImageError::IoError(io) => QrError::Io(io),
            other => unsupported(other.to_string()),
        })?;
    debug!(path = %path.display(), width = image.width(), height = image.height(), "loaded logo");
    Ok(image.to_rgba8())
}

/// Dimensions of a `source` image scaled so its shorter side equals `short_edge`.
///
/// The longer side scales proportionally, rounded down, and never drops below 1 px.
/// Fails with [`QrError::InvalidDimensions`] if it would not fit in a `u32`.
pub fn scaled_dimensions(source: (u32, u32), short_edge: u32) -> Result<(u32, u32)> {
    let (w, h) = source;
    let scale = |long: u32, short: u32| {
        let scaled = ((u64::from(long) * u64::from(short_edge)) / u64::from(short.max(1))).max(1);
        u32::try_from(scaled).map_err(|_| {
            QrError::InvalidDimensions(format!(
                "a {w}x{h} logo scaled to {short_edge} px is {scaled} px long"
            ))
        })
    };
    if w <= h {
        Ok((short_edge, scale(h, w)?))
    } else {
        Ok((scale(w, h)?, short_edge))
    }
}

/// Plate dimensions for a resized logo of `logo` size with `padding` on every side.
pub fn plate_dimensions(logo: (u32, u32), padding: u32) -> Result<(u32, u32)> {
    let grow = |side: u32| {
        padding
            .checked_mul(2)
            .and_then(|p| p.checked_add(side))
            .ok_or_else(|| QrError::InvalidDimensions(format!("logo padding {padding} overflows")))
    };
    Ok((grow(logo.0)?, grow(logo.1)?))
}

/// Top-left corner that centers a `plate` on a `base`, rounding toward the top-left.
pub fn plate_origin(base: (u32, u32), plate: (u32, u32)) -> (i64, i64) {
    (
        (i64::from(base.0) - i64::from(plate.0)).div_euclid(2),
        (i64::from(base.1) - i64::from(plate.1)).div_euclid(2),
    )
}

/// Builds the backing plate: a [`PLATE_COLOR`] rectangle with `logo` pasted at
/// `(padding, padding)`, blended through the logo's own alpha channel.
pub fn build_plate(logo: &RgbaImage, padding: u32) -> Result<RgbaImage> {
    let (width, height) = plate_dimensions(logo.dimensions(), padding)?;
    let mut plate = RgbaImage::from_pixel(width, height, PLATE_COLOR);
    for (x, y, src) in logo.enumerate_pixels() {
        let dst = plate.get_pixel_mut(x + padding, y + padding);
        *dst = blend_masked(*dst, *src);
    }
    Ok(plate)
}

/// Resizes the logo, builds its plate and composites it at the center of `image`.
///
/// # Errors
///
/// - [`QrError::InvalidDimensions`] for a zero target size.
/// - [`QrError::LogoTooLarge`] if the plate breaks `budget`; checked before resizing.
/// - [`QrError::LogoNotFound`] / [`QrError::UnsupportedImageFormat`] from loading.
///
/// `budget` must describe the symbol drawn in `image`.
pub fn overlay(image: &RgbaImage, spec: &LogoSpec, budget: &OcclusionBudget) -> Result<RgbaImage> {
    if spec.target_size == 0 {
        return Err(QrError::InvalidDimensions(
            "logo size must be at least 1 px".to_string(),
        ));
    }
    let logo = spec.load()?;
    let (logo_w, logo_h) = scaled_dimensions(logo.dimensions(), spec.target_size)?;
    let (plate_w, plate_h) = plate_dimensions((logo_w, logo_h), spec.padding)?;
    let (x, y) = plate_origin(image.dimensions(), (plate_w, plate_h));
    budget.check((x, y), (plate_w, plate_h))?;

    let resized = imageops::resize(&logo, logo_w, logo_h, FilterType::Lanczos3);
    let plate = build_plate(&resized, spec.padding)?;
    debug!(plate_w, plate_h, x, y, "placing logo plate");

    let mut out = image.clone();
    composite_over(&mut out, &plate, x, y);
    Ok(out)
}

/// Alpha-composites `top` over `base` with its top-left corner at `(x, y)`.
///
/// Pixels falling outside `base` are dropped.
pub fn composite_over(base: &mut RgbaImage, top: &RgbaImage, x: i64, y: i64) {
    let (bw, bh) = (i64::from(base.width()), i64::from(base.height()));
    for (tx, ty, src) in top.enumerate_pixels() {
        let (px, py) = (x + i64::from(tx), y + i64::from(ty));
        if !(0..bw).contains(&px) || !(0..bh).contains(&py) {
            continue;
        }
        let dst = base.get_pixel_mut(px as u32, py as u32);
        *dst = blend_over(*dst, *src);
    }
}

/// Flattens an RGBA image onto an opaque white background.
pub fn flatten(image: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let Rgba([r, g, b, a]) = *image.get_pixel(x, y);
        let a = u32::from(a);
        let mix = |c: u8| ((u32::from(c) * a + 255 * (255 - a) + 127) / 255) as u8;
        Rgb([mix(r), mix(g), mix(b)])
    })
}

/// Porter-Duff "over": `src` on top of `dst`.
fn blend_over(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let sa = u32::from(src[3]);
    let da = u32::from(dst[3]);
    let inv = 255 - sa;
    // Output alpha scaled by 255.
    let oa = sa * 255 + da * inv;
    if oa == 0 {
        return Rgba([0, 0, 0, 0]);
    }
    let channel = |i: usize| {
        let c = u32::from(src[i]) * sa * 255 + u32::from(dst[i]) * da * inv;
        ((c + oa / 2) / oa) as u8
    };
    Rgba([channel(0), channel(1), channel(2), ((oa + 127) / 255) as u8])
}

/// Blends every channel of `src` into `dst`, weighted by `src`'s alpha.
fn blend_masked(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let m = u32::from(src[3]);
    let mix = |i: usize| ((u32::from(src[i]) * m + u32::from(dst[i]) * (255 - m) + 127) / 255) as u8;
    Rgba([mix(0), mix(1), mix(2), mix(3)])
}

//! # qrmark
//!
//! A Rust library for generating QR codes with a branding logo in the middle.
//!
//! `qrmark` encodes text, URLs or raw JSON into QR Code Model 2 symbols (versions 1 to 40,
//! four error correction levels, byte mode), renders them as pixel images and can place a
//! logo on a light backing plate at the center. The logo is only accepted while its plate
//! leaves the locator patterns clear and hides no more codewords per block than the
//! chosen error correction level can correct.
//!
//! ## Features
//!
//! - Byte-mode encoding with automatic or explicit version selection.
//! - Four error correction levels: Low, Medium, Quartile, High.
//! - Configurable module size and quiet-zone border.
//! - Logo overlay with Lanczos3 resizing, a padded backing plate and alpha compositing,
//!   checked module by module against what error correction can recover.
//! - Typed errors for every failure, no panics on bad input.
//!
//! ## Example
//!
//! Generate a QR code with a logo and save it:
//!
//! ```rust,no_run
//! use qrmark::{build, LogoSpec, QrCodeEcc, RenderOptions};
//!
//! let logo = LogoSpec::from_file("logo.png").with_target_size(40);
//! let img = build(
//!     b"https://example.com",
//!     QrCodeEcc::High,
//!     &RenderOptions::default(),
//!     None,
//!     Some(&logo),
//! )?;
//! img.save("qr.png")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Work with the module matrix directly:
//!
//! ```rust
//! use qrmark::qrcode::{QrCode, QrCodeEcc, Version};
//!
//! let qr = QrCode::encode(b"Hello, World!", QrCodeEcc::Quartile, Some(Version::new(2))).unwrap();
//! assert_eq!(qr.size(), 25);
//! assert!(qr.get_module(0, 0)); // finder pattern corner
//! ```
//!
//! ## Modules
//!
//! - [`capacity`]: Per-version, per-level capacity table.
//! - [`qrcode`]: Core QR code encoding functionality.
//! - [`render`]: Module matrix to pixels.
//! - [`logo`]: Logo loading, backing plate and compositing.
//! - [`pipeline`]: The full encode, render, overlay and flatten sequence.
//! - [`error`]: The shared error type.

pub mod capacity;
pub mod error;
pub mod logo;
pub mod pipeline;
pub mod qrcode;
pub mod render;

pub use error::{Occlusion, QrError, Result};
pub use logo::{LogoSource, LogoSpec};
pub use pipeline::build;
pub use qrcode::{QrCode, QrCodeEcc, Version};
pub use render::RenderOptions;

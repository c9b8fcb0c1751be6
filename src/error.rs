//! Error type shared by every stage of the pipeline.

use crate::qrcode::QrCodeEcc;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can stop a QR code from being built.
///
/// None of these are transient: retrying with the same inputs fails the same way.
#[derive(Error, Debug)]
pub enum QrError {
    #[error("invalid error-correction level `{0}` (expected one of L, M, Q, H)")]
    InvalidLevel(String),

    #[error("invalid version {0} (expected 1 to 40)")]
    InvalidVersion(u32),

    /// An explicit version was requested that cannot hold the payload, although a larger one could.
    #[error(
        "payload of {len} bytes does not fit version {version} at level {level} (capacity {capacity} bytes)"
    )]
    CapacityExceeded {
        version: u8,
        level: QrCodeEcc,
        len: usize,
        capacity: usize,
    },

    /// Not even version 40 can hold the payload at this level.
    #[error("payload of {len} bytes exceeds the maximum of {max} bytes at level {level}")]
    PayloadTooLarge {
        level: QrCodeEcc,
        len: usize,
        max: usize,
    },

    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),

    #[error("logo not found: {}", .0.display())]
    LogoNotFound(PathBuf),

    #[error("unsupported image format for {}: {reason}", path.display())]
    UnsupportedImageFormat { path: PathBuf, reason: String },

    /// The backing plate would hide more of the symbol than the level can recover.
    #[error(
        "logo plate of {width}x{height} px is too large at level {level}: {occlusion}; use a smaller logo or a higher level"
    )]
    LogoTooLarge {
        level: QrCodeEcc,
        width: u32,
        height: u32,
        occlusion: Occlusion,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, QrError>;

/// Which occlusion limit a logo plate broke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Occlusion {
    /// The plate covers more pixels than the level's share of the symbol area.
    Area { plate_area: u64, limit: u64 },
    /// The plate hides modules a reader needs to find the symbol.
    Locator,
    /// More codewords of one block are hidden than Reed-Solomon can correct.
    Codewords {
        block: usize,
        hidden: usize,
        correctable: usize,
    },
}

impl fmt::Display for Occlusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Occlusion::Area { plate_area, limit } => {
                write!(f, "{plate_area} px² exceeds the {limit} px² allowed")
            }
            Occlusion::Locator => write!(f, "it would hide finder, timing or format modules"),
            Occlusion::Codewords {
                block,
                hidden,
                correctable,
            } => write!(
                f,
                "it hides {hidden} codewords of block {block} where only {correctable} can be corrected"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_values() {
        let err = QrError::CapacityExceeded {
            version: 1,
            level: QrCodeEcc::High,
            len: 100,
            capacity: 7,
        };
        assert_eq!(
            err.to_string(),
            "payload of 100 bytes does not fit version 1 at level H (capacity 7 bytes)"
        );

        let err = QrError::LogoNotFound(PathBuf::from("missing.png"));
        assert_eq!(err.to_string(), "logo not found: missing.png");

        let err = QrError::LogoTooLarge {
            level: QrCodeEcc::Medium,
            width: 40,
            height: 30,
            occlusion: Occlusion::Codewords {
                block: 1,
                hidden: 14,
                correctable: 13,
            },
        };
        assert_eq!(
            err.to_string(),
            "logo plate of 40x30 px is too large at level M: it hides 14 codewords of block 1 \
             where only 13 can be corrected; use a smaller logo or a higher level"
        );
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let err: QrError = io.into();
        assert!(matches!(err, QrError::Io(_)));
    }
}

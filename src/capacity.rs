//! Capacity data for every (version, error-correction level) pair.
//!
//! The raw block structure comes from the QR Code Model 2 tables
//! ([`ECC_CODEWORDS_PER_BLOCK`], [`NUM_ERROR_CORRECTION_BLOCKS`]); everything else
//! (data codewords, byte-mode payload capacity) is derived once into a process-wide
//! table on first use and only read afterwards.

use crate::qrcode::{QrCodeEcc, Version};
use std::sync::LazyLock;

/// Error-correction codewords in each block, indexed by `[level][version]`.
pub(crate) static ECC_CODEWORDS_PER_BLOCK: [[i8; 41]; 4] = [
    [
        -1, 7, 10, 15, 20, 26, 18, 20, 24, 30, 18, 20, 24, 26, 30, 22, 24, 28, 30, 28, 28, 28, 28, 30,
        30, 26, 28, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ], // Low
    [
        -1, 10, 16, 26, 18, 24, 16, 18, 22, 22, 26, 30, 22, 22, 24, 24, 28, 28, 26, 26, 26, 26, 28, 28,
        28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28,
    ], // Medium
    [
        -1, 13, 22, 18, 26, 18, 24, 18, 22, 20, 24, 28, 26, 24, 20, 30, 24, 28, 28, 26, 30, 28, 30, 30,
        30, 30, 28, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ], // Quartile
    [
        -1, 17, 28, 22, 16, 22, 28, 26, 26, 24, 28, 24, 28, 22, 24, 24, 30, 28, 28, 26, 28, 30, 24, 30,
        30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ], // High
];

/// Number of error-correction blocks, indexed by `[level][version]`.
pub(crate) static NUM_ERROR_CORRECTION_BLOCKS: [[i8; 41]; 4] = [
    [
        -1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 4, 4, 4, 4, 4, 6, 6, 6, 6, 7, 8, 8, 9, 9, 10, 12, 12, 12,
        13, 14, 15, 16, 17, 18, 19, 19, 20, 21, 22, 24, 25,
    ], // Low
    [
        -1, 1, 1, 1, 2, 2, 4, 4, 4, 5, 5, 5, 8, 9, 9, 10, 10, 11, 13, 14, 16, 17, 17, 18, 20, 21,
        23, 25, 26, 28, 29, 31, 33, 35, 37, 38, 40, 43, 45, 47, 49,
    ], // Medium
    [
        -1, 1, 1, 2, 2, 4, 4, 6, 6, 8, 8, 8, 10, 12, 16, 12, 17, 16, 18, 21, 20, 23, 23, 25, 27, 29,
        34, 34, 35, 38, 40, 43, 45, 48, 51, 53, 56, 59, 62, 65, 68,
    ], // Quartile
    [
        -1, 1, 1, 2, 4, 4, 4, 5, 6, 8, 8, 11, 11, 16, 16, 18, 16, 19, 21, 25, 25, 25, 34, 30, 32, 35,
        37, 40, 42, 45, 48, 51, 54, 57, 60, 63, 66, 70, 74, 77, 81,
    ], // High
];

/// Byte-mode mode indicator length in bits.
const MODE_INDICATOR_BITS: usize = 4;

/// Capacity of one (version, level) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity {
    /// Codewords available for payload, headers and padding.
    pub data_codewords: usize,
    /// Error-correction codewords appended to each block.
    pub ecc_codewords_per_block: usize,
    /// Number of blocks the codewords are split into.
    pub blocks: usize,
    /// Largest byte-mode payload that fits.
    pub max_bytes: usize,
}

impl Capacity {
    const EMPTY: Capacity = Capacity {
        data_codewords: 0,
        ecc_codewords_per_block: 0,
        blocks: 0,
        max_bytes: 0,
    };

    fn compute(ver: Version, ecl: QrCodeEcc) -> Self {
        let ecc_codewords_per_block = table_get(&ECC_CODEWORDS_PER_BLOCK, ver, ecl);
        let blocks = table_get(&NUM_ERROR_CORRECTION_BLOCKS, ver, ecl);
        let data_codewords = num_raw_data_modules(ver) / 8 - ecc_codewords_per_block * blocks;
        let header_bits = MODE_INDICATOR_BITS + usize::from(byte_count_bits(ver));
        Self {
            data_codewords,
            ecc_codewords_per_block,
            blocks,
            max_bytes: (data_codewords * 8 - header_bits) / 8,
        }
    }
}

static TABLE: LazyLock<[[Capacity; 4]; 41]> = LazyLock::new(|| {
    let mut table = [[Capacity::EMPTY; 4]; 41];
    for ver in Version::MIN.value()..=Version::MAX.value() {
        let version = Version::new(ver);
        for ecl in QrCodeEcc::ALL {
            table[usize::from(ver)][ecl.ordinal()] = Capacity::compute(version, ecl);
        }
    }
    table
});

/// Returns the capacity row for the given version and level.
pub fn lookup(ver: Version, ecl: QrCodeEcc) -> Capacity {
    TABLE[usize::from(ver.value())][ecl.ordinal()]
}

/// Returns the largest byte-mode payload, in bytes, that fits the given version and level.
pub fn byte_capacity(ver: Version, ecl: QrCodeEcc) -> usize {
    lookup(ver, ecl).max_bytes
}

/// Returns the smallest version in `minversion..=Version::MAX` that holds `len` payload bytes.
pub fn smallest_version(len: usize, ecl: QrCodeEcc, minversion: Version) -> Option<Version> {
    (minversion.value()..=Version::MAX.value())
        .map(Version::new)
        .find(|&ver| byte_capacity(ver, ecl) >= len)
}

/// Returns the number of modules available for data and error-correction bits,
/// i.e. everything except function patterns and format/version information.
pub fn num_raw_data_modules(ver: Version) -> usize {
    let ver = usize::from(ver.value());
    let mut result: usize = (16 * ver + 128) * ver + 64;
    if ver >= 2 {
        let numalign: usize = ver / 7 + 2;
        result -= (25 * numalign - 10) * numalign - 55;
        if ver >= 7 {
            result -= 36;
        }
    }
    result
}

/// Width of the byte-mode character-count field.
pub(crate) fn byte_count_bits(ver: Version) -> u8 {
    [8, 16, 16][usize::from((ver.value() + 7) / 17)]
}

fn table_get(table: &'static [[i8; 41]; 4], ver: Version, ecl: QrCodeEcc) -> usize {
    table[ecl.ordinal()][usize::from(ver.value())] as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use QrCodeEcc::*;

    #[test]
    fn version_1_byte_capacities() {
        let v1 = Version::new(1);
        assert_eq!(byte_capacity(v1, Low), 17);
        assert_eq!(byte_capacity(v1, Medium), 14);
        assert_eq!(byte_capacity(v1, Quartile), 11);
        assert_eq!(byte_capacity(v1, High), 7);
    }

    #[test]
    fn larger_versions_match_published_capacities() {
        let v10 = Version::new(10);
        assert_eq!(byte_capacity(v10, Low), 271);
        assert_eq!(byte_capacity(v10, Medium), 213);
        assert_eq!(byte_capacity(v10, Quartile), 151);
        assert_eq!(byte_capacity(v10, High), 119);

        assert_eq!(byte_capacity(Version::MAX, Low), 2953);
        assert_eq!(byte_capacity(Version::MAX, Medium), 2331);
        assert_eq!(byte_capacity(Version::MAX, Quartile), 1663);
        assert_eq!(byte_capacity(Version::MAX, High), 1273);
    }

    #[test]
    fn raw_modules_and_codewords() {
        assert_eq!(num_raw_data_modules(Version::new(1)), 208);
        assert_eq!(num_raw_data_modules(Version::new(7)), 1568);
        assert_eq!(num_raw_data_modules(Version::MAX), 29648);

        let row = lookup(Version::new(5), Quartile);
        assert_eq!(row.blocks, 4);
        assert_eq!(row.ecc_codewords_per_block, 18);
        assert_eq!(row.data_codewords, 62);
    }

    #[test]
    fn capacity_grows_with_version_and_shrinks_with_level() {
        for ver in 1..40u8 {
            for ecl in QrCodeEcc::ALL {
                assert!(
                    byte_capacity(Version::new(ver), ecl) < byte_capacity(Version::new(ver + 1), ecl)
                );
            }
            let v = Version::new(ver);
            assert!(byte_capacity(v, Low) > byte_capacity(v, Medium));
            assert!(byte_capacity(v, Medium) > byte_capacity(v, Quartile));
            assert!(byte_capacity(v, Quartile) > byte_capacity(v, High));
        }
    }

    #[test]
    fn smallest_version_boundaries() {
        assert_eq!(smallest_version(0, Medium, Version::MIN), Some(Version::new(1)));
        assert_eq!(smallest_version(14, Medium, Version::MIN), Some(Version::new(1)));
        assert_eq!(smallest_version(15, Medium, Version::MIN), Some(Version::new(2)));
        assert_eq!(smallest_version(2953, Low, Version::MIN), Some(Version::MAX));
        assert_eq!(smallest_version(2954, Low, Version::MIN), None);
        assert_eq!(smallest_version(1, High, Version::new(3)), Some(Version::new(3)));
    }
}

#![forbid(unsafe_code)]
//! QR code encoding functionality.
//!
//! This module turns a byte payload into a QR Code Model 2 symbol: it picks the version,
//! builds the byte-mode bit stream, computes Reed-Solomon error correction, lays out the
//! function patterns, places the codewords and chooses the mask with the lowest penalty.

use crate::capacity::{self, Capacity};
use crate::error::{QrError, Result};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// A QR Code symbol, representing a square grid of dark and light modules.
///
/// The grid includes every function pattern and the masked data and error-correction
/// codewords. Instances are immutable after creation and own their modules.
///
/// # Example
///
/// ```rust
/// use qrmark::qrcode::{QrCode, QrCodeEcc};
///
/// let qr = QrCode::encode(b"Hello, World!", QrCodeEcc::Medium, None).unwrap();
/// assert_eq!(qr.version().value(), 1);
/// assert_eq!(qr.size(), 21);
/// ```
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct QrCode {
    /// The width and height of this QR Code, measured in modules, between
    /// 21 and 177 (inclusive). This is equal to version * 4 + 17.
    size: u8,

    version: Version,
    ecl: QrCodeEcc,
    mask: Mask,

    /// The modules of this QR Code (0 = light, 1 = dark), packed bitwise into bytes.
    /// Accessed through get_module().
    modules: Vec<u8>,
}

impl QrCode {
    /// Encodes a byte payload into a QR code in byte mode.
    ///
    /// With `version` set to `None` the smallest version whose capacity at `ecl` holds the
    /// payload is chosen. With an explicit version the payload must fit that version.
    ///
    /// # Errors
    ///
    /// - [`QrError::CapacityExceeded`] if the explicit version is too small but a larger one
    ///   would do.
    /// - [`QrError::PayloadTooLarge`] if not even version 40 holds the payload.
    pub fn encode(payload: &[u8], ecl: QrCodeEcc, version: Option<Version>) -> Result<Self> {
        let version = Self::select_version(payload.len(), ecl, version)?;
        let datacodewords = Self::encode_data_codewords(payload, ecl, version);
        Ok(Self::encode_codewords(&datacodewords, ecl, version, None))
    }

    /// Encodes UTF-8 text; see [`QrCode::encode`].
    pub fn encode_text(text: &str, ecl: QrCodeEcc, version: Option<Version>) -> Result<Self> {
        Self::encode(text.as_bytes(), ecl, version)
    }

    fn select_version(len: usize, ecl: QrCodeEcc, explicit: Option<Version>) -> Result<Version> {
        let max = capacity::byte_capacity(Version::MAX, ecl);
        if len > max {
            return Err(QrError::PayloadTooLarge {
                level: ecl,
                len,
                max,
            });
        }
        match explicit {
            Some(version) => {
                let capacity = capacity::byte_capacity(version, ecl);
                if len > capacity {
                    return Err(QrError::CapacityExceeded {
                        version: version.value(),
                        level: ecl,
                        len,
                        capacity,
                    });
                }
                debug!(version = version.value(), %ecl, len, "using explicit version");
                Ok(version)
            }
            None => {
                let version = capacity::smallest_version(len, ecl, Version::MIN).ok_or(
                    QrError::PayloadTooLarge {
                        level: ecl,
                        len,
                        max,
                    },
                )?;
                debug!(version = version.value(), %ecl, len, "selected smallest fitting version");
                Ok(version)
            }
        }
    }

    /// Builds the data codewords for a byte-mode segment: mode indicator, character count,
    /// payload, terminator and pad bytes, exactly filling the version's data capacity.
    fn encode_data_codewords(payload: &[u8], ecl: QrCodeEcc, version: Version) -> Vec<u8> {
        let Capacity { data_codewords, .. } = capacity::lookup(version, ecl);
        let datacapacitybits: usize = data_codewords * 8;
        let mut bb = BitBuffer::with_capacity(data_codewords);
        bb.append_bits(MODE_BYTE, 4);
        bb.append_bits(payload.len() as u32, capacity::byte_count_bits(version));
        for &b in payload {
            bb.append_bits(b.into(), 8);
        }
        debug_assert!(bb.len() <= datacapacitybits);

        // Add terminator and pad up to a byte if applicable
        let numzerobits: usize = core::cmp::min(4, datacapacitybits - bb.len());
        bb.append_bits(0, numzerobits as u8);
        let numzerobits: usize = bb.len().wrapping_neg() & 7;
        bb.append_bits(0, numzerobits as u8);
        debug_assert_eq!(bb.len() % 8, 0);

        // Pad with alternating bytes until data capacity is reached
        for &padbyte in [0xec, 0x11].iter().cycle() {
            if bb.len() >= datacapacitybits {
                break;
            }
            bb.append_bits(padbyte, 8);
        }
        bb.into_bytes()
    }

    /// Creates a new QR Code with the given version number,
    /// error correction level, data codeword bytes, and mask number.
    ///
    /// This is the low-level entry point; [`QrCode::encode`] builds the codewords for you.
    /// With `msk` set to `None` every mask is tried and the one with the lowest penalty
    /// score wins (the lowest mask number on ties).
    ///
    /// # Panics
    ///
    /// Panics if `datacodewords` does not hold exactly the data-codeword count of
    /// `version` at `ecl`.
    pub fn encode_codewords(
        datacodewords: &[u8],
        ecl: QrCodeEcc,
        version: Version,
        msk: Option<Mask>,
    ) -> Self {
        let allcodewords = Self::add_ecc_and_interleave(datacodewords, version, ecl);

        // Draw modules
        let mut unmasked = Self::function_modules_marked(version, ecl);
        unmasked.draw_codewords(&allcodewords);
        unmasked.draw_light_function_modules();
        let funcmods = Self::function_modules_marked(version, ecl);

        let result = match msk {
            Some(mask) => unmasked.masked(&funcmods, mask),
            None => choose_mask(&unmasked, &funcmods),
        };
        debug!(
            version = version.value(),
            %ecl,
            mask = result.mask.value(),
            "encoded symbol"
        );
        result
    }

    /// Returns this QR Code's version, in the range [1, 40].
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns this QR Code's size, in the range [21, 177].
    pub fn size(&self) -> i32 {
        i32::from(self.size)
    }

    /// Returns this QR Code's error correction level.
    pub fn error_correction_level(&self) -> QrCodeEcc {
        self.ecl
    }

    /// Returns this QR Code's mask, in the range [0, 7].
    pub fn mask(&self) -> Mask {
        self.mask
    }

    /// Returns the color of the module at the given coordinates.
    ///
    /// Returns `true` for dark modules and `false` for light modules. Coordinates outside the QR
    /// code's bounds return `false`.
    ///
    /// # Arguments
    ///
    /// * `x` - X-coordinate (0 is left).
    /// * `y` - Y-coordinate (0 is top).
    pub fn get_module(&self, x: i32, y: i32) -> bool {
        let range = 0..self.size();
        range.contains(&x) && range.contains(&y) && self.get_module_bounded(x as u8, y as u8)
    }

    fn get_module_bounded(&self, x: u8, y: u8) -> bool {
        let index = usize::from(y) * usize::from(self.size) + usize::from(x);
        get_bit(self.modules[index >> 3].into(), (index & 7) as u8)
    }

    fn set_module_unbounded(&mut self, x: i32, y: i32, isdark: bool) {
        let range = 0..self.size();
        if range.contains(&x) && range.contains(&y) {
            self.set_module_bounded(x as u8, y as u8, isdark);
        }
    }

    fn set_module_bounded(&mut self, x: u8, y: u8, isdark: bool) {
        let index = usize::from(y) * usize::from(self.size) + usize::from(x);
        let byteindex: usize = index >> 3;
        let bitindex: usize = index & 7;
        if isdark {
            self.modules[byteindex] |= 1u8 << bitindex;
        } else {
            self.modules[byteindex] &= !(1u8 << bitindex);
        }
    }

    fn add_ecc_and_interleave(data: &[u8], ver: Version, ecl: QrCodeEcc) -> Vec<u8> {
        let Capacity {
            data_codewords,
            ecc_codewords_per_block: blockecclen,
            blocks: numblocks,
            ..
        } = capacity::lookup(ver, ecl);
        assert_eq!(data.len(), data_codewords, "Invalid data codeword count");
        let rawcodewords: usize = capacity::num_raw_data_modules(ver) / 8;
        let numshortblocks: usize = numblocks - (rawcodewords % numblocks);
        let shortblockdatalen: usize = rawcodewords / numblocks - blockecclen;

        let mut result = vec![0u8; rawcodewords];
        let rs = ReedSolomonGenerator::new(blockecclen);
        let mut ecc = vec![0u8; blockecclen];
        let mut dat: &[u8] = data;
        for i in 0..numblocks {
            let datlen: usize = shortblockdatalen + usize::from(i >= numshortblocks);
            rs.compute_remainder(&dat[..datlen], &mut ecc);
            let mut k: usize = i;
            for (j, &b) in dat[..datlen].iter().enumerate() {
                if j == shortblockdatalen {
                    k -= numshortblocks;
                }
                result[k] = b;
                k += numblocks;
            }
            let mut k: usize = data.len() + i;
            for &b in &ecc {
                result[k] = b;
                k += numblocks;
            }
            dat = &dat[datlen..];
        }
        debug_assert_eq!(dat.len(), 0);
        result
    }

    /// Returns a symbol of the given version where every function module is dark and every
    /// data module light.
    fn function_modules_marked(ver: Version, ecl: QrCodeEcc) -> Self {
        let size: u8 = ver.value() * 4 + 17;
        let sidelen = usize::from(size);
        let mut result = Self {
            size,
            version: ver,
            ecl,
            mask: Mask::new(0),
            modules: vec![0u8; (sidelen * sidelen + 7) / 8],
        };
        result.fill_rectangle(6, 0, 1, size);
        result.fill_rectangle(0, 6, size, 1);
        result.fill_rectangle(0, 0, 9, 9);
        result.fill_rectangle(size - 8, 0, 8, 9);
        result.fill_rectangle(0, size - 8, 9, 8);
        let alignpatpos = alignment_pattern_positions(ver);
        let last = alignpatpos.len().saturating_sub(1);
        for (i, &pos0) in alignpatpos.iter().enumerate() {
            for (j, &pos1) in alignpatpos.iter().enumerate() {
                if !((i == 0 && j == 0) || (i == 0 && j == last) || (i == last && j == 0)) {
                    result.fill_rectangle(pos0 - 2, pos1 - 2, 5, 5);
                }
            }
        }
        if ver.value() >= 7 {
            result.fill_rectangle(size - 11, 0, 3, 6);
            result.fill_rectangle(0, size - 11, 6, 3);
        }
        result
    }

    fn draw_light_function_modules(&mut self) {
        let size: u8 = self.size;
        for i in (7..size - 7).step_by(2) {
            self.set_module_bounded(6, i, false);
            self.set_module_bounded(i, 6, false);
        }
        for dy in -4i32..=4 {
            for dx in -4i32..=4 {
                let dist: i32 = dx.abs().max(dy.abs());
                if dist == 2 || dist == 4 {
                    self.set_module_unbounded(3 + dx, 3 + dy, false);
                    self.set_module_unbounded(i32::from(size) - 4 + dx, 3 + dy, false);
                    self.set_module_unbounded(3 + dx, i32::from(size) - 4 + dy, false);
                }
            }
        }
        let alignpatpos = alignment_pattern_positions(self.version);
        let last = alignpatpos.len().saturating_sub(1);
        for (i, &pos0) in alignpatpos.iter().enumerate() {
            for (j, &pos1) in alignpatpos.iter().enumerate() {
                if (i == 0 && j == 0) || (i == 0 && j == last) || (i == last && j == 0) {
                    continue;
                }
                for dy in -1..=1 {
                    for dx in -1..=1 {
                        self.set_module_bounded(
                            (i32::from(pos0) + dx) as u8,
                            (i32::from(pos1) + dy) as u8,
                            dx == 0 && dy == 0,
                        );
                    }
                }
            }
        }
        let ver = u32::from(self.version.value());
        if ver >= 7 {
            let bits: u32 = {
                let mut rem: u32 = ver;
                for _ in 0..12 {
                    rem = (rem << 1) ^ ((rem >> 11) * 0x1f25);
                }
                (ver << 12) | rem
            };
            for i in 0u8..18 {
                let bit: bool = get_bit(bits, i);
                let a: u8 = size - 11 + (i % 3);
                let b: u8 = i / 3;
                self.set_module_bounded(a, b, bit);
                self.set_module_bounded(b, a, bit);
            }
        }
    }

    fn draw_format_bits(&mut self, ecl: QrCodeEcc, mask: Mask) {
        let bits: u32 = format_bits(ecl, mask);
        for i in 0..6 {
            self.set_module_bounded(8, i, get_bit(bits, i));
        }
        self.set_module_bounded(8, 7, get_bit(bits, 6));
        self.set_module_bounded(8, 8, get_bit(bits, 7));
        self.set_module_bounded(7, 8, get_bit(bits, 8));
        for i in 9..15 {
            self.set_module_bounded(14 - i, 8, get_bit(bits, i));
        }
        let size: u8 = self.size;
        for i in 0..8 {
            self.set_module_bounded(size - 1 - i, 8, get_bit(bits, i));
        }
        for i in 8..15 {
            self.set_module_bounded(8, size - 15 + i, get_bit(bits, i));
        }
        self.set_module_bounded(8, size - 8, true);
    }

    fn fill_rectangle(&mut self, left: u8, top: u8, width: u8, height: u8) {
        for dy in 0..height {
            for dx in 0..width {
                self.set_module_bounded(left + dx, top + dy, true);
            }
        }
    }

    fn draw_codewords(&mut self, data: &[u8]) {
        assert_eq!(
            data.len(),
            capacity::num_raw_data_modules(self.version) / 8,
            "Illegal argument"
        );
        let mut i: usize = 0;
        for (x, y) in zigzag(self.size) {
            if !self.get_module_bounded(x, y) && i < data.len() * 8 {
                self.set_module_bounded(x, y, get_bit(data[i >> 3].into(), 7 - ((i as u8) & 7)));
                i += 1;
            }
        }
        debug_assert_eq!(i, data.len() * 8);
    }

    /// Returns the role of every module of this symbol.
    pub fn layout(&self) -> ModuleLayout {
        ModuleLayout::new(self.version, self.ecl)
    }

    /// Returns a copy of this unmasked symbol with `mask` applied and the matching format
    /// information written.
    fn masked(&self, functionmodules: &QrCode, mask: Mask) -> QrCode {
        let mut result = self.clone();
        for y in 0..result.size {
            for x in 0..result.size {
                if functionmodules.get_module_bounded(x, y) {
                    continue;
                }
                if mask.inverts(x.into(), y.into()) {
                    result.set_module_bounded(x, y, !result.get_module_bounded(x, y));
                }
            }
        }
        result.mask = mask;
        result.draw_format_bits(result.ecl, mask);
        result
    }

    /// Computes the penalty score used to pick a mask; lower is better.
    ///
    /// Sums the four standard terms: long single-color runs, 2x2 single-color blocks,
    /// finder-like 1:1:3:1:1 patterns and dark/light imbalance.
    pub fn penalty_score(&self) -> i32 {
        let mut result: i32 = 0;
        let size: u8 = self.size;
        for y in 0..size {
            result += self.line_penalty((0..size).map(|x| self.get_module_bounded(x, y)));
        }
        for x in 0..size {
            result += self.line_penalty((0..size).map(|y| self.get_module_bounded(x, y)));
        }
        for y in 0..size - 1 {
            for x in 0..size - 1 {
                let color: bool = self.get_module_bounded(x, y);
                if color == self.get_module_bounded(x + 1, y)
                    && color == self.get_module_bounded(x, y + 1)
                    && color == self.get_module_bounded(x + 1, y + 1)
                {
                    result += PENALTY_N2;
                }
            }
        }
        let dark = self.modules.iter().map(|x| x.count_ones()).sum::<u32>() as i32;
        let total = i32::from(size) * i32::from(size);
        let k: i32 = ((dark * 20 - total * 10).abs() + total - 1) / total - 1;
        result += k * PENALTY_N4;
        result
    }

    /// Run-length and finder-pattern penalties for one row or column.
    fn line_penalty(&self, line: impl Iterator<Item = bool>) -> i32 {
        let mut result: i32 = 0;
        let mut runcolor = false;
        let mut runlen: i32 = 0;
        let mut runhistory = FinderPenalty::new(self.size);
        for color in line {
            if color == runcolor {
                runlen += 1;
                if runlen == 5 {
                    result += PENALTY_N1;
                } else if runlen > 5 {
                    result += 1;
                }
            } else {
                runhistory.add_history(runlen);
                if !runcolor {
                    result += runhistory.count_patterns() * PENALTY_N3;
                }
                runcolor = color;
                runlen = 1;
            }
        }
        result + runhistory.terminate_and_count(runcolor, runlen) * PENALTY_N3
    }
}

/// Applies every mask to `unmasked` and returns the candidate with the lowest penalty.
fn choose_mask(unmasked: &QrCode, funcmods: &QrCode) -> QrCode {
    let mut best = unmasked.masked(funcmods, Mask::new(0));
    let mut minpenalty = best.penalty_score();
    for i in 1u8..8 {
        let candidate = unmasked.masked(funcmods, Mask::new(i));
        let penalty = candidate.penalty_score();
        // Strict comparison keeps the lowest mask number on ties.
        if penalty < minpenalty {
            minpenalty = penalty;
            best = candidate;
        }
    }
    best
}

/// Every module position in codeword placement order: two-column strips from the right
/// edge, alternating upward and downward, skipping the vertical timing column.
fn zigzag(size: u8) -> Vec<(u8, u8)> {
    let size = i32::from(size);
    let mut order = Vec::with_capacity((size * size) as usize);
    let mut right: i32 = size - 1;
    while right >= 1 {
        if right == 6 {
            right = 5;
        }
        let upward: bool = ((right + 1) & 2) == 0;
        for vert in 0..size {
            let y = if upward { size - 1 - vert } else { vert };
            for j in 0..2 {
                order.push(((right - j) as u8, y as u8));
            }
        }
        right -= 2;
    }
    order
}

/// What a single module carries.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ModuleRole {
    /// Needed by a reader to find and sample the grid: finder patterns with their
    /// separators, timing patterns, format and version information, the dark module and
    /// the alignment pattern nearest the bottom-right corner.
    Locator,
    /// Any other alignment pattern.
    Alignment,
    /// One bit of the interleaved codeword with this index.
    Codeword(usize),
    /// Leftover bit after the last codeword.
    Remainder,
}

/// Module roles of one version and level, with the block each codeword belongs to.
///
/// Used to work out how many codewords per block an overlay hides, since Reed-Solomon
/// recovers errors block by block.
#[derive(Clone, Debug)]
pub struct ModuleLayout {
    size: u8,
    roles: Vec<ModuleRole>,
    blocks: Vec<usize>,
    capacity: Capacity,
}

impl ModuleLayout {
    pub fn new(ver: Version, ecl: QrCodeEcc) -> Self {
        let funcmods = QrCode::function_modules_marked(ver, ecl);
        let size = funcmods.size;
        let side = usize::from(size);
        let mut roles = vec![ModuleRole::Remainder; side * side];

        let alignpatpos = alignment_pattern_positions(ver);
        let last = alignpatpos.len().saturating_sub(1);
        let mut alignment = vec![false; side * side];
        for (i, &pos0) in alignpatpos.iter().enumerate() {
            for (j, &pos1) in alignpatpos.iter().enumerate() {
                let corner = (i == 0 && j == 0) || (i == 0 && j == last) || (i == last && j == 0);
                if corner || (i == last && j == last) {
                    continue;
                }
                for y in pos1 - 2..=pos1 + 2 {
                    for x in pos0 - 2..=pos0 + 2 {
                        // Timing modules stay locators.
                        if x != 6 && y != 6 {
                            alignment[usize::from(y) * side + usize::from(x)] = true;
                        }
                    }
                }
            }
        }

        let rawcodewords = capacity::num_raw_data_modules(ver) / 8;
        let mut bit: usize = 0;
        for (x, y) in zigzag(size) {
            let index = usize::from(y) * side + usize::from(x);
            if funcmods.get_module_bounded(x, y) {
                continue;
            }
            if bit < rawcodewords * 8 {
                roles[index] = ModuleRole::Codeword(bit >> 3);
            }
            bit += 1;
        }
        for y in 0..size {
            for x in 0..size {
                let index = usize::from(y) * side + usize::from(x);
                if funcmods.get_module_bounded(x, y) {
                    roles[index] = if alignment[index] {
                        ModuleRole::Alignment
                    } else {
                        ModuleRole::Locator
                    };
                }
            }
        }

        let capacity = capacity::lookup(ver, ecl);
        Self {
            size,
            roles,
            blocks: codeword_blocks(capacity, rawcodewords),
            capacity,
        }
    }

    /// Side length in modules.
    pub fn size(&self) -> i32 {
        i32::from(self.size)
    }

    /// Role of the module at `(x, y)`, or `None` outside the symbol.
    pub fn role(&self, x: i32, y: i32) -> Option<ModuleRole> {
        let range = 0..self.size();
        if !range.contains(&x) || !range.contains(&y) {
            return None;
        }
        Some(self.roles[y as usize * usize::from(self.size) + x as usize])
    }

    /// Total codewords, data and error correction.
    pub fn codeword_count(&self) -> usize {
        self.blocks.len()
    }

    /// Block that the interleaved codeword `codeword` belongs to.
    pub fn block_of(&self, codeword: usize) -> usize {
        self.blocks[codeword]
    }

    pub fn block_count(&self) -> usize {
        self.capacity.blocks
    }

    /// Codeword errors a single block can correct.
    pub fn correctable_per_block(&self) -> usize {
        self.capacity.ecc_codewords_per_block / 2
    }
}

/// Block index of every interleaved codeword, following the same order as
/// `add_ecc_and_interleave`.
fn codeword_blocks(capacity: Capacity, rawcodewords: usize) -> Vec<usize> {
    let Capacity {
        data_codewords,
        ecc_codewords_per_block: blockecclen,
        blocks: numblocks,
        ..
    } = capacity;
    let numshortblocks: usize = numblocks - (rawcodewords % numblocks);
    let shortblockdatalen: usize = rawcodewords / numblocks - blockecclen;

    let mut result = vec![0usize; rawcodewords];
    for i in 0..numblocks {
        let datlen: usize = shortblockdatalen + usize::from(i >= numshortblocks);
        let mut k: usize = i;
        for j in 0..datlen {
            if j == shortblockdatalen {
                k -= numshortblocks;
            }
            result[k] = i;
            k += numblocks;
        }
        let mut k: usize = data_codewords + i;
        for _ in 0..blockecclen {
            result[k] = i;
            k += numblocks;
        }
    }
    result
}

/// Returns the alignment pattern center coordinates for the given version, in ascending order.
fn alignment_pattern_positions(ver: Version) -> Vec<u8> {
    let ver: u8 = ver.value();
    if ver == 1 {
        return Vec::new();
    }
    let size: u8 = ver * 4 + 17;
    let numalign: u8 = ver / 7 + 2;
    let step: u8 = if ver == 32 {
        26
    } else {
        ((ver * 4 + numalign * 2 + 1) / (numalign * 2 - 2)) * 2
    };
    let mut result: Vec<u8> = (0..numalign - 1).map(|i| size - 7 - i * step).collect();
    result.push(6);
    result.reverse();
    result
}

/// Returns the 15-bit format information word for the given level and mask.
fn format_bits(ecl: QrCodeEcc, mask: Mask) -> u32 {
    let data = u32::from((ecl.format_bits() << 3) | mask.value());
    let mut rem: u32 = data;
    for _ in 0..10 {
        rem = (rem << 1) ^ ((rem >> 9) * 0x537);
    }
    ((data << 10) | rem) ^ 0x5412
}

struct ReedSolomonGenerator {
    divisor: [u8; 30],
    degree: usize,
}

impl ReedSolomonGenerator {
    fn new(degree: usize) -> Self {
        let mut result = Self {
            divisor: [0u8; 30],
            degree,
        };
        assert!((1..=result.divisor.len()).contains(&degree), "Degree out of range");
        let divisor: &mut [u8] = &mut result.divisor[..degree];
        divisor[degree - 1] = 1;
        let mut root: u8 = 1;
        for _ in 0..degree {
            for j in 0..degree {
                divisor[j] = Self::multiply(divisor[j], root);
                if j + 1 < divisor.len() {
                    divisor[j] ^= divisor[j + 1];
                }
            }
            root = Self::multiply(root, 0x02);
        }
        result
    }

    fn compute_remainder(&self, data: &[u8], result: &mut [u8]) {
        assert_eq!(result.len(), self.degree);
        result.fill(0);
        for b in data {
            let factor: u8 = b ^ result[0];
            result.copy_within(1.., 0);
            result[result.len() - 1] = 0;
            for (x, &y) in result.iter_mut().zip(self.divisor.iter()) {
                *x ^= Self::multiply(y, factor);
            }
        }
    }

    fn multiply(x: u8, y: u8) -> u8 {
        let mut z: u8 = 0;
        for i in (0..8).rev() {
            z = (z << 1) ^ ((z >> 7) * 0x1d);
            z ^= ((y >> i) & 1) * x;
        }
        z
    }
}

struct FinderPenalty {
    qr_size: i32,
    run_history: [i32; 7],
}

impl FinderPenalty {
    fn new(size: u8) -> Self {
        Self {
            qr_size: i32::from(size),
            run_history: [0; 7],
        }
    }

    fn add_history(&mut self, mut currentrunlength: i32) {
        if self.run_history[0] == 0 {
            currentrunlength += self.qr_size;
        }
        let len: usize = self.run_history.len();
        self.run_history.copy_within(0..len - 1, 1);
        self.run_history[0] = currentrunlength;
    }

    fn count_patterns(&self) -> i32 {
        let rh = &self.run_history;
        let n = rh[1];
        i32::from(
            n > 0
                && rh[2] == n
                && rh[3] == n * 3
                && rh[4] == n
                && rh[5] == n
                && (rh[0] >= n * 4 || rh[6] >= n * 4),
        )
    }

    fn terminate_and_count(mut self, currentruncolor: bool, mut currentrunlength: i32) -> i32 {
        if currentruncolor {
            self.add_history(currentrunlength);
            currentrunlength = 0;
        }
        currentrunlength += self.qr_size;
        self.add_history(currentrunlength);
        self.count_patterns()
    }
}

const PENALTY_N1: i32 = 3;
const PENALTY_N2: i32 = 3;
const PENALTY_N3: i32 = 40;
const PENALTY_N4: i32 = 10;

/// Mode indicator for byte-mode segments.
const MODE_BYTE: u32 = 0x4;

/// Error correction level for a QR code.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum QrCodeEcc {
    /// Tolerates ~7% erroneous codewords.
    Low,
    /// Tolerates ~15% erroneous codewords.
    Medium,
    /// Tolerates ~25% erroneous codewords.
    Quartile,
    /// Tolerates ~30% erroneous codewords.
    High,
}

impl QrCodeEcc {
    /// All levels, lowest first.
    pub const ALL: [QrCodeEcc; 4] = [
        QrCodeEcc::Low,
        QrCodeEcc::Medium,
        QrCodeEcc::Quartile,
        QrCodeEcc::High,
    ];

    /// Returns an unsigned 2-bit integer (in the range 0 to 3).
    pub(crate) fn ordinal(self) -> usize {
        use QrCodeEcc::*;
        match self {
            Low => 0,
            Medium => 1,
            Quartile => 2,
            High => 3,
        }
    }

    /// Returns an unsigned 2-bit integer (in the range 0 to 3).
    fn format_bits(self) -> u8 {
        use QrCodeEcc::*;
        match self {
            Low => 1,
            Medium => 0,
            Quartile => 3,
            High => 2,
        }
    }

    /// Percentage of the symbol area that an overlay may cover at this level.
    ///
    /// Low leaves no room for occlusion at all.
    pub fn safe_occlusion_percent(self) -> u32 {
        use QrCodeEcc::*;
        match self {
            Low => 0,
            Medium => 15,
            Quartile => 25,
            High => 30,
        }
    }

    /// The single-letter token for this level.
    pub fn letter(self) -> char {
        use QrCodeEcc::*;
        match self {
            Low => 'L',
            Medium => 'M',
            Quartile => 'Q',
            High => 'H',
        }
    }
}

impl fmt::Display for QrCodeEcc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl FromStr for QrCodeEcc {
    type Err = QrError;

    /// Parses `L`, `M`, `Q` or `H`, ignoring ASCII case and surrounding whitespace.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "L" => Ok(QrCodeEcc::Low),
            "M" => Ok(QrCodeEcc::Medium),
            "Q" => Ok(QrCodeEcc::Quartile),
            "H" => Ok(QrCodeEcc::High),
            _ => Err(QrError::InvalidLevel(s.to_string())),
        }
    }
}

/// Appends bits most-significant first into a growing byte vector.
struct BitBuffer {
    data: Vec<u8>,
    length: usize,
}

impl BitBuffer {
    fn with_capacity(bytes: usize) -> Self {
        Self {
            data: Vec::with_capacity(bytes),
            length: 0,
        }
    }

    fn len(&self) -> usize {
        self.length
    }

    fn append_bits(&mut self, val: u32, len: u8) {
        assert!(len <= 31 && (val >> len) == 0);
        for i in (0..len).rev() {
            if self.length & 7 == 0 {
                self.data.push(0);
            }
            let index: usize = self.length >> 3;
            let shift: u8 = 7 - ((self.length as u8) & 7);
            self.data[index] |= (((val >> i) as u8) & 1) << shift;
            self.length += 1;
        }
    }

    fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

/// A QR code version (1–40).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Version(u8);

impl Version {
    /// The minimum version number supported in the QR Code Model 2 standard.
    pub const MIN: Version = Version(1);

    /// The maximum version number supported in the QR Code Model 2 standard.
    pub const MAX: Version = Version(40);

    /// Creates a version object from the given number.
    ///
    /// # Panics
    ///
    /// Panics if the number is outside the range [1, 40]. Use [`Version::try_from`] for
    /// untrusted input.
    pub const fn new(ver: u8) -> Self {
        assert!(
            Version::MIN.value() <= ver && ver <= Version::MAX.value(),
            "Version number out of range"
        );
        Self(ver)
    }

    /// Returns the value, which is in the range [1, 40].
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Side length of a symbol of this version, in modules.
    pub const fn size(self) -> u32 {
        self.0 as u32 * 4 + 17
    }
}

impl TryFrom<u32> for Version {
    type Error = QrError;

    fn try_from(ver: u32) -> Result<Self> {
        match u8::try_from(ver) {
            Ok(v) if (Version::MIN.value()..=Version::MAX.value()).contains(&v) => Ok(Version(v)),
            _ => Err(QrError::InvalidVersion(ver)),
        }
    }
}

/// A mask pattern (0–7).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Mask(u8);

impl Mask {
    /// Creates a mask object from the given number.
    ///
    /// # Panics
    ///
    /// Panics if the number is outside the range [0, 7].
    pub const fn new(mask: u8) -> Self {
        assert!(mask <= 7, "Mask value out of range");
        Self(mask)
    }

    /// Returns the value, which is in the range [0, 7].
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Whether this mask flips the data module at (x, y).
    fn inverts(self, x: i32, y: i32) -> bool {
        match self.0 {
            0 => (x + y) % 2 == 0,
            1 => y % 2 == 0,
            2 => x % 3 == 0,
            3 => (x + y) % 3 == 0,
            4 => (x / 3 + y / 2) % 2 == 0,
            5 => ((x * y) % 2) + ((x * y) % 3) == 0,
            6 => (((x * y) % 2) + ((x * y) % 3)) % 2 == 0,
            7 => (((x + y) % 2) + ((x * y) % 3)) % 2 == 0,
            _ => unreachable!(),
        }
    }
}

fn get_bit(x: u32, i: u8) -> bool {
    ((x >> i) & 1) != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reads the first copy of the format information back out of a symbol.
    fn read_format_bits(qr: &QrCode) -> u32 {
        let mut bits = 0u32;
        let mut put = |i: u32, dark: bool| bits |= u32::from(dark) << i;
        for i in 0..6 {
            put(i, qr.get_module(8, i as i32));
        }
        put(6, qr.get_module(8, 7));
        put(7, qr.get_module(8, 8));
        put(8, qr.get_module(7, 8));
        for i in 9..15 {
            put(i, qr.get_module(14 - i as i32, 8));
        }
        bits
    }

    fn data_codewords(payload: &[u8], ecl: QrCodeEcc, ver: u8) -> Vec<u8> {
        QrCode::encode_data_codewords(payload, ecl, Version::new(ver))
    }

    #[test]
    fn test_level_tokens() {
        assert_eq!("L".parse::<QrCodeEcc>().unwrap(), QrCodeEcc::Low);
        assert_eq!("m".parse::<QrCodeEcc>().unwrap(), QrCodeEcc::Medium);
        assert_eq!(" Q ".parse::<QrCodeEcc>().unwrap(), QrCodeEcc::Quartile);
        assert_eq!("H".parse::<QrCodeEcc>().unwrap(), QrCodeEcc::High);
        assert!(matches!(
            "X".parse::<QrCodeEcc>(),
            Err(QrError::InvalidLevel(token)) if token == "X"
        ));
        assert!("".parse::<QrCodeEcc>().is_err());
        assert_eq!(QrCodeEcc::Quartile.to_string(), "Q");
    }

    #[test]
    fn test_version_conversion() {
        assert_eq!(Version::try_from(1u32).unwrap(), Version::MIN);
        assert_eq!(Version::try_from(40u32).unwrap(), Version::MAX);
        assert!(matches!(Version::try_from(0u32), Err(QrError::InvalidVersion(0))));
        assert!(matches!(Version::try_from(41u32), Err(QrError::InvalidVersion(41))));
        assert!(matches!(Version::try_from(300u32), Err(QrError::InvalidVersion(300))));
        assert_eq!(Version::new(7).size(), 45);
    }

    #[test]
    fn test_data_codewords_layout() {
        // 0100 | 00000010 | 'h' 'i' | 0000 terminator, then pad bytes.
        let cw = data_codewords(b"hi", QrCodeEcc::Medium, 1);
        assert_eq!(cw.len(), 16);
        assert_eq!(&cw[..4], &[0x40, 0x26, 0x86, 0x90]);
        assert_eq!(&cw[4..8], &[0xec, 0x11, 0xec, 0x11]);
    }

    #[test]
    fn test_data_codewords_use_16_bit_count_from_version_10() {
        let cw = data_codewords(b"A", QrCodeEcc::Low, 10);
        // 0100 | 0000000000000001 | 01000001 | 0000
        assert_eq!(&cw[..4], &[0x40, 0x00, 0x14, 0x10]);
    }

    #[test]
    fn test_full_payload_has_no_room_for_terminator() {
        let payload = [0xffu8; 7];
        let cw = data_codewords(&payload, QrCodeEcc::High, 1);
        assert_eq!(cw.len(), 9);
        assert_eq!(cw[0], 0x40);
        assert_eq!(cw[8], 0xf0);
    }

    #[test]
    fn test_reed_solomon_codeword_is_divisible_by_generator() {
        let rs = ReedSolomonGenerator::new(10);
        let data = [0x10u8, 0x20, 0x0c, 0x56, 0x61, 0x80, 0xec, 0x11, 0xec, 0x11];
        let mut ecc = [0u8; 10];
        rs.compute_remainder(&data, &mut ecc);
        assert_ne!(ecc, [0u8; 10]);

        let codeword: Vec<u8> = data.iter().chain(ecc.iter()).copied().collect();
        let mut rem = [0u8; 10];
        rs.compute_remainder(&codeword, &mut rem);
        assert_eq!(rem, [0u8; 10]);
    }

    #[test]
    fn test_gf_multiply() {
        assert_eq!(ReedSolomonGenerator::multiply(0, 0x53), 0);
        assert_eq!(ReedSolomonGenerator::multiply(1, 0x53), 0x53);
        assert_eq!(ReedSolomonGenerator::multiply(0x80, 0x02), 0x1d);
    }

    #[test]
    fn test_smallest_version_selected() {
        let qr = QrCode::encode(&[b'a'; 14], QrCodeEcc::Medium, None).unwrap();
        assert_eq!(qr.version(), Version::new(1));
        let qr = QrCode::encode(&[b'a'; 15], QrCodeEcc::Medium, None).unwrap();
        assert_eq!(qr.version(), Version::new(2));
        assert_eq!(qr.size(), 25);
    }

    #[test]
    fn test_explicit_version_matches_auto_selection() {
        let payload = b"http://192.168.1.78:8080/api/chargepoints/Devonix1/1/websocket-url";
        let auto = QrCode::encode(payload, QrCodeEcc::Medium, None).unwrap();
        let explicit = QrCode::encode(payload, QrCodeEcc::Medium, Some(auto.version())).unwrap();
        assert_eq!(auto, explicit);
    }

    #[test]
    fn test_explicit_larger_version_is_honoured() {
        let qr = QrCode::encode(b"hi", QrCodeEcc::Low, Some(Version::new(5))).unwrap();
        assert_eq!(qr.version(), Version::new(5));
        assert_eq!(qr.size(), 37);
    }

    #[test]
    fn test_capacity_exceeded_for_small_explicit_version() {
        let payload = [b'x'; 100];
        let err = QrCode::encode(&payload, QrCodeEcc::High, Some(Version::MIN)).unwrap_err();
        assert!(matches!(
            err,
            QrError::CapacityExceeded {
                version: 1,
                level: QrCodeEcc::High,
                len: 100,
                capacity: 7,
            }
        ));
    }

    #[test]
    fn test_payload_too_large() {
        let payload = vec![b'x'; 2954];
        assert!(QrCode::encode(&payload, QrCodeEcc::Low, None).is_err());
        let err = QrCode::encode(&payload, QrCodeEcc::Low, Some(Version::MAX)).unwrap_err();
        assert!(matches!(
            err,
            QrError::PayloadTooLarge {
                len: 2954,
                max: 2953,
                ..
            }
        ));
        let qr = QrCode::encode(&payload[..2953], QrCodeEcc::Low, None).unwrap();
        assert_eq!(qr.version(), Version::MAX);
    }

    #[test]
    fn test_empty_payload() {
        let qr = QrCode::encode(b"", QrCodeEcc::High, None).unwrap();
        assert_eq!(qr.version(), Version::MIN);
    }

    #[test]
    fn test_finder_patterns() {
        let qr = QrCode::encode_text("finder", QrCodeEcc::Low, None).unwrap();
        let size = qr.size();
        for &(cx, cy) in &[(3, 3), (size - 4, 3), (3, size - 4)] {
            for dy in -4i32..=4 {
                for dx in -4i32..=4 {
                    let (x, y) = (cx + dx, cy + dy);
                    if !(0..size).contains(&x) || !(0..size).contains(&y) {
                        continue;
                    }
                    let dist = dx.abs().max(dy.abs());
                    let expected = dist != 2 && dist != 4;
                    assert_eq!(qr.get_module(x, y), expected, "finder at ({x}, {y})");
                }
            }
        }
        assert!(!qr.get_module(-1, 0));
        assert!(!qr.get_module(size, size));
    }

    #[test]
    fn test_timing_patterns_and_dark_module() {
        let qr = QrCode::encode_text("timing", QrCodeEcc::Quartile, Some(Version::new(3))).unwrap();
        let size = qr.size();
        for i in 8..size - 8 {
            assert_eq!(qr.get_module(6, i), i % 2 == 0);
            assert_eq!(qr.get_module(i, 6), i % 2 == 0);
        }
        assert!(qr.get_module(8, size - 8));
    }

    #[test]
    fn test_alignment_positions() {
        assert!(alignment_pattern_positions(Version::new(1)).is_empty());
        assert_eq!(alignment_pattern_positions(Version::new(2)), vec![6, 18]);
        assert_eq!(alignment_pattern_positions(Version::new(7)), vec![6, 22, 38]);
        assert_eq!(
            alignment_pattern_positions(Version::new(32)),
            vec![6, 34, 60, 86, 112, 138]
        );
        assert_eq!(
            alignment_pattern_positions(Version::MAX),
            vec![6, 30, 58, 86, 114, 142, 170]
        );
    }

    #[test]
    fn test_alignment_patterns_skip_finder_corners() {
        // Version 2 has a single alignment pattern centered at (18, 18).
        let qr = QrCode::encode_text("align", QrCodeEcc::Medium, Some(Version::new(2))).unwrap();
        assert!(qr.get_module(18, 18));
        for (dx, dy) in [(-1, -1), (0, -1), (1, 0), (0, 1)] {
            assert!(!qr.get_module(18 + dx, 18 + dy));
        }
        assert!(qr.get_module(16, 16));
        assert!(qr.get_module(20, 20));

        let funcmods = QrCode::function_modules_marked(Version::new(2), QrCodeEcc::Medium);
        // Row 16 next to the bottom-left finder holds data, not an alignment pattern.
        assert!(!funcmods.get_module(4, 16));
        assert_eq!(
            funcmods.modules.iter().map(|b| b.count_ones()).sum::<u32>() as usize,
            25 * 25 - capacity::num_raw_data_modules(Version::new(2))
        );
    }

    #[test]
    fn test_function_module_count_matches_capacity() {
        for ver in [1u8, 6, 7, 14, 21, 32, 40] {
            let version = Version::new(ver);
            let funcmods = QrCode::function_modules_marked(version, QrCodeEcc::Low);
            let marked = funcmods.modules.iter().map(|b| b.count_ones()).sum::<u32>() as usize;
            let total = usize::from(funcmods.size) * usize::from(funcmods.size);
            assert_eq!(total - marked, capacity::num_raw_data_modules(version), "version {ver}");
        }
    }

    #[test]
    fn test_format_bits_written() {
        for ecl in QrCodeEcc::ALL {
            let qr = QrCode::encode_text("format", ecl, None).unwrap();
            assert_eq!(read_format_bits(&qr), format_bits(ecl, qr.mask()));
        }
        // Published value for level M, mask 0.
        assert_eq!(format_bits(QrCodeEcc::Medium, Mask::new(0)), 0x5412);
        assert_eq!(format_bits(QrCodeEcc::Low, Mask::new(4)), 0x662f);
    }

    #[test]
    fn test_version_information_written() {
        let qr = QrCode::encode_text("version info", QrCodeEcc::Low, Some(Version::new(7))).unwrap();
        let size = qr.size();
        let mut bits = 0u32;
        for i in 0..18 {
            let dark = qr.get_module(size - 11 + (i % 3), i / 3);
            assert_eq!(dark, qr.get_module(i / 3, size - 11 + (i % 3)));
            bits |= u32::from(dark) << i;
        }
        assert_eq!(bits, 0x07c94);
    }

    #[test]
    fn test_automatic_mask_has_lowest_penalty() {
        let payload = b"{\"apiBaseUrl\":\"http://192.168.1.10:8080\",\"connectorId\":1}";
        let ecl = QrCodeEcc::Quartile;
        let auto = QrCode::encode(payload, ecl, None).unwrap();
        let version = auto.version();
        let data = QrCode::encode_data_codewords(payload, ecl, version);
        let best = auto.penalty_score();
        for i in 0u8..8 {
            let forced = QrCode::encode_codewords(&data, ecl, version, Some(Mask::new(i)));
            assert_eq!(forced.mask().value(), i);
            assert!(best <= forced.penalty_score(), "mask {i} beats the chosen one");
            if forced.mask() == auto.mask() {
                assert_eq!(forced, auto);
            }
        }
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let a = QrCode::encode_text("same input", QrCodeEcc::High, None).unwrap();
        let b = QrCode::encode_text("same input", QrCodeEcc::High, None).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.error_correction_level(), QrCodeEcc::High);
    }

    fn role_counts(layout: &ModuleLayout) -> (usize, usize, usize, usize) {
        let mut counts = (0, 0, 0, 0);
        for y in 0..layout.size() {
            for x in 0..layout.size() {
                match layout.role(x, y).unwrap() {
                    ModuleRole::Locator => counts.0 += 1,
                    ModuleRole::Alignment => counts.1 += 1,
                    ModuleRole::Codeword(_) => counts.2 += 1,
                    ModuleRole::Remainder => counts.3 += 1,
                }
            }
        }
        counts
    }

    #[test]
    fn test_layout_roles_cover_the_symbol() {
        let v1 = ModuleLayout::new(Version::MIN, QrCodeEcc::High);
        assert_eq!(role_counts(&v1), (233, 0, 208, 0));
        assert_eq!(v1.role(0, 0), Some(ModuleRole::Locator));
        assert_eq!(v1.role(8, 13), Some(ModuleRole::Locator));
        assert_eq!(v1.role(20, 20), Some(ModuleRole::Codeword(0)));
        assert_eq!(v1.role(21, 0), None);
        assert_eq!(v1.role(-1, 5), None);

        // Version 2 leaves 7 remainder bits; its only alignment pattern is a locator.
        let v2 = ModuleLayout::new(Version::new(2), QrCodeEcc::Low);
        assert_eq!(role_counts(&v2), (625 - 359, 0, 352, 7));
        assert_eq!(v2.role(18, 18), Some(ModuleRole::Locator));

        let v7 = ModuleLayout::new(Version::new(7), QrCodeEcc::Medium);
        assert_eq!(role_counts(&v7), (342, 115, 1568, 0));
        assert_eq!(v7.role(22, 22), Some(ModuleRole::Alignment));
        assert_eq!(v7.role(6, 22), Some(ModuleRole::Locator));
        assert_eq!(v7.role(38, 38), Some(ModuleRole::Locator));
    }

    #[test]
    fn test_every_codeword_spans_eight_modules() {
        let layout = ModuleLayout::new(Version::new(5), QrCodeEcc::Quartile);
        let mut bits = vec![0; layout.codeword_count()];
        for y in 0..layout.size() {
            for x in 0..layout.size() {
                if let Some(ModuleRole::Codeword(k)) = layout.role(x, y) {
                    bits[k] += 1;
                }
            }
        }
        assert_eq!(layout.codeword_count(), 134);
        assert!(bits.iter().all(|&n| n == 8));
    }

    #[test]
    fn test_codeword_blocks_match_interleaving() {
        let (ver, ecl) = (Version::new(5), QrCodeEcc::Quartile);
        let layout = ModuleLayout::new(ver, ecl);
        assert_eq!(layout.block_count(), 4);
        assert_eq!(layout.correctable_per_block(), 9);

        let mut sizes = vec![0; layout.block_count()];
        for k in 0..layout.codeword_count() {
            sizes[layout.block_of(k)] += 1;
        }
        assert_eq!(sizes, vec![33, 33, 34, 34]);

        // Fill each block's data with its own index and follow it through interleaving.
        let data: Vec<u8> = [(0u8, 15), (1, 15), (2, 16), (3, 16)]
            .iter()
            .flat_map(|&(block, len)| std::iter::repeat(block).take(len))
            .collect();
        let interleaved = QrCode::add_ecc_and_interleave(&data, ver, ecl);
        for (k, &block) in interleaved[..data.len()].iter().enumerate() {
            assert_eq!(layout.block_of(k), usize::from(block));
        }
    }
}

//! Quantization tables derived from the RFC 2435 Q factor.

/// JPEG Annex K.1 luminance table, stored in zig-zag order as DQT expects.
const LUMA_BASE: [u8; 64] = [
    16, 11, 12, 14, 12, 10, 16, 14, 13, 14, 18, 17, 16, 19, 24, 40, //
    26, 24, 22, 22, 24, 49, 35, 37, 29, 40, 58, 51, 61, 60, 57, 51, //
    56, 55, 64, 72, 92, 78, 64, 68, 87, 69, 55, 56, 80, 109, 81, 87, //
    95, 98, 103, 104, 103, 62, 77, 113, 121, 112, 100, 120, 92, 101, 103, 99,
];

/// JPEG Annex K.2 chrominance table, zig-zag order.
const CHROMA_BASE: [u8; 64] = [
    17, 18, 18, 24, 21, 24, 47, 26, 26, 47, 99, 66, 56, 66, 99, 99, //
    99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, //
    99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, //
    99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99,
];

/// Highest Q value that selects derived (rather than in-band) tables.
pub const MAX_DERIVED_QUALITY: u8 = 127;

/// Build the luma and chroma tables for a quality factor.
///
/// The factor is clamped to 1..=99 and turned into a percentage scale
/// (`5000 / q` below 50, `200 - 2q` from 50 up, as in libjpeg). Each entry is
/// `(base * scale + 50) / 100`, limited to 1..=255.
pub fn make_tables(quality: u8) -> ([u8; 64], [u8; 64]) {
    let factor = u32::from(quality.clamp(1, 99));
    let scale = if factor < 50 {
        5000 / factor
    } else {
        200 - factor * 2
    };

    let mut luma = [0u8; 64];
    let mut chroma = [0u8; 64];
    for (out, base) in luma.iter_mut().zip(LUMA_BASE) {
        *out = scale_entry(base, scale);
    }
    for (out, base) in chroma.iter_mut().zip(CHROMA_BASE) {
        *out = scale_entry(base, scale);
    }
    (luma, chroma)
}

fn scale_entry(base: u8, scale: u32) -> u8 {
    ((u32::from(base) * scale + 50) / 100).clamp(1, 255) as u8
}

/// Quantization tables for one frame, as referenced by the frame header.
///
/// `Separate` emits two DQT tables (ids 0 and 1); the chroma components
/// reference table 1. `Shared` emits a single table 0 that all three
/// components reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuantTables {
    Separate { luma: [u8; 64], chroma: [u8; 64] },
    Shared([u8; 64]),
}

impl QuantTables {
    /// Derived tables for a Q value in 1..=127.
    pub fn from_quality(quality: u8) -> Self {
        let (luma, chroma) = make_tables(quality);
        QuantTables::Separate { luma, chroma }
    }

    /// Split a merged table buffer using its length.
    ///
    /// More than 64 bytes means luma then chroma, each half the buffer; only
    /// 128 bytes (two 8-bit tables) is accepted for that case. Exactly 64
    /// bytes is a single table shared by every component.
    pub fn from_merged(tables: &[u8]) -> Option<Self> {
        match tables.len() {
            128 => {
                let (l, c) = tables.split_at(64);
                Some(QuantTables::Separate {
                    luma: l.try_into().ok()?,
                    chroma: c.try_into().ok()?,
                })
            }
            64 => Some(QuantTables::Shared(tables.try_into().ok()?)),
            _ => None,
        }
    }

    /// Table id used by the chroma components in the SOF segment.
    pub fn chroma_table_id(&self) -> u8 {
        match self {
            QuantTables::Separate { .. } => 1,
            QuantTables::Shared(_) => 0,
        }
    }
}

//! RTP/JPEG payload headers (RFC 2435).
//!
//! Every RTP/JPEG payload starts with an 8-byte main header, optionally
//! followed by a restart marker header and a quantization table header:
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! | Type-specific |              Fragment Offset                  |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |      Type     |       Q       |     Width     |     Height    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! - **Restart marker header** (§3.1.7): present when type is 64-127.
//! - **Quantization table header** (§3.1.8): present when Q >= 128, only in
//!   the fragment at offset 0.
//!
//! Uses static payload type 26: `a=rtpmap:26 JPEG/90000`.

use crate::error::{MalformedReason, Result, RtpJpegError};
use crate::jpeg::QuantTables;
use crate::jpeg::quant::MAX_DERIVED_QUALITY;

/// Static RTP payload type for JPEG (RFC 3551 §6).
pub const JPEG_PAYLOAD_TYPE: u8 = 26;

/// RTP clock rate for JPEG video.
pub const JPEG_CLOCK_RATE: u32 = 90_000;

pub const MAIN_HEADER_LEN: usize = 8;
pub const RESTART_HEADER_LEN: usize = 4;
pub const QUANT_HEADER_LEN: usize = 4;

/// Largest value of the 24-bit fragment offset field.
pub const MAX_FRAGMENT_OFFSET: u32 = 0x00ff_ffff;

/// RTP/JPEG main header (RFC 2435 §3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegHeader {
    pub type_specific: u8,
    /// Byte offset of this fragment within the frame's scan data.
    pub fragment_offset: u32,
    pub type_: u8,
    pub q: u8,
    /// Width in 8-pixel blocks.
    pub width: u8,
    /// Height in 8-pixel blocks.
    pub height: u8,
}

impl JpegHeader {
    /// Types 64-127 carry a restart marker header.
    pub fn has_restart_header(&self) -> bool {
        (64..128).contains(&self.type_)
    }

    /// Q 128-255 carries quantization tables in band, in the first fragment.
    pub fn has_quant_header(&self) -> bool {
        self.q > MAX_DERIVED_QUALITY && self.fragment_offset == 0
    }

    fn read(b: &[u8; MAIN_HEADER_LEN]) -> Self {
        JpegHeader {
            type_specific: b[0],
            fragment_offset: u32::from_be_bytes([0, b[1], b[2], b[3]]),
            type_: b[4],
            q: b[5],
            width: b[6],
            height: b[7],
        }
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        let offset = (self.fragment_offset & MAX_FRAGMENT_OFFSET).to_be_bytes();
        out.push(self.type_specific);
        out.extend_from_slice(&offset[1..]);
        out.extend_from_slice(&[self.type_, self.q, self.width, self.height]);
    }
}

/// Restart marker header (RFC 2435 §3.1.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartHeader {
    /// Restart interval in MCUs; becomes the DRI segment.
    pub interval: u16,
    pub first: bool,
    pub last: bool,
    /// 14-bit restart count.
    pub count: u16,
}

impl RestartHeader {
    fn read(b: &[u8]) -> Self {
        let word = u16::from_be_bytes([b[2], b[3]]);
        RestartHeader {
            interval: u16::from_be_bytes([b[0], b[1]]),
            first: word & 0x8000 != 0,
            last: word & 0x4000 != 0,
            count: word & 0x3fff,
        }
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        let word = (self.count & 0x3fff)
            | if self.first { 0x8000 } else { 0 }
            | if self.last { 0x4000 } else { 0 };
        out.extend_from_slice(&self.interval.to_be_bytes());
        out.extend_from_slice(&word.to_be_bytes());
    }
}

/// Quantization table header (RFC 2435 §3.1.8).
///
/// Only 8-bit tables (precision 0) are accepted. An empty table list is
/// legal for Q 128-254 and means "reuse the tables last sent for this Q".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantTableHeader<'a> {
    pub precision: u8,
    pub tables: &'a [u8],
}

impl QuantTableHeader<'_> {
    pub fn to_tables(&self) -> Option<QuantTables> {
        QuantTables::from_merged(self.tables)
    }

    /// Write the header plus table bytes for `tables` (8-bit precision).
    pub fn write(tables: &QuantTables, out: &mut Vec<u8>) {
        out.extend_from_slice(&[0, 0]); // MBZ, precision
        match tables {
            QuantTables::Separate { luma, chroma } => {
                out.extend_from_slice(&128u16.to_be_bytes());
                out.extend_from_slice(luma);
                out.extend_from_slice(chroma);
            }
            QuantTables::Shared(table) => {
                out.extend_from_slice(&64u16.to_be_bytes());
                out.extend_from_slice(table);
            }
        }
    }
}

/// A parsed RTP/JPEG payload: headers plus the scan bytes of this fragment.
#[derive(Debug, Clone, Copy)]
pub struct JpegPayload<'a> {
    pub header: JpegHeader,
    pub restart: Option<RestartHeader>,
    pub quant: Option<QuantTableHeader<'a>>,
    pub data: &'a [u8],
}

impl<'a> JpegPayload<'a> {
    /// Parse the RFC 2435 headers from an RTP payload.
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        let len = payload.len();
        let (main, mut rest) = payload
            .split_first_chunk::<MAIN_HEADER_LEN>()
            .ok_or(RtpJpegError::malformed(len, MalformedReason::TooShort))?;
        let header = JpegHeader::read(main);

        let restart = if header.has_restart_header() {
            if rest.len() < RESTART_HEADER_LEN {
                return Err(RtpJpegError::malformed(len, MalformedReason::TruncatedJpegHeader));
            }
            let (r, tail) = rest.split_at(RESTART_HEADER_LEN);
            rest = tail;
            Some(RestartHeader::read(r))
        } else {
            None
        };

        let quant = if header.has_quant_header() {
            if rest.len() < QUANT_HEADER_LEN {
                return Err(RtpJpegError::malformed(len, MalformedReason::TruncatedJpegHeader));
            }
            let precision = rest[1];
            let length = u16::from_be_bytes([rest[2], rest[3]]);
            let empty_dynamic = length == 0 && header.q == 255;
            if precision != 0 || !matches!(length, 0 | 64 | 128) || empty_dynamic {
                return Err(RtpJpegError::UnsupportedQuantTables { precision, length });
            }
            let end = QUANT_HEADER_LEN + usize::from(length);
            if rest.len() < end {
                return Err(RtpJpegError::malformed(len, MalformedReason::TruncatedJpegHeader));
            }
            let tables = &rest[QUANT_HEADER_LEN..end];
            rest = &rest[end..];
            Some(QuantTableHeader { precision, tables })
        } else {
            None
        };

        Ok(JpegPayload {
            header,
            restart,
            quant,
            data: rest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn main_header(type_: u8, q: u8, offset: u32) -> Vec<u8> {
        let mut out = Vec::new();
        JpegHeader {
            type_specific: 0,
            fragment_offset: offset,
            type_,
            q,
            width: 40,
            height: 30,
        }
        .write(&mut out);
        out
    }

    #[test]
    fn parse_main_header_fields() {
        let mut buf = main_header(1, 75, 0x012345);
        buf.extend_from_slice(&[0xde, 0xad]);

        let p = JpegPayload::parse(&buf).unwrap();
        assert_eq!(p.header.fragment_offset, 0x012345);
        assert_eq!(p.header.type_, 1);
        assert_eq!(p.header.q, 75);
        assert_eq!(p.header.width, 40);
        assert_eq!(p.header.height, 30);
        assert!(p.restart.is_none());
        assert!(p.quant.is_none());
        assert_eq!(p.data, &[0xde, 0xad]);
    }

    #[test]
    fn parse_restart_header() {
        let mut buf = main_header(65, 50, 0);
        RestartHeader {
            interval: 8,
            first: true,
            last: true,
            count: 0x3fff,
        }
        .write(&mut buf);
        buf.push(0xaa);

        let p = JpegPayload::parse(&buf).unwrap();
        let r = p.restart.unwrap();
        assert_eq!(r.interval, 8);
        assert!(r.first && r.last);
        assert_eq!(r.count, 0x3fff);
        assert_eq!(p.data, &[0xaa]);
    }

    #[test]
    fn parse_inband_tables_only_at_offset_zero() {
        let tables = QuantTables::Separate {
            luma: [3; 64],
            chroma: [4; 64],
        };
        let mut first = main_header(0, 255, 0);
        QuantTableHeader::write(&tables, &mut first);
        first.push(0x11);

        let p = JpegPayload::parse(&first).unwrap();
        assert_eq!(p.quant.unwrap().to_tables(), Some(tables));
        assert_eq!(p.data, &[0x11]);

        let mut later = main_header(0, 255, 100);
        later.extend_from_slice(&[0, 0, 0, 128]);
        let p = JpegPayload::parse(&later).unwrap();
        assert!(p.quant.is_none());
        assert_eq!(p.data.len(), 4);
    }

    #[test]
    fn rejects_sixteen_bit_tables() {
        let mut buf = main_header(0, 255, 0);
        buf.extend_from_slice(&[0, 1, 0, 192]);
        buf.extend(std::iter::repeat_n(1u8, 192));
        assert!(matches!(
            JpegPayload::parse(&buf),
            Err(RtpJpegError::UnsupportedQuantTables {
                precision: 1,
                length: 192
            })
        ));
    }

    #[test]
    fn rejects_truncated_restart_header() {
        let mut buf = main_header(64, 50, 0);
        buf.extend_from_slice(&[0, 8]);
        assert!(matches!(
            JpegPayload::parse(&buf),
            Err(RtpJpegError::MalformedPacket {
                reason: MalformedReason::TruncatedJpegHeader,
                ..
            })
        ));
    }

    #[test]
    fn rejects_truncated_tables() {
        let mut buf = main_header(0, 200, 0);
        buf.extend_from_slice(&[0, 0, 0, 128]);
        buf.extend_from_slice(&[1; 100]);
        assert!(JpegPayload::parse(&buf).is_err());
    }
}

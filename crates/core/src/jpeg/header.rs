//! JPEG marker segments preceding an RTP/JPEG scan (RFC 2435 Appendix B).

use super::huffman::{self, HuffmanTableSpec};
use super::quant::QuantTables;

const SOI: u8 = 0xd8;
const SOF0: u8 = 0xc0;
const DHT: u8 = 0xc4;
const SOS: u8 = 0xda;
const DQT: u8 = 0xdb;
const DRI: u8 = 0xdd;

/// Frame fields the header is built from, as carried in the RTP/JPEG
/// main header and restart marker header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderParams {
    /// RFC 2435 type. Bit 6 (restart markers present) is ignored here.
    pub type_: u8,
    /// Width in 8-pixel blocks.
    pub width: u8,
    /// Height in 8-pixel blocks.
    pub height: u8,
    /// Restart interval in MCUs, 0 for none.
    pub restart_interval: u16,
}

impl HeaderParams {
    /// Luma sampling factors: 2x1 for type 0 (4:2:2), 2x2 otherwise (4:2:0).
    fn luma_sampling(&self) -> u8 {
        if self.type_ & 0x3f == 0 { 0x21 } else { 0x22 }
    }
}

/// Append-only builder for JPEG marker segments.
///
/// [`begin`](Self::begin) writes the marker and a placeholder length;
/// [`end`](Self::end) patches the length with the size of everything written
/// since, including the two length bytes.
#[derive(Debug, Default)]
pub struct SegmentWriter {
    buf: Vec<u8>,
    open: Option<usize>,
}

impl SegmentWriter {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            open: None,
        }
    }

    /// Standalone marker without a length field (SOI, EOI).
    pub fn marker(&mut self, code: u8) -> &mut Self {
        debug_assert!(self.open.is_none(), "marker inside an open segment");
        self.buf.extend_from_slice(&[0xff, code]);
        self
    }

    pub fn begin(&mut self, code: u8) -> &mut Self {
        debug_assert!(self.open.is_none(), "segments cannot nest");
        self.buf.extend_from_slice(&[0xff, code, 0, 0]);
        self.open = Some(self.buf.len() - 2);
        self
    }

    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    pub fn u16(&mut self, value: u16) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn bytes(&mut self, data: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(data);
        self
    }

    pub fn end(&mut self) -> &mut Self {
        if let Some(at) = self.open.take() {
            let len = (self.buf.len() - at) as u16;
            self.buf[at..at + 2].copy_from_slice(&len.to_be_bytes());
        }
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.end();
        self.buf
    }
}

fn write_dqt(w: &mut SegmentWriter, id: u8, table: &[u8; 64]) {
    // Pq = 0 (8-bit entries) in the high nibble
    w.begin(DQT).u8(id).bytes(table).end();
}

fn write_dht(w: &mut SegmentWriter, spec: &HuffmanTableSpec) {
    w.begin(DHT)
        .u8(spec.class_and_id)
        .bytes(&spec.code_lengths)
        .bytes(spec.symbols)
        .end();
}

/// Build the SOI..SOS header that turns an RTP/JPEG scan into a JPEG
/// interchange stream (minus the trailing EOI).
pub fn synthesize(params: &HeaderParams, tables: &QuantTables) -> Vec<u8> {
    let mut w = SegmentWriter::with_capacity(640);

    w.marker(SOI);

    match tables {
        QuantTables::Separate { luma, chroma } => {
            write_dqt(&mut w, 0, luma);
            write_dqt(&mut w, 1, chroma);
        }
        QuantTables::Shared(table) => write_dqt(&mut w, 0, table),
    }

    if params.restart_interval != 0 {
        w.begin(DRI).u16(params.restart_interval).end();
    }

    let chroma_q = tables.chroma_table_id();
    w.begin(SOF0)
        .u8(8)
        .u16(u16::from(params.height) << 3)
        .u16(u16::from(params.width) << 3)
        .u8(3)
        .bytes(&[0, params.luma_sampling(), 0])
        .bytes(&[1, 0x11, chroma_q])
        .bytes(&[2, 0x11, chroma_q])
        .end();

    for spec in huffman::TABLES {
        write_dht(&mut w, spec);
    }

    // Components 0..2; luma uses DC/AC tables 0, chroma tables 1.
    // Spectral selection 0..63, no successive approximation.
    w.begin(SOS)
        .u8(3)
        .bytes(&[0, 0x00, 1, 0x11, 2, 0x11])
        .bytes(&[0, 63, 0])
        .end();

    let header = w.finish();
    tracing::trace!(
        type_ = params.type_,
        width = params.width,
        height = params.height,
        dri = params.restart_interval,
        header_len = header.len(),
        "JPEG header synthesized"
    );
    header
}

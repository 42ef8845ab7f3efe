//! JPEG header synthesis for RTP/JPEG streams.
//!
//! RFC 2435 strips everything but the entropy-coded scan from each frame.
//! The receiver rebuilds the rest from a handful of header fields:
//!
//! | Segment | Source |
//! |---------|--------|
//! | DQT | [`quant`]: derived from Q, or sent in band for Q >= 128 |
//! | DRI | restart marker header (types 64-127) |
//! | SOF0 | type, width, height |
//! | DHT | [`huffman`]: fixed Annex K.3 tables |
//! | SOS | fixed |
//!
//! [`header::synthesize`] writes them in that order behind an SOI marker.

pub mod header;
pub mod huffman;
pub mod quant;

pub use header::{HeaderParams, SegmentWriter, synthesize};
pub use quant::{QuantTables, make_tables};

//! Fragment reassembly for RTP/JPEG frames.
//!
//! Each RTP/JPEG packet names the byte offset of its fragment within the
//! frame's scan data, so fragments are copied straight into place and may
//! arrive in any order. The RTP marker bit closes the frame:
//!
//! ```text
//! Accumulating --(marker, extent > 0)--> FrameReady --(returned)--> Accumulating
//! ```
//!
//! Lost fragments are not detected. A frame with a hole is still emitted,
//! with whatever bytes the buffer held at that position.

use std::collections::HashMap;

use crate::error::{MalformedReason, Result, RtpJpegError};
use crate::jpeg::quant::MAX_DERIVED_QUALITY;
use crate::jpeg::{HeaderParams, QuantTables};
use crate::media::mjpeg::{JPEG_PAYLOAD_TYPE, JpegPayload, MAIN_HEADER_LEN};
use crate::media::rtp::{RTP_HEADER_LEN, RtpPacket};

/// Shortest datagram accepted: RTP fixed header, JPEG main header and at
/// least two bytes of scan data.
pub const MIN_PACKET_LEN: usize = RTP_HEADER_LEN + MAIN_HEADER_LEN + 2;

/// Default reassembly buffer capacity (1 MiB).
pub const DEFAULT_CAPACITY: usize = 1024 * 1024;

/// Reassembler settings.
#[derive(Debug, Clone)]
pub struct ReassemblerConfig {
    /// Maximum scan size of one frame in bytes. Fragments reaching past it
    /// are rejected with [`RtpJpegError::BufferOverflow`].
    pub capacity: usize,
    /// RTP payload type carrying JPEG. 26 unless negotiated otherwise.
    pub payload_type: u8,
}

impl Default for ReassemblerConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            payload_type: JPEG_PAYLOAD_TYPE,
        }
    }
}

/// Fixed-capacity frame buffer with a running valid extent.
///
/// Bytes past the extent are stale data from earlier frames and are never
/// handed out.
#[derive(Debug)]
pub struct ReassemblyBuffer {
    data: Vec<u8>,
    extent: usize,
}

impl ReassemblyBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            extent: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn extent(&self) -> usize {
        self.extent
    }

    /// Copy `bytes` to `offset`, growing the extent if needed.
    pub fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        let end = offset
            .checked_add(bytes.len())
            .filter(|&end| end <= self.data.len())
            .ok_or(RtpJpegError::BufferOverflow {
                offset,
                len: bytes.len(),
                capacity: self.data.len(),
            })?;
        self.data[offset..end].copy_from_slice(bytes);
        self.extent = self.extent.max(end);
        Ok(())
    }

    /// Drop the current frame. Contents are left in place.
    pub fn reset(&mut self) {
        self.extent = 0;
    }

    /// End the current frame, returning its bytes and resetting the extent.
    fn finish(&mut self) -> &[u8] {
        let extent = std::mem::take(&mut self.extent);
        &self.data[..extent]
    }
}

/// Header fields of the packet that completed a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameMetadata {
    pub type_: u8,
    pub quality: u8,
    /// Width in 8-pixel blocks.
    pub width: u8,
    /// Height in 8-pixel blocks.
    pub height: u8,
    /// From the restart marker header, 0 when absent.
    pub restart_interval: u16,
    pub timestamp: u32,
    pub sequence: u16,
}

impl FrameMetadata {
    pub fn header_params(&self) -> HeaderParams {
        HeaderParams {
            type_: self.type_,
            width: self.width,
            height: self.height,
            restart_interval: self.restart_interval,
        }
    }

    pub fn pixel_width(&self) -> u16 {
        u16::from(self.width) * 8
    }

    pub fn pixel_height(&self) -> u16 {
        u16::from(self.height) * 8
    }
}

/// A frame closed by a marker-bearing packet.
///
/// `scan` borrows the reassembler's buffer, so no further packet can be
/// pushed until the frame is dropped.
#[derive(Debug)]
pub struct CompletedFrame<'a> {
    pub meta: FrameMetadata,
    /// In-band (or cached in-band) tables, when Q >= 128.
    pub tables: Option<QuantTables>,
    pub scan: &'a [u8],
}

/// Result of feeding one accepted packet to the reassembler.
#[derive(Debug)]
pub enum PacketOutcome<'a> {
    /// Fragment stored; the frame is still open.
    Continue,
    /// Fragment stored and the frame closed.
    Complete(CompletedFrame<'a>),
}

/// Reassembles RTP/JPEG fragments of a single stream into frames.
///
/// One instance per stream: fragments from different senders must never
/// share a reassembler.
#[derive(Debug)]
pub struct FragmentReassembler {
    config: ReassemblerConfig,
    buffer: ReassemblyBuffer,
    /// Tables received in band for the frame being assembled.
    frame_tables: Option<QuantTables>,
    /// In-band tables keyed by Q (128-254), reused when a sender omits them.
    table_cache: HashMap<u8, QuantTables>,
    last_frame_timestamp: Option<u32>,
}

impl FragmentReassembler {
    pub fn new(config: ReassemblerConfig) -> Self {
        tracing::debug!(
            capacity = config.capacity,
            payload_type = config.payload_type,
            "fragment reassembler created"
        );
        Self {
            buffer: ReassemblyBuffer::new(config.capacity),
            config,
            frame_tables: None,
            table_cache: HashMap::new(),
            last_frame_timestamp: None,
        }
    }

    /// Bytes received so far for the open frame.
    pub fn extent(&self) -> usize {
        self.buffer.extent()
    }

    /// Discard the open frame.
    pub fn reset(&mut self) {
        self.buffer.reset();
        self.frame_tables = None;
    }

    /// Feed one datagram.
    ///
    /// Malformed packets, foreign payload types and unusable table headers
    /// are rejected without touching the open frame. A fragment that does
    /// not fit the buffer discards the open frame.
    pub fn on_packet(&mut self, datagram: &[u8]) -> Result<PacketOutcome<'_>> {
        let len = datagram.len();
        if len < MIN_PACKET_LEN {
            return Err(RtpJpegError::malformed(len, MalformedReason::TooShort));
        }
        match RtpPacket::peek_payload_type(datagram) {
            Some(pt) if pt == self.config.payload_type => {}
            Some(pt) => return Err(RtpJpegError::WrongPayloadType(pt)),
            None => return Err(RtpJpegError::malformed(len, MalformedReason::TooShort)),
        }

        let rtp = RtpPacket::parse(datagram)?;
        let jpeg = JpegPayload::parse(rtp.payload)?;
        let header = jpeg.header;
        let offset = header.fragment_offset as usize;

        tracing::trace!(
            seq = rtp.sequence,
            ts = rtp.timestamp,
            marker = rtp.marker,
            offset,
            len = jpeg.data.len(),
            "fragment"
        );

        let inband = match jpeg.quant {
            Some(q) if !q.tables.is_empty() => Some(q.to_tables().ok_or(
                RtpJpegError::UnsupportedQuantTables {
                    precision: q.precision,
                    length: q.tables.len() as u16,
                },
            )?),
            _ => None,
        };

        if let Err(e) = self.buffer.write(offset, jpeg.data) {
            tracing::warn!(
                seq = rtp.sequence,
                offset,
                len = jpeg.data.len(),
                capacity = self.buffer.capacity(),
                "fragment overflows reassembly buffer, dropping frame"
            );
            self.reset();
            return Err(e);
        }

        if let Some(tables) = inband {
            if header.q < 255 {
                self.table_cache.insert(header.q, tables.clone());
            }
            self.frame_tables = Some(tables);
        }

        if !rtp.marker {
            return Ok(PacketOutcome::Continue);
        }
        if self.buffer.extent() == 0 {
            tracing::debug!(seq = rtp.sequence, "marker on empty frame ignored");
            self.frame_tables = None;
            return Ok(PacketOutcome::Continue);
        }

        if let Some(last) = self.last_frame_timestamp {
            tracing::trace!(
                ts = rtp.timestamp,
                delta = rtp.timestamp.wrapping_sub(last),
                "frame timestamp"
            );
        }
        self.last_frame_timestamp = Some(rtp.timestamp);

        let tables = match self.frame_tables.take() {
            _ if header.q <= MAX_DERIVED_QUALITY => None,
            Some(t) => Some(t),
            None => self.table_cache.get(&header.q).cloned(),
        };

        let meta = FrameMetadata {
            type_: header.type_,
            quality: header.q,
            width: header.width,
            height: header.height,
            restart_interval: jpeg.restart.map_or(0, |r| r.interval),
            timestamp: rtp.timestamp,
            sequence: rtp.sequence,
        };

        Ok(PacketOutcome::Complete(CompletedFrame {
            meta,
            tables,
            scan: self.buffer.finish(),
        }))
    }
}

impl Default for FragmentReassembler {
    fn default() -> Self {
        Self::new(ReassemblerConfig::default())
    }
}

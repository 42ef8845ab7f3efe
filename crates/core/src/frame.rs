//! Turning reassembled scans into JPEG interchange streams.

use crate::error::{Result, RtpJpegError};
use crate::jpeg::quant::MAX_DERIVED_QUALITY;
use crate::jpeg::{QuantTables, synthesize};
use crate::reassembly::{
    CompletedFrame, FragmentReassembler, FrameMetadata, PacketOutcome, ReassemblerConfig,
};

/// A complete JPEG image: synthesized header followed by the scan data.
///
/// No EOI marker is appended; decoders accept the stream without it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledJpeg {
    data: Vec<u8>,
    header_len: usize,
    meta: FrameMetadata,
}

impl AssembledJpeg {
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// The SOI..SOS header.
    pub fn header(&self) -> &[u8] {
        &self.data[..self.header_len]
    }

    /// The entropy-coded scan as received.
    pub fn scan(&self) -> &[u8] {
        &self.data[self.header_len..]
    }

    pub fn meta(&self) -> &FrameMetadata {
        &self.meta
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Stateless header-plus-scan assembly.
pub struct FrameAssembler;

impl FrameAssembler {
    /// Prefix a completed frame's scan with its synthesized JPEG header.
    ///
    /// Q below 128 derives the tables from the quality factor. Q 128 and
    /// above requires tables delivered in band (or cached from an earlier
    /// frame), otherwise [`RtpJpegError::MissingQuantTables`] is returned.
    pub fn assemble(frame: &CompletedFrame<'_>) -> Result<AssembledJpeg> {
        let q = frame.meta.quality;
        let tables = if q > MAX_DERIVED_QUALITY {
            frame
                .tables
                .clone()
                .ok_or(RtpJpegError::MissingQuantTables(q))?
        } else {
            QuantTables::from_quality(q)
        };

        let header = synthesize(&frame.meta.header_params(), &tables);
        let header_len = header.len();
        let mut data = header;
        data.reserve_exact(frame.scan.len());
        data.extend_from_slice(frame.scan);

        tracing::trace!(
            ts = frame.meta.timestamp,
            q,
            width = frame.meta.pixel_width(),
            height = frame.meta.pixel_height(),
            header_len,
            scan_len = frame.scan.len(),
            "frame assembled"
        );

        Ok(AssembledJpeg {
            data,
            header_len,
            meta: frame.meta,
        })
    }
}

/// Datagrams in, JPEG images out.
///
/// Composes a [`FragmentReassembler`] with [`FrameAssembler`]. Errors from
/// either are passed through unchanged; the depacketizer stays usable
/// after any of them.
#[derive(Debug, Default)]
pub struct Depacketizer {
    reassembler: FragmentReassembler,
}

impl Depacketizer {
    pub fn new(config: ReassemblerConfig) -> Self {
        Self {
            reassembler: FragmentReassembler::new(config),
        }
    }

    pub fn reassembler(&self) -> &FragmentReassembler {
        &self.reassembler
    }

    /// Feed one datagram. Returns the image when this packet closed a frame.
    pub fn push(&mut self, datagram: &[u8]) -> Result<Option<AssembledJpeg>> {
        match self.reassembler.on_packet(datagram)? {
            PacketOutcome::Continue => Ok(None),
            PacketOutcome::Complete(frame) => FrameAssembler::assemble(&frame).map(Some),
        }
    }

    /// Discard any partially received frame.
    pub fn reset(&mut self) {
        self.reassembler.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MalformedReason;
    use crate::reassembly::tests::Fragment;

    fn make_frame(meta_q: u8, tables: Option<QuantTables>, scan: &[u8]) -> CompletedFrame<'_> {
        CompletedFrame {
            meta: FrameMetadata {
                type_: 0,
                quality: meta_q,
                width: 10,
                height: 8,
                restart_interval: 0,
                timestamp: 0,
                sequence: 0,
            },
            tables,
            scan,
        }
    }

    #[test]
    fn derived_tables_below_128() {
        let scan = [0x12, 0x34, 0xff, 0xd9];
        let jpeg = FrameAssembler::assemble(&make_frame(50, None, &scan)).unwrap();
        assert_eq!(jpeg.header().len(), 605);
        assert_eq!(jpeg.scan(), &scan);
        assert_eq!(jpeg.len(), 609);

        let (luma, _) = crate::jpeg::make_tables(50);
        assert_eq!(&jpeg.as_bytes()[7..71], &luma);
    }

    #[test]
    fn inband_tables_used_at_128_and_above() {
        let tables = QuantTables::Shared([7; 64]);
        let jpeg = FrameAssembler::assemble(&make_frame(128, Some(tables), &[1, 2])).unwrap();
        assert_eq!(&jpeg.header()[7..71], &[7; 64]);
        // One DQT only
        assert_eq!(&jpeg.header()[71..73], &[0xff, 0xc0]);
    }

    #[test]
    fn missing_tables_reported() {
        let err = FrameAssembler::assemble(&make_frame(200, None, &[1, 2]));
        assert!(matches!(err, Err(RtpJpegError::MissingQuantTables(200))));
    }

    #[test]
    fn short_datagram_then_valid_frame() {
        let mut d = Depacketizer::default();
        let err = d.push(&[0x80; 21]);
        assert!(matches!(
            err,
            Err(RtpJpegError::MalformedPacket {
                reason: MalformedReason::TooShort,
                ..
            })
        ));

        let scan = vec![0xab; 40];
        let jpeg = d
            .push(&Fragment::new(0, scan.clone()).last().encode())
            .unwrap()
            .unwrap();
        assert_eq!(jpeg.scan(), scan.as_slice());
    }

    #[test]
    fn assembled_stream_is_well_formed_jpeg() {
        let mut d = Depacketizer::default();
        assert!(d.push(&Fragment::new(0, vec![0; 30]).encode()).unwrap().is_none());
        let jpeg = d
            .push(&Fragment::new(30, vec![0; 30]).last().encode())
            .unwrap()
            .unwrap();

        let bytes = jpeg.as_bytes();
        assert_eq!(&bytes[..2], &[0xff, 0xd8]);
        // Walk marker segments up to SOS.
        let mut pos = 2;
        let mut markers = Vec::new();
        loop {
            assert_eq!(bytes[pos], 0xff);
            let marker = bytes[pos + 1];
            let len = usize::from(u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]));
            markers.push(marker);
            pos += 2 + len;
            if marker == 0xda {
                break;
            }
        }
        assert_eq!(markers, vec![0xdb, 0xdb, 0xc0, 0xc4, 0xc4, 0xc4, 0xc4, 0xda]);
        assert_eq!(pos, jpeg.header().len());
        assert_eq!(jpeg.meta().pixel_width(), 80);
        assert_eq!(jpeg.meta().pixel_height(), 64);
    }

    #[test]
    fn missing_tables_leave_depacketizer_usable() {
        let mut d = Depacketizer::default();
        let mut f = Fragment::new(0, vec![1; 8]).last();
        f.q = 130;
        f.tables = None;
        // Zero-length table header with nothing cached for Q=130.
        let mut pkt = f.encode();
        let tail = pkt.split_off(20);
        pkt.extend_from_slice(&[0, 0, 0, 0]);
        pkt.extend_from_slice(&tail);
        assert!(matches!(
            d.push(&pkt),
            Err(RtpJpegError::MissingQuantTables(130))
        ));
        assert_eq!(d.reassembler().extent(), 0);

        let jpeg = d.push(&Fragment::new(0, vec![2; 8]).last().encode()).unwrap();
        assert!(jpeg.is_some());
    }
}

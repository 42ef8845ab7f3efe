use super::Packetizer;
use super::mjpeg::{
    JpegHeader, MAIN_HEADER_LEN, MAX_FRAGMENT_OFFSET, QUANT_HEADER_LEN, QuantTableHeader,
    RESTART_HEADER_LEN, RestartHeader,
};
use super::rtp::{RTP_HEADER_LEN, RtpHeader};
use crate::jpeg::QuantTables;
use crate::reassembly::MIN_PACKET_LEN;

const DEFAULT_MTU: usize = 1400;

/// RTP/JPEG packetizer (RFC 2435).
///
/// Splits the entropy-coded scan of a baseline JPEG into fragments that fit
/// the MTU. Every fragment carries the 8-byte main header with its byte
/// offset into the scan; the RTP marker bit is set on the last fragment.
///
/// - **Restart markers**: with a non-zero restart interval the type gets
///   bit 6 set and every fragment carries a restart header. Fragments are
///   not aligned to restart intervals, so F=L=1 and count=0x3FFF.
/// - **In-band tables**: with Q >= 128 the first fragment carries a
///   quantization table header. Without tables configured an empty header
///   is sent and the receiver falls back to tables it cached for that Q.
///
/// No datagram is shorter than [`MIN_PACKET_LEN`]: the fragment before a
/// short tail gives up bytes to it, and a frame too small for even one
/// such datagram is sent with RTP padding.
#[derive(Debug)]
pub struct JpegPacketizer {
    header: RtpHeader,
    mtu: usize,
    type_: u8,
    q: u8,
    width: u8,
    height: u8,
    restart_interval: u16,
    tables: Option<QuantTables>,
}

impl JpegPacketizer {
    /// Create with explicit payload type and SSRC.
    ///
    /// Defaults to type 1 (4:2:0) and Q 75. `width` and `height` are in
    /// 8-pixel blocks.
    pub fn new(pt: u8, ssrc: u32, width: u8, height: u8) -> Self {
        Self::from_header(RtpHeader::new(pt, ssrc), width, height)
    }

    /// Create with a random SSRC (RFC 3550 §8.1).
    pub fn with_random_ssrc(pt: u8, width: u8, height: u8) -> Self {
        Self::from_header(RtpHeader::with_random_ssrc(pt), width, height)
    }

    fn from_header(header: RtpHeader, width: u8, height: u8) -> Self {
        Self {
            header,
            mtu: DEFAULT_MTU,
            type_: 1,
            q: 75,
            width,
            height,
            restart_interval: 0,
            tables: None,
        }
    }

    /// Maximum RTP payload size per packet, RFC 2435 headers included.
    pub fn with_mtu(mut self, mtu: usize) -> Self {
        self.mtu = mtu;
        self
    }

    /// RFC 2435 type; 0 for 4:2:2, 1 for 4:2:0.
    pub fn with_type(mut self, type_: u8) -> Self {
        self.type_ = type_ & 0x3f;
        self
    }

    pub fn with_quality(mut self, q: u8) -> Self {
        self.q = q;
        self
    }

    pub fn with_restart_interval(mut self, interval: u16) -> Self {
        self.restart_interval = interval;
        self
    }

    /// Send `tables` in band. Switches Q to 255 unless already >= 128.
    pub fn with_tables(mut self, tables: QuantTables) -> Self {
        if self.q < 128 {
            self.q = 255;
        }
        self.tables = Some(tables);
        self
    }

    fn wire_type(&self) -> u8 {
        if self.restart_interval != 0 {
            self.type_ | 0x40
        } else {
            self.type_
        }
    }

    /// Scan bytes a fragment at `offset` needs to reach [`MIN_PACKET_LEN`].
    fn min_fragment_data(&self, offset: usize) -> usize {
        let mut headers = MAIN_HEADER_LEN;
        if self.restart_interval != 0 {
            headers += RESTART_HEADER_LEN;
        }
        if offset == 0 && self.q >= 128 {
            headers += QUANT_HEADER_LEN;
        }
        MIN_PACKET_LEN.saturating_sub(RTP_HEADER_LEN + headers)
    }

    fn payload_headers(&self, offset: usize) -> Vec<u8> {
        let mut out =
            Vec::with_capacity(MAIN_HEADER_LEN + RESTART_HEADER_LEN + QUANT_HEADER_LEN + 128);
        JpegHeader {
            type_specific: 0,
            fragment_offset: offset as u32,
            type_: self.wire_type(),
            q: self.q,
            width: self.width,
            height: self.height,
        }
        .write(&mut out);

        if self.restart_interval != 0 {
            RestartHeader {
                interval: self.restart_interval,
                first: true,
                last: true,
                count: 0x3fff,
            }
            .write(&mut out);
        }

        if offset == 0 && self.q >= 128 {
            match &self.tables {
                Some(tables) => QuantTableHeader::write(tables, &mut out),
                None => out.extend_from_slice(&[0, 0, 0, 0]),
            }
        }
        out
    }
}

impl Packetizer for JpegPacketizer {
    fn packetize(&mut self, scan: &[u8], timestamp_increment: u32) -> Vec<Vec<u8>> {
        let mut packets = Vec::new();

        if scan.is_empty() {
            return packets;
        }
        if scan.len() > MAX_FRAGMENT_OFFSET as usize {
            tracing::warn!(
                scan_len = scan.len(),
                "scan too large for 24-bit fragment offsets, frame dropped"
            );
            return packets;
        }

        let mut offset = 0usize;
        while offset < scan.len() {
            let headers = self.payload_headers(offset);
            let room = self.mtu.saturating_sub(headers.len()).max(1);
            let remaining = scan.len() - offset;
            let mut chunk_size = std::cmp::min(room, remaining);
            if chunk_size < remaining {
                let tail = remaining - chunk_size;
                let tail_min = self.min_fragment_data(offset + chunk_size);
                if tail < tail_min {
                    chunk_size = chunk_size.saturating_sub(tail_min - tail).max(1);
                }
            }
            let last = offset + chunk_size == scan.len();

            let rtp = self.header.write(last);
            let mut packet = Vec::with_capacity(MIN_PACKET_LEN + headers.len() + chunk_size);
            packet.extend_from_slice(&rtp);
            packet.extend_from_slice(&headers);
            packet.extend_from_slice(&scan[offset..offset + chunk_size]);
            if packet.len() < MIN_PACKET_LEN {
                let deficit = MIN_PACKET_LEN - packet.len();
                pad(&mut packet, deficit);
            }
            packets.push(packet);

            offset += chunk_size;
        }

        self.header.advance_timestamp(timestamp_increment);

        tracing::trace!(
            rtp_packets = packets.len(),
            scan_bytes = scan.len(),
            seq = self.header.sequence(),
            ts = self.header.timestamp(),
            "frame packetized"
        );

        packets
    }

    fn next_sequence(&self) -> u16 {
        self.header.sequence()
    }

    fn next_rtp_timestamp(&self) -> u32 {
        self.header.timestamp()
    }
}

/// Append RTP padding (RFC 3550 §5.1): `count - 1` zero bytes and the count.
fn pad(packet: &mut Vec<u8>, count: usize) {
    packet[0] |= 0x20;
    packet.resize(packet.len() + count - 1, 0);
    packet.push(count as u8);
}

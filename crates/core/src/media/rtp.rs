use crate::error::{MalformedReason, Result, RtpJpegError};

/// RTP fixed header length (RFC 3550 §5.1).
pub const RTP_HEADER_LEN: usize = 12;

/// Inbound RTP packet, borrowed from the datagram (RFC 3550 §5.1).
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |V=2|P|X|  CC   |M|     PT      |       Sequence Number         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           Timestamp                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                             SSRC                              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// The CSRC list and header extension are skipped, and trailing padding is
/// removed from [`payload`](Self::payload).
#[derive(Debug, Clone, Copy)]
pub struct RtpPacket<'a> {
    pub marker: bool,
    pub payload_type: u8,
    pub sequence: u16,
    pub timestamp: u32,
    pub ssrc: u32,
    pub payload: &'a [u8],
}

impl<'a> RtpPacket<'a> {
    /// Payload type of a datagram without validating anything else.
    pub fn peek_payload_type(data: &[u8]) -> Option<u8> {
        data.get(1).map(|b| b & 0x7f)
    }

    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let len = data.len();
        if len < RTP_HEADER_LEN {
            return Err(RtpJpegError::malformed(len, MalformedReason::TooShort));
        }

        let b0 = data[0];
        let b1 = data[1];
        if b0 >> 6 != 2 {
            return Err(RtpJpegError::malformed(len, MalformedReason::BadVersion));
        }
        let padding = b0 & 0x20 != 0;
        let extension = b0 & 0x10 != 0;
        let csrc_count = usize::from(b0 & 0x0f);

        let mut offset = RTP_HEADER_LEN + csrc_count * 4;
        if extension {
            if len < offset + 4 {
                return Err(RtpJpegError::malformed(len, MalformedReason::TruncatedRtpHeader));
            }
            let words = usize::from(u16::from_be_bytes([data[offset + 2], data[offset + 3]]));
            offset += 4 + words * 4;
        }
        if len < offset {
            return Err(RtpJpegError::malformed(len, MalformedReason::TruncatedRtpHeader));
        }

        let mut end = len;
        if padding {
            let pad = usize::from(data[len - 1]);
            if pad == 0 || end - offset < pad {
                return Err(RtpJpegError::malformed(len, MalformedReason::BadPadding));
            }
            end -= pad;
        }

        Ok(RtpPacket {
            marker: b1 & 0x80 != 0,
            payload_type: b1 & 0x7f,
            sequence: u16::from_be_bytes([data[2], data[3]]),
            timestamp: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            ssrc: u32::from_be_bytes([data[8], data[9], data[10], data[11]]),
            payload: &data[offset..end],
        })
    }
}

/// Sender-side RTP state for one JPEG stream.
///
/// Every [`write`](Self::write) stamps the next sequence number; the
/// timestamp only moves when the packetizer finishes a frame, so all
/// fragments of a frame share it. Both counters wrap. Headers are always
/// version 2 with no padding, extension or CSRCs.
#[derive(Debug)]
pub struct RtpHeader {
    /// Payload type, 26 for static JPEG (RFC 3551).
    pub pt: u8,
    pub ssrc: u32,
    sequence: u16,
    timestamp: u32,
}

impl RtpHeader {
    pub fn new(pt: u8, ssrc: u32) -> Self {
        tracing::debug!(pt, ssrc = format_args!("{:#010X}", ssrc), "RTP sender state");
        Self {
            pt: pt & 0x7f,
            ssrc,
            sequence: 0,
            timestamp: 0,
        }
    }

    /// SSRC drawn at random (RFC 3550 §8.1).
    pub fn with_random_ssrc(pt: u8) -> Self {
        Self::new(pt, rand::random::<u32>())
    }

    /// Sequence number the next packet gets.
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    /// Timestamp of the frame being sent.
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// Header for the next packet of the current frame. `marker` flags the
    /// last fragment (RFC 2435 §3).
    pub fn write(&mut self, marker: bool) -> [u8; RTP_HEADER_LEN] {
        let mut header = [0u8; RTP_HEADER_LEN];
        header[0] = 0x80;
        header[1] = if marker { 0x80 | self.pt } else { self.pt };
        header[2..4].copy_from_slice(&self.sequence.to_be_bytes());
        header[4..8].copy_from_slice(&self.timestamp.to_be_bytes());
        header[8..12].copy_from_slice(&self.ssrc.to_be_bytes());

        self.sequence = self.sequence.wrapping_add(1);
        header
    }

    /// Move to the next frame, `increment` ticks of the 90 kHz clock later.
    pub fn advance_timestamp(&mut self, increment: u32) {
        self.timestamp = self.timestamp.wrapping_add(increment);
    }
}

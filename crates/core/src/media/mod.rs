//! RTP framing for JPEG video.
//!
//! ## RTP overview (RFC 3550)
//!
//! Each JPEG frame travels as one or more RTP packets. Every RTP packet
//! carries a 12-byte fixed header ([`rtp::RtpPacket`] inbound,
//! [`rtp::RtpHeader`] outbound) containing:
//!
//! - **Sequence number** (16-bit, wrapping).
//! - **Timestamp** (32-bit), 90 kHz for video. All fragments of one frame
//!   share it.
//! - **SSRC** (32-bit), randomly chosen to identify the sender.
//! - **Marker bit**, set on the last packet of a frame.
//!
//! ## Modules
//!
//! | Module | RFC | Role |
//! |--------|-----|------|
//! | [`rtp`] | [RFC 3550](https://tools.ietf.org/html/rfc3550) | Fixed header parse/write |
//! | [`mjpeg`] | [RFC 2435](https://tools.ietf.org/html/rfc2435) | JPEG payload headers |
//! | [`packetizer`] | [RFC 2435](https://tools.ietf.org/html/rfc2435) | Scan to RTP packets |

pub mod mjpeg;
pub mod packetizer;
pub mod rtp;

pub use packetizer::JpegPacketizer;

/// Codec-specific RTP packetizer.
///
/// The generic RTP header is handled by [`rtp::RtpHeader`]; packetizers
/// compose it rather than reimplementing header serialization.
pub trait Packetizer: Send {
    /// Packetize one encoded frame into RTP packets.
    ///
    /// Each returned `Vec<u8>` is a complete RTP packet: 12-byte header
    /// (RFC 3550 §5.1) followed by the codec-specific payload.
    ///
    /// `timestamp_increment` advances the RTP timestamp after this frame,
    /// typically `clock_rate / fps` (e.g. 3000 for 30 fps at 90 kHz).
    fn packetize(&mut self, encoded_data: &[u8], timestamp_increment: u32) -> Vec<Vec<u8>>;

    /// Sequence number the next packet will carry.
    fn next_sequence(&self) -> u16;

    /// Timestamp the next frame will carry.
    fn next_rtp_timestamp(&self) -> u32;
}

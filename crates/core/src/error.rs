//! Error types for the RTP/JPEG depacketizer.

use std::fmt;

/// Errors that can occur while receiving and depacketizing RTP/JPEG.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Packet**: [`MalformedPacket`](Self::MalformedPacket),
///   [`WrongPayloadType`](Self::WrongPayloadType). The datagram is dropped
///   and reassembly state is untouched.
/// - **Frame**: [`BufferOverflow`](Self::BufferOverflow),
///   [`MissingQuantTables`](Self::MissingQuantTables). The in-progress frame
///   is discarded.
/// - **Tables**: [`UnsupportedQuantTables`](Self::UnsupportedQuantTables).
/// - **Receiver**: [`Io`](Self::Io), [`NotStarted`](Self::NotStarted),
///   [`AlreadyRunning`](Self::AlreadyRunning).
#[derive(Debug, thiserror::Error)]
pub enum RtpJpegError {
    /// Underlying I/O or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Datagram too short or structurally invalid for RTP + RFC 2435 headers.
    #[error("malformed packet ({len} bytes): {reason}")]
    MalformedPacket { len: usize, reason: MalformedReason },

    /// RTP payload type does not identify JPEG video.
    #[error("unexpected RTP payload type {0}")]
    WrongPayloadType(u8),

    /// Fragment would be written past the end of the reassembly buffer.
    #[error("fragment at offset {offset} with {len} bytes exceeds buffer capacity {capacity}")]
    BufferOverflow {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    /// In-band quantization table header (RFC 2435 §3.1.8) we cannot use.
    #[error("unsupported in-band quantization tables (precision {precision}, length {length})")]
    UnsupportedQuantTables { precision: u8, length: u16 },

    /// A frame with Q >= 128 completed without tables in band or in cache.
    #[error("no quantization tables available for Q={0}")]
    MissingQuantTables(u8),

    /// [`Receiver::start`](crate::Receiver::start) has not been called yet.
    #[error("receiver not started")]
    NotStarted,

    /// [`Receiver::start`](crate::Receiver::start) was called while already running.
    #[error("receiver already running")]
    AlreadyRunning,
}

/// Specific kind of malformed-packet failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    /// Shorter than RTP fixed header plus JPEG main header.
    TooShort,
    /// RTP version field is not 2.
    BadVersion,
    /// CSRC list or header extension runs past the end of the datagram.
    TruncatedRtpHeader,
    /// Padding count larger than the payload.
    BadPadding,
    /// Restart marker or quantization table header is cut off.
    TruncatedJpegHeader,
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort => write!(f, "too short"),
            Self::BadVersion => write!(f, "bad RTP version"),
            Self::TruncatedRtpHeader => write!(f, "truncated RTP header"),
            Self::BadPadding => write!(f, "invalid padding"),
            Self::TruncatedJpegHeader => write!(f, "truncated JPEG payload header"),
        }
    }
}

impl RtpJpegError {
    pub(crate) fn malformed(len: usize, reason: MalformedReason) -> Self {
        Self::MalformedPacket { len, reason }
    }
}

/// Convenience alias for `Result<T, RtpJpegError>`.
pub type Result<T> = std::result::Result<T, RtpJpegError>;

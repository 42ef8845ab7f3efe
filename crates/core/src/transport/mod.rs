//! Network transport for RTP media.
//!
//! RTP/JPEG arrives as plain UDP datagrams ([`udp`]). The receive loop in
//! [`crate::Receiver`] polls the socket with a short read timeout so that
//! [`crate::Receiver::stop`] is observed promptly.

pub mod udp;

pub use udp::UdpTransport;

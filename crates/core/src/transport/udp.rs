use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;

/// Read timeout used to poll the running flag between datagrams.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Largest datagram the transport will hand out.
pub const MAX_DATAGRAM: usize = 65_536;

/// UDP socket carrying RTP packets.
///
/// This layer is address-only: it knows nothing about streams or frames.
/// Callers decide what to do with the source address of each datagram.
#[derive(Debug, Clone)]
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
}

impl UdpTransport {
    /// Bind a UDP socket for inbound RTP.
    pub fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_read_timeout(Some(POLL_INTERVAL))?;
        Ok(Self {
            socket: Arc::new(socket),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive one datagram into `buf`.
    ///
    /// Returns `Ok(None)` when the poll interval elapses with nothing to read.
    pub fn recv_from(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>> {
        match self.socket.recv_from(buf) {
            Ok(received) => Ok(Some(received)),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Send raw bytes to a specific socket address.
    pub fn send_to(&self, payload: &[u8], addr: SocketAddr) -> Result<usize> {
        Ok(self.socket.send_to(payload, addr)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_send_and_receive() {
        let rx = UdpTransport::bind("127.0.0.1:0").unwrap();
        let tx = UdpTransport::bind("127.0.0.1:0").unwrap();
        let to = rx.local_addr().unwrap();

        tx.send_to(&[1, 2, 3], to).unwrap();

        let mut buf = [0u8; 16];
        let mut got = None;
        for _ in 0..40 {
            if let Some(r) = rx.recv_from(&mut buf).unwrap() {
                got = Some(r);
                break;
            }
        }
        let (len, from) = got.expect("datagram");
        assert_eq!(&buf[..len], &[1, 2, 3]);
        assert_eq!(from, tx.local_addr().unwrap());
    }

    #[test]
    fn idle_poll_returns_none() {
        let rx = UdpTransport::bind("127.0.0.1:0").unwrap();
        let mut buf = [0u8; 16];
        assert!(rx.recv_from(&mut buf).unwrap().is_none());
    }
}

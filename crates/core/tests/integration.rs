//! Integration test: RTP/JPEG over UDP loopback into a running receiver.
//!
//! Starts the receiver on a fixed port, packetizes frames with
//! `JpegPacketizer` and checks the JPEGs that reach a channel sink.

use std::net::UdpSocket;
use std::sync::mpsc;
use std::time::Duration;

use rtpjpeg::media::mjpeg::{JPEG_CLOCK_RATE, JPEG_PAYLOAD_TYPE};
use rtpjpeg::{AssembledJpeg, JpegPacketizer, Packetizer, QuantTables, Receiver, ReceiverConfig};

/// Fixed port for integration test. bind_addr must be explicit (no port 0).
const TEST_BIND: &str = "127.0.0.1:15004";

/// One frame at 30 fps.
const FRAME_TICKS: u32 = JPEG_CLOCK_RATE / 30;

fn make_scan(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| seed.wrapping_add((i % 253) as u8)).collect()
}

fn send_all(socket: &UdpSocket, packets: &[Vec<u8>]) {
    for pkt in packets {
        socket.send_to(pkt, TEST_BIND).expect("send datagram");
    }
}

#[test]
fn frames_arrive_over_udp_and_foreign_source_is_ignored() {
    let (tx, rx) = mpsc::channel::<AssembledJpeg>();
    let config = ReceiverConfig {
        bind_addr: TEST_BIND.to_string(),
        ..ReceiverConfig::default()
    };
    let mut receiver = Receiver::new(config, tx);
    receiver.start().expect("receiver start");

    let camera = UdpSocket::bind("127.0.0.1:0").unwrap();
    let intruder = UdpSocket::bind("127.0.0.1:0").unwrap();

    let mut packetizer = JpegPacketizer::new(JPEG_PAYLOAD_TYPE, 0x1111_2222, 80, 60).with_mtu(1200);

    // Frame 1: derived tables, several fragments.
    let first_scan = make_scan(5000, 0);
    send_all(&camera, &packetizer.packetize(&first_scan, FRAME_TICKS));
    let first = rx
        .recv_timeout(Duration::from_secs(2))
        .expect("first frame");
    assert_eq!(&first.as_bytes()[..2], &[0xff, 0xd8]);
    assert_eq!(first.scan(), first_scan.as_slice());
    assert_eq!(first.meta().pixel_width(), 640);
    assert_eq!(first.meta().pixel_height(), 480);
    assert_eq!(first.meta().timestamp, 0);

    // A second sender is dropped while the first is locked in.
    let mut other = JpegPacketizer::new(JPEG_PAYLOAD_TYPE, 0x3333_4444, 10, 10);
    send_all(&intruder, &other.packetize(&make_scan(800, 9), FRAME_TICKS));

    // Frame 2 from the locked source carries its tables in band.
    let tables = QuantTables::Shared([4; 64]);
    let mut packetizer = packetizer.with_tables(tables);
    let second_scan = make_scan(2500, 50);
    send_all(&camera, &packetizer.packetize(&second_scan, FRAME_TICKS));
    let second = rx
        .recv_timeout(Duration::from_secs(2))
        .expect("second frame");
    assert_eq!(second.scan(), second_scan.as_slice());
    assert_eq!(second.meta().quality, 255);
    assert_eq!(second.meta().timestamp, FRAME_TICKS);
    assert_eq!(&second.header()[7..71], &[4; 64]);

    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());

    receiver.stop();
    let stats = receiver.stats();
    assert_eq!(stats.frames, 2);
    assert_eq!(stats.foreign_source, 1);
    assert_eq!(stats.malformed, 0);
    assert_eq!(stats.sink_errors, 0);
}

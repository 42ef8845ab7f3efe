//! Rebuilt frames must decode with a real JPEG decoder.
//!
//! A baseline 4:2:0 image from `jpeg-encoder` is split into its tables and
//! scan, sent through `JpegPacketizer` and `Depacketizer`, and the result is
//! decoded with `jpeg-decoder`.

use jpeg_encoder::{ColorType, Encoder, SamplingFactor};
use rtpjpeg::media::mjpeg::JPEG_PAYLOAD_TYPE;
use rtpjpeg::{Depacketizer, JpegPacketizer, Packetizer, QuantTables};

const SIZE: u16 = 32;
const EOI: [u8; 2] = [0xff, 0xd9];

struct Baseline {
    jpeg: Vec<u8>,
    tables: QuantTables,
    scan: Vec<u8>,
}

fn make_image() -> Vec<u8> {
    let mut pixels = Vec::with_capacity(usize::from(SIZE) * usize::from(SIZE) * 3);
    for y in 0..SIZE {
        for x in 0..SIZE {
            pixels.extend_from_slice(&[(x * 8) as u8, (y * 8) as u8, ((x + y) * 4) as u8]);
        }
    }
    pixels
}

/// Encode the test image and pull out the DQT tables and the scan.
fn make_baseline() -> Baseline {
    let mut jpeg = Vec::new();
    let mut encoder = Encoder::new(&mut jpeg, 90);
    encoder.set_sampling_factor(SamplingFactor::F_2_2);
    encoder.encode(&make_image(), SIZE, SIZE, ColorType::Rgb).unwrap();

    assert_eq!(&jpeg[..2], &[0xff, 0xd8]);
    assert_eq!(&jpeg[jpeg.len() - 2..], &EOI);

    let mut luma = None;
    let mut chroma = None;
    let mut pos = 2;
    let scan_start = loop {
        assert_eq!(jpeg[pos], 0xff);
        let marker = jpeg[pos + 1];
        let len = usize::from(u16::from_be_bytes([jpeg[pos + 2], jpeg[pos + 3]]));
        let body = &jpeg[pos + 4..pos + 2 + len];
        if marker == 0xdb {
            for table in body.chunks(65) {
                assert_eq!(table[0] >> 4, 0, "8-bit tables only");
                let values: [u8; 64] = table[1..].try_into().unwrap();
                match table[0] & 0x0f {
                    0 => luma = Some(values),
                    1 => chroma = Some(values),
                    id => panic!("unexpected table id {id}"),
                }
            }
        }
        pos += 2 + len;
        if marker == 0xda {
            break pos;
        }
    };

    let tables = QuantTables::Separate {
        luma: luma.unwrap(),
        chroma: chroma.unwrap(),
    };
    let scan = jpeg[scan_start..jpeg.len() - 2].to_vec();
    Baseline { jpeg, tables, scan }
}

fn make_packetizer() -> JpegPacketizer {
    let blocks = (SIZE / 8) as u8;
    JpegPacketizer::new(JPEG_PAYLOAD_TYPE, 0x0bad_cafe, blocks, blocks).with_type(1)
}

/// Run `packets` through a depacketizer, marker packet last, and close the
/// stream with EOI.
fn rebuild(packets: Vec<Vec<u8>>) -> Vec<u8> {
    let mut depacketizer = Depacketizer::default();
    let (last, rest) = packets.split_last().unwrap();
    for pkt in rest.iter().rev() {
        assert!(depacketizer.push(pkt).unwrap().is_none());
    }
    let jpeg = depacketizer.push(last).unwrap().unwrap();
    let mut bytes = jpeg.as_bytes().to_vec();
    bytes.extend_from_slice(&EOI);
    bytes
}

fn decode(bytes: &[u8]) -> (Vec<u8>, jpeg_decoder::ImageInfo) {
    let mut decoder = jpeg_decoder::Decoder::new(bytes);
    let pixels = decoder.decode().unwrap();
    let info = decoder.info().unwrap();
    (pixels, info)
}

#[test]
fn inband_tables_decode_like_the_source_image() {
    let baseline = make_baseline();
    let (expected, _) = decode(&baseline.jpeg);

    for mtu in [1400, 200] {
        let mut packetizer = make_packetizer()
            .with_tables(baseline.tables.clone())
            .with_mtu(mtu);
        let packets = packetizer.packetize(&baseline.scan, 3000);
        if mtu == 200 {
            assert!(packets.len() > 1);
        }

        let (pixels, info) = decode(&rebuild(packets));
        assert_eq!(info.width, SIZE);
        assert_eq!(info.height, SIZE);
        assert_eq!(pixels.len(), 3072);
        assert_eq!(pixels, expected);
    }
}

#[test]
fn derived_tables_produce_a_decodable_image() {
    let baseline = make_baseline();
    let mut packetizer = make_packetizer().with_quality(75).with_mtu(200);
    let packets = packetizer.packetize(&baseline.scan, 3000);

    let (pixels, info) = decode(&rebuild(packets));
    assert_eq!((info.width, info.height), (SIZE, SIZE));
    assert_eq!(pixels.len(), 3072);
}

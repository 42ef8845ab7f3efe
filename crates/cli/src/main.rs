use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use rtpjpeg::reassembly::{DEFAULT_CAPACITY, ReassemblerConfig};
use rtpjpeg::receiver::DEFAULT_PORT;
use rtpjpeg::{FileSink, FrameSink, Receiver, ReceiverConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "rtpjpeg-recv",
    about = "Receive an RTP/JPEG (RFC 2435) stream over UDP and rebuild the JPEG frames"
)]
struct Args {
    /// UDP port to listen on
    #[arg(long, short, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Local address to bind
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// Only accept packets from this sender (host:port)
    #[arg(long)]
    source: Option<SocketAddr>,

    /// Save every frame as image-NNNNN.jpg
    #[arg(long, short = 'i')]
    save_images: bool,

    /// Save every synthesized header as header-NNNNN.bin
    #[arg(long, short = 's')]
    save_headers: bool,

    /// Directory for saved files
    #[arg(long, short, default_value = ".")]
    output: PathBuf,

    /// Trace every packet (marker, sequence, offset, timestamp deltas)
    #[arg(long, short = 'd')]
    dump_stats: bool,

    /// Reassembly buffer size in bytes
    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    capacity: usize,

    /// RTP payload type carrying JPEG
    #[arg(long, default_value_t = 26)]
    payload_type: u8,

    /// Log the frame rate every N frames (0 disables)
    #[arg(long, default_value_t = 50)]
    report_every: u64,
}

fn init_tracing(dump_stats: bool) {
    let default = if dump_stats { "info,rtpjpeg=trace" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() {
    let args = Args::parse();
    init_tracing(args.dump_stats);

    let mut sinks: Vec<Box<dyn FrameSink>> = Vec::new();
    if args.save_images || args.save_headers {
        match FileSink::new(&args.output) {
            Ok(sink) => {
                println!("Saving frames to {}", sink.dir().display());
                sinks.push(Box::new(
                    sink.images(args.save_images).headers(args.save_headers),
                ));
            }
            Err(e) => {
                eprintln!("Cannot use output directory {}: {}", args.output.display(), e);
                return;
            }
        }
    }

    let config = ReceiverConfig {
        bind_addr: format!("{}:{}", args.bind, args.port),
        source: args.source,
        reassembler: ReassemblerConfig {
            capacity: args.capacity,
            payload_type: args.payload_type,
        },
        report_every: args.report_every,
    };
    let mut receiver = Receiver::new(config, sinks);

    if let Err(e) = receiver.start() {
        eprintln!("Failed to start receiver: {}", e);
        return;
    }

    println!(
        "RTP/JPEG receiver on {} (press Enter to stop)",
        receiver.config().bind_addr
    );
    let mut input = String::new();
    if let Err(e) = io::stdin().read_line(&mut input) {
        eprintln!("Failed to read stdin: {}", e);
    }

    receiver.stop();

    let stats = receiver.stats();
    println!(
        "{} frames from {} packets ({} bytes); dropped: {} malformed, {} wrong payload type, \
         {} overflow, {} table, {} foreign source; {} sink errors",
        stats.frames,
        stats.packets,
        stats.bytes,
        stats.malformed,
        stats.wrong_payload_type,
        stats.overflows,
        stats.table_errors,
        stats.foreign_source,
        stats.sink_errors
    );
}

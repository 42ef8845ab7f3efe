pub mod error;
pub mod frame;
pub mod jpeg;
pub mod media;
pub mod reassembly;
pub mod receiver;
pub mod sink;
pub mod transport;

pub use error::{MalformedReason, Result, RtpJpegError};
pub use frame::{AssembledJpeg, Depacketizer, FrameAssembler};
pub use jpeg::QuantTables;
pub use media::{JpegPacketizer, Packetizer};
pub use reassembly::{
    CompletedFrame, FragmentReassembler, FrameMetadata, PacketOutcome, ReassemblerConfig,
};
pub use receiver::{Receiver, ReceiverConfig, ReceiverStats};
pub use sink::{FileSink, FrameSink, RateReporter};

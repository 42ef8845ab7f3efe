use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use crate::error::{Result, RtpJpegError};
use crate::frame::Depacketizer;
use crate::reassembly::ReassemblerConfig;
use crate::sink::{FrameSink, RateReporter};
use crate::transport::UdpTransport;
use crate::transport::udp::MAX_DATAGRAM;

/// Default RTP/JPEG listen port.
pub const DEFAULT_PORT: u16 = 50004;

/// Receiver configuration.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Local UDP address to listen on (host:port).
    pub bind_addr: String,
    /// Only accept datagrams from this sender. When `None`, the receiver
    /// locks onto the first address it hears from.
    pub source: Option<SocketAddr>,
    pub reassembler: ReassemblerConfig,
    /// Log the frame rate every this many frames; 0 disables.
    pub report_every: u64,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{DEFAULT_PORT}"),
            source: None,
            reassembler: ReassemblerConfig::default(),
            report_every: 50,
        }
    }
}

/// Counters kept by the receive loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// Datagrams from the locked source.
    pub packets: u64,
    pub bytes: u64,
    /// Frames assembled, whether or not the sink accepted them.
    pub frames: u64,
    pub malformed: u64,
    pub wrong_payload_type: u64,
    pub overflows: u64,
    /// Unsupported in-band tables, or Q >= 128 without any tables.
    pub table_errors: u64,
    /// Datagrams from senders other than the locked source.
    pub foreign_source: u64,
    pub sink_errors: u64,
}

impl ReceiverStats {
    fn record_error(&mut self, err: &RtpJpegError) {
        match err {
            RtpJpegError::MalformedPacket { .. } => self.malformed += 1,
            RtpJpegError::WrongPayloadType(_) => self.wrong_payload_type += 1,
            RtpJpegError::BufferOverflow { .. } => self.overflows += 1,
            RtpJpegError::UnsupportedQuantTables { .. } | RtpJpegError::MissingQuantTables(_) => {
                self.table_errors += 1
            }
            _ => {}
        }
    }
}

/// UDP RTP/JPEG receiver.
///
/// Owns the socket and a worker thread that reads datagrams, reassembles
/// frames and hands each completed JPEG to the sink. The reassembler lives
/// on the worker thread; stats and the sink are shared through
/// [`parking_lot::Mutex`].
pub struct Receiver {
    config: ReceiverConfig,
    running: Arc<AtomicBool>,
    udp: Option<UdpTransport>,
    worker: Option<JoinHandle<()>>,
    sink: Arc<Mutex<Box<dyn FrameSink>>>,
    stats: Arc<Mutex<ReceiverStats>>,
}

impl Receiver {
    pub fn new(config: ReceiverConfig, sink: impl FrameSink + 'static) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            udp: None,
            worker: None,
            sink: Arc::new(Mutex::new(Box::new(sink))),
            stats: Arc::new(Mutex::new(ReceiverStats::default())),
        }
    }

    /// Bind the socket and start the receive loop.
    pub fn start(&mut self) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            return Err(RtpJpegError::AlreadyRunning);
        }

        let udp = UdpTransport::bind(self.config.bind_addr.as_str())?;
        let local_addr = udp.local_addr()?;

        self.running.store(true, Ordering::SeqCst);

        let mut receive_loop = ReceiveLoop {
            udp: udp.clone(),
            depacketizer: Depacketizer::new(self.config.reassembler.clone()),
            reporter: RateReporter::new(self.config.report_every),
            source: self.config.source,
            sink: self.sink.clone(),
            stats: self.stats.clone(),
            running: self.running.clone(),
        };
        self.udp = Some(udp);

        tracing::info!(
            addr = %local_addr,
            source = ?self.config.source,
            "RTP/JPEG receiver listening"
        );

        self.worker = Some(thread::spawn(move || receive_loop.run()));
        Ok(())
    }

    /// Stop the receive loop and wait for it to exit.
    ///
    /// A partially received frame is discarded.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("receive loop panicked");
            }
            tracing::info!("receiver stopped");
        }
        self.udp = None;
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Address the socket is bound to. Useful with port 0.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.udp
            .as_ref()
            .ok_or(RtpJpegError::NotStarted)?
            .local_addr()
    }

    /// Snapshot of the receive counters.
    pub fn stats(&self) -> ReceiverStats {
        *self.stats.lock()
    }

    pub fn config(&self) -> &ReceiverConfig {
        &self.config
    }
}

impl Drop for Receiver {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State owned by the worker thread.
struct ReceiveLoop {
    udp: UdpTransport,
    depacketizer: Depacketizer,
    reporter: RateReporter,
    source: Option<SocketAddr>,
    sink: Arc<Mutex<Box<dyn FrameSink>>>,
    stats: Arc<Mutex<ReceiverStats>>,
    running: Arc<AtomicBool>,
}

impl ReceiveLoop {
    /// Polls the socket, checking the `running` flag between reads so that
    /// [`Receiver::stop`] terminates it within one poll interval.
    fn run(&mut self) {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        while self.running.load(Ordering::SeqCst) {
            match self.udp.recv_from(&mut buf) {
                Ok(Some((len, from))) => self.on_datagram(&buf[..len], from),
                Ok(None) => {}
                Err(e) => {
                    if self.running.load(Ordering::SeqCst) {
                        tracing::warn!(error = %e, "UDP receive error");
                    }
                }
            }
        }
        tracing::debug!("receive loop exited");
    }

    fn on_datagram(&mut self, datagram: &[u8], from: SocketAddr) {
        let source = *self.source.get_or_insert_with(|| {
            tracing::info!(%from, "locked onto RTP source");
            from
        });
        if from != source {
            let mut stats = self.stats.lock();
            stats.foreign_source += 1;
            if stats.foreign_source == 1 {
                tracing::warn!(%from, %source, "ignoring datagrams from a second sender");
            }
            return;
        }

        {
            let mut stats = self.stats.lock();
            stats.packets += 1;
            stats.bytes += datagram.len() as u64;
        }

        match self.depacketizer.push(datagram) {
            Ok(None) => {}
            Ok(Some(jpeg)) => {
                self.stats.lock().frames += 1;
                self.reporter.tick();
                if let Err(e) = self.sink.lock().on_frame(&jpeg) {
                    self.stats.lock().sink_errors += 1;
                    tracing::warn!(error = %e, ts = jpeg.meta().timestamp, "frame sink failed");
                }
            }
            Err(e) => {
                self.stats.lock().record_error(&e);
                match e {
                    RtpJpegError::MalformedPacket { .. } | RtpJpegError::WrongPayloadType(_) => {
                        tracing::debug!(error = %e, %from, "datagram dropped");
                    }
                    _ => tracing::warn!(error = %e, "frame dropped"),
                }
            }
        }
    }
}

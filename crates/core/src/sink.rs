//! Consumers of assembled frames.
//!
//! The [`Receiver`](crate::Receiver) hands every completed image to a
//! [`FrameSink`]. Decoding or display lives behind this seam; the crate
//! ships sinks that write files, forward over a channel, and log the frame
//! rate.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Instant;

use crate::error::{Result, RtpJpegError};
use crate::frame::AssembledJpeg;

/// Receives each assembled JPEG frame.
///
/// Errors are counted by the receiver and do not stop it.
pub trait FrameSink: Send {
    fn on_frame(&mut self, frame: &AssembledJpeg) -> Result<()>;
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn on_frame(&mut self, frame: &AssembledJpeg) -> Result<()> {
        (**self).on_frame(frame)
    }
}

/// Fan-out: every sink sees every frame, the first error is returned.
impl FrameSink for Vec<Box<dyn FrameSink>> {
    fn on_frame(&mut self, frame: &AssembledJpeg) -> Result<()> {
        let mut first_err = None;
        for sink in self.iter_mut() {
            if let Err(e) = sink.on_frame(frame) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

impl FrameSink for mpsc::Sender<AssembledJpeg> {
    fn on_frame(&mut self, frame: &AssembledJpeg) -> Result<()> {
        self.send(frame.clone()).map_err(|_| {
            RtpJpegError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "frame channel closed",
            ))
        })
    }
}

/// Writes frames to numbered files in a directory.
///
/// - `image-NNNNN.jpg`: header and scan, a viewable JPEG.
/// - `header-NNNNN.bin`: the synthesized header alone.
///
/// The number counts frames seen by this sink, starting at 0.
#[derive(Debug)]
pub struct FileSink {
    dir: PathBuf,
    save_images: bool,
    save_headers: bool,
    index: u32,
}

impl FileSink {
    /// Create the sink, creating `dir` if needed. Saves images only.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            save_images: true,
            save_headers: false,
            index: 0,
        })
    }

    pub fn images(mut self, enabled: bool) -> Self {
        self.save_images = enabled;
        self
    }

    pub fn headers(mut self, enabled: bool) -> Self {
        self.save_headers = enabled;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn image_path(&self, index: u32) -> PathBuf {
        self.dir.join(format!("image-{index:05}.jpg"))
    }

    pub fn header_path(&self, index: u32) -> PathBuf {
        self.dir.join(format!("header-{index:05}.bin"))
    }
}

impl FrameSink for FileSink {
    fn on_frame(&mut self, frame: &AssembledJpeg) -> Result<()> {
        let index = self.index;
        self.index = self.index.wrapping_add(1);

        if self.save_images {
            let path = self.image_path(index);
            std::fs::write(&path, frame.as_bytes())?;
            tracing::debug!(path = %path.display(), bytes = frame.len(), "image saved");
        }
        if self.save_headers {
            let path = self.header_path(index);
            std::fs::write(&path, frame.header())?;
            tracing::debug!(path = %path.display(), bytes = frame.header().len(), "header saved");
        }
        Ok(())
    }
}

/// Logs the average frame rate every `report_every` frames.
#[derive(Debug)]
pub struct RateReporter {
    report_every: u64,
    frames: u64,
    started: Option<Instant>,
}

impl RateReporter {
    /// `report_every` of 0 disables reporting.
    pub fn new(report_every: u64) -> Self {
        Self {
            report_every,
            frames: 0,
            started: None,
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Count one frame. Returns the average rate when a report is due.
    pub fn tick(&mut self) -> Option<f64> {
        let started = *self.started.get_or_insert_with(Instant::now);
        self.frames += 1;
        if self.report_every == 0 || self.frames % self.report_every != 0 {
            return None;
        }

        let elapsed = started.elapsed().as_secs_f64();
        let fps = if elapsed > 0.0 {
            self.frames as f64 / elapsed
        } else {
            0.0
        };
        tracing::info!(
            "received {} frames in {}s ({:.2} fps)",
            self.frames,
            elapsed as u64,
            fps
        );
        Some(fps)
    }
}

impl FrameSink for RateReporter {
    fn on_frame(&mut self, _frame: &AssembledJpeg) -> Result<()> {
        self.tick();
        Ok(())
    }
}

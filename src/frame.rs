//! Captured frames and the rolling pre-roll buffer.
//!
//! - `Frame`: owned BGR24 pixel grid with its capture sequence number.
//! - `RollingBuffer`: bounded drop-oldest ring of frames that can be flushed to a
//!   video sink. Flushing never mutates the buffer; the caller clears it after a
//!   successful flush so a failed write cannot lose frames.

use anyhow::{anyhow, Result};
use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::CaptureConfig;
use crate::output::{SinkError, SinkFactory};

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// Pixel dimensions of a frame or video stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Byte length of a BGR24 frame of this size.
    pub fn bgr_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One captured image: `width x height` pixels, 3 channels in B, G, R order.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    /// Capture sequence number assigned by the source.
    pub index: u64,
}

impl Frame {
    /// Wraps BGR24 bytes. Fails when the length does not match the dimensions.
    pub fn from_bgr(data: Vec<u8>, width: u32, height: u32, index: u64) -> Result<Self> {
        let expected = FrameSize::new(width, height).bgr_len();
        if data.len() != expected {
            return Err(anyhow!(
                "BGR frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            index,
        })
    }

    /// Solid-color frame, mostly useful for synthetic sources and tests.
    pub fn filled(size: FrameSize, bgr: [u8; 3], index: u64) -> Self {
        let data = bgr
            .iter()
            .copied()
            .cycle()
            .take(size.bgr_len())
            .collect();
        Self {
            data,
            width: size.width,
            height: size.height,
            index,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bgr(&self) -> &[u8] {
        &self.data
    }

    pub fn bgr_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }

    /// BGR triple at `(x, y)`. Panics when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let offset = (y as usize * self.width as usize + x as usize) * 3;
        [
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
        ]
    }
}

// Pixel payloads are large; keep Debug output to the metadata.
impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("index", &self.index)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// RollingBuffer
// ----------------------------------------------------------------------------

/// Outcome of a successful flush.
#[derive(Clone, Debug, PartialEq)]
pub struct FlushReport {
    pub path: PathBuf,
    pub frames: usize,
    /// Encoded duration in seconds: `frames / fps`.
    pub duration_secs: f64,
}

#[derive(Debug, Error)]
pub enum FlushError {
    #[error("failed to open video sink {}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: SinkError,
    },
    #[error("failed to write frame {position} to {}", .path.display())]
    Write {
        path: PathBuf,
        position: usize,
        #[source]
        source: SinkError,
    },
    #[error("failed to finalize {}", .path.display())]
    Finish {
        path: PathBuf,
        #[source]
        source: SinkError,
    },
}

/// Fill level of the buffer, used by preview indicators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferFill {
    pub len: usize,
    pub capacity: usize,
}

impl BufferFill {
    /// Whole percent, rounded down.
    pub fn percent(&self) -> u32 {
        if self.capacity == 0 {
            return 0;
        }
        (self.len * 100 / self.capacity) as u32
    }
}

impl fmt::Display for BufferFill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Buffer: {}/{} ({}%)",
            self.len,
            self.capacity,
            self.percent()
        )
    }
}

/// Bounded drop-oldest ring of the most recent frames.
///
/// Appending past capacity always evicts from the head, whether or not a flush
/// is pending. The buffer never flushes or clears itself.
pub struct RollingBuffer {
    frames: VecDeque<Frame>,
    capacity: usize,
}

impl RollingBuffer {
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "rolling buffer capacity must be non-zero");
        Self {
            frames: VecDeque::new(),
            capacity,
        }
    }

    /// Capacity of `fps x retention_secs` frames.
    pub fn for_config(config: &CaptureConfig) -> Self {
        Self::new(config.buffer_capacity())
    }

    /// Push a frame at the tail, evicting the oldest frames beyond capacity.
    pub fn append(&mut self, frame: Frame) {
        self.frames.push_back(frame);
        while self.frames.len() > self.capacity {
            self.frames.pop_front();
        }
    }

    pub fn is_full(&self) -> bool {
        self.frames.len() == self.capacity
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn fill(&self) -> BufferFill {
        BufferFill {
            len: self.frames.len(),
            capacity: self.capacity,
        }
    }

    /// Most recently appended frame.
    pub fn latest(&self) -> Option<&Frame> {
        self.frames.back()
    }

    /// Frames oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Frame> + '_ {
        self.frames.iter()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Encode every buffered frame, in order, into a new sink at `path`.
    ///
    /// The buffer is left untouched whatever the outcome.
    pub fn flush(
        &self,
        sinks: &dyn SinkFactory,
        path: &Path,
        fps: f64,
        frame_size: FrameSize,
    ) -> Result<FlushReport, FlushError> {
        let mut sink = sinks
            .open(path, fps, frame_size)
            .map_err(|source| FlushError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        for (position, frame) in self.frames.iter().enumerate() {
            sink.write(frame).map_err(|source| FlushError::Write {
                path: path.to_path_buf(),
                position,
                source,
            })?;
        }
        sink.finish().map_err(|source| FlushError::Finish {
            path: path.to_path_buf(),
            source,
        })?;

        let frames = self.frames.len();
        Ok(FlushReport {
            path: path.to_path_buf(),
            frames,
            duration_secs: frames as f64 / fps,
        })
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

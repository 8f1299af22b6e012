//! Hand-triggered webcam capture
//!
//! Reads frames from a camera, looks for a hand using skin-color segmentation,
//! and keeps the most recent frames in a rolling buffer. When a hand is seen
//! while the buffer is full, the buffered frames are written out as a
//! timestamped video file and the buffer starts over.
//!
//! # Module Structure
//!
//! - `config`: Run configuration (defaults, JSON file, environment overrides)
//! - `frame`: Frames, the rolling buffer, and buffer flushing
//! - `detect`: Skin segmentation, morphology, contour selection, detector backends
//! - `ingest`: Frame sources (synthetic, V4L2, OpenCV)
//! - `output`: Video sinks and output file naming
//! - `preview`: Live preview surfaces (window, terminal, none)
//! - `capture`: The capture loop tying it together

pub mod capture;
pub mod config;
#[cfg(feature = "backend-opencv")]
mod cv;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod output;
pub mod preview;

pub use capture::{run_capture, CaptureStats, FrameOutcome, Recorder};
pub use config::{CaptureConfig, PreviewMode};
pub use detect::{DetectionResult, DetectorRegistry, HandDetector, SkinPolicy};
pub use frame::{BufferFill, FlushError, FlushReport, Frame, FrameSize, RollingBuffer};
pub use ingest::{open_source, FrameSource};
pub use output::{default_sink_factory, OutputNamer, SinkError, SinkFactory, VideoSink};
pub use preview::{open_preview, Preview, PreviewControl, UiMode};

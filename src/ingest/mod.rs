//! Frame sources.
//!
//! - Synthetic source (`stub://name[?frames=N]`) for tests and demos
//! - V4L2 devices (feature: ingest-v4l2)
//! - OpenCV `VideoCapture` (feature: backend-opencv)
//!
//! Every source negotiates its frame size when opened and reports the size it
//! actually delivers, which is what the video writer must use. A read that
//! yields nothing is end of stream (`Ok(None)`), not an error.

use anyhow::{anyhow, Result};

use crate::config::CameraSettings;
use crate::frame::{Frame, FrameSize};

#[cfg(feature = "ingest-v4l2")]
mod normalize;
#[cfg(feature = "backend-opencv")]
pub mod opencv;
pub mod stub;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

#[cfg(feature = "backend-opencv")]
pub use self::opencv::OpenCvSource;
pub use stub::StubSource;
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::V4l2Source;

/// A camera-like producer of BGR frames.
pub trait FrameSource {
    /// Human-readable source identifier for logs.
    fn describe(&self) -> &str;

    /// Negotiated frame size.
    fn frame_size(&self) -> FrameSize;

    /// Next frame, or `None` once the source is exhausted or unreadable.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Release the underlying device. Must be idempotent.
    fn release(&mut self) -> Result<()>;
}

/// Open the source named by `settings.source`.
///
/// `stub://` URLs always resolve; device indices and nodes go to OpenCV when it
/// is compiled in, otherwise to V4L2.
pub fn open_source(settings: &CameraSettings) -> Result<Box<dyn FrameSource>> {
    if settings.source.starts_with("stub://") {
        return Ok(Box::new(StubSource::open(settings)?));
    }

    #[cfg(feature = "backend-opencv")]
    {
        Ok(Box::new(OpenCvSource::open(settings)?))
    }
    #[cfg(all(feature = "ingest-v4l2", not(feature = "backend-opencv")))]
    {
        Ok(Box::new(V4l2Source::open(settings)?))
    }
    #[cfg(not(any(feature = "ingest-v4l2", feature = "backend-opencv")))]
    {
        Err(anyhow!(
            "camera '{}' requires the backend-opencv or ingest-v4l2 feature",
            settings.source
        ))
    }
}

/// Parse `"0"` or `"/dev/video0"` into a device index.
pub fn parse_device_index(source: &str) -> Option<u32> {
    if let Ok(index) = source.trim().parse::<u32>() {
        return Some(index);
    }
    let digits = source.strip_prefix("/dev/video")?;
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        return digits.parse().ok();
    }
    None
}

/// Device node for a source string: indices map to `/dev/videoN`.
pub fn device_path(source: &str) -> Result<String> {
    if let Ok(index) = source.trim().parse::<u32>() {
        return Ok(format!("/dev/video{}", index));
    }
    if source.starts_with('/') {
        return Ok(source.to_string());
    }
    Err(anyhow!("'{}' is neither a device index nor a device path", source))
}

//! Video sinks for flushed buffers.
//!
//! A `SinkFactory` opens one `VideoSink` per flush. Opening is where codec,
//! path and dimension problems surface, so the caller can keep its frames when
//! a file cannot be created.
//!
//! - `FfmpegSinkFactory`: pipes raw BGR frames into the `ffmpeg` CLI.
//! - `OpenCvSinkFactory`: OpenCV `VideoWriter` (feature: backend-opencv).

use chrono::{Local, NaiveDateTime};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::OutputSettings;
use crate::frame::{Frame, FrameSize};

mod ffmpeg;
#[cfg(feature = "backend-opencv")]
mod opencv;

pub use ffmpeg::FfmpegSinkFactory;
#[cfg(feature = "backend-opencv")]
pub use self::opencv::OpenCvSinkFactory;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("unsupported codec '{0}'")]
    UnsupportedCodec(String),
    #[error("invalid frame size {0}")]
    InvalidSize(FrameSize),
    #[error("invalid frame rate {0}")]
    InvalidFrameRate(f64),
    #[error("frame size {actual} does not match sink size {expected}")]
    SizeMismatch {
        expected: FrameSize,
        actual: FrameSize,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Backend(String),
}

/// An open video file accepting frames in presentation order.
pub trait VideoSink {
    fn write(&mut self, frame: &Frame) -> Result<(), SinkError>;

    /// Flush and close the file.
    fn finish(self: Box<Self>) -> Result<(), SinkError>;
}

/// Opens video sinks at a fixed frame rate and size.
pub trait SinkFactory {
    fn name(&self) -> &'static str;

    fn open(
        &self,
        path: &Path,
        fps: f64,
        frame_size: FrameSize,
    ) -> Result<Box<dyn VideoSink>, SinkError>;
}

/// Default sink for this build: OpenCV when compiled in, the ffmpeg CLI otherwise.
pub fn default_sink_factory(settings: &OutputSettings) -> Box<dyn SinkFactory> {
    #[cfg(feature = "backend-opencv")]
    {
        Box::new(OpenCvSinkFactory::new(&settings.fourcc))
    }
    #[cfg(not(feature = "backend-opencv"))]
    {
        Box::new(FfmpegSinkFactory::new(&settings.fourcc))
    }
}

pub(crate) fn check_open_args(fps: f64, frame_size: FrameSize) -> Result<(), SinkError> {
    if frame_size.is_empty() {
        return Err(SinkError::InvalidSize(frame_size));
    }
    if !(fps.is_finite() && fps > 0.0) {
        return Err(SinkError::InvalidFrameRate(fps));
    }
    Ok(())
}

pub(crate) fn check_frame_size(expected: FrameSize, frame: &Frame) -> Result<(), SinkError> {
    if frame.size() != expected {
        return Err(SinkError::SizeMismatch {
            expected,
            actual: frame.size(),
        });
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// Output naming
// ----------------------------------------------------------------------------

/// Produces `<prefix>_<YYYYMMDD>_<HHMMSS>.<ext>` paths.
///
/// Two flushes inside the same second get `_1`, `_2`, ... suffixes, as does any
/// name that already exists on disk.
#[derive(Debug, Clone)]
pub struct OutputNamer {
    dir: PathBuf,
    prefix: String,
    extension: String,
    last_stem: Option<String>,
    last_counter: u32,
}

impl OutputNamer {
    pub fn new(dir: impl Into<PathBuf>, prefix: &str, extension: &str) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.to_string(),
            extension: extension.to_string(),
            last_stem: None,
            last_counter: 0,
        }
    }

    pub fn from_settings(settings: &OutputSettings) -> Self {
        Self::new(&settings.dir, &settings.prefix, &settings.extension)
    }

    /// Next path stamped with the local wall clock.
    pub fn next_path(&mut self) -> PathBuf {
        self.path_for(Local::now().naive_local())
    }

    pub fn path_for(&mut self, at: NaiveDateTime) -> PathBuf {
        let stem = format!("{}_{}", self.prefix, at.format("%Y%m%d_%H%M%S"));
        let mut counter = match &self.last_stem {
            Some(last) if *last == stem => self.last_counter + 1,
            _ => 0,
        };
        let path = loop {
            let candidate = self.dir.join(self.file_name(&stem, counter));
            if !candidate.exists() {
                break candidate;
            }
            counter += 1;
        };
        self.last_stem = Some(stem);
        self.last_counter = counter;
        path
    }

    fn file_name(&self, stem: &str, counter: u32) -> String {
        if counter == 0 {
            format!("{}.{}", stem, self.extension)
        } else {
            format!("{}_{}.{}", stem, counter, self.extension)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn names_follow_timestamp_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let mut namer = OutputNamer::new(dir.path(), "hand_captured", "mp4");
        let path = namer.path_for(at(14, 5, 7));
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "hand_captured_20240309_140507.mp4"
        );
        assert_eq!(path.parent().unwrap(), dir.path());
    }

    #[test]
    fn same_second_gets_counter_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let mut namer = OutputNamer::new(dir.path(), "hand_captured", "mp4");
        let first = namer.path_for(at(9, 0, 0));
        let second = namer.path_for(at(9, 0, 0));
        let third = namer.path_for(at(9, 0, 0));
        let next = namer.path_for(at(9, 0, 1));

        assert!(first.ends_with("hand_captured_20240309_090000.mp4"));
        assert!(second.ends_with("hand_captured_20240309_090000_1.mp4"));
        assert!(third.ends_with("hand_captured_20240309_090000_2.mp4"));
        assert!(next.ends_with("hand_captured_20240309_090001.mp4"));
    }

    #[test]
    fn existing_files_are_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("clip_20240309_120000.avi"), b"x").unwrap();
        let mut namer = OutputNamer::new(dir.path(), "clip", "avi");
        let path = namer.path_for(at(12, 0, 0));
        assert!(path.ends_with("clip_20240309_120000_1.avi"));
    }

    #[test]
    fn open_args_are_validated() {
        assert!(check_open_args(30.0, FrameSize::new(640, 480)).is_ok());
        assert!(matches!(
            check_open_args(30.0, FrameSize::new(0, 480)),
            Err(SinkError::InvalidSize(_))
        ));
        assert!(matches!(
            check_open_args(0.0, FrameSize::new(640, 480)),
            Err(SinkError::InvalidFrameRate(_))
        ));
    }
}

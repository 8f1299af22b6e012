//! Video sink backed by OpenCV's `VideoWriter`.

use std::path::Path;

use opencv::core::Size;
use opencv::prelude::*;
use opencv::videoio::VideoWriter;

use super::{check_frame_size, check_open_args, SinkError, SinkFactory, VideoSink};
use crate::cv::frame_to_mat;
use crate::frame::{Frame, FrameSize};

fn backend_error(err: impl std::fmt::Display) -> SinkError {
    SinkError::Backend(err.to_string())
}

#[derive(Debug, Clone)]
pub struct OpenCvSinkFactory {
    fourcc: String,
}

impl OpenCvSinkFactory {
    pub fn new(fourcc: &str) -> Self {
        Self {
            fourcc: fourcc.to_string(),
        }
    }

    fn fourcc_code(&self) -> Result<i32, SinkError> {
        let chars: Vec<char> = self.fourcc.chars().collect();
        let [a, b, c, d] = chars[..] else {
            return Err(SinkError::UnsupportedCodec(self.fourcc.clone()));
        };
        VideoWriter::fourcc(a, b, c, d).map_err(backend_error)
    }
}

impl SinkFactory for OpenCvSinkFactory {
    fn name(&self) -> &'static str {
        "opencv"
    }

    fn open(
        &self,
        path: &Path,
        fps: f64,
        frame_size: FrameSize,
    ) -> Result<Box<dyn VideoSink>, SinkError> {
        check_open_args(fps, frame_size)?;
        let fourcc = self.fourcc_code()?;
        let filename = path
            .to_str()
            .ok_or_else(|| SinkError::Backend(format!("non UTF-8 path {}", path.display())))?;

        let writer = VideoWriter::new(
            filename,
            fourcc,
            fps,
            Size::new(frame_size.width as i32, frame_size.height as i32),
            true,
        )
        .map_err(backend_error)?;
        if !writer.is_opened().map_err(backend_error)? {
            return Err(SinkError::Backend(format!(
                "video writer refused {} ({} @ {} fps, fourcc {})",
                path.display(),
                frame_size,
                fps,
                self.fourcc
            )));
        }

        Ok(Box::new(OpenCvSink { writer, frame_size }))
    }
}

struct OpenCvSink {
    writer: VideoWriter,
    frame_size: FrameSize,
}

impl VideoSink for OpenCvSink {
    fn write(&mut self, frame: &Frame) -> Result<(), SinkError> {
        check_frame_size(self.frame_size, frame)?;
        let mat = frame_to_mat(frame).map_err(|err| SinkError::Backend(format!("{:#}", err)))?;
        self.writer.write(&mat).map_err(backend_error)
    }

    fn finish(mut self: Box<Self>) -> Result<(), SinkError> {
        self.writer.release().map_err(backend_error)
    }
}

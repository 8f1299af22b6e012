//! OpenCV `VideoCapture` source for device indices, device nodes and files.

use anyhow::{anyhow, Context, Result};
use opencv::core::Mat;
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture};

use super::{parse_device_index, FrameSource};
use crate::config::CameraSettings;
use crate::cv::mat_to_frame;
use crate::frame::{Frame, FrameSize};

pub struct OpenCvSource {
    source: String,
    capture: Option<VideoCapture>,
    scratch: Mat,
    size: FrameSize,
    frame_count: u64,
}

impl OpenCvSource {
    pub fn open(settings: &CameraSettings) -> Result<Self> {
        let mut capture = match parse_device_index(&settings.source) {
            Some(index) => VideoCapture::new(index as i32, videoio::CAP_ANY),
            None => VideoCapture::from_file(&settings.source, videoio::CAP_ANY),
        }
        .with_context(|| format!("create video capture for {}", settings.source))?;

        if !capture.is_opened().context("query video capture state")? {
            return Err(anyhow!("failed to open video source {}", settings.source));
        }

        // Best effort: drivers may ignore any of these.
        let _ = capture.set(videoio::CAP_PROP_FRAME_WIDTH, settings.width as f64);
        let _ = capture.set(videoio::CAP_PROP_FRAME_HEIGHT, settings.height as f64);
        let _ = capture.set(videoio::CAP_PROP_FPS, settings.fps as f64);

        let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as u32;
        let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as u32;
        let size = FrameSize::new(width, height);
        log::info!(
            "OpenCvSource: connected to {} ({}, requested {}x{} @ {} fps)",
            settings.source,
            size,
            settings.width,
            settings.height,
            settings.fps
        );

        Ok(Self {
            source: settings.source.clone(),
            capture: Some(capture),
            scratch: Mat::default(),
            size,
            frame_count: 0,
        })
    }
}

impl FrameSource for OpenCvSource {
    fn describe(&self) -> &str {
        &self.source
    }

    fn frame_size(&self) -> FrameSize {
        self.size
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(capture) = self.capture.as_mut() else {
            return Ok(None);
        };
        match capture.read(&mut self.scratch) {
            Ok(true) => {}
            Ok(false) => return Ok(None),
            Err(err) => {
                log::warn!("OpenCvSource: read from {} failed: {}", self.source, err);
                return Ok(None);
            }
        }
        if self.scratch.empty() {
            return Ok(None);
        }

        let frame = mat_to_frame(&self.scratch, self.frame_count)?;
        self.frame_count += 1;
        Ok(Some(frame))
    }

    fn release(&mut self) -> Result<()> {
        if let Some(mut capture) = self.capture.take() {
            capture.release().context("release video capture")?;
            log::debug!("OpenCvSource: released {}", self.source);
        }
        Ok(())
    }
}

impl Drop for OpenCvSource {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            log::warn!("OpenCvSource: {:#}", err);
        }
    }
}

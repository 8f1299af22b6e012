//! Synthetic frame source.
//!
//! Renders a dark scene in which a skin-colored square periodically enters,
//! drifts to the right and leaves again. `stub://name?frames=N` ends the stream
//! after `N` frames; without it the stream never ends.

use anyhow::{anyhow, Result};

use super::FrameSource;
use crate::config::CameraSettings;
use crate::frame::{Frame, FrameSize};

/// Frames per appear/disappear cycle.
pub const HAND_CYCLE_FRAMES: u64 = 300;
/// Frames at the end of each cycle during which the hand is visible.
pub const HAND_VISIBLE_FRAMES: u64 = 60;

const BACKGROUND_BGR: [u8; 3] = [40, 40, 40];
const SKIN_BGR: [u8; 3] = [105, 172, 224];

#[derive(Clone, Debug)]
pub struct StubSource {
    url: String,
    size: FrameSize,
    limit: Option<u64>,
    frame_count: u64,
    released: bool,
}

impl StubSource {
    pub fn open(settings: &CameraSettings) -> Result<Self> {
        let limit = parse_frame_limit(&settings.source)?;
        let size = FrameSize::new(settings.width, settings.height);
        if size.is_empty() {
            return Err(anyhow!("stub source needs a non-zero frame size"));
        }
        log::info!(
            "StubSource: connected to {} ({}, synthetic)",
            settings.source,
            size
        );
        Ok(Self {
            url: settings.source.clone(),
            size,
            limit,
            frame_count: 0,
            released: false,
        })
    }

    pub fn frames_captured(&self) -> u64 {
        self.frame_count
    }

    /// Whether frame `index` shows the hand.
    pub fn hand_visible(index: u64) -> bool {
        index % HAND_CYCLE_FRAMES >= HAND_CYCLE_FRAMES - HAND_VISIBLE_FRAMES
    }

    fn render(&self, index: u64) -> Frame {
        let mut frame = Frame::filled(self.size, BACKGROUND_BGR, index);
        if !Self::hand_visible(index) {
            return frame;
        }

        let side = (self.size.width.min(self.size.height) / 4).max(1);
        let phase = index % HAND_CYCLE_FRAMES - (HAND_CYCLE_FRAMES - HAND_VISIBLE_FRAMES);
        let travel = self.size.width.saturating_sub(side) as u64;
        let x0 = (travel * phase / HAND_VISIBLE_FRAMES) as u32;
        let y0 = (self.size.height - side) / 2;

        let width = self.size.width as usize;
        let data = frame.bgr_mut();
        for y in y0..y0 + side {
            let row = y as usize * width;
            for x in x0..x0 + side {
                let offset = (row + x as usize) * 3;
                data[offset..offset + 3].copy_from_slice(&SKIN_BGR);
            }
        }
        frame
    }
}

impl FrameSource for StubSource {
    fn describe(&self) -> &str {
        &self.url
    }

    fn frame_size(&self) -> FrameSize {
        self.size
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.released {
            return Ok(None);
        }
        if self.limit.is_some_and(|limit| self.frame_count >= limit) {
            return Ok(None);
        }
        let frame = self.render(self.frame_count);
        self.frame_count += 1;
        Ok(Some(frame))
    }

    fn release(&mut self) -> Result<()> {
        if !self.released {
            self.released = true;
            log::debug!("StubSource: released {}", self.url);
        }
        Ok(())
    }
}

fn parse_frame_limit(url: &str) -> Result<Option<u64>> {
    let Some((_, query)) = url.split_once('?') else {
        return Ok(None);
    };
    for pair in query.split('&') {
        if let Some(value) = pair.strip_prefix("frames=") {
            let frames = value
                .parse()
                .map_err(|_| anyhow!("stub source frames must be an integer, got '{}'", value))?;
            return Ok(Some(frames));
        }
    }
    Ok(None)
}

use anyhow::{Context, Result};
use opencv::core::{Point as CvPoint, Scalar, Vector};
use opencv::highgui;
use opencv::imgproc;

use super::{Preview, PreviewControl};
use crate::cv::{frame_to_mat, mask_to_mat};
use crate::detect::DetectionResult;
use crate::frame::{BufferFill, Frame};

const FEED_WINDOW: &str = "Hand Detector";
const MASK_WINDOW: &str = "Skin Detection";
const QUIT_KEY: i32 = 'q' as i32;

fn green() -> Scalar {
    Scalar::new(0.0, 255.0, 0.0, 0.0)
}

fn blue() -> Scalar {
    Scalar::new(255.0, 0.0, 0.0, 0.0)
}

/// Two OpenCV windows: the annotated feed and the skin mask. `q` quits.
pub struct HighGuiPreview {
    open: bool,
}

impl HighGuiPreview {
    pub fn new() -> Result<Self> {
        highgui::named_window(FEED_WINDOW, highgui::WINDOW_AUTOSIZE)
            .context("create preview window")?;
        highgui::named_window(MASK_WINDOW, highgui::WINDOW_AUTOSIZE)
            .context("create mask window")?;
        log::info!("preview: press 'q' in the preview window to quit");
        Ok(Self { open: true })
    }

    fn put_text(img: &mut opencv::core::Mat, text: &str, y: i32) -> opencv::Result<()> {
        imgproc::put_text(
            img,
            text,
            CvPoint::new(10, y),
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.7,
            green(),
            2,
            imgproc::LINE_8,
            false,
        )
    }
}

impl Preview for HighGuiPreview {
    fn render(
        &mut self,
        frame: &Frame,
        detection: &DetectionResult,
        fill: BufferFill,
    ) -> Result<PreviewControl> {
        if !self.open {
            return Ok(PreviewControl::Quit);
        }
        let mut canvas = frame_to_mat(frame)?;

        if let Some(hand) = &detection.hand {
            let outline: Vector<CvPoint> = hand
                .contour
                .points()
                .iter()
                .map(|p| CvPoint::new(p.x, p.y))
                .collect();
            imgproc::polylines(&mut canvas, &outline, true, green(), 2, imgproc::LINE_8, 0)?;
            imgproc::circle(
                &mut canvas,
                CvPoint::new(hand.center.x, hand.center.y),
                10,
                blue(),
                imgproc::FILLED,
                imgproc::LINE_8,
                0,
            )?;
            Self::put_text(&mut canvas, "Hand detected", 50)?;
        }
        Self::put_text(&mut canvas, &fill.to_string(), 30)?;

        highgui::imshow(FEED_WINDOW, &canvas)?;
        if let Some(mask) = &detection.mask {
            highgui::imshow(MASK_WINDOW, &mask_to_mat(mask)?)?;
        }

        let key = highgui::wait_key(1)?;
        if key >= 0 && (key & 0xFF) == QUIT_KEY {
            return Ok(PreviewControl::Quit);
        }
        Ok(PreviewControl::Continue)
    }

    fn close(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            highgui::destroy_all_windows().context("destroy preview windows")?;
        }
        Ok(())
    }
}

impl Drop for HighGuiPreview {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::warn!("preview: {:#}", err);
        }
    }
}

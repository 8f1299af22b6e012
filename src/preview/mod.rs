//! Live preview surfaces.
//!
//! Presentation only: a preview sees each frame after it has been buffered and
//! can ask the loop to stop, nothing else.

use anyhow::Result;

use crate::config::PreviewMode;
use crate::detect::DetectionResult;
use crate::frame::{BufferFill, Frame};

#[cfg(feature = "backend-opencv")]
mod highgui;
mod terminal;

#[cfg(feature = "backend-opencv")]
pub use highgui::HighGuiPreview;
pub use terminal::{TerminalPreview, UiMode};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreviewControl {
    Continue,
    Quit,
}

pub trait Preview {
    fn render(
        &mut self,
        frame: &Frame,
        detection: &DetectionResult,
        fill: BufferFill,
    ) -> Result<PreviewControl>;

    /// Tear down any surfaces. Must be idempotent.
    fn close(&mut self) -> Result<()>;
}

/// Headless preview.
#[derive(Debug, Default)]
pub struct NullPreview;

impl Preview for NullPreview {
    fn render(
        &mut self,
        _frame: &Frame,
        _detection: &DetectionResult,
        _fill: BufferFill,
    ) -> Result<PreviewControl> {
        Ok(PreviewControl::Continue)
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Build the preview for `mode`. `Auto` prefers a window when OpenCV is built in.
pub fn open_preview(mode: PreviewMode, ui: UiMode) -> Result<Box<dyn Preview>> {
    match mode {
        PreviewMode::None => Ok(Box::new(NullPreview)),
        PreviewMode::Terminal => Ok(Box::new(TerminalPreview::new(ui))),
        PreviewMode::Window => open_window(),
        PreviewMode::Auto => {
            if cfg!(feature = "backend-opencv") {
                open_window()
            } else {
                Ok(Box::new(TerminalPreview::new(ui)))
            }
        }
    }
}

#[cfg(feature = "backend-opencv")]
fn open_window() -> Result<Box<dyn Preview>> {
    Ok(Box::new(HighGuiPreview::new()?))
}

#[cfg(not(feature = "backend-opencv"))]
fn open_window() -> Result<Box<dyn Preview>> {
    Err(anyhow::anyhow!("window preview requires the backend-opencv feature"))
}

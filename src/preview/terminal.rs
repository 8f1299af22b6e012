use anyhow::Result;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::IsTerminal;
use std::time::{Duration, Instant};

use super::{Preview, PreviewControl};
use crate::detect::DetectionResult;
use crate::frame::{BufferFill, Frame};

const PLAIN_REPORT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UiMode {
    #[default]
    Auto,
    Plain,
    Pretty,
}

impl UiMode {
    pub fn from_flag(flag: Option<&str>) -> Self {
        match flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        }
    }
}

/// Buffer fill and detection status on stderr.
///
/// On a TTY this is a progress bar; otherwise a status line at most once per second.
pub struct TerminalPreview {
    bar: Option<ProgressBar>,
    last_report: Option<Instant>,
    closed: bool,
}

impl TerminalPreview {
    pub fn new(mode: UiMode) -> Self {
        Self::with_tty(mode, std::io::stderr().is_terminal())
    }

    fn with_tty(mode: UiMode, is_tty: bool) -> Self {
        let use_pretty = is_tty
            && match mode {
                UiMode::Pretty | UiMode::Auto => true,
                UiMode::Plain => false,
            };

        let bar = use_pretty.then(|| {
            let bar = ProgressBar::new(0);
            bar.set_draw_target(ProgressDrawTarget::stderr());
            let style = ProgressStyle::with_template(
                "{spinner} buffer [{bar:30}] {pos}/{len} ({percent}%) {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar());
            bar.set_style(style);
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        });

        Self {
            bar,
            last_report: None,
            closed: false,
        }
    }
}

fn status_message(detection: &DetectionResult) -> String {
    match &detection.hand {
        Some(hand) => format!(
            "Hand detected at ({}, {}) area {:.0}",
            hand.center.x, hand.center.y, hand.area
        ),
        None => "no hand".to_string(),
    }
}

impl Preview for TerminalPreview {
    fn render(
        &mut self,
        _frame: &Frame,
        detection: &DetectionResult,
        fill: BufferFill,
    ) -> Result<PreviewControl> {
        if self.closed {
            return Ok(PreviewControl::Continue);
        }
        let message = status_message(detection);
        match &self.bar {
            Some(bar) => {
                bar.set_length(fill.capacity as u64);
                bar.set_position(fill.len as u64);
                bar.set_message(message);
            }
            None => {
                let due = self
                    .last_report
                    .map_or(true, |at| at.elapsed() >= PLAIN_REPORT_INTERVAL);
                if due {
                    eprintln!("{} {}", fill, message);
                    self.last_report = Some(Instant::now());
                }
            }
        }
        Ok(PreviewControl::Continue)
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            if let Some(bar) = self.bar.take() {
                bar.finish_and_clear();
            }
        }
        Ok(())
    }
}

impl Drop for TerminalPreview {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

//! Video sink backed by the `ffmpeg` command-line encoder.
//!
//! Raw BGR24 frames are piped to the child's stdin; the fourcc picks the encoder.
//! The output file is created before the child starts so path problems are
//! reported at open time, and removed again unless `finish` succeeds.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use super::{check_frame_size, check_open_args, SinkError, SinkFactory, VideoSink};
use crate::frame::{Frame, FrameSize};

/// Encoder name and optional container tag for a fourcc.
fn encoder_for(fourcc: &str) -> Result<(&'static str, Option<&'static str>), SinkError> {
    match fourcc {
        "mp4v" | "MP4V" | "FMP4" => Ok(("mpeg4", Some("mp4v"))),
        "XVID" | "xvid" => Ok(("mpeg4", Some("xvid"))),
        "MJPG" | "mjpg" => Ok(("mjpeg", None)),
        "avc1" | "H264" | "h264" | "X264" => Ok(("libx264", None)),
        other => Err(SinkError::UnsupportedCodec(other.to_string())),
    }
}

#[derive(Debug, Clone)]
pub struct FfmpegSinkFactory {
    fourcc: String,
    program: PathBuf,
}

impl FfmpegSinkFactory {
    pub fn new(fourcc: &str) -> Self {
        Self {
            fourcc: fourcc.to_string(),
            program: PathBuf::from("ffmpeg"),
        }
    }

    /// Use a specific ffmpeg executable instead of the one on `PATH`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }
}

impl SinkFactory for FfmpegSinkFactory {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    fn open(
        &self,
        path: &Path,
        fps: f64,
        frame_size: FrameSize,
    ) -> Result<Box<dyn VideoSink>, SinkError> {
        check_open_args(fps, frame_size)?;
        let (encoder, tag) = encoder_for(&self.fourcc)?;

        File::create(path)?;

        let mut cmd = Command::new(&self.program);
        cmd.arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-y")
            .arg("-f")
            .arg("rawvideo")
            .arg("-pix_fmt")
            .arg("bgr24")
            .arg("-video_size")
            .arg(frame_size.to_string())
            .arg("-framerate")
            .arg(fps.to_string())
            .arg("-i")
            .arg("-")
            .arg("-an")
            .arg("-c:v")
            .arg(encoder);
        if let Some(tag) = tag {
            cmd.arg("-tag:v").arg(tag);
        }
        cmd.arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                let _ = fs::remove_file(path);
                return Err(SinkError::Io(err));
            }
        };
        let Some(stdin) = child.stdin.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(SinkError::Backend("failed to capture ffmpeg stdin".into()));
        };

        log::debug!(
            "ffmpeg sink: encoding {} at {} fps with {} -> {}",
            frame_size,
            fps,
            encoder,
            path.display()
        );

        Ok(Box::new(FfmpegSink {
            child,
            stdin: Some(stdin),
            frame_size,
            path: path.to_path_buf(),
            completed: false,
        }))
    }
}

struct FfmpegSink {
    child: Child,
    stdin: Option<ChildStdin>,
    frame_size: FrameSize,
    path: PathBuf,
    completed: bool,
}

impl VideoSink for FfmpegSink {
    fn write(&mut self, frame: &Frame) -> Result<(), SinkError> {
        check_frame_size(self.frame_size, frame)?;
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| SinkError::Backend("ffmpeg sink already closed".into()))?;
        stdin.write_all(frame.bgr())?;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<(), SinkError> {
        // Closing stdin signals end of input.
        drop(self.stdin.take());
        let status = self.child.wait()?;
        if !status.success() {
            return Err(SinkError::Backend(format!("ffmpeg exited with {}", status)));
        }
        self.completed = true;
        Ok(())
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if self.stdin.take().is_some() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
        // A file that did not encode every frame must not look like a clip.
        if !self.completed {
            if let Err(err) = fs::remove_file(&self.path) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("ffmpeg sink: could not remove {}: {}", self.path.display(), err);
                }
            }
        }
    }
}

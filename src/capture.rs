//! Capture loop: detect, maybe flush, buffer, preview.
//!
//! Per frame the trigger is evaluated against the buffer as it was *before* the
//! frame arrives: a detected hand on a full buffer flushes the buffered frames,
//! clears the buffer on success, and only then appends the triggering frame, so
//! that frame opens the next epoch instead of closing the flushed one.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::config::CaptureConfig;
use crate::detect::HandDetector;
use crate::frame::{FlushError, FlushReport, Frame, FrameSize, RollingBuffer};
use crate::ingest::FrameSource;
use crate::output::{OutputNamer, SinkFactory};
use crate::preview::{Preview, PreviewControl};

/// Counters for one capture run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CaptureStats {
    pub frames: u64,
    pub detections: u64,
    pub flushes: u64,
    pub failed_flushes: u64,
    pub files: Vec<PathBuf>,
}

/// What happened to a frame handed to the recorder.
#[derive(Debug)]
pub enum FrameOutcome {
    Buffered,
    Flushed(FlushReport),
    FlushFailed(FlushError),
}

/// Rolling buffer plus the flush trigger.
pub struct Recorder {
    buffer: RollingBuffer,
    sinks: Box<dyn SinkFactory>,
    namer: OutputNamer,
    fps: f64,
    frame_size: FrameSize,
    stats: CaptureStats,
}

impl Recorder {
    /// `frame_size` is the size the source actually negotiated.
    pub fn new(config: &CaptureConfig, frame_size: FrameSize, sinks: Box<dyn SinkFactory>) -> Self {
        Self {
            buffer: RollingBuffer::for_config(config),
            sinks,
            namer: OutputNamer::from_settings(&config.output),
            fps: config.camera.fps as f64,
            frame_size,
            stats: CaptureStats::default(),
        }
    }

    pub fn buffer(&self) -> &RollingBuffer {
        &self.buffer
    }

    pub fn stats(&self) -> &CaptureStats {
        &self.stats
    }

    pub fn into_stats(self) -> CaptureStats {
        self.stats
    }

    /// Apply the trigger policy to one captured frame.
    pub fn process(&mut self, frame: Frame, hand_detected: bool) -> FrameOutcome {
        self.stats.frames += 1;
        if hand_detected {
            self.stats.detections += 1;
        }

        let outcome = if hand_detected && self.buffer.is_full() {
            self.flush()
        } else {
            FrameOutcome::Buffered
        };

        self.buffer.append(frame);
        outcome
    }

    fn flush(&mut self) -> FrameOutcome {
        let path = self.namer.next_path();
        let started = Instant::now();
        match self
            .buffer
            .flush(self.sinks.as_ref(), &path, self.fps, self.frame_size)
        {
            Ok(report) => {
                self.buffer.clear();
                self.stats.flushes += 1;
                self.stats.files.push(report.path.clone());
                log::info!(
                    "saved {} ({} frames, {:.2}s of video) in {}",
                    report.path.display(),
                    report.frames,
                    report.duration_secs,
                    format_duration(started.elapsed())
                );
                FrameOutcome::Flushed(report)
            }
            Err(err) => {
                // Keep the frames; the next trigger retries with whatever is buffered then.
                self.stats.failed_flushes += 1;
                match std::error::Error::source(&err) {
                    Some(cause) => log::error!("{} via {}: {}", err, self.sinks.name(), cause),
                    None => log::error!("{} via {}", err, self.sinks.name()),
                }
                FrameOutcome::FlushFailed(err)
            }
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Releases the camera and preview on every exit path, unwinding included.
struct SessionGuard<'s, 'p> {
    source: &'s mut dyn FrameSource,
    preview: &'p mut dyn Preview,
}

impl Drop for SessionGuard<'_, '_> {
    fn drop(&mut self) {
        if let Err(err) = self.source.release() {
            log::warn!("releasing {} failed: {:#}", self.source.describe(), err);
        }
        if let Err(err) = self.preview.close() {
            log::warn!("closing preview failed: {:#}", err);
        }
        log::info!("resources released");
    }
}

/// Run until end of stream, a quit from the preview, `stop`, or `config.max_frames`.
pub fn run_capture(
    config: &CaptureConfig,
    source: &mut dyn FrameSource,
    detector: &mut dyn HandDetector,
    sinks: Box<dyn SinkFactory>,
    preview: &mut dyn Preview,
    stop: &AtomicBool,
) -> Result<CaptureStats> {
    let guard = SessionGuard { source, preview };
    let mut recorder = Recorder::new(config, guard.source.frame_size(), sinks);
    capture_frames(config, guard, detector, &mut recorder, stop)?;
    Ok(recorder.into_stats())
}

fn capture_frames(
    config: &CaptureConfig,
    mut guard: SessionGuard<'_, '_>,
    detector: &mut dyn HandDetector,
    recorder: &mut Recorder,
    stop: &AtomicBool,
) -> Result<()> {
    log::info!(
        "capturing from {} ({}) with {} detector; buffer holds {} frames ({} s at {} fps)",
        guard.source.describe(),
        guard.source.frame_size(),
        detector.name(),
        recorder.buffer().capacity(),
        config.buffer.retention_secs,
        config.camera.fps
    );

    loop {
        if stop.load(Ordering::SeqCst) {
            log::info!("stop requested");
            break;
        }
        if config
            .max_frames
            .is_some_and(|limit| recorder.stats().frames >= limit)
        {
            log::info!("frame limit reached");
            break;
        }

        let Some(frame) = guard.source.next_frame()? else {
            log::info!("end of stream from {}", guard.source.describe());
            break;
        };

        let detection = detector.detect(&frame);
        recorder.process(frame, detection.hand_detected());

        let fill = recorder.buffer().fill();
        if let Some(latest) = recorder.buffer().latest() {
            if guard.preview.render(latest, &detection, fill)? == PreviewControl::Quit {
                log::info!("quit requested from preview");
                break;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameSize;
    use crate::output::{SinkError, VideoSink};
    use std::cell::RefCell;
    use std::path::Path;
    use std::rc::Rc;

    type Written = Rc<RefCell<Vec<Vec<u64>>>>;

    struct MemorySinks {
        clips: Written,
        fail: Rc<RefCell<bool>>,
    }

    struct MemorySink {
        clips: Written,
        frames: Vec<u64>,
    }

    impl VideoSink for MemorySink {
        fn write(&mut self, frame: &Frame) -> Result<(), SinkError> {
            self.frames.push(frame.index);
            Ok(())
        }

        fn finish(self: Box<Self>) -> Result<(), SinkError> {
            self.clips.borrow_mut().push(self.frames);
            Ok(())
        }
    }

    impl SinkFactory for MemorySinks {
        fn name(&self) -> &'static str {
            "memory"
        }

        fn open(
            &self,
            _path: &Path,
            _fps: f64,
            _size: FrameSize,
        ) -> Result<Box<dyn VideoSink>, SinkError> {
            if *self.fail.borrow() {
                return Err(SinkError::Backend("refused".into()));
            }
            Ok(Box::new(MemorySink {
                clips: self.clips.clone(),
                frames: Vec::new(),
            }))
        }
    }

    fn recorder(capacity_secs: u32, fps: u32) -> (Recorder, Written, Rc<RefCell<bool>>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = CaptureConfig::default();
        config.camera.fps = fps;
        config.buffer.retention_secs = capacity_secs;
        config.output.dir = dir.path().to_path_buf();
        let clips: Written = Rc::default();
        let fail = Rc::new(RefCell::new(false));
        let sinks = MemorySinks {
            clips: clips.clone(),
            fail: fail.clone(),
        };
        let rec = Recorder::new(&config, FrameSize::new(2, 2), Box::new(sinks));
        (rec, clips, fail, dir)
    }

    fn frame(index: u64) -> Frame {
        Frame::filled(FrameSize::new(2, 2), [0, 0, 0], index)
    }

    #[test]
    fn detection_before_full_only_buffers() {
        let (mut rec, clips, _, _dir) = recorder(1, 4);
        for i in 0..3 {
            assert!(matches!(rec.process(frame(i), true), FrameOutcome::Buffered));
        }
        assert!(clips.borrow().is_empty());
        assert_eq!(rec.buffer().len(), 3);
    }

    #[test]
    fn full_buffer_without_detection_keeps_rolling() {
        let (mut rec, clips, _, _dir) = recorder(1, 4);
        for i in 0..10 {
            rec.process(frame(i), false);
        }
        assert!(clips.borrow().is_empty());
        let kept: Vec<u64> = rec.buffer().iter().map(|f| f.index).collect();
        assert_eq!(kept, vec![6, 7, 8, 9]);
    }

    #[test]
    fn triggering_frame_starts_next_epoch() {
        let (mut rec, clips, _, _dir) = recorder(1, 4);
        for i in 0..4 {
            rec.process(frame(i), false);
        }
        let outcome = rec.process(frame(4), true);
        let FrameOutcome::Flushed(report) = outcome else {
            panic!("expected a flush");
        };
        assert_eq!(report.frames, 4);
        assert!((report.duration_secs - 1.0).abs() < 1e-9);
        assert_eq!(*clips.borrow(), vec![vec![0, 1, 2, 3]]);

        let kept: Vec<u64> = rec.buffer().iter().map(|f| f.index).collect();
        assert_eq!(kept, vec![4]);
        assert_eq!(rec.stats().flushes, 1);
        assert_eq!(rec.stats().files.len(), 1);
    }

    #[test]
    fn failed_flush_keeps_frames_and_retries() {
        let (mut rec, clips, fail, _dir) = recorder(1, 3);
        for i in 0..3 {
            rec.process(frame(i), false);
        }
        *fail.borrow_mut() = true;
        assert!(matches!(
            rec.process(frame(3), true),
            FrameOutcome::FlushFailed(FlushError::Open { .. })
        ));
        let kept: Vec<u64> = rec.buffer().iter().map(|f| f.index).collect();
        assert_eq!(kept, vec![1, 2, 3]);
        assert_eq!(rec.stats().failed_flushes, 1);

        *fail.borrow_mut() = false;
        assert!(matches!(rec.process(frame(4), true), FrameOutcome::Flushed(_)));
        assert_eq!(*clips.borrow(), vec![vec![1, 2, 3]]);
        assert_eq!(rec.buffer().len(), 1);
    }

    #[test]
    fn consecutive_flushes_get_distinct_paths() {
        let (mut rec, _clips, _, _dir) = recorder(1, 2);
        for i in 0..2 {
            rec.process(frame(i), false);
        }
        rec.process(frame(2), true);
        rec.process(frame(3), false);
        rec.process(frame(4), true);
        let files = &rec.stats().files;
        assert_eq!(files.len(), 2);
        assert_ne!(files[0], files[1]);
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }
}

use std::cell::{Cell, RefCell};
use std::path::Path;
use std::rc::Rc;
use std::sync::atomic::AtomicBool;

use anyhow::{anyhow, Result};

use hand_capture::detect::{CpuBackend, HandDetector};
use hand_capture::ingest::StubSource;
use hand_capture::preview::NullPreview;
use hand_capture::{
    run_capture, BufferFill, CaptureConfig, DetectionResult, Frame, FrameSize, FrameSource,
    Preview, PreviewControl, SinkError, SinkFactory, VideoSink,
};

type Clips = Rc<RefCell<Vec<Vec<u64>>>>;

struct MemorySinks {
    clips: Clips,
    refuse: bool,
}

struct MemorySink {
    clips: Clips,
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
        _frame_size: FrameSize,
    ) -> Result<Box<dyn VideoSink>, SinkError> {
        if self.refuse {
            return Err(SinkError::Backend("disk full".into()));
        }
        Ok(Box::new(MemorySink {
            clips: self.clips.clone(),
            frames: Vec::new(),
        }))
    }
}

/// Reports a hand exactly when the synthetic scene shows one.
struct ScriptedDetector;

impl HandDetector for ScriptedDetector {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, frame: &Frame) -> DetectionResult {
        let mut result = DetectionResult::default();
        if StubSource::hand_visible(frame.index) {
            result.hand = Some(hand_capture::detect::HandDetection {
                center: hand_capture::detect::Point::new(0, 0),
                contour: hand_capture::detect::Contour::default(),
                area: 5000.0,
            });
        }
        result
    }
}

struct TrackedSource {
    inner: StubSource,
    releases: Rc<Cell<u32>>,
    fail_at: Option<u64>,
}

impl FrameSource for TrackedSource {
    fn describe(&self) -> &str {
        self.inner.describe()
    }

    fn frame_size(&self) -> FrameSize {
        self.inner.frame_size()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.fail_at == Some(self.inner.frames_captured()) {
            return Err(anyhow!("camera unplugged"));
        }
        self.inner.next_frame()
    }

    fn release(&mut self) -> Result<()> {
        self.releases.set(self.releases.get() + 1);
        self.inner.release()
    }
}

struct CountingPreview {
    renders: u64,
    quit_after: Option<u64>,
    closes: Rc<Cell<u32>>,
    fills: Vec<BufferFill>,
}

impl Preview for CountingPreview {
    fn render(
        &mut self,
        _frame: &Frame,
        _detection: &DetectionResult,
        fill: BufferFill,
    ) -> Result<PreviewControl> {
        self.renders += 1;
        self.fills.push(fill);
        if self.quit_after == Some(self.renders) {
            return Ok(PreviewControl::Quit);
        }
        Ok(PreviewControl::Continue)
    }

    fn close(&mut self) -> Result<()> {
        self.closes.set(self.closes.get() + 1);
        Ok(())
    }
}

fn config(source: &str, out: &Path) -> CaptureConfig {
    let mut cfg = CaptureConfig::default();
    cfg.camera.source = source.to_string();
    cfg.camera.width = 80;
    cfg.camera.height = 60;
    cfg.camera.fps = 2;
    cfg.buffer.retention_secs = 10;
    cfg.output.dir = out.to_path_buf();
    cfg
}

fn tracked(cfg: &CaptureConfig, fail_at: Option<u64>) -> (TrackedSource, Rc<Cell<u32>>) {
    let releases = Rc::new(Cell::new(0));
    let source = TrackedSource {
        inner: StubSource::open(&cfg.camera).expect("stub source"),
        releases: releases.clone(),
        fail_at,
    };
    (source, releases)
}

#[test]
fn flushes_full_buffer_and_starts_next_epoch_with_trigger_frame() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config("stub://cam?frames=300", dir.path());
    let (mut source, releases) = tracked(&cfg, None);
    let clips: Clips = Rc::default();
    let sinks = MemorySinks {
        clips: clips.clone(),
        refuse: false,
    };

    let stats = run_capture(
        &cfg,
        &mut source,
        &mut ScriptedDetector,
        Box::new(sinks),
        &mut NullPreview,
        &AtomicBool::new(false),
    )
    .unwrap();

    assert_eq!(stats.frames, 300);
    assert_eq!(stats.detections, 60);
    // Capacity is 20 frames; the hand is visible from frame 240 on.
    let clips = clips.borrow();
    assert_eq!(clips.len(), 3);
    assert_eq!(clips[0], (220..240).collect::<Vec<u64>>());
    assert_eq!(clips[1], (240..260).collect::<Vec<u64>>());
    assert_eq!(clips[2], (260..280).collect::<Vec<u64>>());
    assert_eq!(stats.flushes, 3);
    assert_eq!(stats.files.len(), 3);
    assert_eq!(releases.get(), 1);
}

#[test]
fn refused_sink_keeps_capturing() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config("stub://cam?frames=260", dir.path());
    let (mut source, releases) = tracked(&cfg, None);
    let clips: Clips = Rc::default();
    let sinks = MemorySinks {
        clips: clips.clone(),
        refuse: true,
    };

    let stats = run_capture(
        &cfg,
        &mut source,
        &mut ScriptedDetector,
        Box::new(sinks),
        &mut NullPreview,
        &AtomicBool::new(false),
    )
    .unwrap();

    assert_eq!(stats.frames, 260);
    assert_eq!(stats.flushes, 0);
    // Every visible-hand frame on a full buffer retries the flush.
    assert_eq!(stats.failed_flushes, 20);
    assert!(stats.files.is_empty());
    assert!(clips.borrow().is_empty());
    assert_eq!(releases.get(), 1);
}

#[test]
fn cpu_detector_triggers_on_synthetic_hand() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config("stub://cam?frames=300", dir.path());
    cfg.detector.policy.min_hand_area = 100.0;
    let (mut source, _releases) = tracked(&cfg, None);
    let clips: Clips = Rc::default();
    let sinks = MemorySinks {
        clips: clips.clone(),
        refuse: false,
    };
    let mut detector = CpuBackend::new(cfg.detector.policy.clone());

    let stats = run_capture(
        &cfg,
        &mut source,
        &mut detector,
        Box::new(sinks),
        &mut NullPreview,
        &AtomicBool::new(false),
    )
    .unwrap();

    assert_eq!(stats.detections, 60);
    assert_eq!(stats.flushes, 3);
    assert_eq!(clips.borrow()[0], (220..240).collect::<Vec<u64>>());
}

#[test]
fn source_error_still_releases_resources() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config("stub://cam", dir.path());
    let (mut source, releases) = tracked(&cfg, Some(5));
    let closes = Rc::new(Cell::new(0));
    let mut preview = CountingPreview {
        renders: 0,
        quit_after: None,
        closes: closes.clone(),
        fills: Vec::new(),
    };
    let sinks = MemorySinks {
        clips: Rc::default(),
        refuse: false,
    };

    let err = run_capture(
        &cfg,
        &mut source,
        &mut ScriptedDetector,
        Box::new(sinks),
        &mut preview,
        &AtomicBool::new(false),
    )
    .unwrap_err();

    assert!(err.to_string().contains("camera unplugged"));
    assert_eq!(preview.renders, 5);
    assert_eq!(releases.get(), 1);
    assert_eq!(closes.get(), 1);
}

#[test]
fn preview_quit_and_frame_limit_stop_the_loop() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config("stub://cam", dir.path());
    let (mut source, releases) = tracked(&cfg, None);
    let closes = Rc::new(Cell::new(0));
    let mut preview = CountingPreview {
        renders: 0,
        quit_after: Some(7),
        closes: closes.clone(),
        fills: Vec::new(),
    };
    let stats = run_capture(
        &cfg,
        &mut source,
        &mut ScriptedDetector,
        Box::new(MemorySinks {
            clips: Rc::default(),
            refuse: false,
        }),
        &mut preview,
        &AtomicBool::new(false),
    )
    .unwrap();
    assert_eq!(stats.frames, 7);
    assert_eq!(releases.get(), 1);
    assert_eq!(closes.get(), 1);
    assert_eq!(preview.fills.last().unwrap().to_string(), "Buffer: 7/20 (35%)");

    let mut cfg = config("stub://cam", dir.path());
    cfg.max_frames = Some(5);
    let (mut source, releases) = tracked(&cfg, None);
    let stats = run_capture(
        &cfg,
        &mut source,
        &mut ScriptedDetector,
        Box::new(MemorySinks {
            clips: Rc::default(),
            refuse: false,
        }),
        &mut NullPreview,
        &AtomicBool::new(false),
    )
    .unwrap();
    assert_eq!(stats.frames, 5);
    assert_eq!(releases.get(), 1);
}

#[test]
fn stop_flag_ends_before_first_frame() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config("stub://cam", dir.path());
    let (mut source, releases) = tracked(&cfg, None);
    let stats = run_capture(
        &cfg,
        &mut source,
        &mut ScriptedDetector,
        Box::new(MemorySinks {
            clips: Rc::default(),
            refuse: false,
        }),
        &mut NullPreview,
        &AtomicBool::new(true),
    )
    .unwrap();
    assert_eq!(stats.frames, 0);
    assert_eq!(source.inner.frames_captured(), 0);
    assert_eq!(releases.get(), 1);
}

//! hand_capture - hand-triggered webcam recorder
//!
//! This binary:
//! 1. Opens the configured camera (or a `stub://` synthetic source)
//! 2. Looks for a hand in every frame via skin-color segmentation
//! 3. Keeps the last `fps * retention_secs` frames in a rolling buffer
//! 4. Writes the buffer to a timestamped video when a hand shows up on a full buffer
//! 5. Stops on Ctrl-C, `q` in the preview window, end of stream, or `--max-frames`

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hand_capture::{
    default_sink_factory, open_preview, open_source, run_capture, CaptureConfig,
    DetectorRegistry, PreviewMode, UiMode,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Record the seconds before a hand appears in front of the camera"
)]
struct Args {
    /// JSON config file. Environment overrides still apply on top of it.
    #[arg(long, env = "HAND_CAPTURE_CONFIG")]
    config: Option<PathBuf>,

    /// Camera index, device node, or stub://name[?frames=N].
    #[arg(long)]
    camera: Option<String>,

    /// Directory for captured videos.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Detector backend (cpu, opencv).
    #[arg(long)]
    detector: Option<String>,

    /// Preview: auto, window, terminal, none.
    #[arg(long)]
    preview: Option<PreviewMode>,

    /// Terminal preview style: auto, plain, pretty.
    #[arg(long, env = "HAND_CAPTURE_UI")]
    ui: Option<String>,

    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,

    /// List detector backends compiled into this build and exit.
    #[arg(long)]
    list_detectors: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = CaptureConfig::load_from(args.config.as_deref())?;
    if let Some(camera) = args.camera {
        config.camera.source = camera;
    }
    if let Some(dir) = args.output_dir {
        config.output.dir = dir;
    }
    if let Some(detector) = args.detector {
        config.detector.backend = detector.trim().to_lowercase();
    }
    if let Some(preview) = args.preview {
        config.preview = preview;
    }
    if args.max_frames.is_some() {
        config.max_frames = args.max_frames;
    }
    config.validate()?;

    let mut registry = DetectorRegistry::builtin(&config.detector.policy);
    if args.list_detectors {
        for name in registry.list() {
            println!("{}", name);
        }
        return Ok(());
    }

    if !config.output.dir.is_dir() {
        return Err(anyhow!(
            "output directory {} does not exist",
            config.output.dir.display()
        ));
    }

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            stop.store(true, Ordering::SeqCst);
        })
        .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;
    }

    let mut detector = registry.take(&config.detector.backend)?;
    let mut source = open_source(&config.camera)?;
    let sinks = default_sink_factory(&config.output);
    let mut preview = open_preview(config.preview, UiMode::from_flag(args.ui.as_deref()))?;

    log::info!(
        "hand_capture running. writing to {} via {}",
        config.output.dir.display(),
        sinks.name()
    );

    let stats = run_capture(
        &config,
        source.as_mut(),
        detector.as_mut(),
        sinks,
        preview.as_mut(),
        &stop,
    )?;

    log::info!(
        "captured {} frames, {} with a hand, {} videos saved, {} failed",
        stats.frames,
        stats.detections,
        stats.flushes,
        stats.failed_flushes
    );
    for path in &stats.files {
        println!("{}", path.display());
    }
    Ok(())
}

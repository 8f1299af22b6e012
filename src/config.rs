use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::detect::SkinPolicy;

const DEFAULT_CAMERA: &str = "0";
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_FPS: u32 = 30;
const DEFAULT_RETENTION_SECS: u32 = 15;
const DEFAULT_OUTPUT_DIR: &str = ".";
const DEFAULT_OUTPUT_PREFIX: &str = "hand_captured";
const DEFAULT_OUTPUT_EXTENSION: &str = "mp4";
const DEFAULT_FOURCC: &str = "mp4v";
/// Highest frame rate a camera may be asked for.
pub const MAX_FPS: u32 = 240;
/// Upper bound on `fps x retention_secs`; ten minutes at 30 fps.
pub const MAX_BUFFER_FRAMES: usize = 18_000;
#[cfg(feature = "backend-opencv")]
const DEFAULT_DETECTOR: &str = "opencv";
#[cfg(not(feature = "backend-opencv"))]
const DEFAULT_DETECTOR: &str = "cpu";

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    camera: Option<CameraConfigFile>,
    buffer: Option<BufferConfigFile>,
    detector: Option<DetectorConfigFile>,
    output: Option<OutputConfigFile>,
    preview: Option<PreviewMode>,
    max_frames: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    source: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct BufferConfigFile {
    retention_secs: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    skin_lower: Option<[u8; 3]>,
    skin_upper: Option<[u8; 3]>,
    kernel_size: Option<u32>,
    min_hand_area: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct OutputConfigFile {
    dir: Option<PathBuf>,
    prefix: Option<String>,
    extension: Option<String>,
    fourcc: Option<String>,
}

/// How the live preview is presented.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PreviewMode {
    /// Window when OpenCV is built in, terminal otherwise.
    #[default]
    Auto,
    Window,
    Terminal,
    None,
}

impl std::str::FromStr for PreviewMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "window" => Ok(Self::Window),
            "terminal" => Ok(Self::Terminal),
            "none" | "off" => Ok(Self::None),
            other => Err(anyhow!("unknown preview mode '{}'", other)),
        }
    }
}

/// Immutable run configuration, passed explicitly to the capture loop and buffer.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub camera: CameraSettings,
    pub buffer: BufferSettings,
    pub detector: DetectorSettings,
    pub output: OutputSettings,
    pub preview: PreviewMode,
    /// Stop after this many captured frames (unbounded when `None`).
    pub max_frames: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    /// Device index ("0"), device node ("/dev/video0") or "stub://name".
    pub source: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

#[derive(Debug, Clone)]
pub struct BufferSettings {
    pub retention_secs: u32,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: String,
    pub policy: SkinPolicy,
}

#[derive(Debug, Clone)]
pub struct OutputSettings {
    pub dir: PathBuf,
    pub prefix: String,
    pub extension: String,
    pub fourcc: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        // The empty file always resolves.
        Self::from_file(CaptureConfigFile::default())
    }
}

impl CaptureConfig {
    /// Defaults, then the JSON file named by `HAND_CAPTURE_CONFIG`, then env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("HAND_CAPTURE_CONFIG").ok().map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Like [`CaptureConfig::load`] with an explicit config file instead of `HAND_CAPTURE_CONFIG`.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self> {
        let file_cfg = match config_path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Buffer capacity in frames: frame rate times retention window.
    pub fn buffer_capacity(&self) -> usize {
        self.camera.fps as usize * self.buffer.retention_secs as usize
    }

    fn from_file(file: CaptureConfigFile) -> Self {
        let camera = file.camera.unwrap_or_default();
        let detector = file.detector.unwrap_or_default();
        let output = file.output.unwrap_or_default();
        let defaults = SkinPolicy::default();

        Self {
            camera: CameraSettings {
                source: camera.source.unwrap_or_else(|| DEFAULT_CAMERA.to_string()),
                width: camera.width.unwrap_or(DEFAULT_WIDTH),
                height: camera.height.unwrap_or(DEFAULT_HEIGHT),
                fps: camera.fps.unwrap_or(DEFAULT_FPS),
            },
            buffer: BufferSettings {
                retention_secs: file
                    .buffer
                    .and_then(|buffer| buffer.retention_secs)
                    .unwrap_or(DEFAULT_RETENTION_SECS),
            },
            detector: DetectorSettings {
                backend: detector
                    .backend
                    .unwrap_or_else(|| DEFAULT_DETECTOR.to_string()),
                policy: SkinPolicy {
                    lower: detector.skin_lower.unwrap_or(defaults.lower),
                    upper: detector.skin_upper.unwrap_or(defaults.upper),
                    kernel_size: detector.kernel_size.unwrap_or(defaults.kernel_size),
                    min_hand_area: detector.min_hand_area.unwrap_or(defaults.min_hand_area),
                },
            },
            output: OutputSettings {
                dir: output
                    .dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
                prefix: output
                    .prefix
                    .unwrap_or_else(|| DEFAULT_OUTPUT_PREFIX.to_string()),
                extension: output
                    .extension
                    .unwrap_or_else(|| DEFAULT_OUTPUT_EXTENSION.to_string()),
                fourcc: output.fourcc.unwrap_or_else(|| DEFAULT_FOURCC.to_string()),
            },
            preview: file.preview.unwrap_or_default(),
            max_frames: file.max_frames,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(source) = std::env::var("HAND_CAPTURE_CAMERA") {
            if !source.trim().is_empty() {
                self.camera.source = source.trim().to_string();
            }
        }
        if let Ok(dir) = std::env::var("HAND_CAPTURE_OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                self.output.dir = PathBuf::from(dir);
            }
        }
        if let Ok(backend) = std::env::var("HAND_CAPTURE_DETECTOR") {
            if !backend.trim().is_empty() {
                self.detector.backend = backend.trim().to_lowercase();
            }
        }
        if let Ok(fps) = std::env::var("HAND_CAPTURE_FPS") {
            self.camera.fps = fps
                .trim()
                .parse()
                .map_err(|_| anyhow!("HAND_CAPTURE_FPS must be an integer frame rate"))?;
        }
        if let Ok(retention) = std::env::var("HAND_CAPTURE_RETENTION_SECS") {
            self.buffer.retention_secs = retention.trim().parse().map_err(|_| {
                anyhow!("HAND_CAPTURE_RETENTION_SECS must be an integer number of seconds")
            })?;
        }
        Ok(())
    }

    /// Rejects settings that would produce an unusable buffer, detector or writer.
    pub fn validate(&self) -> Result<()> {
        if self.camera.source.trim().is_empty() {
            return Err(anyhow!("camera source must not be empty"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera width and height must be greater than zero"));
        }
        if self.camera.fps == 0 {
            return Err(anyhow!("fps must be greater than zero"));
        }
        if self.camera.fps > MAX_FPS {
            return Err(anyhow!("fps must be at most {}", MAX_FPS));
        }
        if self.buffer.retention_secs == 0 {
            return Err(anyhow!("buffer retention must be greater than zero"));
        }
        if self.buffer_capacity() > MAX_BUFFER_FRAMES {
            return Err(anyhow!(
                "buffer of {} frames ({} fps x {} s) exceeds the limit of {} frames",
                self.buffer_capacity(),
                self.camera.fps,
                self.buffer.retention_secs,
                MAX_BUFFER_FRAMES
            ));
        }
        self.detector.policy.validate()?;
        if self.output.prefix.trim().is_empty() {
            return Err(anyhow!("output prefix must not be empty"));
        }
        if self.output.extension.trim().is_empty() || self.output.extension.contains('.') {
            return Err(anyhow!(
                "output extension must be non-empty and given without a dot"
            ));
        }
        if self.output.fourcc.len() != 4 || !self.output.fourcc.is_ascii() {
            return Err(anyhow!(
                "fourcc must be exactly four ASCII characters, got '{}'",
                self.output.fourcc
            ));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<CaptureConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_capture_setup() {
        let cfg = CaptureConfig::default();
        assert_eq!(cfg.camera.source, "0");
        assert_eq!((cfg.camera.width, cfg.camera.height), (640, 480));
        assert_eq!(cfg.camera.fps, 30);
        assert_eq!(cfg.buffer_capacity(), 450);
        assert_eq!(cfg.output.prefix, "hand_captured");
        assert_eq!(cfg.output.fourcc, "mp4v");
        assert_eq!(cfg.detector.policy, SkinPolicy::default());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_bad_fourcc_and_zero_rates() {
        let mut cfg = CaptureConfig::default();
        cfg.output.fourcc = "mp4".to_string();
        assert!(cfg.validate().is_err());

        let mut cfg = CaptureConfig::default();
        cfg.camera.fps = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = CaptureConfig::default();
        cfg.buffer.retention_secs = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn bounds_buffer_size() {
        let mut cfg = CaptureConfig::default();
        cfg.camera.fps = MAX_FPS + 1;
        assert!(cfg.validate().is_err());

        let mut cfg = CaptureConfig::default();
        cfg.camera.fps = 30;
        cfg.buffer.retention_secs = 600;
        assert!(cfg.validate().is_ok());
        cfg.buffer.retention_secs = 601;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn preview_mode_parses_aliases() {
        assert_eq!("Window".parse::<PreviewMode>().unwrap(), PreviewMode::Window);
        assert_eq!("off".parse::<PreviewMode>().unwrap(), PreviewMode::None);
        assert!("fullscreen".parse::<PreviewMode>().is_err());
    }
}

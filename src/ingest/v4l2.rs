//! V4L2 camera source.
//!
//! Opens a local device node (an index `N` maps to `/dev/videoN`), asks for the
//! configured size, rate and YUYV pixels, and reads back what the driver actually
//! negotiated. Frames are normalised to BGR24 in memory.

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;

use super::normalize::{normalize_to_bgr, PixelFormat};
use super::{device_path, FrameSource};
use crate::config::CameraSettings;
use crate::frame::{Frame, FrameSize};

pub struct V4l2Source {
    device: String,
    state: Option<DeviceV4l2State>,
    format: PixelFormat,
    size: FrameSize,
    frame_count: u64,
}

#[self_referencing]
struct DeviceV4l2State {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Source {
    pub fn open(settings: &CameraSettings) -> Result<Self> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let path = device_path(&settings.source)?;
        let device =
            v4l::Device::with_path(&path).with_context(|| format!("open v4l2 device {}", path))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = settings.width;
        format.height = settings.height;
        format.fourcc = v4l::FourCC::new(b"YUYV");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("V4l2Source: failed to set format on {}: {}", path, err);
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };

        let pixel_format = PixelFormat::from_fourcc(&format.fourcc.repr).ok_or_else(|| {
            anyhow!(
                "v4l2 device {} negotiated unsupported pixel format {}",
                path,
                format.fourcc
            )
        })?;

        let params = v4l::video::capture::Parameters::with_fps(settings.fps);
        if let Err(err) = device.set_params(&params) {
            log::warn!("V4l2Source: failed to set fps on {}: {}", path, err);
        }

        let state = DeviceV4l2StateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;

        let size = FrameSize::new(format.width, format.height);
        if size != FrameSize::new(settings.width, settings.height) {
            log::warn!(
                "V4l2Source: requested {}x{}, device delivers {}",
                settings.width,
                settings.height,
                size
            );
        }
        log::info!("V4l2Source: connected to {} ({})", path, size);

        Ok(Self {
            device: path,
            state: Some(state),
            format: pixel_format,
            size,
            frame_count: 0,
        })
    }
}

impl FrameSource for V4l2Source {
    fn describe(&self) -> &str {
        &self.device
    }

    fn frame_size(&self) -> FrameSize {
        self.size
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        use v4l::io::traits::CaptureStream;

        let Some(state) = self.state.as_mut() else {
            return Ok(None);
        };
        let pixels = match state.with_mut(|fields| fields.stream.next().map(|(buf, _)| buf.to_vec())) {
            Ok(pixels) => pixels,
            Err(err) => {
                log::warn!("V4l2Source: read from {} failed: {}", self.device, err);
                return Ok(None);
            }
        };

        let bgr = normalize_to_bgr(&pixels, self.size.width, self.size.height, self.format)?;
        let frame = Frame::from_bgr(bgr, self.size.width, self.size.height, self.frame_count)?;
        self.frame_count += 1;
        Ok(Some(frame))
    }

    fn release(&mut self) -> Result<()> {
        if self.state.take().is_some() {
            log::debug!("V4l2Source: released {}", self.device);
        }
        Ok(())
    }
}

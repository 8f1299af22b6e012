use anyhow::{anyhow, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PixelFormat {
    Rgb24,
    Bgr24,
    Yuyv,
}

impl PixelFormat {
    pub(crate) fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"RGB3" => Some(Self::Rgb24),
            b"BGR3" => Some(Self::Bgr24),
            b"YUYV" => Some(Self::Yuyv),
            _ => None,
        }
    }
}

/// Convert a device buffer to tightly packed BGR24.
pub(crate) fn normalize_to_bgr(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<Vec<u8>> {
    let pixel_count = width
        .checked_mul(height)
        .ok_or_else(|| anyhow!("frame dimensions overflow"))? as usize;
    match format {
        PixelFormat::Bgr24 => {
            expect_len(pixels, pixel_count * 3, "BGR")?;
            Ok(pixels[..pixel_count * 3].to_vec())
        }
        PixelFormat::Rgb24 => {
            expect_len(pixels, pixel_count * 3, "RGB")?;
            Ok(pixels[..pixel_count * 3]
                .chunks_exact(3)
                .flat_map(|px| [px[2], px[1], px[0]])
                .collect())
        }
        PixelFormat::Yuyv => yuyv_to_bgr(pixels, pixel_count),
    }
}

// Drivers may hand out buffers padded past the payload.
fn expect_len(pixels: &[u8], expected: usize, name: &str) -> Result<()> {
    if pixels.len() < expected {
        return Err(anyhow!(
            "{} frame length mismatch: expected {}, got {}",
            name,
            expected,
            pixels.len()
        ));
    }
    Ok(())
}

fn yuyv_to_bgr(pixels: &[u8], pixel_count: usize) -> Result<Vec<u8>> {
    if pixel_count % 2 != 0 {
        return Err(anyhow!("YUYV frames need an even pixel count"));
    }
    expect_len(pixels, pixel_count * 2, "YUYV")?;

    let mut bgr = Vec::with_capacity(pixel_count * 3);
    for macro_pixel in pixels[..pixel_count * 2].chunks_exact(4) {
        let u = macro_pixel[1] as f32 - 128.0;
        let v = macro_pixel[3] as f32 - 128.0;
        for y in [macro_pixel[0], macro_pixel[2]] {
            let y = y as f32;
            let r = y + 1.402_f32 * v;
            let g = y - 0.344_136_f32 * u - 0.714_136_f32 * v;
            let b = y + 1.772_f32 * u;
            bgr.extend_from_slice(&[clamp_to_u8(b), clamp_to_u8(g), clamp_to_u8(r)]);
        }
    }
    Ok(bgr)
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

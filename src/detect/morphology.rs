//! Mask cleanup: close then open with an elliptical structuring element.

use image::{GrayImage, Luma};
use imageproc::morphology::{grayscale_close, grayscale_open, Mask};

use super::skin::ellipse_kernel;

/// Elliptical `size x size` structuring element anchored at its centre.
///
/// `size` must be odd and at most 31 (`SkinPolicy::validate`).
pub fn ellipse_mask(size: u32) -> Mask {
    let cells = ellipse_kernel(size);
    let stamp = GrayImage::from_fn(size, size, |x, y| {
        Luma([if cells[(y * size + x) as usize] { 255 } else { 0 }])
    });
    let anchor = (size / 2) as u8;
    Mask::from_image(&stamp, anchor, anchor)
}

/// Fill gaps smaller than the element, then drop specks smaller than it.
pub fn clean(raw: &GrayImage, mask: &Mask) -> GrayImage {
    grayscale_open(&grayscale_close(raw, mask), mask)
}

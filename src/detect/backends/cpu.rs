use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::morphology::Mask;

use crate::detect::backend::HandDetector;
use crate::detect::morphology;
use crate::detect::result::{Contour, DetectionResult, Point, SkinMask};
use crate::detect::skin::{bgr_to_hsv, select_hand, SkinPolicy};
use crate::frame::Frame;

/// Pure-Rust skin segmentation on the CPU.
pub struct CpuBackend {
    policy: SkinPolicy,
    element: Mask,
}

impl CpuBackend {
    pub fn new(policy: SkinPolicy) -> Self {
        let element = morphology::ellipse_mask(policy.kernel_size);
        Self { policy, element }
    }

    fn skin_mask(&self, frame: &Frame) -> GrayImage {
        let width = frame.width() as usize;
        let bgr = frame.bgr();
        GrayImage::from_fn(frame.width(), frame.height(), |x, y| {
            let offset = (y as usize * width + x as usize) * 3;
            let hsv = bgr_to_hsv([bgr[offset], bgr[offset + 1], bgr[offset + 2]]);
            Luma([if self.policy.is_skin(hsv) { 255 } else { 0 }])
        })
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new(SkinPolicy::default())
    }
}

impl HandDetector for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn detect(&mut self, frame: &Frame) -> DetectionResult {
        let raw = self.skin_mask(frame);
        let mask = morphology::clean(&raw, &self.element);

        let contours = find_contours::<i32>(&mask)
            .into_iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
            .map(|c| Contour::new(c.points.iter().map(|p| Point::new(p.x, p.y)).collect()));
        let hand = select_hand(contours, self.policy.min_hand_area);

        let (width, height) = mask.dimensions();
        DetectionResult {
            hand,
            mask: Some(SkinMask {
                width,
                height,
                data: mask.into_raw(),
            }),
        }
    }
}

use anyhow::{Context, Result};
use opencv::core::{self, Mat, Point as CvPoint, Scalar, Size, Vector};
use opencv::imgproc;
use opencv::prelude::*;

use crate::cv::{frame_to_mat, mat_to_mask};
use crate::detect::backend::HandDetector;
use crate::detect::result::{Contour, DetectionResult, Point};
use crate::detect::skin::{select_hand, SkinPolicy};
use crate::frame::Frame;

/// Skin segmentation through OpenCV's imgproc module.
pub struct OpenCvBackend {
    policy: SkinPolicy,
    kernel: Mat,
}

impl OpenCvBackend {
    pub fn new(policy: SkinPolicy) -> Result<Self> {
        let side = policy.kernel_size as i32;
        let kernel = imgproc::get_structuring_element(
            imgproc::MORPH_ELLIPSE,
            Size::new(side, side),
            CvPoint::new(-1, -1),
        )
        .context("build elliptical structuring element")?;
        Ok(Self { policy, kernel })
    }

    fn bound(hsv: [u8; 3]) -> Scalar {
        Scalar::new(hsv[0] as f64, hsv[1] as f64, hsv[2] as f64, 0.0)
    }

    fn morphology(&self, src: &Mat, op: i32) -> opencv::Result<Mat> {
        let mut dst = Mat::default();
        imgproc::morphology_ex(
            src,
            &mut dst,
            op,
            &self.kernel,
            CvPoint::new(-1, -1),
            1,
            core::BORDER_CONSTANT,
            imgproc::morphology_default_border_value()?,
        )?;
        Ok(dst)
    }

    fn try_detect(&self, frame: &Frame) -> Result<DetectionResult> {
        let bgr = frame_to_mat(frame)?;

        let mut hsv = Mat::default();
        imgproc::cvt_color(&bgr, &mut hsv, imgproc::COLOR_BGR2HSV, 0)?;

        let mut raw = Mat::default();
        core::in_range(
            &hsv,
            &Self::bound(self.policy.lower),
            &Self::bound(self.policy.upper),
            &mut raw,
        )?;

        let closed = self.morphology(&raw, imgproc::MORPH_CLOSE)?;
        let mask = self.morphology(&closed, imgproc::MORPH_OPEN)?;

        let mut found = Vector::<Vector<CvPoint>>::new();
        imgproc::find_contours(
            &mask,
            &mut found,
            imgproc::RETR_EXTERNAL,
            imgproc::CHAIN_APPROX_SIMPLE,
            CvPoint::new(0, 0),
        )?;

        let contours = found.iter().map(|points| {
            Contour::new(points.iter().map(|p| Point::new(p.x, p.y)).collect())
        });
        let hand = select_hand(contours, self.policy.min_hand_area);

        Ok(DetectionResult {
            hand,
            mask: Some(mat_to_mask(&mask)?),
        })
    }
}

impl HandDetector for OpenCvBackend {
    fn name(&self) -> &'static str {
        "opencv"
    }

    fn detect(&mut self, frame: &Frame) -> DetectionResult {
        match self.try_detect(frame) {
            Ok(result) => result,
            Err(err) => {
                log::warn!("opencv detector: frame {} skipped: {:#}", frame.index, err);
                DetectionResult::default()
            }
        }
    }
}

//! Skin-tone segmentation policy shared by every detector backend.

use anyhow::{anyhow, Result};

use super::result::{Contour, HandDetection};

/// Thresholds and filters that decide what counts as a hand.
#[derive(Clone, Debug, PartialEq)]
pub struct SkinPolicy {
    /// Inclusive lower HSV bound (8-bit scale, hue 0-179).
    pub lower: [u8; 3],
    /// Inclusive upper HSV bound.
    pub upper: [u8; 3],
    /// Side of the elliptical structuring element.
    pub kernel_size: u32,
    /// Smallest contour area accepted as a hand.
    pub min_hand_area: f64,
}

impl Default for SkinPolicy {
    fn default() -> Self {
        Self {
            lower: [0, 20, 70],
            upper: [20, 255, 255],
            kernel_size: 7,
            min_hand_area: 3000.0,
        }
    }
}

impl SkinPolicy {
    pub fn validate(&self) -> Result<()> {
        for channel in 0..3 {
            if self.lower[channel] > self.upper[channel] {
                return Err(anyhow!(
                    "skin range channel {} has lower bound above upper bound",
                    channel
                ));
            }
        }
        if self.upper[0] > 179 {
            return Err(anyhow!("hue bounds use the 0-179 scale"));
        }
        if self.kernel_size == 0 || self.kernel_size % 2 == 0 || self.kernel_size > 31 {
            return Err(anyhow!("kernel size must be odd and between 1 and 31"));
        }
        if !(self.min_hand_area.is_finite() && self.min_hand_area >= 0.0) {
            return Err(anyhow!("minimum hand area must be a non-negative number"));
        }
        Ok(())
    }

    pub fn is_skin(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|c| hsv[c] >= self.lower[c] && hsv[c] <= self.upper[c])
    }

    pub fn is_skin_bgr(&self, bgr: [u8; 3]) -> bool {
        self.is_skin(bgr_to_hsv(bgr))
    }
}

/// BGR to HSV on the 8-bit scale: hue halved into 0-179, S and V in 0-255.
pub fn bgr_to_hsv(bgr: [u8; 3]) -> [u8; 3] {
    let [b, g, r] = bgr.map(|c| c as f32);
    let v = b.max(g).max(r);
    let min = b.min(g).min(r);
    let diff = v - min;

    let s = if v == 0.0 { 0.0 } else { 255.0 * diff / v };

    let mut h = if diff == 0.0 {
        0.0
    } else if v == r {
        60.0 * (g - b) / diff
    } else if v == g {
        120.0 + 60.0 * (b - r) / diff
    } else {
        240.0 + 60.0 * (r - g) / diff
    };
    if h < 0.0 {
        h += 360.0;
    }
    let h = (h / 2.0).round() as u32 % 180;

    [h as u8, s.round() as u8, v as u8]
}

/// Binary elliptical structuring element, row-major, `size x size`.
pub fn ellipse_kernel(size: u32) -> Vec<bool> {
    let n = size as usize;
    let r = (size / 2) as f64;
    let mut kernel = vec![false; n * n];
    if r == 0.0 {
        kernel.fill(true);
        return kernel;
    }
    for row in 0..n {
        let dy = row as f64 - r;
        let dx = (r * ((r * r - dy * dy).max(0.0) / (r * r)).sqrt()).round() as usize;
        let center = n / 2;
        let from = center.saturating_sub(dx);
        let to = (center + dx + 1).min(n);
        for cell in &mut kernel[row * n + from..row * n + to] {
            *cell = true;
        }
    }
    kernel
}

/// Pick the hand among external contours.
///
/// The largest contour wins; it must reach `min_area` and have non-zero mass.
pub fn select_hand<I>(contours: I, min_area: f64) -> Option<HandDetection>
where
    I: IntoIterator<Item = Contour>,
{
    let (area, contour) = contours
        .into_iter()
        .map(|c| (c.area(), c))
        .reduce(|best, next| if next.0 > best.0 { next } else { best })?;
    if area < min_area {
        return None;
    }
    let center = contour.moments().centroid()?;
    Some(HandDetection {
        center,
        contour,
        area,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::Point;

    fn rect(x0: i32, y0: i32, w: i32, h: i32) -> Contour {
        Contour::new(vec![
            Point::new(x0, y0),
            Point::new(x0 + w, y0),
            Point::new(x0 + w, y0 + h),
            Point::new(x0, y0 + h),
        ])
    }

    #[test]
    fn hsv_matches_8bit_convention() {
        assert_eq!(bgr_to_hsv([0, 0, 255]), [0, 255, 255]);
        assert_eq!(bgr_to_hsv([0, 255, 0]), [60, 255, 255]);
        assert_eq!(bgr_to_hsv([255, 0, 0]), [120, 255, 255]);
        assert_eq!(bgr_to_hsv([0, 0, 0]), [0, 0, 0]);
        assert_eq!(bgr_to_hsv([128, 128, 128]), [0, 0, 128]);
    }

    #[test]
    fn skin_range_accepts_skin_and_rejects_background() {
        let policy = SkinPolicy::default();
        // (R, G, B) = (224, 172, 105)
        assert!(policy.is_skin_bgr([105, 172, 224]));
        assert!(!policy.is_skin_bgr([40, 40, 40]));
        assert!(!policy.is_skin_bgr([200, 60, 30]));
        assert!(!policy.is_skin_bgr([20, 30, 60]));
    }

    #[test]
    fn ellipse_kernel_7x7_shape() {
        let k = ellipse_kernel(7);
        let rows: Vec<usize> = k
            .chunks(7)
            .map(|row| row.iter().filter(|&&on| on).count())
            .collect();
        assert_eq!(rows, vec![1, 5, 7, 7, 7, 5, 1]);
        assert!(k[3]);
        assert!(!k[0]);
    }

    #[test]
    fn select_hand_picks_largest_above_threshold() {
        let small = rect(0, 0, 10, 10);
        let big = rect(100, 100, 80, 60);
        let hand = select_hand(vec![small, big.clone()], 3000.0).unwrap();
        assert_eq!(hand.contour, big);
        assert_eq!(hand.area, 4800.0);
        assert_eq!(hand.center, Point::new(140, 130));
    }

    #[test]
    fn select_hand_rejects_small_and_empty() {
        assert!(select_hand(Vec::new(), 3000.0).is_none());
        assert!(select_hand(vec![rect(0, 0, 50, 50)], 3000.0).is_none());
    }

    #[test]
    fn select_hand_guards_zero_mass() {
        let line = Contour::new(vec![Point::new(0, 0), Point::new(9, 0), Point::new(4, 0)]);
        assert!(select_hand(vec![line], 0.0).is_none());
    }

    #[test]
    fn policy_validation() {
        assert!(SkinPolicy::default().validate().is_ok());
        let bad = SkinPolicy {
            kernel_size: 6,
            ..SkinPolicy::default()
        };
        assert!(bad.validate().is_err());
        let inverted = SkinPolicy {
            lower: [30, 20, 70],
            ..SkinPolicy::default()
        };
        assert!(inverted.validate().is_err());
    }
}

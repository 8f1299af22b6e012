/// Integer pixel coordinate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Closed boundary curve of a foreground region, in traversal order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Contour {
    points: Vec<Point>,
}

/// Zeroth and first order area moments of a closed polygon.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Moments {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
}

impl Moments {
    /// Area-weighted center, truncated to integer pixels.
    ///
    /// `None` when the region has no mass.
    pub fn centroid(&self) -> Option<Point> {
        if self.m00 == 0.0 {
            return None;
        }
        Some(Point::new(
            (self.m10 / self.m00) as i32,
            (self.m01 / self.m00) as i32,
        ))
    }
}

impl Contour {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Polygon moments via Green's theorem over the closed boundary.
    ///
    /// Orientation only flips the sign of every term, so centroids are unaffected.
    pub fn moments(&self) -> Moments {
        let n = self.points.len();
        if n < 3 {
            return Moments::default();
        }
        let mut m = Moments::default();
        for i in 0..n {
            let p = self.points[i];
            let q = self.points[(i + 1) % n];
            let (xi, yi) = (p.x as f64, p.y as f64);
            let (xj, yj) = (q.x as f64, q.y as f64);
            let cross = xi * yj - xj * yi;
            m.m00 += cross;
            m.m10 += cross * (xi + xj);
            m.m01 += cross * (yi + yj);
        }
        m.m00 /= 2.0;
        m.m10 /= 6.0;
        m.m01 /= 6.0;
        m
    }

    /// Enclosed polygon area (absolute value of `m00`).
    pub fn area(&self) -> f64 {
        self.moments().m00.abs()
    }

    /// Inclusive `(min, max)` corners.
    pub fn bounding_box(&self) -> Option<(Point, Point)> {
        let first = *self.points.first()?;
        Some(self.points.iter().fold((first, first), |(lo, hi), p| {
            (
                Point::new(lo.x.min(p.x), lo.y.min(p.y)),
                Point::new(hi.x.max(p.x), hi.y.max(p.y)),
            )
        }))
    }
}

/// Binary skin mask, one byte per pixel (0 or 255).
#[derive(Clone, PartialEq, Eq)]
pub struct SkinMask {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl SkinMask {
    pub fn foreground_pixels(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }
}

impl std::fmt::Debug for SkinMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkinMask")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// A located hand.
#[derive(Clone, Debug, PartialEq)]
pub struct HandDetection {
    pub center: Point,
    pub contour: Contour,
    pub area: f64,
}

/// Result of running the detector on one frame.
#[derive(Clone, Debug, Default)]
pub struct DetectionResult {
    pub hand: Option<HandDetection>,
    /// Post-morphology mask, kept for preview surfaces.
    pub mask: Option<SkinMask>,
}

impl DetectionResult {
    pub fn hand_detected(&self) -> bool {
        self.hand.is_some()
    }
}

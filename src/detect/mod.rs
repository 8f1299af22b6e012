mod backend;
mod backends;
pub mod morphology;
mod registry;
mod result;
mod skin;

pub use backend::HandDetector;
#[cfg(feature = "backend-opencv")]
pub use backends::OpenCvBackend;
pub use backends::CpuBackend;
pub use registry::DetectorRegistry;
pub use result::{Contour, DetectionResult, HandDetection, Moments, Point, SkinMask};
pub use skin::{bgr_to_hsv, ellipse_kernel, select_hand, SkinPolicy};

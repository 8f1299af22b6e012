use crate::detect::result::DetectionResult;
use crate::frame::Frame;

/// Hand detector backend.
///
/// Detection is a pure function of the frame and the backend's fixed policy.
/// Backends never fail: a library error inside a backend is logged and reported
/// as "no detection".
pub trait HandDetector: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Locate the hand in a BGR frame.
    fn detect(&mut self, frame: &Frame) -> DetectionResult;
}

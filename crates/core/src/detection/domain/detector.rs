use crate::shared::detection::Detection;
use crate::shared::frame::Frame;

/// Domain interface for face detection.
///
/// A populated (possibly empty) detection list means the backend answered;
/// an error means it did not — implementations never return a silently
/// malformed result. Implementations may hold sessions or connections,
/// hence `&mut self`.
pub trait Detector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>>;
}

use crate::shared::frame::Frame;

/// Reads frames from a live video device.
///
/// Implementations own the device handle (opened at construction) and
/// deliver frames in whatever cadence the hardware allows. `read` blocks
/// until a frame is available.
pub trait FrameSource: Send {
    /// Blocks for the next frame.
    ///
    /// `Ok(None)` means the device has closed — terminal, not transient.
    /// An error means the read itself failed and the capture run is over.
    fn read(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error + Send + Sync>>;

    /// Releases the device.
    fn close(&mut self);
}

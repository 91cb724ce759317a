use crate::shared::detection::PixelRect;
use crate::shared::frame::Frame;

/// One cycle's rendered output: the frame copy with overlays burned in,
/// plus the caption and rectangles that were drawn, kept as data so sinks
/// and tests can inspect the overlay without decoding pixels.
#[derive(Clone, Debug)]
pub struct AnnotatedFrame {
    pub frame: Frame,
    pub caption: String,
    pub boxes: Vec<PixelRect>,
}

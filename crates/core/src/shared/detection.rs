/// A detection bounding box in pixel coordinates.
///
/// Coordinates may be fractional: remote backends report sub-pixel
/// positions and local models scale normalized outputs up to frame size.
/// Conversion to integer pixels happens only at the drawing boundary.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Clamps the box to frame bounds and converts to an integer rectangle.
    ///
    /// Returns `None` when nothing of the box is visible inside the frame.
    pub fn to_pixel_rect(&self, frame_w: u32, frame_h: u32) -> Option<PixelRect> {
        let x1 = self.left.max(0.0);
        let y1 = self.top.max(0.0);
        let x2 = (self.left + self.width).min(frame_w as f64);
        let y2 = (self.top + self.height).min(frame_h as f64);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(PixelRect {
            x: x1 as u32,
            y: y1 as u32,
            width: (x2 - x1) as u32,
            height: (y2 - y1) as u32,
        })
    }
}

/// Integer rectangle, fully inside a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// One localized detector result, backend-agnostic after translation.
///
/// `confidence` is absent for backends that do not report one.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub confidence: Option<f64>,
}

impl Detection {
    pub fn new(left: f64, top: f64, width: f64, height: f64, confidence: Option<f64>) -> Self {
        Self {
            bbox: BoundingBox {
                left,
                top,
                width,
                height,
            },
            confidence,
        }
    }
}

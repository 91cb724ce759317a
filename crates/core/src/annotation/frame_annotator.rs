use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::annotation::annotated_frame::AnnotatedFrame;
use crate::annotation::glyphs::draw_text;
use crate::shared::constants::{CAPTION_ORIGIN, OVERLAY_COLOR, OVERLAY_THICKNESS};
use crate::shared::detection::{Detection, PixelRect};
use crate::shared::frame::Frame;

/// Burns detection rectangles and a status caption into a frame copy.
///
/// Boxes outside the frame are clamped before drawing; fully invisible
/// boxes are skipped. All drawing is done on an owned copy so the shared
/// buffer never sees overlays.
pub struct FrameAnnotator {
    color: Rgb<u8>,
    thickness: u32,
    text_scale: u32,
}

impl Default for FrameAnnotator {
    fn default() -> Self {
        Self {
            color: Rgb(OVERLAY_COLOR),
            thickness: OVERLAY_THICKNESS,
            text_scale: 2,
        }
    }
}

impl FrameAnnotator {
    pub fn new(color: [u8; 3], thickness: u32, text_scale: u32) -> Self {
        Self {
            color: Rgb(color),
            thickness: thickness.max(1),
            text_scale: text_scale.max(1),
        }
    }

    pub fn annotate(
        &self,
        frame: Frame,
        caption: &str,
        detections: &[Detection],
    ) -> AnnotatedFrame {
        let width = frame.width();
        let height = frame.height();
        let boxes: Vec<PixelRect> = detections
            .iter()
            .filter_map(|d| d.bbox.to_pixel_rect(width, height))
            .collect();

        let mut img = match RgbImage::from_raw(width, height, frame.into_data()) {
            Some(img) => img,
            // Non-RGB frames cannot reach this point; render a blank canvas
            // rather than panic if one ever does.
            None => RgbImage::new(width, height),
        };

        for rect in &boxes {
            self.draw_box(&mut img, rect);
        }
        draw_text(
            &mut img,
            caption,
            CAPTION_ORIGIN.0,
            CAPTION_ORIGIN.1,
            self.text_scale,
            self.color,
        );

        let (w, h) = (img.width(), img.height());
        AnnotatedFrame {
            frame: Frame::new(img.into_raw(), w, h, 3),
            caption: caption.to_string(),
            boxes,
        }
    }

    /// Thickness is applied inward so the border never spills outside the
    /// clamped rectangle.
    fn draw_box(&self, img: &mut RgbImage, rect: &PixelRect) {
        for inset in 0..self.thickness {
            let w = rect.width.saturating_sub(2 * inset);
            let h = rect.height.saturating_sub(2 * inset);
            if w == 0 || h == 0 {
                break;
            }
            draw_hollow_rect_mut(
                img,
                Rect::at((rect.x + inset) as i32, (rect.y + inset) as i32).of_size(w, h),
                self.color,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLUE: Rgb<u8> = Rgb([0, 0, 255]);

    fn annotator() -> FrameAnnotator {
        FrameAnnotator::default()
    }

    fn black_frame(w: u32, h: u32) -> Frame {
        Frame::filled(w, h, [0, 0, 0])
    }

    fn as_image(frame: &Frame) -> RgbImage {
        RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec()).unwrap()
    }

    #[test]
    fn test_box_border_is_colored() {
        let det = Detection::new(100.0, 100.0, 50.0, 40.0, Some(0.9));
        let out = annotator().annotate(black_frame(320, 240), "", &[det]);
        let img = as_image(&out.frame);
        // Top-left corner of the border.
        assert_eq!(*img.get_pixel(100, 100), BLUE);
        // All three thickness rings.
        assert_eq!(*img.get_pixel(102, 102), BLUE);
        // Bottom-right corner: rect spans x 100..150, y 100..140.
        assert_eq!(*img.get_pixel(149, 139), BLUE);
    }

    #[test]
    fn test_box_interior_untouched() {
        let det = Detection::new(100.0, 100.0, 50.0, 40.0, Some(0.9));
        let out = annotator().annotate(black_frame(320, 240), "", &[det]);
        let img = as_image(&out.frame);
        assert_eq!(*img.get_pixel(125, 120), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_no_detections_draws_no_boxes() {
        let out = annotator().annotate(black_frame(320, 240), "", &[]);
        assert!(out.boxes.is_empty());
        // Nothing but the (empty) caption was drawn.
        let img = as_image(&out.frame);
        assert!(img.pixels().all(|&p| p == Rgb([0, 0, 0])));
    }

    #[test]
    fn test_caption_renders_pixels() {
        let out = annotator().annotate(black_frame(320, 240), "Result: 2", &[]);
        let img = as_image(&out.frame);
        let blue = img.pixels().filter(|&&p| p == BLUE).count();
        assert!(blue > 0);
        assert_eq!(out.caption, "Result: 2");
    }

    #[test]
    fn test_out_of_bounds_box_is_clamped() {
        let det = Detection::new(300.0, 220.0, 100.0, 100.0, Some(0.9));
        let out = annotator().annotate(black_frame(320, 240), "", &[det]);
        assert_eq!(out.boxes.len(), 1);
        let rect = out.boxes[0];
        assert!(rect.x + rect.width <= 320);
        assert!(rect.y + rect.height <= 240);
        // Drawing the clamped rect must not panic and must mark pixels.
        let img = as_image(&out.frame);
        assert_eq!(*img.get_pixel(300, 220), BLUE);
    }

    #[test]
    fn test_invisible_box_is_dropped() {
        let det = Detection::new(-200.0, -200.0, 50.0, 50.0, Some(0.9));
        let out = annotator().annotate(black_frame(320, 240), "", &[det]);
        assert!(out.boxes.is_empty());
    }

    #[test]
    fn test_annotate_preserves_dimensions() {
        let out = annotator().annotate(black_frame(320, 240), "x", &[]);
        assert_eq!(out.frame.width(), 320);
        assert_eq!(out.frame.height(), 240);
        assert_eq!(out.frame.channels(), 3);
    }
}

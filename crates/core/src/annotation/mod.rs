pub mod annotated_frame;
pub mod frame_annotator;
pub mod glyphs;

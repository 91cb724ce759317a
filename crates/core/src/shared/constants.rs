/// Number of detection cycles to run per invocation.
pub const DEFAULT_ITERATIONS: usize = 50;

/// How long the consumer waits for the producer's first frame before
/// entering its loop anyway.
pub const DEFAULT_FIRST_FRAME_TIMEOUT_MS: u64 = 500;

/// Minimum confidence for a local-model detection to be surfaced.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.5;

/// Fixed square input resolution of the SSD face models.
pub const SSD_INPUT_SIZE: u32 = 300;

/// Caption origin in pixels, top-left of the first glyph.
pub const CAPTION_ORIGIN: (u32, u32) = (50, 50);

/// Overlay color (RGB): blue.
pub const OVERLAY_COLOR: [u8; 3] = [0, 0, 255];

/// Rectangle border thickness in pixels.
pub const OVERLAY_THICKNESS: u32 = 3;

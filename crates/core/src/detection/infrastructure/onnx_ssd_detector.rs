use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::detection::domain::detector::Detector;
use crate::shared::constants::{DEFAULT_CONFIDENCE_THRESHOLD, SSD_INPUT_SIZE};
use crate::shared::detection::Detection;
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("model file not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to load model: {0}")]
    Session(#[source] ort::Error),
}

/// Input normalization preset, keyed to the model family the ONNX graph
/// was exported from.
///
/// Caffe-family SSD face models expect BGR input with per-channel mean
/// subtraction; TensorFlow-family exports expect RGB scaled to [-1, 1].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelPreset {
    Caffe,
    Tensorflow,
}

impl ModelPreset {
    /// Guesses the preset from the model file name; `caffe` anywhere in the
    /// stem selects the Caffe preset. Callers can always pass the preset
    /// explicitly instead.
    pub fn infer(model_path: &Path) -> Self {
        let stem = model_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        if stem.contains("caffe") {
            ModelPreset::Caffe
        } else {
            ModelPreset::Tensorflow
        }
    }

    /// Per-output-channel means, in the preset's channel order.
    fn mean(self) -> [f32; 3] {
        match self {
            ModelPreset::Caffe => [104.0, 177.0, 123.0],
            ModelPreset::Tensorflow => [127.5, 127.5, 127.5],
        }
    }

    fn scale(self) -> f32 {
        match self {
            ModelPreset::Caffe => 1.0,
            ModelPreset::Tensorflow => 1.0 / 127.5,
        }
    }

    /// Whether the model wants BGR channel order (source frames are RGB).
    fn bgr(self) -> bool {
        matches!(self, ModelPreset::Caffe)
    }
}

/// SSD face detector backed by an ONNX Runtime session.
///
/// The output tensor is a flat array of 7-value records
/// `[batch, class, confidence, left, top, right, bottom]` with normalized
/// coordinates; records below the confidence threshold are dropped.
#[derive(Debug)]
pub struct OnnxSsdDetector {
    session: ort::session::Session,
    preset: ModelPreset,
    confidence: f64,
    input_size: u32,
}

impl OnnxSsdDetector {
    /// Loads the model and prepares for inference.
    ///
    /// The input resolution is read from the model's input shape (NCHW),
    /// falling back to the standard 300 when the shape is dynamic.
    pub fn new(
        model_path: &Path,
        preset: ModelPreset,
        confidence: f64,
    ) -> Result<Self, ModelLoadError> {
        if !model_path.exists() {
            return Err(ModelLoadError::NotFound(model_path.to_path_buf()));
        }
        let session = ort::session::Session::builder()
            .and_then(|mut b| b.commit_from_file(model_path))
            .map_err(ModelLoadError::Session)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    // NCHW: [1, 3, H, W]
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as u32)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(SSD_INPUT_SIZE);

        Ok(Self {
            session,
            preset,
            confidence,
            input_size,
        })
    }

    pub fn with_default_confidence(
        model_path: &Path,
        preset: ModelPreset,
    ) -> Result<Self, ModelLoadError> {
        Self::new(model_path, preset, DEFAULT_CONFIDENCE_THRESHOLD)
    }
}

impl Detector for OnnxSsdDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
        let tensor = preprocess(frame, self.input_size, self.preset);

        let input_value = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("SSD model produced no outputs".into());
        }
        let output = outputs[0].try_extract_array::<f32>()?;
        let data = output.as_slice().ok_or("Cannot get tensor slice")?;

        Ok(decode_detections(
            data,
            frame.width(),
            frame.height(),
            self.confidence,
        ))
    }
}

/// Stretch-resizes the frame to the model's square input and normalizes it
/// into an NCHW float32 tensor per the preset.
fn preprocess(frame: &Frame, input_size: u32, preset: ModelPreset) -> ndarray::Array4<f32> {
    let size = input_size as usize;
    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, size, size));

    let src = frame.as_ndarray(); // [H, W, C] u8, RGB
    let src_w = frame.width().max(1) as usize;
    let src_h = frame.height().max(1) as usize;
    let mean = preset.mean();
    let scale = preset.scale();

    for y in 0..size {
        let src_y = (y * src_h / size).min(src_h - 1);
        for x in 0..size {
            let src_x = (x * src_w / size).min(src_w - 1);
            for c in 0..3 {
                // RGB source channel feeding output channel c.
                let src_c = if preset.bgr() { 2 - c } else { c };
                let value = src[[src_y, src_x, src_c]] as f32;
                tensor[[0, c, y, x]] = (value - mean[c]) * scale;
            }
        }
    }

    tensor
}

/// Decodes the flat SSD output into pixel-space detections.
///
/// Records with confidence at or below `threshold` are dropped; a trailing
/// partial record is ignored.
fn decode_detections(data: &[f32], frame_w: u32, frame_h: u32, threshold: f64) -> Vec<Detection> {
    let fw = frame_w as f64;
    let fh = frame_h as f64;
    data.chunks_exact(7)
        .filter_map(|record| {
            let confidence = record[2] as f64;
            if confidence <= threshold {
                return None;
            }
            let left = record[3] as f64 * fw;
            let top = record[4] as f64 * fh;
            let right = record[5] as f64 * fw;
            let bottom = record[6] as f64 * fh;
            Some(Detection::new(
                left,
                top,
                right - left,
                bottom - top,
                Some(confidence),
            ))
        })
        .collect()
}

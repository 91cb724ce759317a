use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use facewatch_core::capture::domain::frame_source::FrameSource;
#[cfg(target_os = "linux")]
use facewatch_core::capture::infrastructure::v4l_frame_source::V4lFrameSource;
use facewatch_core::detection::domain::detector::Detector;
use facewatch_core::detection::infrastructure::onnx_ssd_detector::{ModelPreset, OnnxSsdDetector};
use facewatch_core::detection::infrastructure::remote_http_detector::{
    RemoteHttpDetector, ResponseSchema,
};
use facewatch_core::output::domain::output_sink::OutputSink;
use facewatch_core::output::infrastructure::image_file_sink::ImageFileSink;
use facewatch_core::pipeline::watch_faces_use_case::{WatchConfig, WatchFacesUseCase};
use facewatch_core::shared::constants::{
    DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_FIRST_FRAME_TIMEOUT_MS, DEFAULT_ITERATIONS,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// POST frames to an HTTP face detection API.
    Remote,
    /// Run a local ONNX SSD face model.
    Local,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Schema {
    /// `error_msg` / `result.face_list` at the top level.
    Flat,
    /// The same payload wrapped in an outer `result` object.
    Nested,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Preset {
    Caffe,
    Tensorflow,
}

/// Watches a webcam and writes annotated face detection snapshots.
#[derive(Parser)]
#[command(name = "facewatch")]
struct Cli {
    /// Video device: an index (0) or a path (/dev/video0).
    device: String,

    /// Detection backend.
    #[arg(long, value_enum, default_value = "local")]
    backend: Backend,

    /// Face API endpoint URL (required with --backend remote).
    #[arg(long)]
    endpoint: Option<String>,

    /// Face API response shape (with --backend remote).
    #[arg(long, value_enum, default_value = "flat")]
    schema: Schema,

    /// ONNX SSD face model file (required with --backend local).
    #[arg(long)]
    model: Option<PathBuf>,

    /// Model input preset; inferred from the file name when omitted.
    #[arg(long, value_enum)]
    preset: Option<Preset>,

    /// Detection confidence threshold (0.0-1.0, local backend).
    #[arg(long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD)]
    confidence: f64,

    /// Number of detection cycles to run.
    #[arg(long, default_value_t = DEFAULT_ITERATIONS)]
    iterations: usize,

    /// Directory for the numbered output images.
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// How long to wait for the first camera frame, in milliseconds.
    #[arg(long, default_value_t = DEFAULT_FIRST_FRAME_TIMEOUT_MS)]
    first_frame_timeout_ms: u64,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let detector = build_detector(&cli)?;
    let source = build_source(&cli.device)?;
    let sink: Box<dyn OutputSink> = Box::new(ImageFileSink::new(&cli.output_dir)?);

    let use_case = WatchFacesUseCase::new(WatchConfig {
        iterations: cli.iterations,
        first_frame_timeout: Duration::from_millis(cli.first_frame_timeout_ms),
    });
    let stats = use_case.execute(source, detector, sink)?;

    log::info!(
        "Wrote {} snapshot(s) to {}",
        stats.emitted,
        cli.output_dir.display()
    );
    Ok(())
}

#[cfg(target_os = "linux")]
fn build_source(device: &str) -> Result<Box<dyn FrameSource>, Box<dyn std::error::Error>> {
    Ok(Box::new(V4lFrameSource::open(device)?))
}

#[cfg(not(target_os = "linux"))]
fn build_source(_device: &str) -> Result<Box<dyn FrameSource>, Box<dyn std::error::Error>> {
    Err("video capture requires a V4L2 device and is only available on Linux".into())
}

fn build_detector(cli: &Cli) -> Result<Box<dyn Detector>, Box<dyn std::error::Error>> {
    match cli.backend {
        Backend::Remote => {
            let endpoint = cli
                .endpoint
                .as_ref()
                .ok_or("--endpoint is required with --backend remote")?;
            let schema = match cli.schema {
                Schema::Flat => ResponseSchema::Flat,
                Schema::Nested => ResponseSchema::Nested,
            };
            Ok(Box::new(RemoteHttpDetector::new(endpoint, schema)))
        }
        Backend::Local => {
            let model = cli
                .model
                .as_ref()
                .ok_or("--model is required with --backend local")?;
            let preset = match cli.preset {
                Some(Preset::Caffe) => ModelPreset::Caffe,
                Some(Preset::Tensorflow) => ModelPreset::Tensorflow,
                None => ModelPreset::infer(model),
            };
            log::info!("Loading model {} ({preset:?} preset)", model.display());
            Ok(Box::new(OnnxSsdDetector::new(model, preset, cli.confidence)?))
        }
    }
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if cli.iterations == 0 {
        return Err("Iterations must be at least 1".into());
    }
    if !(0.0..=1.0).contains(&cli.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            cli.confidence
        )
        .into());
    }
    if cli.backend == Backend::Remote && cli.endpoint.is_none() {
        return Err("--endpoint is required with --backend remote".into());
    }
    if cli.backend == Backend::Local {
        match &cli.model {
            None => return Err("--model is required with --backend local".into()),
            Some(model) if !model.exists() => {
                return Err(format!("Model file not found: {}", model.display()).into());
            }
            Some(_) => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_source_fails_gracefully_without_a_device() {
        // Missing device on Linux, unsupported platform elsewhere; either
        // way an error, never a panic or a compile hole.
        let err = build_source("/dev/video-does-not-exist").err().unwrap();
        assert!(err.to_string().contains("capture"));
    }

    #[test]
    fn test_validate_rejects_remote_without_endpoint() {
        let cli = Cli::parse_from(["facewatch", "0", "--backend", "remote"]);
        assert!(validate(&cli).is_err());
    }

    #[test]
    fn test_validate_rejects_local_without_model() {
        let cli = Cli::parse_from(["facewatch", "0", "--backend", "local"]);
        assert!(validate(&cli).is_err());
    }
}

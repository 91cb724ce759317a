use std::io::Cursor;

use base64::Engine;
use serde::Deserialize;
use thiserror::Error;

use crate::detection::domain::detector::Detector;
use crate::shared::detection::Detection;
use crate::shared::frame::Frame;

/// Status string the face-detection services use for a successful call.
const STATUS_SUCCESS: &str = "SUCCESS";

#[derive(Error, Debug)]
pub enum RemoteDetectError {
    #[error("frame is not RGB8, cannot encode for transport")]
    NotRgb,
    #[error("failed to encode frame as JPEG: {0}")]
    Encode(#[source] image::ImageError),
    #[error("request to detection service failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("detection service returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed response body: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("detection service reported: {0}")]
    Backend(String),
}

/// How the service nests its detection payload.
///
/// The hosted gateways wrap the same `{error_msg, result.face_list}` payload
/// differently: some return it at the top level, some wrap it once more
/// under `result`. This is a per-backend property, configured at
/// construction; no canonical schema is assumed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseSchema {
    /// `error_msg` / `result.face_list` at the top level.
    Flat,
    /// Payload wrapped once more: `result.error_msg` / `result.result.face_list`.
    Nested,
}

// --- wire format -----------------------------------------------------------

#[derive(Deserialize, Debug, Default)]
struct WireLocation {
    #[serde(default)]
    left: f64,
    #[serde(default)]
    top: f64,
    #[serde(default)]
    width: f64,
    #[serde(default)]
    height: f64,
    #[serde(default)]
    #[allow(dead_code)]
    rotation: f64,
}

#[derive(Deserialize, Debug, Default)]
struct WireFace {
    #[serde(default)]
    location: WireLocation,
    #[serde(default)]
    face_probability: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
struct WireFaceList {
    #[serde(default)]
    face_list: Vec<WireFace>,
}

#[derive(Deserialize, Debug, Default)]
struct WirePayload {
    #[serde(default)]
    error_msg: String,
    #[serde(default)]
    result: WireFaceList,
}

#[derive(Deserialize, Debug, Default)]
struct WireEnvelope {
    #[serde(default)]
    result: WirePayload,
}

// ---------------------------------------------------------------------------

/// Face detector calling a remote HTTP detection service.
///
/// The frame is JPEG-encoded, base64'd, and POSTed form-urlencoded as
/// `image_type=BASE64&image=<b64>`; the JSON response is translated into
/// backend-agnostic detections. Transport failures, non-2xx statuses, and
/// malformed bodies surface as errors without ending the run.
pub struct RemoteHttpDetector {
    client: reqwest::blocking::Client,
    endpoint: String,
    schema: ResponseSchema,
}

impl RemoteHttpDetector {
    pub fn new(endpoint: impl Into<String>, schema: ResponseSchema) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            endpoint: endpoint.into(),
            schema,
        }
    }

    fn encode_jpeg(frame: &Frame) -> Result<Vec<u8>, RemoteDetectError> {
        if frame.channels() != 3 {
            return Err(RemoteDetectError::NotRgb);
        }
        let img =
            image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
                .ok_or(RemoteDetectError::NotRgb)?;
        let mut jpeg = Vec::new();
        img.write_to(&mut Cursor::new(&mut jpeg), image::ImageFormat::Jpeg)
            .map_err(RemoteDetectError::Encode)?;
        Ok(jpeg)
    }
}

impl Detector for RemoteHttpDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
        let jpeg = Self::encode_jpeg(frame)?;
        let b64 = base64::engine::general_purpose::STANDARD.encode(&jpeg);

        let response = self
            .client
            .post(&self.endpoint)
            .form(&[("image_type", "BASE64"), ("image", b64.as_str())])
            .send()
            .map_err(RemoteDetectError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteDetectError::Status(status).into());
        }

        let body = response.bytes().map_err(RemoteDetectError::Transport)?;
        let faces = parse_body(&body, self.schema)?;
        Ok(faces)
    }
}

/// Parses a response body according to the backend's nesting schema.
fn parse_body(body: &[u8], schema: ResponseSchema) -> Result<Vec<Detection>, RemoteDetectError> {
    let payload: WirePayload = match schema {
        ResponseSchema::Flat => {
            serde_json::from_slice(body).map_err(RemoteDetectError::Malformed)?
        }
        ResponseSchema::Nested => serde_json::from_slice::<WireEnvelope>(body)
            .map_err(RemoteDetectError::Malformed)?
            .result,
    };

    if !payload.error_msg.is_empty() && payload.error_msg != STATUS_SUCCESS {
        return Err(RemoteDetectError::Backend(payload.error_msg));
    }

    Ok(payload
        .result
        .face_list
        .into_iter()
        .map(|f| {
            Detection::new(
                f.location.left,
                f.location.top,
                f.location.width,
                f.location.height,
                f.face_probability,
            )
        })
        .collect())
}

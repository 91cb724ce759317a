use std::path::Path;

use thiserror::Error;
use v4l::buffer::Type;
use v4l::capability::Flags as CapFlags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::MmapStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use crate::capture::domain::frame_source::FrameSource;
use crate::shared::frame::Frame;

const BUFFER_COUNT: u32 = 4;

/// ENODEV on Linux: the camera was unplugged mid-stream.
const ENODEV: i32 = 19;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("failed to open capture device {device}: {source}")]
    Open {
        device: String,
        source: std::io::Error,
    },
    #[error("device does not support video capture")]
    NotACaptureDevice,
    #[error("failed to negotiate a pixel format: {0}")]
    Format(#[source] std::io::Error),
    #[error("device offers no format this pipeline can decode (got {0})")]
    UnsupportedFormat(String),
    #[error("failed to start capture stream: {0}")]
    Stream(#[source] std::io::Error),
    #[error("failed to decode MJPG frame: {0}")]
    Decode(#[source] image::ImageError),
}

/// Pixel layout the device was negotiated to deliver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Delivery {
    Rgb24,
    Mjpg,
}

/// Webcam frame source backed by V4L2 memory-mapped streaming.
///
/// Prefers raw RGB24 from the driver; falls back to MJPG with a software
/// JPEG decode, which most UVC cameras support.
pub struct V4lFrameSource {
    device: Box<Device>,
    stream: Option<MmapStream<'static>>,
    delivery: Delivery,
    width: u32,
    height: u32,
}

impl V4lFrameSource {
    /// Opens the device and negotiates a deliverable pixel format.
    ///
    /// `identifier` is either a V4L index (`"0"`) or a path
    /// (`"/dev/video0"`).
    pub fn open(identifier: &str) -> Result<Self, CaptureError> {
        let device = if let Ok(index) = identifier.parse::<usize>() {
            Device::new(index)
        } else {
            Device::with_path(Path::new(identifier))
        }
        .map_err(|e| CaptureError::Open {
            device: identifier.to_string(),
            source: e,
        })?;

        let caps = device.query_caps().map_err(|e| CaptureError::Open {
            device: identifier.to_string(),
            source: e,
        })?;
        log::info!("Capture device: {} ({})", caps.card, caps.driver);
        if !caps.capabilities.contains(CapFlags::VIDEO_CAPTURE) {
            return Err(CaptureError::NotACaptureDevice);
        }

        let mut fmt = device.format().map_err(CaptureError::Format)?;
        fmt.fourcc = FourCC::new(b"RGB3");
        let fmt = device.set_format(&fmt).map_err(CaptureError::Format)?;

        let delivery = if &fmt.fourcc.repr == b"RGB3" {
            Delivery::Rgb24
        } else {
            // Driver refused RGB24; renegotiate for MJPG.
            let mut fmt = device.format().map_err(CaptureError::Format)?;
            fmt.fourcc = FourCC::new(b"MJPG");
            let fmt = device.set_format(&fmt).map_err(CaptureError::Format)?;
            if &fmt.fourcc.repr != b"MJPG" {
                return Err(CaptureError::UnsupportedFormat(fmt.fourcc.to_string()));
            }
            Delivery::Mjpg
        };

        let fmt = device.format().map_err(CaptureError::Format)?;
        log::info!("Negotiated {}x{} {}", fmt.width, fmt.height, fmt.fourcc);

        Ok(Self {
            device: Box::new(device),
            stream: None,
            delivery,
            width: fmt.width,
            height: fmt.height,
        })
    }

    fn ensure_stream(&mut self) -> Result<&mut MmapStream<'static>, CaptureError> {
        if self.stream.is_none() {
            let stream = MmapStream::with_buffers(&self.device, Type::VideoCapture, BUFFER_COUNT)
                .map_err(CaptureError::Stream)?;
            self.stream = Some(stream);
        }
        match self.stream.as_mut() {
            Some(stream) => Ok(stream),
            None => Err(CaptureError::Stream(std::io::Error::other(
                "capture stream unavailable",
            ))),
        }
    }
}

impl FrameSource for V4lFrameSource {
    fn read(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error + Send + Sync>> {
        let (delivery, width, height) = (self.delivery, self.width, self.height);
        let stream = self.ensure_stream()?;
        let (buf, meta) = match stream.next() {
            Ok(pair) => pair,
            Err(e) if e.raw_os_error() == Some(ENODEV) => return Ok(None),
            Err(e) => return Err(Box::new(CaptureError::Stream(e))),
        };
        let used = meta.bytesused as usize;
        let payload = if used > 0 && used <= buf.len() {
            &buf[..used]
        } else {
            buf
        };
        let frame = convert_payload(delivery, width, height, payload)?;
        Ok(Some(frame))
    }

    fn close(&mut self) {
        self.stream = None;
    }
}

/// Turns one dequeued V4L2 buffer into an RGB frame.
fn convert_payload(
    delivery: Delivery,
    width: u32,
    height: u32,
    raw: &[u8],
) -> Result<Frame, CaptureError> {
    match delivery {
        Delivery::Rgb24 => {
            let expected = (width * height * 3) as usize;
            let mut data = raw.to_vec();
            // Some drivers pad the buffer past the payload; some deliver
            // short final buffers. Normalize either way.
            data.truncate(expected);
            data.resize(expected, 0);
            Ok(Frame::new(data, width, height, 3))
        }
        Delivery::Mjpg => {
            let img = image::load_from_memory(raw)
                .map_err(CaptureError::Decode)?
                .to_rgb8();
            let (w, h) = (img.width(), img.height());
            Ok(Frame::new(img.into_raw(), w, h, 3))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Device-dependent paths need hardware; these cover payload conversion.

    #[test]
    fn test_rgb24_payload_passthrough() {
        let raw = vec![7u8; 12];
        let frame = convert_payload(Delivery::Rgb24, 2, 2, &raw).unwrap();
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.data(), &raw[..]);
    }

    #[test]
    fn test_rgb24_padded_buffer_truncated() {
        let raw = vec![7u8; 20]; // 8 bytes of driver padding
        let frame = convert_payload(Delivery::Rgb24, 2, 2, &raw).unwrap();
        assert_eq!(frame.data().len(), 12);
    }

    #[test]
    fn test_rgb24_short_buffer_zero_filled() {
        let raw = vec![7u8; 6];
        let frame = convert_payload(Delivery::Rgb24, 2, 2, &raw).unwrap();
        assert_eq!(frame.data().len(), 12);
        assert_eq!(frame.data()[11], 0);
    }

    #[test]
    fn test_mjpg_decode_roundtrip() {
        let img = image::RgbImage::from_pixel(8, 4, image::Rgb([200, 10, 10]));
        let mut jpeg = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut jpeg),
            image::ImageFormat::Jpeg,
        )
        .unwrap();

        let frame = convert_payload(Delivery::Mjpg, 0, 0, &jpeg).unwrap();
        assert_eq!(frame.width(), 8);
        assert_eq!(frame.height(), 4);
        // Lossy codec: just check the red channel dominates.
        assert!(frame.data()[0] > 150);
    }

    #[test]
    fn test_mjpg_garbage_is_an_error() {
        let err = convert_payload(Delivery::Mjpg, 0, 0, &[0u8; 16]).unwrap_err();
        assert!(matches!(err, CaptureError::Decode(_)));
    }
}

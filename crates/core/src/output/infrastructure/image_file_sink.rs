use std::fs;
use std::io;
use std::path::PathBuf;

use image::RgbImage;
use thiserror::Error;

use crate::annotation::annotated_frame::AnnotatedFrame;
use crate::output::domain::output_sink::OutputSink;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("failed to create output directory {dir}: {source}")]
    CreateDir {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("frame {index} has invalid pixel data")]
    InvalidFrame { index: usize },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Writes each annotated frame to `<dir>/<index>.jpg`.
pub struct ImageFileSink {
    dir: PathBuf,
}

impl ImageFileSink {
    /// Creates the output directory if missing.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| SinkError::CreateDir {
            dir: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }
}

impl OutputSink for ImageFileSink {
    fn emit(
        &mut self,
        frame: &AnnotatedFrame,
        index: usize,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let img = RgbImage::from_raw(
            frame.frame.width(),
            frame.frame.height(),
            frame.frame.data().to_vec(),
        )
        .ok_or(SinkError::InvalidFrame { index })?;

        let path = self.dir.join(format!("{index}.jpg"));
        img.save(&path).map_err(|source| SinkError::Write {
            path: path.clone(),
            source,
        })?;
        log::debug!("wrote {}", path.display());
        Ok(())
    }
}

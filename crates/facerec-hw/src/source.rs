//! Frame sources: the camera stream and replayed image files.

use crate::camera::CameraError;
use crate::frame::Frame;
use image::ImageFormat;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("camera: {0}")]
    Camera(#[from] CameraError),
    #[error("cannot read frames from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Supplies successive grayscale frames.
pub trait FrameSource {
    /// The next frame, or `Ok(None)` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError>;
}

/// Replays image files as frames, in file-name order.
///
/// Files that fail to decode are logged and skipped. After the last file the
/// source reports end of stream.
pub struct ImageSequence {
    paths: std::vec::IntoIter<PathBuf>,
    sequence: u32,
}

impl ImageSequence {
    /// A single image file, or every decodable image in a directory.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let io_err = |source| SourceError::Io {
            path: path.display().to_string(),
            source,
        };

        if path.is_dir() {
            let mut paths: Vec<PathBuf> = std::fs::read_dir(path)
                .map_err(io_err)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && ImageFormat::from_path(p).is_ok())
                .collect();
            paths.sort();
            tracing::info!(dir = %path.display(), frames = paths.len(), "replaying image directory");
            Ok(Self::from_paths(paths))
        } else {
            std::fs::metadata(path).map_err(io_err)?;
            Ok(Self::from_paths(vec![path.to_path_buf()]))
        }
    }

    pub fn from_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            paths: paths.into_iter(),
            sequence: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.paths.len()
    }
}

impl FrameSource for ImageSequence {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        for path in self.paths.by_ref() {
            match image::open(&path) {
                Ok(img) => {
                    let frame = Frame::new(img.to_luma8(), self.sequence);
                    self.sequence += 1;
                    tracing::debug!(path = %path.display(), seq = frame.sequence, "replayed frame");
                    return Ok(Some(frame));
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping undecodable frame");
                }
            }
        }
        Ok(None)
    }
}

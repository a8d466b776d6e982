//! Thumbnail generation: decode a source image and shrink it
//!
//! Runs on worker threads; produces a plain RGBA buffer (`Thumbnail`) that the
//! UI thread converts to whatever texture type it displays.

use image::{ImageError, ImageReader};
use log::debug;
use std::path::{Path, PathBuf};

use crate::entities::Thumbnail;

/// Per-file thumbnail failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailError {
    Io { path: PathBuf, message: String },
    Decode { path: PathBuf, message: String },
}

impl std::fmt::Display for ThumbnailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThumbnailError::Io { path, message } => {
                write!(f, "Cannot read {}: {}", path.display(), message)
            }
            ThumbnailError::Decode { path, message } => {
                write!(f, "Cannot decode {}: {}", path.display(), message)
            }
        }
    }
}

impl std::error::Error for ThumbnailError {}

/// Decode `path` and fit it into a `size` x `size` box, keeping aspect.
///
/// Images already smaller than the box are not upscaled.
pub fn generate(path: &Path, size: u32) -> Result<Thumbnail, ThumbnailError> {
    let io_err = |e: std::io::Error| ThumbnailError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let reader = ImageReader::open(path).map_err(io_err)?.with_guessed_format().map_err(io_err)?;
    let img = reader.decode().map_err(|e| match e {
        ImageError::IoError(e) => io_err(e),
        other => ThumbnailError::Decode {
            path: path.to_path_buf(),
            message: other.to_string(),
        },
    })?;

    let size = size.max(1);
    let img = if img.width() > size || img.height() > size {
        img.thumbnail(size, size)
    } else {
        img
    };

    debug!("Thumbnail {}x{} for {}", img.width(), img.height(), path.display());
    Ok(Thumbnail::from(img.to_rgba8()))
}

//! Decoded thumbnail shared between worker threads and the UI thread.
//!
//! Pixels live behind `Arc<[u8]>` so cloning out of the cache is cheap.

use image::RgbaImage;
use std::sync::Arc;

/// RGBA8 preview image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    width: u32,
    height: u32,
    pixels: Arc<[u8]>,
}

impl Thumbnail {
    /// Wrap a raw RGBA8 buffer. Returns None if the length doesn't match.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        if pixels.len() != width as usize * height as usize * 4 {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels: pixels.into(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Pixel buffer size in bytes
    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }

    /// Copy into an `image` buffer (for encoding or display conversion)
    pub fn to_image(&self) -> RgbaImage {
        // Length checked in constructors
        RgbaImage::from_raw(self.width, self.height, self.pixels.to_vec())
            .unwrap_or_else(|| RgbaImage::new(self.width, self.height))
    }
}

impl From<RgbaImage> for Thumbnail {
    fn from(img: RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            pixels: img.into_raw().into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rgba_checks_length() {
        assert!(Thumbnail::from_rgba(2, 2, vec![0; 16]).is_some());
        assert!(Thumbnail::from_rgba(2, 2, vec![0; 15]).is_none());
    }

    #[test]
    fn test_image_conversion() {
        let mut img = RgbaImage::new(3, 2);
        img.put_pixel(1, 1, image::Rgba([10, 20, 30, 255]));
        let thumb = Thumbnail::from(img.clone());
        assert_eq!((thumb.width(), thumb.height()), (3, 2));
        assert_eq!(thumb.byte_size(), 24);
        assert_eq!(thumb.to_image(), img);

        // Clones share the pixel buffer
        let copy = thumb.clone();
        assert!(std::ptr::eq(copy.pixels().as_ptr(), thumb.pixels().as_ptr()));
    }
}

//! Image sequence detected by the scanner
//!
//! **Why**: Artists browse folders with numbered frames (plate_0001.exr, plate_0002.exr...).
//! The scanner groups them into one entry with frame range, padding and gap info.
//!
//! **Used by**: Scanner (construction), CLI listing, thumbnail loader (first frame)
//!
//! # Frame Numbering
//!
//! `frames` and `file_list` are parallel and sorted by numeric frame value.
//! Gaps are allowed: `[1, 2, 3, 5]` is one sequence missing frame 4.

use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use image::{ImageDecoder, ImageReader};

use crate::utils::media;

/// Why metadata could not be read
#[derive(Debug)]
pub enum MetadataError {
    Io(String),
    Decode(String),
}

impl std::fmt::Display for MetadataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataError::Io(e) => write!(f, "I/O error: {}", e),
            MetadataError::Decode(e) => write!(f, "Header decode error: {}", e),
        }
    }
}

impl std::error::Error for MetadataError {}

/// Run of frame-numbered files sharing prefix, padding and extension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSequence {
    pub base_name: String,      // "plate_" (text before frame digits)
    pub padding: usize,         // 4 for "0001", 0 for non-numbered files
    pub extension: String,      // ".exr" (with dot, as found on disk)
    pub frames: Vec<u64>,       // ascending
    pub file_list: Vec<String>, // parallel to frames
    pub directory: PathBuf,

    // Filled after construction
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub resolution: Option<(u32, u32)>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bit_depth: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub color_space: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub total_size_bytes: Option<u64>,
}

impl ImageSequence {
    /// Create sequence from parallel, already sorted frame/file lists
    pub fn new(
        base_name: String,
        padding: usize,
        extension: String,
        frames: Vec<u64>,
        file_list: Vec<String>,
        directory: PathBuf,
    ) -> Self {
        debug_assert_eq!(frames.len(), file_list.len());
        debug_assert!(frames.windows(2).all(|w| w[0] < w[1]));
        Self {
            base_name,
            padding,
            extension,
            frames,
            file_list,
            directory,
            resolution: None,
            bit_depth: None,
            color_space: None,
            total_size_bytes: None,
        }
    }

    /// Degenerate entry for a file without a frame number
    pub fn standalone(file_name: &str, directory: PathBuf) -> Self {
        let path = Path::new(file_name);
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name)
            .to_string();
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();

        Self::new(stem, 0, extension, vec![0], vec![file_name.to_string()], directory)
    }

    /// More than one file
    pub fn is_sequence(&self) -> bool {
        self.file_list.len() > 1
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn first_frame(&self) -> Option<u64> {
        self.frames.first().copied()
    }

    pub fn last_frame(&self) -> Option<u64> {
        self.frames.last().copied()
    }

    /// Get range (first, last) inclusive
    pub fn frame_range(&self) -> Option<(u64, u64)> {
        Some((self.first_frame()?, self.last_frame()?))
    }

    /// Frame numbers between first and last that have no file
    ///
    /// Allocates one entry per missing frame; use `missing_count` when only the
    /// size of the gaps matters.
    pub fn missing_frames(&self) -> Vec<u64> {
        let mut missing = Vec::new();
        for pair in self.frames.windows(2) {
            missing.extend(pair[0] + 1..pair[1]);
        }
        missing
    }

    /// Number of missing frames, without listing them
    pub fn missing_count(&self) -> u64 {
        self.frames
            .windows(2)
            .map(|w| w[1].saturating_sub(w[0]).saturating_sub(1))
            .fold(0u64, |acc, n| acc.saturating_add(n))
    }

    pub fn has_gaps(&self) -> bool {
        self.frames.windows(2).any(|w| w[1] - w[0] > 1)
    }

    /// Hash-padded pattern: `plate_####.exr`
    ///
    /// Standalone files return their own name.
    pub fn pattern(&self) -> String {
        if self.padding == 0 {
            return format!("{}{}", self.base_name, self.extension);
        }
        format!("{}{}{}", self.base_name, "#".repeat(self.padding), self.extension)
    }

    /// printf-style pattern: `plate_%04d.exr`
    pub fn printf_pattern(&self) -> String {
        if self.padding == 0 {
            return format!("{}{}", self.base_name, self.extension);
        }
        format!("{}%0{}d{}", self.base_name, self.padding, self.extension)
    }

    /// Label for listings: `plate_####.exr [1-100]`
    pub fn display_name(&self) -> String {
        if !self.is_sequence() {
            return self.file_list.first().cloned().unwrap_or_else(|| self.pattern());
        }
        let (first, last) = self.frame_range().unwrap_or((0, 0));
        let mut name = format!("{} [{}-{}]", self.pattern(), first, last);
        if self.has_gaps() {
            name.push_str(" (gaps)");
        }
        name
    }

    /// Absolute path of the file at `index` (sorted order)
    pub fn file_path(&self, index: usize) -> Option<PathBuf> {
        self.file_list.get(index).map(|f| self.directory.join(f))
    }

    pub fn first_file(&self) -> Option<PathBuf> {
        self.file_path(0)
    }

    /// Absolute paths of all members
    pub fn paths(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.file_list.iter().map(|f| self.directory.join(f))
    }

    /// Read resolution, bit depth and color space from the first file header
    ///
    /// Color space is guessed from the extension so it is set even when the
    /// header can't be read (dpx/cin have no decoder).
    pub fn extract_metadata(&mut self) -> Result<(), MetadataError> {
        let Some(path) = self.first_file() else {
            return Ok(());
        };
        self.color_space = Some(media::color_space_for(&path).to_string());

        let reader = ImageReader::open(&path)
            .map_err(|e| MetadataError::Io(format!("{}: {}", path.display(), e)))?
            .with_guessed_format()
            .map_err(|e| MetadataError::Io(format!("{}: {}", path.display(), e)))?;
        let decoder = reader
            .into_decoder()
            .map_err(|e| MetadataError::Decode(format!("{}: {}", path.display(), e)))?;

        let color = decoder.color_type();
        let channels = u16::from(color.channel_count()).max(1);
        self.resolution = Some(decoder.dimensions());
        self.bit_depth = Some((color.bits_per_pixel() / channels) as u8);

        debug!(
            "Metadata for {}: {:?} {:?}-bit {:?}",
            self.pattern(),
            self.resolution,
            self.bit_depth,
            self.color_space
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(frames: Vec<u64>) -> ImageSequence {
        let files = frames.iter().map(|f| format!("shot_{:04}.exr", f)).collect();
        ImageSequence::new(
            "shot_".into(),
            4,
            ".exr".into(),
            frames,
            files,
            PathBuf::from("/plates"),
        )
    }

    #[test]
    fn test_missing_frames() {
        let s = seq(vec![1, 2, 3, 5, 7, 8, 9, 10]);
        assert_eq!(s.missing_frames(), vec![4, 6]);
        assert!(s.has_gaps());
        assert_eq!(s.frame_range(), Some((1, 10)));
    }

    #[test]
    fn test_missing_count_huge_gap() {
        let s = seq(vec![0, 9_999_999_999]);
        assert_eq!(s.missing_count(), 9_999_999_998);
        assert!(s.has_gaps());
        assert_eq!(s.display_name(), "shot_####.exr [0-9999999999] (gaps)");

        assert_eq!(seq(vec![1, 2, 3, 5, 7, 8, 9, 10]).missing_count(), 2);
        assert_eq!(seq(vec![u64::MAX - 1, u64::MAX]).missing_count(), 0);
    }

    #[test]
    fn test_contiguous_has_no_gaps() {
        let s = seq((1..=100).collect());
        assert!(s.missing_frames().is_empty());
        assert!(!s.has_gaps());
        assert_eq!(s.frame_count(), 100);
    }

    #[test]
    fn test_patterns_and_names() {
        let s = seq(vec![1, 2, 4]);
        assert_eq!(s.pattern(), "shot_####.exr");
        assert_eq!(s.printf_pattern(), "shot_%04d.exr");
        assert_eq!(s.display_name(), "shot_####.exr [1-4] (gaps)");
        assert_eq!(s.file_path(2), Some(PathBuf::from("/plates/shot_0004.exr")));
        assert_eq!(s.file_path(3), None);
    }

    #[test]
    fn test_standalone() {
        let s = ImageSequence::standalone("logo.png", PathBuf::from("/x"));
        assert_eq!(s.base_name, "logo");
        assert_eq!(s.extension, ".png");
        assert_eq!(s.frames, vec![0]);
        assert!(!s.is_sequence());
        assert!(!s.has_gaps());
        assert_eq!(s.display_name(), "logo.png");
        assert_eq!(s.pattern(), "logo.png");
    }

    #[test]
    fn test_extract_metadata_png() {
        let dir = tempfile::tempdir().unwrap();
        image::RgbaImage::new(16, 8).save(dir.path().join("a_0001.png")).unwrap();

        let mut s = ImageSequence::new(
            "a_".into(),
            4,
            ".png".into(),
            vec![1],
            vec!["a_0001.png".into()],
            dir.path().to_path_buf(),
        );
        s.extract_metadata().unwrap();
        assert_eq!(s.resolution, Some((16, 8)));
        assert_eq!(s.bit_depth, Some(8));
        assert_eq!(s.color_space.as_deref(), Some("sRGB"));
    }

    #[test]
    fn test_extract_metadata_unreadable_keeps_color_space() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("scan_0001.dpx"), b"not really a dpx").unwrap();

        let mut s = ImageSequence::new(
            "scan_".into(),
            4,
            ".dpx".into(),
            vec![1],
            vec!["scan_0001.dpx".into()],
            dir.path().to_path_buf(),
        );
        assert!(s.extract_metadata().is_err());
        assert_eq!(s.resolution, None);
        assert_eq!(s.color_space.as_deref(), Some("log"));
    }

    #[test]
    fn test_serialize_skips_unset_metadata() {
        let s = seq(vec![1, 2]);
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"base_name\":\"shot_\""));
        assert!(!json.contains("resolution"));
    }
}

//! File-type helpers and frame-number grouping
//!
//! **Why**: extension rules and naming patterns shared by scanner and metadata code
//!
//! **Used by**: scanner, thumbnail loader, sequence metadata

pub mod sequences;

/// Media file type detection
pub mod media {
    use std::path::Path;

    /// Supported image file extensions (lowercase, without dot)
    ///
    /// Union of every still-image format the browser ever listed, including
    /// film formats (dpx, cin) the decoder can't read. Those still group into
    /// sequences; only their thumbnails fail.
    pub const IMAGE_EXTS: &[&str] = &[
        "jpg", "jpeg", "png", "bmp", "tiff", "tif", "gif", "exr", "dpx", "cin", "hdr", "tga",
    ];

    /// Scene-linear formats
    pub const LINEAR_EXTS: &[&str] = &["exr", "hdr"];

    /// Log-encoded film scan formats
    pub const LOG_EXTS: &[&str] = &["dpx", "cin"];

    /// Lowercase extension of a path without the dot
    pub fn ext_lower(path: &Path) -> Option<String> {
        path.extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase())
    }

    /// Check if file is an image format
    pub fn is_image(path: &Path) -> bool {
        ext_lower(path)
            .map(|s| IMAGE_EXTS.contains(&s.as_str()))
            .unwrap_or(false)
    }

    /// Guess color space label from extension
    pub fn color_space_for(path: &Path) -> &'static str {
        match ext_lower(path) {
            Some(e) if LINEAR_EXTS.contains(&e.as_str()) => "linear",
            Some(e) if LOG_EXTS.contains(&e.as_str()) => "log",
            _ => "sRGB",
        }
    }

}

//! Directory scanner - finds image sequences in one folder
//!
//! Steps (progress reported after each):
//! 1. List regular files (non-recursive), skipping entries that can't be stat'd
//! 2. Keep image extensions only
//! 3. Match frame numbers and group by (prefix, padding, ext)
//! 4. Build sorted `ImageSequence`s, optionally reading header metadata
//!
//! Cancellation is cooperative: the flag is polled between files and between
//! groups. A cancelled scan returns only sequences that were completely built.

use log::{debug, info, warn};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::core::workers::CancelToken;
use crate::entities::ImageSequence;
use crate::utils::media;
use crate::utils::sequences::{ListedFile, SequenceGrouper};

/// Directory-level scan failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    NotFound(PathBuf),
    NotADirectory(PathBuf),
    PermissionDenied(PathBuf),
    Io { path: PathBuf, message: String },
}

impl ScanError {
    fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => ScanError::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => ScanError::PermissionDenied(path.to_path_buf()),
            _ => ScanError::Io {
                path: path.to_path_buf(),
                message: err.to_string(),
            },
        }
    }
}

impl std::fmt::Display for ScanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanError::NotFound(p) => write!(f, "Directory not found: {}", p.display()),
            ScanError::NotADirectory(p) => write!(f, "Not a directory: {}", p.display()),
            ScanError::PermissionDenied(p) => write!(f, "Permission denied: {}", p.display()),
            ScanError::Io { path, message } => {
                write!(f, "I/O error on {}: {}", path.display(), message)
            }
        }
    }
}

impl std::error::Error for ScanError {}

/// Coarse progress checkpoint on a 0-100 scale
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanProgress {
    pub current: u32,
    pub total: u32,
    pub message: String,
}

impl ScanProgress {
    fn new(current: u32, message: impl Into<String>) -> Self {
        Self {
            current,
            total: 100,
            message: message.into(),
        }
    }
}

/// Sequences found plus whether the scan stopped early
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub sequences: Vec<ImageSequence>,
    pub cancelled: bool,
}

impl ScanOutcome {
    fn cancelled(sequences: Vec<ImageSequence>) -> Self {
        Self {
            sequences,
            cancelled: true,
        }
    }
}

/// Single-directory sequence scanner
#[derive(Debug, Clone)]
pub struct SequenceScanner {
    cancel: CancelToken,
    include_standalone: bool,
    read_metadata: bool,
}

impl Default for SequenceScanner {
    fn default() -> Self {
        Self {
            cancel: CancelToken::new(),
            include_standalone: true,
            read_metadata: false,
        }
    }
}

impl SequenceScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep single files (no frame number, or a lone numbered file) in results
    pub fn with_standalone(mut self, include: bool) -> Self {
        self.include_standalone = include;
        self
    }

    /// Read resolution/bit depth from each sequence's first file
    pub fn with_metadata(mut self, read: bool) -> Self {
        self.read_metadata = read;
        self
    }

    /// Handle for cancelling from another thread
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn request_cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Scan `directory` for image sequences
    ///
    /// `progress` is called at coarse checkpoints only.
    pub fn scan(
        &self,
        directory: &Path,
        mut progress: impl FnMut(ScanProgress),
    ) -> Result<ScanOutcome, ScanError> {
        let meta = fs::metadata(directory).map_err(|e| ScanError::from_io(directory, e))?;
        if !meta.is_dir() {
            return Err(ScanError::NotADirectory(directory.to_path_buf()));
        }
        let directory = fs::canonicalize(directory).map_err(|e| ScanError::from_io(directory, e))?;

        progress(ScanProgress::new(0, format!("Listing {}", directory.display())));
        let Some(files) = self.list_files(&directory)? else {
            info!("Scan of {} cancelled while listing", directory.display());
            return Ok(ScanOutcome::cancelled(Vec::new()));
        };

        progress(ScanProgress::new(25, format!("Found {} files", files.len())));
        let images: Vec<ListedFile> = files
            .into_iter()
            .filter(|f| media::is_image(Path::new(&f.name)))
            .collect();

        progress(ScanProgress::new(50, format!("Detecting sequences in {} images", images.len())));
        let mut grouper = SequenceGrouper::new();
        for file in images {
            if self.is_cancelled() {
                info!("Scan of {} cancelled during detection", directory.display());
                return Ok(ScanOutcome::cancelled(Vec::new()));
            }
            grouper.push(file);
        }

        progress(ScanProgress::new(75, format!("Building {} entries", grouper.len())));
        let mut sequences = grouper.finish(&directory, || !self.is_cancelled());
        if !self.include_standalone {
            sequences.retain(|s| s.is_sequence());
        }

        if self.read_metadata {
            for seq in sequences.iter_mut() {
                if self.is_cancelled() {
                    break;
                }
                if let Err(e) = seq.extract_metadata() {
                    debug!("No metadata for {}: {}", seq.pattern(), e);
                }
            }
        }

        if self.is_cancelled() {
            info!(
                "Scan of {} cancelled, returning {} complete entries",
                directory.display(),
                sequences.len()
            );
            return Ok(ScanOutcome::cancelled(sequences));
        }

        let seq_count = sequences.iter().filter(|s| s.is_sequence()).count();
        info!(
            "Scanned {}: {} sequences, {} single files",
            directory.display(),
            seq_count,
            sequences.len() - seq_count
        );
        progress(ScanProgress::new(100, format!("Found {} sequences", seq_count)));

        Ok(ScanOutcome {
            sequences,
            cancelled: false,
        })
    }

    /// List regular files; None if cancelled
    fn list_files(&self, directory: &Path) -> Result<Option<Vec<ListedFile>>, ScanError> {
        let entries = fs::read_dir(directory).map_err(|e| ScanError::from_io(directory, e))?;
        let mut files = Vec::new();

        for entry in entries {
            if self.is_cancelled() {
                return Ok(None);
            }
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Skipping unreadable entry in {}: {}", directory.display(), e);
                    continue;
                }
            };
            // Follow symlinks so linked frames count as files
            let meta = match fs::metadata(entry.path()) {
                Ok(m) => m,
                Err(e) => {
                    debug!("Skipping {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            if !meta.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                warn!("Skipping non UTF-8 file name {:?}", entry.file_name());
                continue;
            };
            files.push(ListedFile {
                name,
                size: meta.len(),
            });
        }

        Ok(Some(files))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"x").unwrap();
    }

    fn scan(dir: &Path) -> ScanOutcome {
        SequenceScanner::new().scan(dir, |_| {}).unwrap()
    }

    #[test]
    fn test_hundred_frame_sequence() {
        let dir = tempfile::tempdir().unwrap();
        for i in 1..=100 {
            touch(dir.path(), &format!("name_{:04}.png", i));
        }

        let outcome = scan(dir.path());
        assert!(!outcome.cancelled);
        assert_eq!(outcome.sequences.len(), 1);

        let seq = &outcome.sequences[0];
        assert_eq!(seq.frames, (1..=100).collect::<Vec<u64>>());
        assert_eq!(seq.padding, 4);
        assert!(!seq.has_gaps());
        assert_eq!(seq.total_size_bytes, Some(100));
        assert_eq!(seq.directory, fs::canonicalize(dir.path()).unwrap());
    }

    #[test]
    fn test_unnumbered_files_are_single_entries() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["logo.png", "matte.exr", "bg.jpg", "ref.tiff"] {
            touch(dir.path(), name);
        }

        let outcome = scan(dir.path());
        assert_eq!(outcome.sequences.len(), 4);
        assert!(outcome.sequences.iter().all(|s| !s.is_sequence() && s.file_list.len() == 1));
    }

    #[test]
    fn test_filters_non_images_and_subdirs() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a_0001.exr");
        touch(dir.path(), "a_0002.exr");
        touch(dir.path(), "notes_0001.txt");
        fs::create_dir(dir.path().join("b_0003.exr")).unwrap();

        let outcome = scan(dir.path());
        assert_eq!(outcome.sequences.len(), 1);
        assert_eq!(outcome.sequences[0].frames, vec![1, 2]);
    }

    #[test]
    fn test_gaps_detected() {
        let dir = tempfile::tempdir().unwrap();
        for i in [1, 2, 3, 5, 7, 8, 9, 10] {
            touch(dir.path(), &format!("shot.{:04}.exr", i));
        }
        let outcome = scan(dir.path());
        let seq = &outcome.sequences[0];
        assert_eq!(seq.missing_frames(), vec![4, 6]);
        assert!(seq.has_gaps());
    }

    #[test]
    fn test_without_standalone() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a_0001.exr");
        touch(dir.path(), "a_0002.exr");
        touch(dir.path(), "logo.png");

        let outcome = SequenceScanner::new()
            .with_standalone(false)
            .scan(dir.path(), |_| {})
            .unwrap();
        assert_eq!(outcome.sequences.len(), 1);
    }

    #[test]
    fn test_directory_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        assert_eq!(
            SequenceScanner::new().scan(&missing, |_| {}).unwrap_err(),
            ScanError::NotFound(missing.clone())
        );

        touch(dir.path(), "file.png");
        let file = dir.path().join("file.png");
        assert_eq!(
            SequenceScanner::new().scan(&file, |_| {}).unwrap_err(),
            ScanError::NotADirectory(file.clone())
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_is_permission_denied() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        touch(&locked, "a_0001.exr");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Root ignores directory permissions
        let privileged = fs::read_dir(&locked).is_ok();
        let result = SequenceScanner::new().scan(&locked, |_| {});
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        if privileged {
            return;
        }
        assert!(matches!(result, Err(ScanError::PermissionDenied(_))), "{:?}", result);
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_skipped() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a_0001.exr");
        touch(dir.path(), "a_0002.exr");
        std::os::unix::fs::symlink(dir.path().join("gone.exr"), dir.path().join("a_0003.exr"))
            .unwrap();

        let mut messages = Vec::new();
        let outcome = SequenceScanner::new()
            .scan(dir.path(), |p| messages.push(p.message))
            .unwrap();
        assert_eq!(outcome.sequences.len(), 1);
        assert_eq!(outcome.sequences[0].frames, vec![1, 2]);
        assert_eq!(messages[1], "Found 2 files");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_name_skipped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a_0001.exr");
        touch(dir.path(), "a_0002.exr");
        let bad = dir.path().join(OsStr::from_bytes(b"a_\xff_0003.exr"));
        if fs::write(&bad, b"x").is_err() {
            // Filesystem refuses non UTF-8 names
            return;
        }

        let outcome = scan(dir.path());
        assert_eq!(outcome.sequences.len(), 1);
        assert_eq!(outcome.sequences[0].frames, vec![1, 2]);
    }

    #[test]
    fn test_progress_checkpoints() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a_0001.exr");

        let mut seen = Vec::new();
        SequenceScanner::new()
            .scan(dir.path(), |p| seen.push(p.current))
            .unwrap();
        assert_eq!(seen, vec![0, 25, 50, 75, 100]);
    }

    #[test]
    fn test_cancel_before_scan_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        for i in 1..=10 {
            touch(dir.path(), &format!("a_{:04}.exr", i));
        }
        let scanner = SequenceScanner::new();
        scanner.request_cancel();
        let outcome = scanner.scan(dir.path(), |_| {}).unwrap();
        assert!(outcome.cancelled);
        assert!(outcome.sequences.is_empty());
    }

    #[test]
    fn test_cancel_from_progress_callback() {
        let dir = tempfile::tempdir().unwrap();
        for i in 1..=10 {
            touch(dir.path(), &format!("a_{:04}.exr", i));
            touch(dir.path(), &format!("b_{:04}.exr", i));
        }
        let scanner = SequenceScanner::new();
        let token = scanner.cancel_token();
        let outcome = scanner
            .scan(dir.path(), |p| {
                if p.current == 75 {
                    token.cancel();
                }
            })
            .unwrap();
        assert!(outcome.cancelled);
        assert!(outcome.sequences.is_empty());
    }

    #[test]
    fn test_metadata_read_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        for i in 1..=2 {
            image::RgbaImage::new(4, 2)
                .save(dir.path().join(format!("p_{:04}.png", i)))
                .unwrap();
        }
        let outcome = SequenceScanner::new()
            .with_metadata(true)
            .scan(dir.path(), |_| {})
            .unwrap();
        assert_eq!(outcome.sequences[0].resolution, Some((4, 2)));
    }
}

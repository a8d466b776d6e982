use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::thumb_cache::CacheConfig;

/// Recent directories kept in preferences
pub const MAX_RECENT: usize = 10;

/// Browser preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    // Thumbnails
    pub thumbnail_size: u32,   // Longer edge in px (default 128)
    pub loader_threads: usize, // 0 = auto (3/4 of cores)
    pub jpeg_quality: u8,      // Disk tier quality (default 85)

    // Cache
    pub memory_cache_items: usize,
    pub disk_cache_max_items: usize,
    pub disk_cache_max_mb: u64,

    // Browser
    pub show_standalone_files: bool,
    pub read_metadata: bool,
    pub last_directory: Option<PathBuf>,
    pub recent_directories: Vec<PathBuf>, // Most recent first
}

impl Default for Preferences {
    fn default() -> Self {
        let cache = CacheConfig::default();
        Self {
            thumbnail_size: 128,
            loader_threads: 0,
            jpeg_quality: cache.jpeg_quality,
            memory_cache_items: cache.memory_capacity,
            disk_cache_max_items: cache.max_disk_items,
            disk_cache_max_mb: cache.max_disk_bytes / (1024 * 1024),
            show_standalone_files: true,
            read_metadata: false,
            last_directory: None,
            recent_directories: Vec::new(),
        }
    }
}

impl Preferences {
    /// Load preferences; missing file or broken JSON falls back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(prefs) => prefs,
            Err(e) => {
                if path.exists() {
                    warn!("Using default preferences: {:#}", e);
                }
                Self::default()
            }
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read preferences: {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse preferences: {}", path.display()))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize preferences")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write preferences: {}", path.display()))
    }

    /// Remember a browsed directory (moves it to the front, trims the list)
    pub fn push_recent(&mut self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        self.recent_directories.retain(|d| d != &dir);
        self.recent_directories.insert(0, dir.clone());
        self.recent_directories.truncate(MAX_RECENT);
        self.last_directory = Some(dir);
    }

    /// Cache limits derived from preferences
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            memory_capacity: self.memory_cache_items.max(1),
            max_disk_items: self.disk_cache_max_items,
            max_disk_bytes: self.disk_cache_max_mb.saturating_mul(1024 * 1024),
            jpeg_quality: self.jpeg_quality,
        }
    }

    /// Thumbnail worker count, resolving 0 to 3/4 of the cores
    pub fn effective_loader_threads(&self) -> usize {
        if self.loader_threads > 0 {
            self.loader_threads
        } else {
            (num_cpus::get() * 3 / 4).max(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_keys_default() {
        let prefs: Preferences = serde_json::from_str(r#"{"thumbnail_size": 256}"#).unwrap();
        assert_eq!(prefs.thumbnail_size, 256);
        assert_eq!(prefs.memory_cache_items, 100);
        assert!(prefs.show_standalone_files);
        assert!(prefs.recent_directories.is_empty());
    }

    #[test]
    fn test_push_recent() {
        let mut prefs = Preferences::default();
        for i in 0..12 {
            prefs.push_recent(format!("/d{}", i));
        }
        prefs.push_recent("/d5");
        assert_eq!(prefs.recent_directories.len(), MAX_RECENT);
        assert_eq!(prefs.recent_directories[0], PathBuf::from("/d5"));
        assert_eq!(prefs.recent_directories[1], PathBuf::from("/d11"));
        assert_eq!(prefs.last_directory, Some(PathBuf::from("/d5")));
    }

    #[test]
    fn test_cache_config() {
        let prefs = Preferences {
            memory_cache_items: 0,
            disk_cache_max_mb: 2,
            ..Preferences::default()
        };
        let cfg = prefs.cache_config();
        assert_eq!(cfg.memory_capacity, 1);
        assert_eq!(cfg.max_disk_bytes, 2 * 1024 * 1024);
        assert_eq!(Preferences::default().cache_config(), CacheConfig::default());
    }

    #[test]
    fn test_save_load_and_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");

        let mut prefs = Preferences::default();
        prefs.thumbnail_size = 64;
        prefs.push_recent("/plates");
        prefs.save(&path).unwrap();
        assert_eq!(Preferences::load(&path).unwrap(), prefs);

        fs::write(&path, "[1, 2").unwrap();
        assert_eq!(Preferences::load_or_default(&path), Preferences::default());
        let missing = dir.path().join("none.json");
        assert_eq!(Preferences::load_or_default(missing), Preferences::default());
    }

    #[test]
    fn test_loader_threads() {
        let prefs = Preferences { loader_threads: 3, ..Preferences::default() };
        assert_eq!(prefs.effective_loader_threads(), 3);
        assert!(Preferences::default().effective_loader_threads() >= 1);
    }
}

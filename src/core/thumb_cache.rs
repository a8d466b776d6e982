//! Two-tier thumbnail cache: memory LRU over a bounded JPEG directory
//!
//! **Why**: Decoding a 4K EXR to show a 128px preview is expensive. The memory tier
//! serves the browser's visible items; the disk tier survives restarts.
//!
//! # Keys
//!
//! `sha256("{path}:{size}:{mtime_nanos}")`, first 32 hex chars. Touching the source
//! file changes its mtime and therefore the key, so stale previews are never served.
//!
//! # Eviction
//!
//! - Memory: strict LRU (`lru` crate), both get and put refresh recency
//! - Disk: item count and byte limits. After every put the directory is listed and
//!   the oldest entries are removed until both limits hold. Files missing from the
//!   access order rank oldest, by mtime.
//!
//! A memory hit also refreshes the entry in the disk access order, so hot items
//! never go cold on disk just because they are served from RAM.
//!
//! # Concurrency
//!
//! All bookkeeping sits behind one Mutex. JPEG encoding and temp-file writes happen
//! outside it; the final rename happens inside, so an eviction pass never sees a
//! half-registered entry and readers never see a partial file.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use indexmap::IndexSet;
use log::{debug, info, trace, warn};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::core::thumbnail::{self, ThumbnailError};
use crate::entities::Thumbnail;

/// Sidecar format version
pub const CACHE_VERSION: &str = "1.0";
/// Sidecar file name inside the cache root
pub const METADATA_FILE: &str = "cache_metadata.json";

const THUMB_EXT: &str = "jpg";
const TMP_EXT: &str = "tmp";

/// Cache limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub memory_capacity: usize,
    pub max_disk_items: usize,
    pub max_disk_bytes: u64,
    pub jpeg_quality: u8,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_capacity: 100,
            max_disk_items: 10_000,
            max_disk_bytes: 500 * 1024 * 1024,
            jpeg_quality: 85,
        }
    }
}

/// Cache failure (disk tier only; the memory tier can't fail)
#[derive(Debug)]
pub enum CacheError {
    Io { path: PathBuf, message: String },
    Encode(String),
    Thumbnail(ThumbnailError),
}

impl CacheError {
    fn io(path: &Path, err: std::io::Error) -> Self {
        CacheError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::Io { path, message } => {
                write!(f, "Cache I/O error on {}: {}", path.display(), message)
            }
            CacheError::Encode(e) => write!(f, "Thumbnail encode error: {}", e),
            CacheError::Thumbnail(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CacheError {}

impl From<ThumbnailError> for CacheError {
    fn from(e: ThumbnailError) -> Self {
        CacheError::Thumbnail(e)
    }
}

/// Snapshot for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub memory_items: usize,
    pub memory_capacity: usize,
    pub memory_bytes: usize,
    pub disk_items: usize,
    pub disk_bytes: u64,
    pub max_disk_items: usize,
    pub max_disk_bytes: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

/// Hit/miss counters, updated without the main lock
#[derive(Debug, Default)]
struct HitCounters {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl HitCounters {
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    fn hit_rate(&self) -> f64 {
        let total = self.hits() + self.misses();
        if total == 0 { 0.0 } else { self.hits() as f64 / total as f64 }
    }
}

/// On-disk sidecar: `{"access_order": [...], "version": "1.0"}`
#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    access_order: Vec<String>,
    version: String,
}

#[derive(Debug)]
struct CacheInner {
    memory: LruCache<String, Thumbnail>,
    memory_bytes: usize,
    /// Disk access order, oldest first
    access_order: IndexSet<String>,
    dirty: bool,
}

impl CacheInner {
    fn touch_disk(&mut self, key: &str) {
        if self.access_order.shift_remove(key) {
            self.access_order.insert(key.to_string());
            self.dirty = true;
        }
    }

    fn insert_memory(&mut self, key: String, thumb: Thumbnail) {
        self.memory_bytes += thumb.byte_size();
        // push returns the replaced value or the evicted LRU entry
        if let Some((old_key, old)) = self.memory.push(key, thumb) {
            self.memory_bytes = self.memory_bytes.saturating_sub(old.byte_size());
            trace!("Memory tier dropped {}", old_key);
        }
    }
}

/// One file in the cache directory
struct DiskEntry {
    key: String,
    bytes: u64,
    modified: SystemTime,
}

/// Thread-safe two-tier thumbnail cache
#[derive(Debug)]
pub struct ThumbnailCache {
    root: PathBuf,
    config: CacheConfig,
    inner: Mutex<CacheInner>,
    counters: HitCounters,
    tmp_seq: AtomicU64,
}

impl ThumbnailCache {
    /// Open (or create) a cache rooted at `root`
    ///
    /// Restores the disk access order from the sidecar; an unreadable or
    /// foreign-version sidecar is ignored.
    pub fn open(root: impl Into<PathBuf>, config: CacheConfig) -> Result<Self, CacheError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| CacheError::io(&root, e))?;

        let mut access_order = IndexSet::new();
        if let Some(sidecar) = Self::read_sidecar(&root) {
            access_order.extend(
                sidecar
                    .access_order
                    .into_iter()
                    .filter(|k| Self::entry_path_in(&root, k).is_file()),
            );
        }

        let capacity =
            NonZeroUsize::new(config.memory_capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        info!(
            "Thumbnail cache at {}: {} disk entries known, memory capacity {}",
            root.display(),
            access_order.len(),
            capacity
        );

        Ok(Self {
            root,
            config,
            inner: Mutex::new(CacheInner {
                memory: LruCache::new(capacity),
                memory_bytes: 0,
                access_order,
                dirty: false,
            }),
            counters: HitCounters::default(),
            tmp_seq: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Stable key for (source, size, source mtime)
    pub fn cache_key(source: &Path, size: u32) -> String {
        let mtime = fs::metadata(source)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos())
            .unwrap_or(0);

        let mut hasher = Sha256::new();
        hasher.update(format!("{}:{}:{}", source.to_string_lossy(), size, mtime).as_bytes());
        let hash = hasher.finalize();
        format!("{:x}", hash).chars().take(32).collect()
    }

    fn entry_path_in(root: &Path, key: &str) -> PathBuf {
        root.join(format!("{}.{}", key, THUMB_EXT))
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        Self::entry_path_in(&self.root, key)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Look up a thumbnail: memory first, then disk (promoting into memory)
    pub fn get(&self, source: &Path, size: u32) -> Option<Thumbnail> {
        let key = Self::cache_key(source, size);

        {
            let mut inner = self.lock();
            if let Some(thumb) = inner.memory.get(&key).cloned() {
                inner.touch_disk(&key);
                self.counters.record_hit();
                trace!("Memory hit {} ({})", key, source.display());
                return Some(thumb);
            }
        }

        let path = self.entry_path(&key);
        let thumb = match self.read_entry(&key, &path) {
            Some(t) => t,
            None => {
                self.counters.record_miss();
                return None;
            }
        };

        let mut inner = self.lock();
        inner.insert_memory(key.clone(), thumb.clone());
        if inner.access_order.contains(&key) {
            inner.touch_disk(&key);
        } else if path.is_file() {
            // Written by another process, or evicted meanwhile
            inner.access_order.insert(key.clone());
            inner.dirty = true;
        }
        self.counters.record_hit();
        trace!("Disk hit {} ({})", key, source.display());
        Some(thumb)
    }

    /// Memory-tier membership without touching recency
    pub fn in_memory(&self, source: &Path, size: u32) -> bool {
        let key = Self::cache_key(source, size);
        self.lock().memory.contains(&key)
    }

    /// Disk-tier membership
    pub fn on_disk(&self, source: &Path, size: u32) -> bool {
        self.entry_path(&Self::cache_key(source, size)).is_file()
    }

    /// Store in both tiers, then enforce limits
    ///
    /// The memory tier is updated even if the disk write fails.
    pub fn put(&self, source: &Path, size: u32, thumb: &Thumbnail) -> Result<(), CacheError> {
        let key = Self::cache_key(source, size);
        self.lock().insert_memory(key.clone(), thumb.clone());

        let jpeg = self.encode(thumb)?;
        let tmp = self.root.join(format!(
            ".{}.{}.{}.{}",
            key,
            std::process::id(),
            self.tmp_seq.fetch_add(1, Ordering::Relaxed),
            TMP_EXT
        ));
        fs::write(&tmp, &jpeg).map_err(|e| CacheError::io(&tmp, e))?;

        let path = self.entry_path(&key);
        let mut inner = self.lock();
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(CacheError::io(&path, e));
        }
        inner.access_order.shift_remove(&key);
        inner.access_order.insert(key.clone());
        inner.dirty = true;
        debug!("Cached {} ({} bytes) for {}", key, jpeg.len(), source.display());

        self.evict_disk(&mut inner);
        self.save_sidecar(&mut inner)
    }

    /// Cached thumbnail, or decode + store on miss
    pub fn get_or_create(&self, source: &Path, size: u32) -> Result<Thumbnail, CacheError> {
        if let Some(thumb) = self.get(source, size) {
            return Ok(thumb);
        }
        let thumb = thumbnail::generate(source, size)?;
        if let Err(e) = self.put(source, size, &thumb) {
            warn!("Thumbnail for {} not persisted: {}", source.display(), e);
        }
        Ok(thumb)
    }

    /// Drop everything, including files on disk
    ///
    /// Temp files of puts still in flight are left alone; their rename lands
    /// after the clear and registers a fresh entry.
    pub fn clear(&self) -> Result<(), CacheError> {
        let mut inner = self.lock();
        inner.memory.clear();
        inner.memory_bytes = 0;
        inner.access_order.clear();
        inner.dirty = false;

        let entries = fs::read_dir(&self.root).map_err(|e| CacheError::io(&self.root, e))?;
        let mut first_err = None;
        let mut removed = 0usize;
        for entry in entries.flatten() {
            let path = entry.path();
            let ours = path.file_name().and_then(|n| n.to_str()) == Some(METADATA_FILE)
                || path.extension().and_then(|e| e.to_str()) == Some(THUMB_EXT);
            if !ours || !path.is_file() {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => {
                    warn!("Failed to remove {}: {}", path.display(), e);
                    if first_err.is_none() {
                        first_err = Some(CacheError::io(&path, e));
                    }
                }
            }
        }

        info!("Thumbnail cache cleared ({} files removed)", removed);
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Counts and sizes of both tiers (lists the cache directory)
    pub fn stats(&self) -> CacheStats {
        let (memory_items, memory_bytes) = {
            let inner = self.lock();
            (inner.memory.len(), inner.memory_bytes)
        };
        let disk = self.list_disk();

        CacheStats {
            memory_items,
            memory_capacity: self.config.memory_capacity.max(1),
            memory_bytes,
            disk_items: disk.len(),
            disk_bytes: disk.iter().map(|e| e.bytes).sum(),
            max_disk_items: self.config.max_disk_items,
            max_disk_bytes: self.config.max_disk_bytes,
            hits: self.counters.hits(),
            misses: self.counters.misses(),
            hit_rate: self.counters.hit_rate(),
        }
    }

    /// Persist the access order if it changed
    pub fn flush(&self) -> Result<(), CacheError> {
        let mut inner = self.lock();
        if inner.dirty {
            self.save_sidecar(&mut inner)?;
        }
        Ok(())
    }

    fn encode(&self, thumb: &Thumbnail) -> Result<Vec<u8>, CacheError> {
        // JPEG has no alpha
        let rgb = DynamicImage::ImageRgba8(thumb.to_image()).to_rgb8();
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, self.config.jpeg_quality.clamp(1, 100))
            .encode_image(&rgb)
            .map_err(|e| CacheError::Encode(e.to_string()))?;
        Ok(buf)
    }

    /// Decode a disk entry. Corrupt entries are deleted and forgotten.
    fn read_entry(&self, key: &str, path: &Path) -> Option<Thumbnail> {
        let bytes = fs::read(path).ok()?;
        match image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg) {
            Ok(img) => Some(Thumbnail::from(img.to_rgba8())),
            Err(e) => {
                warn!("Corrupt cache entry {}: {}", path.display(), e);
                let mut inner = self.lock();
                let _ = fs::remove_file(path);
                if inner.access_order.shift_remove(key) {
                    inner.dirty = true;
                }
                None
            }
        }
    }

    fn list_disk(&self) -> Vec<DiskEntry> {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return Vec::new();
        };
        entries
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some(THUMB_EXT) {
                    return None;
                }
                let key = path.file_stem()?.to_str()?.to_string();
                let meta = entry.metadata().ok()?;
                if !meta.is_file() {
                    return None;
                }
                Some(DiskEntry {
                    key,
                    bytes: meta.len(),
                    modified: meta.modified().unwrap_or(UNIX_EPOCH),
                })
            })
            .collect()
    }

    /// Remove oldest disk entries until both limits hold. Caller holds the lock.
    fn evict_disk(&self, inner: &mut CacheInner) -> usize {
        let mut entries = self.list_disk();
        let mut count = entries.len();
        let mut bytes: u64 = entries.iter().map(|e| e.bytes).sum();
        if count <= self.config.max_disk_items && bytes <= self.config.max_disk_bytes {
            return 0;
        }

        // Unknown files first (by mtime), then access order
        entries.sort_by(|a, b| {
            let rank = |e: &DiskEntry| inner.access_order.get_index_of(&e.key);
            match (rank(a), rank(b)) {
                (None, None) => a.modified.cmp(&b.modified),
                (None, Some(_)) => std::cmp::Ordering::Less,
                (Some(_), None) => std::cmp::Ordering::Greater,
                (Some(x), Some(y)) => x.cmp(&y),
            }
        });

        let mut evicted = 0;
        for entry in entries {
            if count <= self.config.max_disk_items && bytes <= self.config.max_disk_bytes {
                break;
            }
            let path = self.entry_path(&entry.key);
            if let Err(e) = fs::remove_file(&path) {
                warn!("Failed to evict {}: {}", path.display(), e);
                continue;
            }
            inner.access_order.shift_remove(&entry.key);
            count -= 1;
            bytes = bytes.saturating_sub(entry.bytes);
            evicted += 1;
        }

        inner.dirty = true;
        debug!("Disk tier evicted {} entries ({} left, {} bytes)", evicted, count, bytes);
        evicted
    }

    fn read_sidecar(root: &Path) -> Option<Sidecar> {
        let path = root.join(METADATA_FILE);
        let data = fs::read(&path).ok()?;
        match serde_json::from_slice::<Sidecar>(&data) {
            Ok(s) if s.version == CACHE_VERSION => Some(s),
            Ok(s) => {
                warn!("Ignoring cache metadata version {} in {}", s.version, path.display());
                None
            }
            Err(e) => {
                warn!("Ignoring unreadable cache metadata {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Write sidecar via temp file + rename. Caller holds the lock.
    fn save_sidecar(&self, inner: &mut CacheInner) -> Result<(), CacheError> {
        let sidecar = Sidecar {
            access_order: inner.access_order.iter().cloned().collect(),
            version: CACHE_VERSION.to_string(),
        };
        let data =
            serde_json::to_vec_pretty(&sidecar).map_err(|e| CacheError::Encode(e.to_string()))?;

        let path = self.root.join(METADATA_FILE);
        let tmp = self.root.join(format!(".{}.{}", METADATA_FILE, TMP_EXT));
        fs::write(&tmp, data).map_err(|e| CacheError::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| CacheError::io(&path, e))?;
        inner.dirty = false;
        Ok(())
    }
}

impl Drop for ThumbnailCache {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!("Failed to save thumbnail cache metadata: {}", e);
        }
    }
}

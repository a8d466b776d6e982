//! Core engine modules - scanner, thumbnail cache, background jobs
//!
//! These modules are independent of any UI toolkit.

pub mod scanner;
pub mod thumb_cache;
pub mod thumbnail;
pub mod workers;

// Re-exports for convenience
pub use scanner::{ScanError, ScanOutcome, ScanProgress, SequenceScanner};
pub use thumb_cache::{CacheConfig, CacheError, CacheStats, ThumbnailCache};
pub use thumbnail::ThumbnailError;
pub use workers::{CancelToken, ScanEvent, ScanJob, ScanObserver, ThumbnailEvent, ThumbnailJob};

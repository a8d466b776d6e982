//! seqbrowse - image sequence browser library
//!
//! Re-exports all modules for use by the binary target.

// Core engine (scanner, thumbnail cache, workers)
pub mod core;

// App modules
pub mod cli;
pub mod config;
pub mod entities;
pub mod store;
pub mod utils;

// Re-export commonly used types from core
pub use crate::core::scanner::{ScanError, SequenceScanner};
pub use crate::core::thumb_cache::{CacheConfig, ThumbnailCache};
pub use crate::core::workers::{CancelToken, ScanJob, ThumbnailJob};

// Re-export entities
pub use crate::entities::{ImageSequence, Thumbnail};

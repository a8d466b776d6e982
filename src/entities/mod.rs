//! Entities module - plain data handed between workers and the controlling thread
//!
//! - `ImageSequence`: one detected run of numbered frames (or a standalone file)
//! - `Thumbnail`: decoded RGBA preview, cheap to clone and `Send`

pub mod sequence;
pub mod thumbnail;

pub use sequence::{ImageSequence, MetadataError};
pub use thumbnail::Thumbnail;

//! JSON-backed user stores (favorites, preferences)

pub mod favorites;
pub mod prefs;

pub use favorites::{Favorite, Favorites};
pub use prefs::Preferences;

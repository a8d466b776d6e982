//! Favorite directories for the browser sidebar
//!
//! File format: `{"favorites": [{"name": "Plates", "path": "/shows/x/plates"}, ...]}`.
//! Order is the display order.

use anyhow::{Context, Result, bail};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Named directory bookmark
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favorite {
    pub name: String,
    pub path: PathBuf,
}

/// Ordered favorites list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favorites {
    #[serde(default)]
    favorites: Vec<Favorite>,
}

impl Favorites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from JSON file; a missing file is an empty list
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No favorites file at {}", path.display());
            return Ok(Self::new());
        }
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read favorites: {}", path.display()))?;
        let favorites: Favorites = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse favorites: {}", path.display()))?;
        Ok(favorites)
    }

    /// Save as pretty JSON, creating the parent directory if needed
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize favorites")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write favorites: {}", path.display()))?;
        info!("Saved {} favorites to {}", self.favorites.len(), path.display());
        Ok(())
    }

    pub fn list(&self) -> &[Favorite] {
        &self.favorites
    }

    pub fn len(&self) -> usize {
        self.favorites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.favorites.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.favorites.iter().position(|f| f.name == name)
    }

    /// Append a favorite; the same path can't be added twice
    pub fn add(&mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Result<()> {
        let name = name.into();
        let path = path.into();
        if let Some(existing) = self.favorites.iter().find(|f| f.path == path) {
            bail!("{} is already a favorite ({})", path.display(), existing.name);
        }
        self.favorites.push(Favorite { name, path });
        Ok(())
    }

    /// Add an existing directory, stored canonicalized
    ///
    /// The name defaults to the directory's own name.
    pub fn add_directory(&mut self, path: &Path, name: Option<String>) -> Result<Favorite> {
        let path = path
            .canonicalize()
            .with_context(|| format!("Not a valid directory: {}", path.display()))?;
        if !path.is_dir() {
            bail!("Not a directory: {}", path.display());
        }
        let name = name.unwrap_or_else(|| {
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string())
        });
        self.add(name.clone(), path.clone())?;
        Ok(Favorite { name, path })
    }

    /// Remove by name
    pub fn remove(&mut self, name: &str) -> Result<Favorite> {
        let idx = self
            .position(name)
            .with_context(|| format!("No favorite named '{}'", name))?;
        Ok(self.favorites.remove(idx))
    }

    pub fn rename(&mut self, old: &str, new: impl Into<String>) -> Result<()> {
        let idx = self
            .position(old)
            .with_context(|| format!("No favorite named '{}'", old))?;
        self.favorites[idx].name = new.into();
        Ok(())
    }

    /// Move entry at `from` to position `to` (indices into the current list)
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.favorites.len();
        if from >= len || to >= len {
            bail!("Favorite index out of range: {} -> {} (have {})", from, to, len);
        }
        let item = self.favorites.remove(from);
        self.favorites.insert(to, item);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(f: &Favorites) -> Vec<&str> {
        f.list().iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn test_crud() {
        let mut favs = Favorites::new();
        favs.add("Plates", "/show/plates").unwrap();
        favs.add("Renders", "/show/renders").unwrap();
        favs.add("Refs", "/show/refs").unwrap();
        assert!(favs.add("Dup", "/show/plates").is_err());

        favs.rename("Renders", "Comp renders").unwrap();
        favs.move_item(2, 0).unwrap();
        assert_eq!(names(&favs), vec!["Refs", "Plates", "Comp renders"]);

        let removed = favs.remove("Plates").unwrap();
        assert_eq!(removed.path, PathBuf::from("/show/plates"));
        assert!(favs.remove("Plates").is_err());
        assert!(favs.move_item(0, 5).is_err());
        assert_eq!(favs.len(), 2);
    }

    #[test]
    fn test_add_directory() {
        let dir = tempfile::tempdir().unwrap();
        let shots = dir.path().join("shots");
        fs::create_dir(&shots).unwrap();
        let file = dir.path().join("notes.txt");
        fs::write(&file, b"x").unwrap();

        let mut favs = Favorites::new();
        let fav = favs.add_directory(&shots, None).unwrap();
        assert_eq!(fav.name, "shots");
        assert_eq!(fav.path, shots.canonicalize().unwrap());

        let err = favs.add_directory(&file, None).unwrap_err();
        assert!(err.to_string().contains("Not a directory"));
        assert!(favs.add_directory(&dir.path().join("missing"), None).is_err());
        assert!(favs.add_directory(&shots, Some("again".into())).is_err());
        assert_eq!(favs.len(), 1);
    }

    #[test]
    fn test_save_load_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/favorites.json");

        let mut favs = Favorites::new();
        favs.add("Plates", "/show/plates").unwrap();
        favs.save(&path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["favorites"][0]["name"], "Plates");
        assert_eq!(raw["favorites"][0]["path"], "/show/plates");

        assert_eq!(Favorites::load(&path).unwrap(), favs);
    }

    #[test]
    fn test_load_missing_and_broken() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Favorites::load(dir.path().join("none.json")).unwrap().is_empty());

        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{ nope").unwrap();
        assert!(Favorites::load(&broken).is_err());

        let empty_obj = dir.path().join("empty.json");
        fs::write(&empty_obj, "{}").unwrap();
        assert!(Favorites::load(&empty_obj).unwrap().is_empty());
    }
}

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Directory name under the home directory
const APP_DIR: &str = ".curveeditor";
/// Thumbnail cache directory name inside the app directory
pub const CACHE_DIR: &str = "thumbnail_cache";

/// Configuration for overriding default application paths
#[derive(Debug, Clone, Default)]
pub struct PathConfig {
    /// Custom config directory (from CLI or ENV)
    pub config_dir: Option<PathBuf>,
}

impl PathConfig {
    /// Create PathConfig from CLI arguments and environment variables
    ///
    /// Priority: CLI args → ENV var (SEQBROWSE_CONFIG_DIR) → None (use defaults)
    pub fn from_env_and_cli(cli_dir: Option<PathBuf>) -> Self {
        let config_dir = cli_dir.or_else(|| {
            std::env::var("SEQBROWSE_CONFIG_DIR")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
        });

        Self { config_dir }
    }
}

/// Get path to a configuration file (favorites.json, preferences.json, logs)
///
/// Priority:
/// 1. CLI --config-dir argument
/// 2. SEQBROWSE_CONFIG_DIR environment variable
/// 3. ~/.curveeditor (home directory from dirs-next)
/// 4. <temp>/curveeditor if there is no home directory
pub fn config_file(name: &str, config: &PathConfig) -> PathBuf {
    get_config_dir(config).join(name)
}

/// Get the thumbnail cache root
pub fn cache_dir(config: &PathConfig) -> PathBuf {
    get_config_dir(config).join(CACHE_DIR)
}

/// Ensure that configuration and cache directories exist
///
/// Creates directories if they don't exist. Returns error if creation fails.
pub fn ensure_dirs(config: &PathConfig) -> Result<()> {
    let config_dir = get_config_dir(config);
    let cache_dir = cache_dir(config);

    for dir in [&config_dir, &cache_dir] {
        if !dir.exists() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
    }

    Ok(())
}

/// Get the configuration directory
fn get_config_dir(config: &PathConfig) -> PathBuf {
    // Priority 1: Custom directory from CLI or ENV
    if let Some(dir) = &config.config_dir {
        return dir.clone();
    }

    // Priority 2: Home directory
    if let Some(home) = dirs_next::home_dir() {
        return home.join(APP_DIR);
    }

    // Fallback: temp dir if everything else fails
    std::env::temp_dir().join("curveeditor")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_with_custom_dir() {
        let config = PathConfig {
            config_dir: Some(PathBuf::from("/custom")),
        };

        assert_eq!(config_file("favorites.json", &config), PathBuf::from("/custom/favorites.json"));
        assert_eq!(cache_dir(&config), PathBuf::from("/custom/thumbnail_cache"));
    }

    #[test]
    fn test_cli_dir_wins() {
        let config = PathConfig::from_env_and_cli(Some(PathBuf::from("/from-cli")));
        assert_eq!(config.config_dir, Some(PathBuf::from("/from-cli")));
    }

    #[test]
    fn test_default_uses_app_dir() {
        let config = PathConfig { config_dir: None };
        let path = config_file("preferences.json", &config);
        assert!(path.to_string_lossy().contains("curveeditor"));
        assert!(path.ends_with("preferences.json"));
    }

    #[test]
    fn test_ensure_dirs_creates_cache_root() {
        let temp = tempfile::tempdir().unwrap();
        let config = PathConfig {
            config_dir: Some(temp.path().join("cfg")),
        };
        ensure_dirs(&config).unwrap();
        assert!(cache_dir(&config).is_dir());
    }
}

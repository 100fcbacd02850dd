//! Default paths for medminder components
//!
//! Paths are user-writable by default:
//! - Config: `$XDG_CONFIG_HOME/medminder/config.toml` or `~/.config/medminder/config.toml`
//! - Data: `$XDG_DATA_HOME/medminder` or `~/.local/share/medminder`

use std::path::PathBuf;

/// Config filename within the config directory
const CONFIG_FILENAME: &str = "config.toml";

/// Database filename within the data directory
pub const DATABASE_FILENAME: &str = "medminder.db";

/// Application subdirectory name
const APP_DIR: &str = "medminder";

fn xdg_dir(xdg_var: &str, home_relative: &[&str], fallback: &str) -> PathBuf {
    if let Ok(dir) = std::env::var(xdg_var) {
        return PathBuf::from(dir).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        let mut path = PathBuf::from(home);
        for part in home_relative {
            path.push(part);
        }
        return path.join(APP_DIR);
    }

    // Last resort
    PathBuf::from("/tmp").join(APP_DIR).join(fallback)
}

/// Get the default configuration file path.
pub fn default_config_path() -> PathBuf {
    xdg_dir("XDG_CONFIG_HOME", &[".config"], "config").join(CONFIG_FILENAME)
}

/// Get the default data directory.
///
/// The `MEDMINDER_DATA_DIR` override is applied by the service's CLI, so
/// this only resolves the XDG location.
pub fn default_data_dir() -> PathBuf {
    xdg_dir("XDG_DATA_HOME", &[".local", "share"], "data")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_is_toml_under_app_dir() {
        let path = default_config_path();
        assert!(path.to_string_lossy().contains("medminder"));
        assert!(path.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn data_dir_contains_medminder() {
        let path = default_data_dir();
        assert!(path.to_string_lossy().contains("medminder"));
    }
}

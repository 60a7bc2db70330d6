use std::fs;
use std::path::{Path, PathBuf};

use oceannav_core::{Options, OptionsPatch};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

// ---------------------------------------------------------------------------
// Shell preferences
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShellPreferences {
    /// Options applied at startup, before any link is restored.
    #[serde(default)]
    pub default_options: Options,
    /// Catalog document. When empty, `catalog.json` next to the executable
    /// is used if present, else the built-in sample catalog.
    #[serde(default)]
    pub catalog_path: String,
    /// Origin and path that generated links are rooted at.
    #[serde(default = "default_permalink_base")]
    pub permalink_base: String,
    /// Origin for generated API script links.
    #[serde(default = "default_script_origin")]
    pub script_origin: String,
    #[serde(default = "default_true")]
    pub restore_last_link: bool,
    /// Last link generated or opened in the shell.
    #[serde(default)]
    pub last_link: Option<String>,
    /// Maximum modal history entries.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_permalink_base() -> String {
    "https://navigator.oceansdata.ca/public/".to_string()
}
fn default_script_origin() -> String {
    "https://navigator.oceansdata.ca".to_string()
}
fn default_true() -> bool {
    true
}
fn default_history_limit() -> usize {
    200
}

impl Default for ShellPreferences {
    fn default() -> Self {
        Self {
            default_options: Options::default(),
            catalog_path: String::new(),
            permalink_base: default_permalink_base(),
            script_origin: default_script_origin(),
            restore_last_link: true,
            last_link: None,
            history_limit: default_history_limit(),
        }
    }
}

impl ShellPreferences {
    /// Load preferences from next to the executable, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(json) => match serde_json::from_str::<ShellPreferences>(&json) {
                    Ok(prefs) => {
                        info!("Loaded preferences from {}", path.display());
                        return prefs;
                    }
                    Err(e) => {
                        error!("Failed to parse preferences: {e}");
                    }
                },
                Err(e) => {
                    error!("Failed to read preferences file: {e}");
                }
            }
        } else {
            debug!("No preferences file at {}", path.display());
        }
        Self::default()
    }

    /// Persist preferences to disk.
    pub fn save(&self) {
        self.save_to(&config_path());
    }

    pub fn save_to(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory: {e}");
                return;
            }
        }
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(path, &json) {
                    error!("Failed to write preferences: {e}");
                } else {
                    debug!("Saved preferences");
                }
            }
            Err(e) => error!("Failed to serialize preferences: {e}"),
        }
    }

    /// The configured catalog file, if any.
    pub fn catalog_file(&self) -> Option<PathBuf> {
        if self.catalog_path.trim().is_empty() {
            let fallback = crate::app_dir::default_catalog_path();
            fallback.exists().then_some(fallback)
        } else {
            Some(PathBuf::from(self.catalog_path.trim()))
        }
    }

    /// Patch installing the default options.
    pub fn options_patch(&self) -> OptionsPatch {
        OptionsPatch::from_options(&self.default_options)
    }

    /// Link to restore on startup, if enabled.
    pub fn startup_link(&self) -> Option<&str> {
        self.restore_last_link
            .then_some(self.last_link.as_deref())
            .flatten()
    }
}

fn config_path() -> PathBuf {
    crate::app_dir::exe_directory().join("preferences.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use oceannav_core::InterpolationMethod;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("oceannav-prefs-{}-{name}", std::process::id()))
            .join("preferences.json")
    }

    #[test]
    fn missing_fields_take_defaults() {
        let prefs: ShellPreferences =
            serde_json::from_str(r#"{ "catalog_path": "/data/catalog.json" }"#).unwrap();
        assert_eq!(prefs.catalog_path, "/data/catalog.json");
        assert_eq!(prefs.permalink_base, default_permalink_base());
        assert!(prefs.restore_last_link);
        assert_eq!(prefs.history_limit, 200);
        assert_eq!(prefs.default_options, Options::default());
    }

    #[test]
    fn save_then_load() {
        let path = temp_path("roundtrip");
        let mut prefs = ShellPreferences {
            last_link: Some("https://navigator.example/?query=%7B%7D".to_string()),
            ..ShellPreferences::default()
        };
        prefs.default_options.interp_type = InterpolationMethod::Nearest;
        prefs.save_to(&path);
        assert_eq!(ShellPreferences::load_from(&path), prefs);
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn unreadable_file_falls_back_to_defaults() {
        let path = temp_path("corrupt");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(ShellPreferences::load_from(&path), ShellPreferences::default());
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn startup_link_respects_the_flag() {
        let mut prefs = ShellPreferences {
            last_link: Some("?query=%7B%7D".to_string()),
            ..ShellPreferences::default()
        };
        assert_eq!(prefs.startup_link(), Some("?query=%7B%7D"));
        prefs.restore_last_link = false;
        assert_eq!(prefs.startup_link(), None);
    }

    #[test]
    fn explicit_catalog_path_is_used_verbatim() {
        let prefs = ShellPreferences {
            catalog_path: " /srv/catalog.json ".to_string(),
            ..ShellPreferences::default()
        };
        assert_eq!(prefs.catalog_file(), Some(PathBuf::from("/srv/catalog.json")));
    }
}

//! Directory where the executable lives. Preferences and the catalog file are
//! looked up next to the binary so a standalone install keeps its data local.

use std::path::PathBuf;

/// Directory containing the running executable. Falls back to current directory if unavailable.
pub fn exe_directory() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

/// Catalog document picked up when no path is configured.
pub fn default_catalog_path() -> PathBuf {
    exe_directory().join("catalog.json")
}

//! Project configuration, read from `.refgraph/config.toml`.
//!
//! Every field has a default, so a missing or partial file is fine:
//!
//! ```toml
//! cache_path = "deps.cache"
//! scan_progress_interval = 30
//!
//! [search]
//! search_properties = false
//! lazy_scene_search = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Name of the per-project state directory.
pub const STATE_DIR: &str = ".refgraph";

const DEFAULT_CACHE_FILE: &str = "dependency.cache";
const DEFAULT_SCAN_PROGRESS_INTERVAL: usize = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefGraphConfig {
    /// Dependency cache location. Relative paths resolve against the state dir.
    pub cache_path: Option<PathBuf>,
    /// Items processed between progress polls during the initial cache scan.
    pub scan_progress_interval: usize,
    pub search: SearchOptions,
}

impl Default for RefGraphConfig {
    fn default() -> Self {
        Self {
            cache_path: None,
            scan_progress_interval: DEFAULT_SCAN_PROGRESS_INTERVAL,
            search: SearchOptions::default(),
        }
    }
}

impl RefGraphConfig {
    /// Load the config file, falling back to defaults when it is missing or broken.
    pub fn load(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(_) => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Self::default();
            }
        };

        match Self::parse(&text) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "invalid config file, using defaults");
                Self::default()
            }
        }
    }

    pub fn parse(text: &str) -> crate::error::Result<Self> {
        let mut config: Self = toml::from_str(text)?;
        if config.scan_progress_interval == 0 {
            config.scan_progress_interval = 1;
        }
        Ok(config)
    }

    /// Where the dependency cache lives for a project whose state dir is `state_dir`.
    pub fn resolve_cache_path(&self, state_dir: &Path) -> PathBuf {
        match &self.cache_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => state_dir.join(path),
            None => state_dir.join(DEFAULT_CACHE_FILE),
        }
    }
}

/// Knobs for a single search run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Follow plain (non-property) members.
    pub search_fields: bool,
    /// Follow property members.
    pub search_properties: bool,
    /// Skip members the engine would not serialize.
    pub serializable_only: bool,
    /// Crawl into the searched objects too, so references between them show up.
    pub search_candidates_themselves: bool,
    /// Report material texture slots the shader no longer declares.
    pub search_unused_material_properties: bool,
    /// Defer searching scenes that do not contain a searched object.
    pub lazy_scene_search: bool,
    /// Elide repeated sub-trees when rendering.
    pub hide_duplicate_rows: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            search_fields: true,
            search_properties: true,
            serializable_only: true,
            search_candidates_themselves: true,
            search_unused_material_properties: false,
            lazy_scene_search: false,
            hide_duplicate_rows: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = RefGraphConfig::load(&dir.path().join("config.toml"));
        assert_eq!(config, RefGraphConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = RefGraphConfig::parse(
            "scan_progress_interval = 5\n[search]\nsearch_properties = false\n",
        )
        .unwrap();
        assert_eq!(config.scan_progress_interval, 5);
        assert!(!config.search.search_properties);
        assert!(config.search.search_fields, "unspecified options keep their default");
    }

    #[test]
    fn test_invalid_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "scan_progress_interval = \"often\"").unwrap();
        assert_eq!(RefGraphConfig::load(&path), RefGraphConfig::default());
    }

    #[test]
    fn test_resolve_cache_path() {
        let state = Path::new("/project/.refgraph");
        let mut config = RefGraphConfig::default();
        assert_eq!(
            config.resolve_cache_path(state),
            PathBuf::from("/project/.refgraph/dependency.cache")
        );

        config.cache_path = Some(PathBuf::from("custom.bin"));
        assert_eq!(
            config.resolve_cache_path(state),
            PathBuf::from("/project/.refgraph/custom.bin")
        );

        config.cache_path = Some(PathBuf::from("/tmp/elsewhere.bin"));
        assert_eq!(config.resolve_cache_path(state), PathBuf::from("/tmp/elsewhere.bin"));
    }
}

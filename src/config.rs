use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub case_sensitive: bool,
    /// Expand ancestors of matching rows automatically while filtering.
    #[serde(default = "FilterConfig::default_expand_to_matches")]
    pub expand_to_matches: bool,
}

impl FilterConfig {
    const fn default_expand_to_matches() -> bool {
        true
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self { case_sensitive: false, expand_to_matches: Self::default_expand_to_matches() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TreeConfig {
    /// Hide components produced by construction scripts from instance trees.
    #[serde(default)]
    pub hide_construction_script_components: bool,
    /// Newly added rows start expanded.
    #[serde(default = "TreeConfig::default_expand_added_rows")]
    pub expand_added_rows: bool,
}

impl TreeConfig {
    const fn default_expand_added_rows() -> bool {
        true
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            hide_construction_script_components: false,
            expand_added_rows: Self::default_expand_added_rows(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InspectorConfig {
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub tree: TreeConfig,
}

impl InspectorConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                eprintln!("Config load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }
}

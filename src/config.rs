//! Build configuration.
//!
//! Handles loading, validating, and merging `simple-press.toml`. Stock
//! defaults are the base layer; the user file overrides only the keys it
//! names. The manager never reads this file itself; it receives an already
//! resolved [`BuildConfig`].
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! content_dir = "content"            # Markdown sources
//! output_dir = "public"              # Generated site
//! cache_dir = ".simple-press-cache"  # Incremental build cache
//!
//! [build]
//! # workers = 4                      # Parallel workers (omit for auto = CPU cores)
//! no_cache = false                   # Ignore and don't write the cache
//! allow_private = false              # Publish posts marked `private = true`
//!
//! [[feeds]]
//! slug = "blog"
//! title = "Blog"
//! # tag = "rust"                     # Only posts tagged "rust" (omit for all)
//!
//! [plugins.<name>]                   # Free-form, read by the named plugin
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the config file looked up in the project directory.
pub const CONFIG_FILENAME: &str = "simple-press.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Resolved build configuration.
///
/// All fields have defaults. User config files need only specify the
/// values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Directory holding markdown sources.
    pub content_dir: PathBuf,
    /// Directory the site is written to.
    pub output_dir: PathBuf,
    /// Directory holding the build cache manifest.
    pub cache_dir: PathBuf,
    /// Execution settings.
    pub build: BuildSettings,
    /// Feeds that group posts into index pages and sidebars.
    pub feeds: Vec<FeedConfig>,
    /// Per-plugin settings, keyed by plugin name.
    pub plugins: BTreeMap<String, toml::Value>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            content_dir: PathBuf::from("content"),
            output_dir: PathBuf::from("public"),
            cache_dir: PathBuf::from(".simple-press-cache"),
            build: BuildSettings::default(),
            feeds: vec![FeedConfig {
                slug: "blog".to_string(),
                title: "Blog".to_string(),
                tag: None,
            }],
            plugins: BTreeMap::new(),
        }
    }
}

impl BuildConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.build.workers == Some(0) {
            return Err(ConfigError::Validation(
                "build.workers must be at least 1".into(),
            ));
        }
        if self.content_dir == self.output_dir {
            return Err(ConfigError::Validation(
                "content_dir and output_dir must differ".into(),
            ));
        }
        let mut seen = HashSet::new();
        for feed in &self.feeds {
            if feed.slug.is_empty()
                || !feed
                    .slug
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
            {
                return Err(ConfigError::Validation(format!(
                    "feed slug {:?} must be non-empty lowercase letters, digits, or dashes",
                    feed.slug
                )));
            }
            if !seen.insert(feed.slug.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate feed slug {:?}",
                    feed.slug
                )));
            }
        }
        Ok(())
    }

    /// Raw settings table for `plugin`, if any.
    pub fn plugin_table(&self, plugin: &str) -> Option<&toml::Value> {
        self.plugins.get(plugin)
    }

    /// Typed settings for `plugin`. `Ok(None)` when the table is absent.
    pub fn plugin_config<T: DeserializeOwned>(&self, plugin: &str) -> Result<Option<T>, ConfigError> {
        match self.plugins.get(plugin) {
            Some(value) => Ok(Some(value.clone().try_into()?)),
            None => Ok(None),
        }
    }
}

/// Execution settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildSettings {
    /// Maximum number of parallel workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub workers: Option<usize>,
    /// Run cold and leave the cache untouched.
    pub no_cache: bool,
    /// Publish posts flagged `private = true`.
    pub allow_private: bool,
}

/// One feed definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FeedConfig {
    pub slug: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// Resolve the effective worker count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_workers(settings: &BuildSettings) -> usize {
    let cores = crate::concurrency::available_workers();
    settings
        .workers
        .map(|n| n.min(cores))
        .unwrap_or(cores)
        .max(1)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(BuildConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay (arrays included) replace base values.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto the stock defaults, then deserialize and
/// validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<BuildConfig, ConfigError> {
    let base = stock_defaults_value();
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: BuildConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load a config file. A missing file yields the stock defaults.
pub fn load_config_file(path: &Path) -> Result<BuildConfig, ConfigError> {
    if !path.exists() {
        return resolve_config(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    resolve_config(Some(value))
}

/// Load `simple-press.toml` from `dir`, resolving relative directories
/// against `dir`.
pub fn load_config(dir: &Path) -> Result<BuildConfig, ConfigError> {
    load_config_from(&dir.join(CONFIG_FILENAME))
}

/// Load the config file at `path`, resolving relative directories against
/// the directory holding it.
pub fn load_config_from(path: &Path) -> Result<BuildConfig, ConfigError> {
    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    let mut config = load_config_file(path)?;
    for path in [
        &mut config.content_dir,
        &mut config.output_dir,
        &mut config.cache_dir,
    ] {
        if path.is_relative() {
            *path = dir.join(&*path);
        }
    }
    Ok(config)
}

/// Returns a fully-commented stock config with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# simple-press configuration
# ==========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# Markdown sources, relative to this file.
content_dir = "content"

# Generated site.
output_dir = "public"

# Incremental build cache. Safe to delete; the next build runs cold.
cache_dir = ".simple-press-cache"

# ---------------------------------------------------------------------------
# Build execution
# ---------------------------------------------------------------------------
[build]
# Maximum parallel workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# workers = 4

# Ignore the cache entirely: every post is rebuilt and nothing is saved.
no_cache = false

# Posts with `private = true` in their front matter fail the build unless
# this is enabled.
allow_private = false

# ---------------------------------------------------------------------------
# Feeds
# ---------------------------------------------------------------------------
# Each feed gets an index page at /<slug>/ and appears in the sidebar of
# every post it contains. Set `tag` to admit only posts with that tag.
[[feeds]]
slug = "blog"
title = "Blog"
"##
}

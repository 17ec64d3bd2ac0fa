//! Shared test utilities.
//!
//! Recording plugins for asserting invocation order, and builders for
//! contexts, managers and content trees.
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let log = Log::default();
//! let mut m = test_manager();
//! m.register(recorder("a", Stage::Render, 0, &log));
//! m.run().unwrap();
//! assert_eq!(*log.lock(), vec!["a"]);
//! ```

use crate::cache::BuildCache;
use crate::config::BuildConfig;
use crate::context::BuildContext;
use crate::manager::Manager;
use crate::plugin::FnPlugin;
use crate::stage::Stage;
use parking_lot::{Mutex, MutexGuard};
use std::path::Path;
use std::sync::Arc;

// =========================================================================
// Contexts and managers
// =========================================================================

/// Context with stock config and an in-memory cache.
pub fn test_context() -> BuildContext {
    BuildContext::new(BuildConfig::default(), BuildCache::in_memory())
}

/// Manager with stock config and an in-memory cache, no plugins.
pub fn test_manager() -> Manager {
    Manager::new(BuildConfig::default(), BuildCache::in_memory())
}

/// Config rooted at `root`: `root/content`, `root/public`, `root/cache`.
pub fn rooted_config(root: &Path) -> BuildConfig {
    BuildConfig {
        content_dir: root.join("content"),
        output_dir: root.join("public"),
        cache_dir: root.join("cache"),
        ..BuildConfig::default()
    }
}

// =========================================================================
// Recording plugins
// =========================================================================

/// Shared invocation log.
#[derive(Clone, Default)]
pub struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.0.lock()
    }
}

/// A plugin that appends `name` to `log` when its `stage` hook runs.
pub fn recorder(name: &str, stage: Stage, priority: i32, log: &Log) -> FnPlugin {
    let log = log.clone();
    let entry = name.to_string();
    FnPlugin::new(name).on(stage, priority, move |_| {
        log.lock().push(entry.clone());
        Ok(())
    })
}

// =========================================================================
// Content trees
// =========================================================================

/// Write `files` (relative path, contents) under `dir`.
pub fn write_tree(dir: &Path, files: &[(&str, &str)]) {
    for (rel, body) in files {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, body).unwrap();
    }
}

/// Markdown source with a TOML front-matter block.
pub fn with_front_matter(front: &str, body: &str) -> String {
    format!("+++\n{front}\n+++\n{body}")
}

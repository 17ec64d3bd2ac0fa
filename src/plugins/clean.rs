//! Remove outputs the previous build wrote but this one did not.
//!
//! The previous build's output list comes from the cache snapshot; this
//! build's from what [`Publish`](super::publish::Publish) recorded. Files in
//! the first set but not the second are deleted, along with any directories
//! left empty. With the cache disabled the previous list is empty and
//! nothing is removed.

use crate::context::BuildContext;
use crate::error::BuildError;
use crate::plugin::Plugin;
use crate::stage::Stage;
use std::path::{Component, Path};
use tracing::{debug, info, warn};

pub struct CleanStale;

/// True if `rel` stays inside the directory it is joined to.
fn is_contained(rel: &str) -> bool {
    let path = Path::new(rel);
    !rel.is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)))
}

/// Delete empty directories from `start` up to, but not including, `root`.
fn prune_empty_dirs(root: &Path, start: &Path) {
    let mut dir = start;
    while dir != root && dir.starts_with(root) {
        // Fails on non-empty directories, which ends the walk.
        if std::fs::remove_dir(dir).is_err() {
            break;
        }
        match dir.parent() {
            Some(parent) => dir = parent,
            None => break,
        }
    }
}

impl Plugin for CleanStale {
    fn name(&self) -> &str {
        "clean-stale"
    }

    fn stages(&self) -> &[Stage] {
        &[Stage::Cleanup]
    }

    fn cleanup(&mut self, ctx: &mut BuildContext) -> Result<(), BuildError> {
        let root = ctx.config().output_dir.clone();
        let current = ctx.cache().current_outputs();
        let stale: Vec<String> = ctx
            .cache()
            .previous_outputs()
            .difference(&current)
            .cloned()
            .collect();

        let mut removed = 0;
        for rel in stale {
            if !is_contained(&rel) {
                warn!(path = %rel, "refusing to remove output outside the output directory");
                continue;
            }
            let path = root.join(&rel);
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    debug!(path = %rel, "removed stale output");
                    removed += 1;
                    if let Some(parent) = path.parent() {
                        prune_empty_dirs(&root, parent);
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    ctx.warn(BuildError::warning(format!("could not remove {rel}: {e}")));
                }
            }
        }
        if removed > 0 {
            info!(removed, "cleaned stale outputs");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::BuildCache;
    use crate::test_helpers::{rooted_config, write_tree};
    use tempfile::TempDir;

    #[test]
    fn contained_paths() {
        assert!(is_contained("a/index.html"));
        assert!(!is_contained("../escape.html"));
        assert!(!is_contained("/etc/passwd"));
        assert!(!is_contained("a/../../b"));
        assert!(!is_contained(""));
    }

    #[test]
    fn removes_outputs_no_longer_produced() {
        let tmp = TempDir::new().unwrap();
        let config = rooted_config(tmp.path());
        let out = config.output_dir.clone();
        write_tree(
            &out,
            &[("old/index.html", "old"), ("kept/index.html", "kept"), ("manual.txt", "mine")],
        );

        // Previous build produced old/ and kept/.
        let cache = BuildCache::load(&config.cache_dir);
        cache.record_output("old/index.html");
        cache.record_output("kept/index.html");
        cache.save().unwrap();

        // This build only produces kept/.
        let cache = BuildCache::load(&config.cache_dir);
        cache.record_output("kept/index.html");
        let mut ctx = BuildContext::new(config, cache);
        CleanStale.cleanup(&mut ctx).unwrap();

        assert!(!out.join("old/index.html").exists());
        assert!(!out.join("old").exists());
        assert!(out.join("kept/index.html").exists());
        assert!(out.join("manual.txt").exists());
        assert!(out.exists());
    }

    #[test]
    fn already_missing_file_is_fine() {
        let tmp = TempDir::new().unwrap();
        let config = rooted_config(tmp.path());
        let cache = BuildCache::load(&config.cache_dir);
        cache.record_output("gone/index.html");
        cache.save().unwrap();
        let mut ctx = BuildContext::new(config.clone(), BuildCache::load(&config.cache_dir));
        CleanStale.cleanup(&mut ctx).unwrap();
        assert!(ctx.warnings().is_empty());
    }

    #[test]
    fn disabled_cache_removes_nothing() {
        let tmp = TempDir::new().unwrap();
        let config = rooted_config(tmp.path());
        write_tree(&config.output_dir, &[("x/index.html", "x")]);
        let out = config.output_dir.clone();
        let mut ctx = BuildContext::new(config, BuildCache::disabled());
        CleanStale.cleanup(&mut ctx).unwrap();
        assert!(out.join("x/index.html").exists());
    }
}

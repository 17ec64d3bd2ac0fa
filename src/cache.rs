//! Persistent build cache for incremental builds.
//!
//! Rendering every post on every build is wasted work when most of the
//! site hasn't changed. This module remembers, per post path, the input
//! fingerprint the post was last built from and the artifacts produced
//! from it, so plugins can skip recomputation on the next run.
//!
//! # Design
//!
//! ## Entries and namespaces
//!
//! The cache is keyed by post path. Each entry holds:
//!
//! - **`input_hash`**: the post's [`input_hash`](crate::post::Post::input_hash)
//!   at the end of the last successful build.
//! - **`discriminator`**: an extra value that must also match for the
//!   cached output to be reused (the template name, in practice).
//! - **`membership_hash`**: fingerprint of the groups (feeds, sidebars) the
//!   post took part in when its output was rendered.
//! - **`artifacts`**: one slot per [`ArtifactKind`]. Each slot stores the
//!   fingerprint it was produced from and the payload. Kinds are
//!   independent namespaces sharing the same path key.
//!
//! ## What a hit means
//!
//! Input-hash equality alone never proves a post is fresh. A post whose
//! own bytes are unchanged is still stale when a post it depends on
//! changed, or when the membership of a group it renders changed. Those
//! checks live in [`crate::invalidation`], layered on the queries here.
//!
//! Staleness queries ([`BuildCache::should_rebuild`],
//! [`BuildCache::changed_paths`]) compare against a snapshot taken at load
//! time, so every plugin in a build sees the same answer no matter what
//! earlier plugins wrote.
//!
//! ## Storage
//!
//! The manifest is a JSON file at `<cache_dir>/.build-cache.json`. A
//! missing, corrupt, or wrong-version manifest yields an empty cache: the
//! build runs cold rather than failing. Anything other than a missing file
//! is kept as a [load warning](BuildCache::load_warning) for the build
//! report.
//!
//! ## Failed producers
//!
//! A post whose artifact could not be produced is
//! [marked failed](BuildCache::mark_failed): the stale artifact is dropped
//! and the manager records no input hash for it, so the next build sees the
//! post as changed instead of trusting what is left over.
//!
//! ## Bypassing the cache
//!
//! [`BuildCache::disabled`] answers "rebuild" to every query and drops all
//! writes. `--no-cache` uses it.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::{debug, warn};

/// Name of the cache manifest file within the cache directory.
const MANIFEST_FILENAME: &str = ".build-cache.json";

/// Version of the cache manifest format. Bump this to invalidate all
/// existing caches when the format or key computation changes.
const MANIFEST_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Independent artifact namespaces stored per post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Markdown rendered to an HTML fragment.
    Rendered,
    /// A post-processed HTML fragment.
    Partial,
    /// The complete wrapped document.
    Full,
}

/// A cached artifact and the fingerprint it was produced from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CachedArtifact {
    pub fingerprint: String,
    pub payload: String,
}

/// Everything cached for one post path.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    #[serde(default)]
    pub input_hash: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub discriminator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub membership_hash: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub artifacts: BTreeMap<ArtifactKind, CachedArtifact>,
}

/// On-disk manifest layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Manifest {
    version: u32,
    entries: BTreeMap<String, CacheEntry>,
    /// Output files written by the build, relative to the output dir.
    #[serde(default)]
    outputs: BTreeSet<String>,
}

impl Manifest {
    fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: BTreeMap::new(),
            outputs: BTreeSet::new(),
        }
    }
}

/// Thread-safe handle to the build cache.
///
/// All methods take `&self`; the cache can be shared with parallel workers.
#[derive(Debug)]
pub struct BuildCache {
    dir: Option<PathBuf>,
    enabled: bool,
    /// State as loaded. Never mutated after construction.
    snapshot: Manifest,
    /// State that will be persisted.
    current: RwLock<Manifest>,
    changed: OnceLock<Arc<BTreeSet<String>>>,
    /// Post paths of this build, captured with `changed`.
    seen: OnceLock<BTreeSet<String>>,
    /// Paths whose artifact production failed in this build.
    failed: Mutex<BTreeSet<String>>,
    load_warning: Option<String>,
    hits: AtomicU32,
    misses: AtomicU32,
}

impl BuildCache {
    fn from_manifest(dir: Option<PathBuf>, enabled: bool, manifest: Manifest) -> Self {
        let mut current = manifest.clone();
        current.outputs.clear();
        Self {
            dir,
            enabled,
            snapshot: manifest,
            current: RwLock::new(current),
            changed: OnceLock::new(),
            seen: OnceLock::new(),
            failed: Mutex::new(BTreeSet::new()),
            load_warning: None,
            hits: AtomicU32::new(0),
            misses: AtomicU32::new(0),
        }
    }

    /// An empty cache that is never persisted. Used by tests and dry runs.
    pub fn in_memory() -> Self {
        Self::from_manifest(None, true, Manifest::empty())
    }

    /// A cache that reports every post as stale and drops every write.
    pub fn disabled() -> Self {
        Self::from_manifest(None, false, Manifest::empty())
    }

    /// Load from `dir`. Returns an empty cache bound to `dir` if the
    /// manifest doesn't exist or can't be parsed (version mismatch,
    /// corruption). Those cases also set [`load_warning`](Self::load_warning).
    pub fn load(dir: &Path) -> Self {
        let path = dir.join(MANIFEST_FILENAME);
        let mut problem = None;
        let manifest = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Manifest>(&content) {
                Ok(m) if m.version == MANIFEST_VERSION => m,
                Ok(m) => {
                    warn!(
                        found = m.version,
                        expected = MANIFEST_VERSION,
                        "cache manifest version mismatch, starting cold"
                    );
                    problem = Some(format!(
                        "cache manifest {} has version {}, expected {}; building without cached results",
                        path.display(),
                        m.version,
                        MANIFEST_VERSION
                    ));
                    Manifest::empty()
                }
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "cache manifest unreadable, starting cold");
                    problem = Some(format!(
                        "cache manifest {} is unreadable ({e}); building without cached results",
                        path.display()
                    ));
                    Manifest::empty()
                }
            },
            Err(_) if !path.exists() => {
                debug!(path = %path.display(), "no cache manifest, starting cold");
                Manifest::empty()
            }
            Err(e) => {
                warn!(error = %e, path = %path.display(), "cache manifest unreadable, starting cold");
                problem = Some(format!(
                    "cannot read cache manifest {} ({e}); building without cached results",
                    path.display()
                ));
                Manifest::empty()
            }
        };
        let mut cache = Self::from_manifest(Some(dir.to_path_buf()), true, manifest);
        cache.load_warning = problem;
        cache
    }

    /// Why an existing manifest could not be used, if it couldn't.
    pub fn load_warning(&self) -> Option<&str> {
        self.load_warning.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Persist the current state. A no-op for in-memory and disabled caches.
    pub fn save(&self) -> Result<(), CacheError> {
        let Some(dir) = self.dir.as_ref().filter(|_| self.enabled) else {
            return Ok(());
        };
        std::fs::create_dir_all(dir)?;
        let json = serde_json::to_string_pretty(&*self.current.read())?;
        std::fs::write(dir.join(MANIFEST_FILENAME), json)?;
        Ok(())
    }

    // =========================================================================
    // Staleness queries (answered from the load-time snapshot)
    // =========================================================================

    /// True unless the previous build recorded exactly this input hash and
    /// discriminator for `path`. An empty input hash always rebuilds.
    pub fn should_rebuild(&self, path: &str, input_hash: &str, discriminator: &str) -> bool {
        if !self.enabled || input_hash.is_empty() {
            return true;
        }
        match self.snapshot.entries.get(path) {
            Some(entry) => entry.input_hash != input_hash || entry.discriminator != discriminator,
            None => true,
        }
    }

    /// Input hash recorded for `path` by the previous build.
    pub fn previous_input_hash(&self, path: &str) -> Option<&str> {
        self.snapshot
            .entries
            .get(path)
            .map(|e| e.input_hash.as_str())
            .filter(|h| !h.is_empty())
    }

    /// Paths whose input hash differs from the previous build.
    ///
    /// Computed on the first call from `current` (path, input hash) pairs
    /// and memoised; later calls return the same set and ignore their
    /// argument. Call it once every post has been hashed. Paths that
    /// existed last build but are absent now count as changed, so
    /// dependents of a deleted post are invalidated too.
    pub fn changed_paths<'a, I>(&self, current: I) -> Arc<BTreeSet<String>>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.changed
            .get_or_init(|| {
                let mut seen = BTreeSet::new();
                let mut changed = BTreeSet::new();
                for (path, hash) in current {
                    seen.insert(path.to_string());
                    let fresh = self.enabled
                        && !hash.is_empty()
                        && self.previous_input_hash(path) == Some(hash);
                    if !fresh {
                        changed.insert(path.to_string());
                    }
                }
                for path in self.snapshot.entries.keys() {
                    if !seen.contains(path) {
                        changed.insert(path.clone());
                    }
                }
                debug!(count = changed.len(), "computed changed paths");
                let _ = self.seen.set(seen);
                Arc::new(changed)
            })
            .clone()
    }

    /// True when `path` is a post of this build or was one in the previous
    /// build. Posts of this build are known once
    /// [`changed_paths`](Self::changed_paths) has run.
    pub fn is_known(&self, path: &str) -> bool {
        self.snapshot.entries.contains_key(path)
            || self.seen.get().is_some_and(|seen| seen.contains(path))
    }

    // =========================================================================
    // Artifacts
    // =========================================================================

    /// The artifact stored under (`kind`, `path`), only if it was produced
    /// from exactly `fingerprint`. A mismatch is a miss, not an error.
    pub fn get_cached(&self, kind: ArtifactKind, path: &str, fingerprint: &str) -> Option<String> {
        let found = if self.enabled && !fingerprint.is_empty() {
            self.current
                .read()
                .entries
                .get(path)
                .and_then(|e| e.artifacts.get(&kind))
                .filter(|a| a.fingerprint == fingerprint)
                .map(|a| a.payload.clone())
        } else {
            None
        };
        match found {
            Some(payload) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(path, ?kind, "cache hit");
                Some(payload)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(path, ?kind, "cache miss");
                None
            }
        }
    }

    /// Count a rebuild decided before any lookup was attempted.
    pub(crate) fn count_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Store an artifact. Last write for a (`kind`, `path`) pair wins.
    pub fn set_cached(&self, kind: ArtifactKind, path: &str, fingerprint: &str, payload: &str) {
        if !self.enabled {
            return;
        }
        self.current
            .write()
            .entries
            .entry(path.to_string())
            .or_default()
            .artifacts
            .insert(
                kind,
                CachedArtifact {
                    fingerprint: fingerprint.to_string(),
                    payload: payload.to_string(),
                },
            );
    }

    /// Record that producing the `kind` artifact for `path` failed.
    ///
    /// The stored artifact is dropped so it can never be served again, and
    /// the path is reported by [`failed_paths`](Self::failed_paths).
    pub fn mark_failed(&self, kind: ArtifactKind, path: &str) {
        if !self.enabled {
            return;
        }
        if let Some(entry) = self.current.write().entries.get_mut(path) {
            entry.artifacts.remove(&kind);
        }
        self.failed.lock().insert(path.to_string());
    }

    /// Paths marked failed during this build.
    pub fn failed_paths(&self) -> BTreeSet<String> {
        self.failed.lock().clone()
    }

    /// Clear the input hash recorded for `path`, so the next build treats
    /// it (and its dependents) as changed.
    pub fn forget_input(&self, path: &str) {
        if !self.enabled {
            return;
        }
        if let Some(entry) = self.current.write().entries.get_mut(path) {
            entry.input_hash.clear();
            entry.discriminator.clear();
        }
    }

    /// Record that `path` was successfully built from `input_hash`.
    pub fn mark_built(&self, path: &str, input_hash: &str, discriminator: &str) {
        if !self.enabled {
            return;
        }
        let mut state = self.current.write();
        let entry = state.entries.entry(path.to_string()).or_default();
        entry.input_hash = input_hash.to_string();
        entry.discriminator = discriminator.to_string();
    }

    /// Drop entries for paths not in `live`, so deleted posts don't linger.
    pub fn retain_paths(&self, live: &BTreeSet<&str>) {
        if !self.enabled {
            return;
        }
        self.current
            .write()
            .entries
            .retain(|path, _| live.contains(path.as_str()));
    }

    // =========================================================================
    // Membership hashes
    // =========================================================================

    pub fn get_membership_hash(&self, path: &str) -> Option<String> {
        if !self.enabled {
            return None;
        }
        self.current
            .read()
            .entries
            .get(path)
            .and_then(|e| e.membership_hash.clone())
    }

    pub fn set_membership_hash(&self, path: &str, hash: &str) {
        if !self.enabled {
            return;
        }
        self.current
            .write()
            .entries
            .entry(path.to_string())
            .or_default()
            .membership_hash = Some(hash.to_string());
    }

    // =========================================================================
    // Output tracking
    // =========================================================================

    /// Output files written by the previous build.
    pub fn previous_outputs(&self) -> &BTreeSet<String> {
        &self.snapshot.outputs
    }

    /// Record an output file written by this build.
    pub fn record_output(&self, rel_path: &str) {
        if !self.enabled {
            return;
        }
        self.current.write().outputs.insert(rel_path.to_string());
    }

    pub fn current_outputs(&self) -> BTreeSet<String> {
        self.current.read().outputs.clone()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Resolve the cache manifest path for a cache directory.
pub fn manifest_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(MANIFEST_FILENAME)
}

/// Delete the cache manifest. Returns whether a file was removed.
pub fn clear(cache_dir: &Path) -> std::io::Result<bool> {
    match std::fs::remove_file(manifest_path(cache_dir)) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Summary of cache performance for a build run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn total(&self) -> u32 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} rebuilt ({} total)",
                self.hits,
                self.misses,
                self.total()
            )
        } else {
            write!(f, "{} rebuilt", self.misses)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    /// Build a cache whose snapshot holds `path` built from `hash`.
    fn cache_with_built(tmp: &TempDir, path: &str, hash: &str, template: &str) -> BuildCache {
        let c = BuildCache::load(tmp.path());
        c.mark_built(path, hash, template);
        c.save().unwrap();
        BuildCache::load(tmp.path())
    }

    // =========================================================================
    // should_rebuild
    // =========================================================================

    #[test]
    fn missing_entry_rebuilds() {
        let c = BuildCache::in_memory();
        assert!(c.should_rebuild("a.md", "h1", ""));
    }

    #[test]
    fn matching_entry_skips() {
        let tmp = TempDir::new().unwrap();
        let c = cache_with_built(&tmp, "a.md", "h1", "post");
        assert!(!c.should_rebuild("a.md", "h1", "post"));
    }

    #[test]
    fn changed_input_rebuilds() {
        let tmp = TempDir::new().unwrap();
        let c = cache_with_built(&tmp, "a.md", "h1", "post");
        assert!(c.should_rebuild("a.md", "h2", "post"));
    }

    #[test]
    fn changed_discriminator_rebuilds() {
        let tmp = TempDir::new().unwrap();
        let c = cache_with_built(&tmp, "a.md", "h1", "post");
        assert!(c.should_rebuild("a.md", "h1", "wide"));
    }

    #[test]
    fn empty_hash_always_rebuilds() {
        let tmp = TempDir::new().unwrap();
        let c = cache_with_built(&tmp, "a.md", "", "");
        assert!(c.should_rebuild("a.md", "", ""));
    }

    #[test]
    fn should_rebuild_ignores_writes_in_same_build() {
        let c = BuildCache::in_memory();
        c.mark_built("a.md", "h1", "");
        assert!(c.should_rebuild("a.md", "h1", ""));
    }

    #[test]
    fn disabled_always_rebuilds_and_drops_writes() {
        let c = BuildCache::disabled();
        c.mark_built("a.md", "h1", "");
        c.set_cached(ArtifactKind::Full, "a.md", "f", "payload");
        assert!(c.should_rebuild("a.md", "h1", ""));
        assert_eq!(c.get_cached(ArtifactKind::Full, "a.md", "f"), None);
        assert!(c.save().is_ok());
    }

    // =========================================================================
    // Artifacts
    // =========================================================================

    #[test]
    fn get_cached_requires_exact_fingerprint() {
        let c = BuildCache::in_memory();
        c.set_cached(ArtifactKind::Rendered, "a.md", "fp1", "<p>hi</p>");
        assert_eq!(
            c.get_cached(ArtifactKind::Rendered, "a.md", "fp1").as_deref(),
            Some("<p>hi</p>")
        );
        assert_eq!(c.get_cached(ArtifactKind::Rendered, "a.md", "fp2"), None);
    }

    #[test]
    fn artifact_kinds_are_independent() {
        let c = BuildCache::in_memory();
        c.set_cached(ArtifactKind::Rendered, "a.md", "fp", "fragment");
        assert_eq!(c.get_cached(ArtifactKind::Full, "a.md", "fp"), None);
        c.set_cached(ArtifactKind::Full, "a.md", "fp", "document");
        assert_eq!(
            c.get_cached(ArtifactKind::Rendered, "a.md", "fp").as_deref(),
            Some("fragment")
        );
    }

    #[test]
    fn set_cached_last_write_wins() {
        let c = BuildCache::in_memory();
        c.set_cached(ArtifactKind::Full, "a.md", "fp", "one");
        c.set_cached(ArtifactKind::Full, "a.md", "fp", "two");
        assert_eq!(
            c.get_cached(ArtifactKind::Full, "a.md", "fp").as_deref(),
            Some("two")
        );
    }

    #[test]
    fn stats_count_hits_and_misses() {
        let c = BuildCache::in_memory();
        c.set_cached(ArtifactKind::Full, "a.md", "fp", "x");
        c.get_cached(ArtifactKind::Full, "a.md", "fp");
        c.get_cached(ArtifactKind::Full, "b.md", "fp");
        c.get_cached(ArtifactKind::Full, "a.md", "other");
        assert_eq!(c.stats(), CacheStats { hits: 1, misses: 2 });
    }

    // =========================================================================
    // changed_paths
    // =========================================================================

    #[test]
    fn changed_paths_detects_new_modified_and_removed() {
        let tmp = TempDir::new().unwrap();
        let c = BuildCache::load(tmp.path());
        c.mark_built("same.md", "h", "");
        c.mark_built("edited.md", "old", "");
        c.mark_built("deleted.md", "h", "");
        c.save().unwrap();

        let c = BuildCache::load(tmp.path());
        let changed = c.changed_paths([
            ("same.md", "h"),
            ("edited.md", "new"),
            ("added.md", "h"),
        ]);
        let expected: BTreeSet<String> = ["edited.md", "added.md", "deleted.md"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(*changed, expected);
    }

    #[test]
    fn changed_paths_is_memoised() {
        let c = BuildCache::in_memory();
        let first = c.changed_paths([("a.md", "h")]);
        let second = c.changed_paths([("b.md", "h")]);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(second.contains("a.md"));
        assert!(!second.contains("b.md"));
    }

    #[test]
    fn is_known_covers_previous_and_current_posts() {
        let tmp = TempDir::new().unwrap();
        let c = cache_with_built(&tmp, "old.md", "h", "");
        assert!(c.is_known("old.md"));
        assert!(!c.is_known("new.md"));
        c.changed_paths([("new.md", "h")]);
        assert!(c.is_known("new.md"));
        assert!(!c.is_known("typo.md"));
    }

    #[test]
    fn changed_paths_treats_empty_hash_as_changed() {
        let tmp = TempDir::new().unwrap();
        let c = cache_with_built(&tmp, "a.md", "h", "");
        assert!(c.changed_paths([("a.md", "")]).contains("a.md"));
    }

    // =========================================================================
    // Membership hashes
    // =========================================================================

    #[test]
    fn membership_hash_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let c = BuildCache::load(tmp.path());
        assert_eq!(c.get_membership_hash("a.md"), None);
        c.set_membership_hash("a.md", "m1");
        c.save().unwrap();
        let c = BuildCache::load(tmp.path());
        assert_eq!(c.get_membership_hash("a.md").as_deref(), Some("m1"));
    }

    // =========================================================================
    // Save / Load
    // =========================================================================

    #[test]
    fn save_and_load_preserves_artifacts() {
        let tmp = TempDir::new().unwrap();
        let c = BuildCache::load(tmp.path());
        c.mark_built("a.md", "h", "post");
        c.set_cached(ArtifactKind::Full, "a.md", "fp", "<html>");
        c.save().unwrap();

        let loaded = BuildCache::load(tmp.path());
        assert_eq!(loaded.previous_input_hash("a.md"), Some("h"));
        assert_eq!(
            loaded.get_cached(ArtifactKind::Full, "a.md", "fp").as_deref(),
            Some("<html>")
        );
    }

    #[test]
    fn load_missing_file_returns_empty() {
        let tmp = TempDir::new().unwrap();
        let c = BuildCache::load(tmp.path());
        assert!(c.should_rebuild("a.md", "h", ""));
        assert!(c.previous_outputs().is_empty());
        assert_eq!(c.load_warning(), None);
    }

    #[test]
    fn load_corrupt_json_returns_empty() {
        let tmp = TempDir::new().unwrap();
        fs::write(manifest_path(tmp.path()), "not json").unwrap();
        let c = BuildCache::load(tmp.path());
        assert_eq!(c.previous_input_hash("a.md"), None);
        assert!(c.load_warning().unwrap().contains("unreadable"));
    }

    #[test]
    fn load_wrong_version_returns_empty() {
        let tmp = TempDir::new().unwrap();
        let json = format!(
            r#"{{"version": {}, "entries": {{"a.md": {{"input_hash": "h"}}}}}}"#,
            MANIFEST_VERSION + 1
        );
        fs::write(manifest_path(tmp.path()), json).unwrap();
        let c = BuildCache::load(tmp.path());
        assert_eq!(c.previous_input_hash("a.md"), None);
        assert!(c.load_warning().unwrap().contains("version"));
    }

    #[test]
    fn save_into_unwritable_location_errors() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        fs::write(&blocker, "x").unwrap();
        // A regular file where the cache directory should be.
        let c = BuildCache::load(&blocker.join("cache"));
        c.mark_built("a.md", "h", "");
        assert!(c.save().is_err());
    }

    #[test]
    fn outputs_are_tracked_per_build() {
        let tmp = TempDir::new().unwrap();
        let c = BuildCache::load(tmp.path());
        c.record_output("a/index.html");
        c.save().unwrap();

        let c = BuildCache::load(tmp.path());
        assert!(c.previous_outputs().contains("a/index.html"));
        assert!(c.current_outputs().is_empty());
    }

    #[test]
    fn retain_paths_drops_deleted_posts() {
        let c = BuildCache::in_memory();
        c.mark_built("keep.md", "h", "");
        c.mark_built("gone.md", "h", "");
        c.set_membership_hash("gone.md", "m");
        c.retain_paths(&BTreeSet::from(["keep.md"]));
        assert_eq!(c.get_membership_hash("gone.md"), None);
    }

    // =========================================================================
    // Failed producers
    // =========================================================================

    #[test]
    fn mark_failed_drops_only_that_artifact() {
        let c = BuildCache::in_memory();
        c.set_cached(ArtifactKind::Rendered, "a.md", "fp", "<p>");
        c.set_cached(ArtifactKind::Full, "a.md", "fp", "<html>");
        c.mark_failed(ArtifactKind::Full, "a.md");
        assert_eq!(c.get_cached(ArtifactKind::Full, "a.md", "fp"), None);
        assert_eq!(
            c.get_cached(ArtifactKind::Rendered, "a.md", "fp").as_deref(),
            Some("<p>")
        );
        assert!(c.failed_paths().contains("a.md"));
    }

    #[test]
    fn forgotten_input_counts_as_changed_next_build() {
        let tmp = TempDir::new().unwrap();
        let c = BuildCache::load(tmp.path());
        c.mark_built("a.md", "h", "post");
        c.forget_input("a.md");
        c.save().unwrap();

        let c = BuildCache::load(tmp.path());
        assert!(c.should_rebuild("a.md", "h", "post"));
        assert!(c.changed_paths([("a.md", "h")]).contains("a.md"));
    }

    #[test]
    fn clear_removes_manifest() {
        let tmp = TempDir::new().unwrap();
        let c = BuildCache::load(tmp.path());
        c.mark_built("a.md", "h", "");
        c.save().unwrap();
        assert!(clear(tmp.path()).unwrap());
        assert!(!clear(tmp.path()).unwrap());
    }

    // =========================================================================
    // CacheStats
    // =========================================================================

    #[test]
    fn cache_stats_display_with_hits() {
        let s = CacheStats { hits: 5, misses: 2 };
        assert_eq!(format!("{}", s), "5 cached, 2 rebuilt (7 total)");
    }

    #[test]
    fn cache_stats_display_no_hits() {
        let s = CacheStats { hits: 0, misses: 3 };
        assert_eq!(format!("{}", s), "3 rebuilt");
    }
}

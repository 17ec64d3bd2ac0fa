//! Shared mutable build state.
//!
//! One [`BuildContext`] exists per build. The manager owns it and lends it
//! to each plugin call by `&mut`; nothing about the build lives in globals.

use crate::cache::BuildCache;
use crate::concurrency::WorkerPool;
use crate::config::BuildConfig;
use crate::error::BuildError;
use crate::invalidation;
use crate::post::Post;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// One entry of a feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedMember {
    pub path: String,
    pub title: String,
    /// Link to the member's page, relative to the site root.
    pub href: String,
}

/// A group of posts rendered together (a feed, a sidebar).
#[derive(Debug, Clone, Default)]
pub struct Feed {
    pub slug: String,
    pub title: String,
    /// Only posts carrying this tag belong. `None` admits every post.
    pub tag: Option<String>,
    /// Members in display order.
    pub members: Vec<FeedMember>,
    /// Fingerprint of everything a page showing this feed renders from it.
    pub membership_hash: String,
    /// Rendered index page.
    pub output: String,
}

impl Feed {
    pub fn contains(&self, path: &str) -> bool {
        self.members.iter().any(|m| m.path == path)
    }

    pub fn admits(&self, post: &Post) -> bool {
        match &self.tag {
            Some(tag) => post.tags().iter().any(|t| t == tag),
            None => true,
        }
    }

    /// Output path relative to the site root.
    pub fn output_path(&self) -> String {
        format!("{}/index.html", self.slug)
    }
}

/// Membership hash covering every feed in `feeds` that contains `path`.
///
/// A path in no feed still gets a hash (of the empty set), so leaving the
/// last feed registers as a change.
pub fn membership_in(feeds: &[Feed], path: &str) -> String {
    let hashes = feeds
        .iter()
        .filter(|f| f.contains(path))
        .map(|f| f.membership_hash.as_str());
    invalidation::membership_hash(hashes)
}

/// Read-only view handed to parallel per-post workers.
pub struct Shared<'a> {
    pub cache: &'a BuildCache,
    pub config: &'a BuildConfig,
    /// Paths whose input changed since the previous build.
    pub changed: &'a BTreeSet<String>,
    /// Feeds as computed so far in this build.
    pub feeds: &'a [Feed],
}

/// State shared by every plugin for the duration of one build.
pub struct BuildContext {
    pub posts: Vec<Post>,
    /// Discovered source files, relative to the content directory.
    pub files: Vec<PathBuf>,
    pub feeds: Vec<Feed>,
    config: BuildConfig,
    cache: BuildCache,
    pool: WorkerPool,
    warnings: Vec<BuildError>,
}

impl BuildContext {
    pub fn new(config: BuildConfig, cache: BuildCache) -> Self {
        let pool = WorkerPool::new(crate::config::effective_workers(&config.build));
        let warnings = cache
            .load_warning()
            .map(|w| BuildError::warning(w.to_string()))
            .into_iter()
            .collect();
        Self {
            posts: Vec::new(),
            files: Vec::new(),
            feeds: Vec::new(),
            config,
            cache,
            pool,
            warnings,
        }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn cache(&self) -> &BuildCache {
        &self.cache
    }

    /// Worker budget for parallel helpers.
    pub fn workers(&self) -> usize {
        self.pool.budget()
    }

    /// Replace the build's worker pool with one of `workers` threads.
    pub fn set_workers(&mut self, workers: usize) {
        self.pool = WorkerPool::new(workers.max(1));
    }

    /// The build's worker pool, shared by every parallel call.
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    // =========================================================================
    // Posts
    // =========================================================================

    pub fn post(&self, path: &str) -> Option<&Post> {
        self.posts.iter().find(|p| p.path() == path)
    }

    pub fn post_mut(&mut self, path: &str) -> Option<&mut Post> {
        self.posts.iter_mut().find(|p| p.path() == path)
    }

    /// Add a post, replacing any existing post with the same path.
    /// Returns the replaced post.
    pub fn insert_post(&mut self, post: Post) -> Option<Post> {
        match self.posts.iter_mut().find(|p| p.path() == post.path()) {
            Some(existing) => Some(std::mem::replace(existing, post)),
            None => {
                self.posts.push(post);
                None
            }
        }
    }

    /// Keep only posts matching `keep`.
    pub fn retain_posts<F>(&mut self, keep: F)
    where
        F: FnMut(&Post) -> bool,
    {
        self.posts.retain(keep);
    }

    /// Paths whose input hash differs from the previous build.
    ///
    /// Computed from the current posts on first call and reused for the
    /// rest of the build. Call it after posts are loaded and hashed.
    pub fn changed_paths(&self) -> Arc<BTreeSet<String>> {
        self.cache.changed_paths(
            self.posts
                .iter()
                .map(|p| (p.path(), p.input_hash.as_str())),
        )
    }

    /// Run `f` over every post in parallel with the build's worker budget.
    pub fn for_each_post<F>(&mut self, f: F) -> Result<(), BuildError>
    where
        F: Fn(&mut Post, &Shared<'_>) -> Result<(), BuildError> + Send + Sync,
    {
        let changed = self.changed_paths();
        let shared = Shared {
            cache: &self.cache,
            config: &self.config,
            changed: changed.as_ref(),
            feeds: &self.feeds,
        };
        self.pool.for_each_post(&mut self.posts, |post| f(post, &shared))
    }

    /// Membership hash covering every feed `path` belongs to.
    pub fn membership_of(&self, path: &str) -> String {
        membership_in(&self.feeds, path)
    }

    // =========================================================================
    // Warnings
    // =========================================================================

    /// Record a non-halting problem.
    pub fn warn(&mut self, err: BuildError) {
        warn!("{err}");
        self.warnings.push(err);
    }

    pub fn warnings(&self) -> &[BuildError] {
        &self.warnings
    }
}

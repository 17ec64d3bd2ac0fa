//! # Simple Press
//!
//! Build orchestration for a plugin-driven static site generator, with
//! incremental builds.
//!
//! A build is a fixed sequence of stages. Plugins register for the stages
//! they care about and run in priority order within each one; per-post work
//! inside a plugin fans out over a bounded worker pool. A persistent,
//! content-addressed cache lets the next build skip every post whose input,
//! dependencies and group membership are unchanged.
//!
//! ```text
//! configure → discover → load → transform → render → collect → write → cleanup
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`manager`] | Registers plugins and drives a build through every stage |
//! | [`plugin`] | The `Plugin` capability trait and closure-built plugins |
//! | [`stage`] | The seven stages and named priority bands |
//! | [`context`] | Shared build state handed to every plugin call |
//! | [`post`] | The unit of content flowing through the pipeline |
//! | [`cache`] | Persistent per-post hashes and cached artifacts |
//! | [`invalidation`] | Dependency- and membership-aware staleness on top of the cache |
//! | [`concurrency`] | Bounded parallel map over posts |
//! | [`error`] | Build errors carrying a critical/warning severity |
//! | [`hash`] | SHA-256 content fingerprints |
//! | [`config`] | `simple-press.toml` loading, merging and validation |
//! | [`plugins`] | Built-in plugins that make up a working site build |
//! | [`output`] | CLI report formatting |
//!
//! # Design Decisions
//!
//! ## Fail Closed
//!
//! An error nobody classified halts the build just like a critical one.
//! Only errors explicitly marked as warnings let the build continue, so an
//! unexpected failure never ships a half-built site.
//!
//! ## Over-Invalidate
//!
//! A false "fresh" serves stale pages; a false "stale" only costs time.
//! Every ambiguous cache answer, including an unreadable or disabled cache,
//! resolves to rebuild.
//!
//! ## Sequential Plugins, Parallel Posts
//!
//! Plugins within a stage run one after another because a plugin may
//! reshape the post collection for the next. Parallelism lives inside a
//! plugin's turn, over independent posts, and always finishes before the
//! next plugin starts.

pub mod cache;
pub mod concurrency;
pub mod config;
pub mod context;
pub mod error;
pub mod hash;
pub mod invalidation;
pub mod manager;
pub mod output;
pub mod plugin;
pub mod plugins;
pub mod post;
pub mod stage;

#[cfg(test)]
pub(crate) mod test_helpers;

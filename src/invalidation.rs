//! Dependency- and membership-aware staleness.
//!
//! [`BuildCache`] answers "did this post's own input change?". That is not
//! enough to trust a cached artifact. A post is only fresh when:
//!
//! 1. its own input hash and discriminator match the previous build,
//! 2. none of its declared [`dependencies`](crate::post::Post::dependencies)
//!    appear in the build's changed-path set, and every one of them names a
//!    post the cache knows about, and
//! 3. the membership hash of every group it renders is the one recorded
//!    when its cached output was written.
//!
//! A false "fresh" serves stale output; a false "stale" only costs time.
//! Every ambiguous case here resolves to stale.
//!
//! Dependencies are a plain reference set, not a graph: cycles are
//! harmless because the check is one set-membership test per dependency.

use crate::cache::{ArtifactKind, BuildCache};
use crate::hash;
use crate::post::Post;
use std::collections::BTreeSet;
use std::fmt;

/// Why a post must be rebuilt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    /// The post has no input hash.
    Unhashed,
    /// No entry, or the input hash or discriminator differs.
    InputChanged,
    /// A declared dependency changed since the previous build.
    DependencyChanged(String),
    /// A declared dependency matches no post, now or in the previous build.
    UnknownDependency(String),
    /// The group membership affecting this post's output differs.
    MembershipChanged,
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleReason::Unhashed => write!(f, "no input hash"),
            StaleReason::InputChanged => write!(f, "input changed"),
            StaleReason::DependencyChanged(dep) => write!(f, "dependency {dep} changed"),
            StaleReason::UnknownDependency(dep) => write!(f, "dependency {dep} matches no post"),
            StaleReason::MembershipChanged => write!(f, "membership changed"),
        }
    }
}

/// The first declared dependency of `post` that is in `changed`.
pub fn changed_dependency<'a>(post: &'a Post, changed: &BTreeSet<String>) -> Option<&'a str> {
    post.dependencies
        .iter()
        .map(String::as_str)
        .find(|dep| changed.contains(*dep))
}

/// Fingerprint of a group's composition.
///
/// Order-insensitive and duplicate-insensitive: the same members always
/// give the same hash.
pub fn membership_hash<'a, I>(members: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let sorted: BTreeSet<&str> = members.into_iter().collect();
    hash::hash_parts(sorted.into_iter().map(str::as_bytes))
}

/// True when `current` differs from the membership hash stored for `path`.
///
/// A post that belongs to no group should pass `membership_hash([])`
/// rather than skipping the check, so leaving every group still counts
/// as a change.
pub fn membership_changed(cache: &BuildCache, path: &str, current: &str) -> bool {
    if !cache.is_enabled() {
        return true;
    }
    cache.get_membership_hash(path).as_deref() != Some(current)
}

/// Full two-layer staleness check. `None` means the post is fresh.
///
/// `membership` is `None` for artifacts whose output does not depend on
/// any group; the membership layer is skipped for them.
pub fn stale_reason(
    cache: &BuildCache,
    post: &Post,
    discriminator: &str,
    changed: &BTreeSet<String>,
    membership: Option<&str>,
) -> Option<StaleReason> {
    if !post.has_input_hash() {
        return Some(StaleReason::Unhashed);
    }
    if cache.should_rebuild(post.path(), &post.input_hash, discriminator) {
        return Some(StaleReason::InputChanged);
    }
    if let Some(dep) = changed_dependency(post, changed) {
        return Some(StaleReason::DependencyChanged(dep.to_string()));
    }
    if let Some(dep) = post.dependencies.iter().find(|dep| !cache.is_known(dep)) {
        return Some(StaleReason::UnknownDependency(dep.clone()));
    }
    if let Some(current) = membership
        && membership_changed(cache, post.path(), current)
    {
        return Some(StaleReason::MembershipChanged);
    }
    None
}

/// Fingerprint a cached artifact is stored under.
pub fn artifact_fingerprint(post: &Post, discriminator: &str, membership: Option<&str>) -> String {
    let inputs = hash::hash_parts([
        post.input_hash.as_bytes(),
        membership.unwrap_or("").as_bytes(),
    ]);
    hash::hash_with_context(discriminator, inputs.as_bytes())
}

/// Outcome of [`cached_or_compute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Served from the cache without calling the producer.
    Hit(String),
    /// Produced fresh and written back to the cache.
    Built(String, StaleReason),
}

impl Lookup {
    pub fn into_payload(self) -> String {
        match self {
            Lookup::Hit(p) | Lookup::Built(p, _) => p,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, Lookup::Hit(_))
    }
}

/// Return the cached artifact for `post` if it is fresh, otherwise call
/// `produce` and store its result.
///
/// `produce` is not called on a hit. On failure nothing is written and the
/// previous artifact of this kind is dropped via
/// [`BuildCache::mark_failed`]; it was judged stale and must not be served
/// by a later build.
pub fn cached_or_compute<E, F>(
    cache: &BuildCache,
    kind: ArtifactKind,
    post: &Post,
    discriminator: &str,
    changed: &BTreeSet<String>,
    membership: Option<&str>,
    produce: F,
) -> Result<Lookup, E>
where
    F: FnOnce() -> Result<String, E>,
{
    let fingerprint = artifact_fingerprint(post, discriminator, membership);
    let reason = match stale_reason(cache, post, discriminator, changed, membership) {
        None => match cache.get_cached(kind, post.path(), &fingerprint) {
            Some(payload) => return Ok(Lookup::Hit(payload)),
            // Fresh by every check but the artifact itself is gone.
            None => StaleReason::InputChanged,
        },
        Some(reason) => {
            cache.count_miss();
            reason
        }
    };

    let payload = match produce() {
        Ok(payload) => payload,
        Err(e) => {
            cache.mark_failed(kind, post.path());
            return Err(e);
        }
    };
    cache.set_cached(kind, post.path(), &fingerprint, &payload);
    if let Some(m) = membership {
        cache.set_membership_hash(post.path(), m);
    }
    Ok(Lookup::Built(payload, reason))
}

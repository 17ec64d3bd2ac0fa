//! Bounded parallel helpers for per-post work.
//!
//! Plugins use these to spread independent per-post work over a worker
//! pool sized by the build's worker budget. Each call blocks until every
//! item has been attempted, so a plugin's turn always ends with the whole
//! batch finished and its errors collected.
//!
//! A [`WorkerPool`] starts its threads on first use and keeps them for
//! every later call; the build context owns one for the whole build. The
//! free functions build a throwaway pool per call. A call made from inside
//! a worker runs on the pool it is already on, so nesting never adds
//! threads.
//!
//! ## Semantics
//!
//! - **No ordering between items.** Workers pick items in any order.
//! - **No fail-fast.** A failing item does not stop the others. A caller
//!   wanting early exit checks its own shared flag inside the closure.
//! - **Partial mutation stays.** A post whose closure failed keeps
//!   whatever it wrote before failing.
//! - **Panics are errors.** A panicking closure becomes a critical
//!   [`BuildError`] for that item; the rest of the batch still runs.
//!
//! Errors come back in item order: the single error, or all of them joined.

use crate::error::BuildError;
use crate::post::Post;
use rayon::prelude::*;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::OnceLock;

/// Number of hardware threads, at least 1.
pub fn available_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Resolve a worker budget: `0` means "all available".
fn resolve_budget(budget: usize) -> usize {
    if budget == 0 {
        available_workers()
    } else {
        budget
    }
}

/// Bounded pool of worker threads, started lazily and reused.
pub struct WorkerPool {
    budget: usize,
    pool: OnceLock<rayon::ThreadPool>,
}

impl WorkerPool {
    /// A pool of up to `budget` threads (`0` = all cores).
    pub fn new(budget: usize) -> Self {
        Self {
            budget: resolve_budget(budget),
            pool: OnceLock::new(),
        }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    fn threads(&self) -> Result<&rayon::ThreadPool, BuildError> {
        if let Some(pool) = self.pool.get() {
            return Ok(pool);
        }
        let built = rayon::ThreadPoolBuilder::new()
            .num_threads(self.budget)
            .thread_name(|i| format!("simple-press-worker-{i}"))
            .build()
            .map_err(|e| BuildError::critical(format!("cannot start worker pool: {e}")))?;
        Ok(self.pool.get_or_init(|| built))
    }

    fn install<R, OP>(&self, op: OP) -> Result<R, BuildError>
    where
        R: Send,
        OP: FnOnce() -> R + Send,
    {
        if rayon::current_thread_index().is_some() {
            return Ok(op());
        }
        Ok(self.threads()?.install(op))
    }

    /// Apply `f` to every post. Returns once every post has been attempted.
    pub fn for_each_post<F>(&self, posts: &mut [Post], f: F) -> Result<(), BuildError>
    where
        F: Fn(&mut Post) -> Result<(), BuildError> + Send + Sync,
    {
        let errors: Vec<BuildError> = if self.budget == 1 || posts.len() <= 1 {
            posts
                .iter_mut()
                .filter_map(|post| guarded(|| f(post)).err())
                .collect()
        } else {
            self.install(|| {
                posts
                    .par_iter_mut()
                    .filter_map(|post| guarded(|| f(post)).err())
                    .collect()
            })?
        };
        match BuildError::join(errors) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Map `f` over `items`, preserving input order in the output.
    pub fn map_parallel<T, R, F>(&self, items: &[T], f: F) -> Result<Vec<Result<R, BuildError>>, BuildError>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> Result<R, BuildError> + Send + Sync,
    {
        if self.budget == 1 || items.len() <= 1 {
            return Ok(items.iter().map(|item| guarded(|| f(item))).collect());
        }
        self.install(|| {
            items
                .par_iter()
                .map(|item| guarded(|| f(item)))
                .collect()
        })
    }
}

fn guarded<T, F>(f: F) -> Result<T, BuildError>
where
    F: FnOnce() -> Result<T, BuildError>,
{
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| Err(BuildError::panicked(&*payload)))
}

/// Apply `f` to every post using up to `budget` workers (`0` = all cores).
///
/// Returns once every post has been attempted.
pub fn for_each_post<F>(posts: &mut [Post], budget: usize, f: F) -> Result<(), BuildError>
where
    F: Fn(&mut Post) -> Result<(), BuildError> + Send + Sync,
{
    WorkerPool::new(budget).for_each_post(posts, f)
}

/// Map `f` over `items` in parallel, preserving input order in the output.
///
/// Each item's result is returned as-is; nothing is short-circuited.
pub fn map_parallel<T, R, F>(items: &[T], budget: usize, f: F) -> Result<Vec<Result<R, BuildError>>, BuildError>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> Result<R, BuildError> + Send + Sync,
{
    WorkerPool::new(budget).map_parallel(items, f)
}

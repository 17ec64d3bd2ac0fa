//! Stage registry and build orchestrator.
//!
//! The [`Manager`] owns the registered plugins and the [`BuildContext`] and
//! drives one build:
//!
//! ```text
//! configure (every plugin, registration order)
//!   → discover → load → transform → render → collect → write → cleanup
//!   → finalize cache
//! ```
//!
//! Within a stage, participating plugins run one at a time in ascending
//! priority, ties broken by registration order. Intra-stage order is part
//! of the contract: a plugin may reshape the post collection for the ones
//! after it. Any parallelism happens inside a plugin's own turn and is
//! finished before the next plugin starts.
//!
//! ## Errors
//!
//! Every error returned from a plugin call, and every panic, is
//! [classified](crate::error::classify). Warnings are recorded and the
//! build goes on. Critical and unclassified errors abort the build at once:
//! the remaining plugins of the stage and all later stages are skipped,
//! and the cache is not written.
//!
//! ## Cache finalization
//!
//! After cleanup, every post is marked built from its current input hash
//! and the cache is saved. A post whose artifact failed to build this time
//! is not marked: its recorded input hash is cleared instead, so the next
//! build rebuilds it and everything depending on it. A failure to save is
//! downgraded to a warning; the next build simply runs colder.
//!
//! Declared dependencies that match no post are reported as warnings.
//! Posts declaring them are rebuilt on every run.

use crate::cache::{BuildCache, CacheStats};
use crate::config::BuildConfig;
use crate::context::BuildContext;
use crate::error::{BuildError, classify};
use crate::plugin::{self, Plugin, PluginRecord};
use crate::stage::Stage;
use std::collections::BTreeSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// One plugin invocation in a build report.
#[derive(Debug, Clone)]
pub struct PluginRun {
    pub plugin: String,
    pub priority: i32,
    pub elapsed: Duration,
}

/// Plugins invoked for one stage, in invocation order.
#[derive(Debug, Clone)]
pub struct StageReport {
    pub stage: Stage,
    pub runs: Vec<PluginRun>,
}

/// What happened during a build.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub stages: Vec<StageReport>,
    pub warnings: Vec<String>,
    pub cache: CacheStats,
    pub posts: usize,
    pub elapsed: Duration,
}

impl BuildReport {
    /// Plugin names invoked for `stage`, in order.
    pub fn invoked(&self, stage: Stage) -> Vec<&str> {
        self.stages
            .iter()
            .filter(|s| s.stage == stage)
            .flat_map(|s| s.runs.iter().map(|r| r.plugin.as_str()))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Ready,
    Running(Stage),
    Finished,
    Failed,
}

/// Owns plugins and build state; runs the stage sequence once.
pub struct Manager {
    plugins: Vec<PluginRecord>,
    ctx: BuildContext,
    state: RunState,
    report: BuildReport,
}

impl Manager {
    pub fn new(config: BuildConfig, cache: BuildCache) -> Self {
        Self {
            plugins: Vec::new(),
            ctx: BuildContext::new(config, cache),
            state: RunState::Ready,
            report: BuildReport::default(),
        }
    }

    /// Register `plugin` for every stage it declares.
    ///
    /// Registering the same kind of plugin twice runs it twice.
    pub fn register(&mut self, plugin: impl Plugin + 'static) -> &mut Self {
        self.register_boxed(Box::new(plugin))
    }

    pub fn register_boxed(&mut self, plugin: Box<dyn Plugin>) -> &mut Self {
        let order = self.plugins.len();
        debug!(plugin = plugin.name(), stages = ?plugin.stages(), "registered plugin");
        self.plugins.push(PluginRecord::new(plugin, order));
        self
    }

    pub fn context(&self) -> &BuildContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut BuildContext {
        &mut self.ctx
    }

    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    /// Stage currently executing, if any.
    pub fn current_stage(&self) -> Option<Stage> {
        match self.state {
            RunState::Running(stage) => Some(stage),
            _ => None,
        }
    }

    /// Indices of plugins participating in `stage`, in invocation order.
    fn schedule(&self, stage: Stage) -> Vec<(usize, i32)> {
        let mut scheduled: Vec<(usize, i32)> = self
            .plugins
            .iter()
            .enumerate()
            .filter(|(_, r)| r.participates_in(stage))
            .map(|(i, r)| (i, r.plugin.priority(stage)))
            .collect();
        // Stable: equal priorities keep registration order.
        scheduled.sort_by_key(|&(i, priority)| (priority, self.plugins[i].order));
        scheduled
    }

    /// Execute the whole build. Can be called once per manager.
    pub fn run(&mut self) -> Result<&BuildReport, BuildError> {
        if self.state != RunState::Ready {
            return Err(BuildError::critical("build already ran; create a new manager"));
        }
        let started = Instant::now();

        match self.run_stages() {
            Ok(()) => {
                self.report_dangling_dependencies();
                self.finalize_cache();
                self.state = RunState::Finished;
                self.fill_report(started);
                info!(elapsed = ?self.report.elapsed, "build complete");
                Ok(&self.report)
            }
            Err(err) => {
                self.state = RunState::Failed;
                self.fill_report(started);
                error!("{err}");
                Err(err)
            }
        }
    }

    fn run_stages(&mut self) -> Result<(), BuildError> {
        for record in &mut self.plugins {
            let name = record.plugin.name().to_string();
            let result = catch_unwind(AssertUnwindSafe(|| record.plugin.configure(&mut self.ctx)))
                .unwrap_or_else(|payload| Err(BuildError::panicked(&*payload)));
            if let Err(err) = result {
                Self::absorb(&mut self.ctx, err.in_plugin(&name, None))?;
            }
        }

        for stage in Stage::ALL {
            self.state = RunState::Running(stage);
            let scheduled = self.schedule(stage);
            info!(%stage, plugins = scheduled.len(), "stage start");
            let mut stage_report = StageReport {
                stage,
                runs: Vec::with_capacity(scheduled.len()),
            };

            for (index, priority) in scheduled {
                let record = &mut self.plugins[index];
                let name = record.plugin.name().to_string();
                debug!(%stage, plugin = %name, priority, "invoking plugin");
                let t0 = Instant::now();
                let result = catch_unwind(AssertUnwindSafe(|| {
                    plugin::dispatch(record.plugin.as_mut(), stage, &mut self.ctx)
                }))
                .unwrap_or_else(|payload| Err(BuildError::panicked(&*payload)));
                stage_report.runs.push(PluginRun {
                    plugin: name.clone(),
                    priority,
                    elapsed: t0.elapsed(),
                });

                if let Err(err) = result {
                    let absorbed = Self::absorb(&mut self.ctx, err.in_plugin(&name, Some(stage)));
                    if absorbed.is_err() {
                        self.report.stages.push(stage_report);
                        return absorbed;
                    }
                }
            }

            self.report.stages.push(stage_report);
        }
        Ok(())
    }

    /// Record a warning, or hand back an error that must halt the build.
    fn absorb(ctx: &mut BuildContext, err: BuildError) -> Result<(), BuildError> {
        if classify(&err).halts() {
            Err(err)
        } else {
            ctx.warn(err);
            Ok(())
        }
    }

    fn report_dangling_dependencies(&mut self) {
        let known: BTreeSet<&str> = self.ctx.posts.iter().map(|p| p.path()).collect();
        let mut dangling = Vec::new();
        for post in &self.ctx.posts {
            for dep in &post.dependencies {
                if !known.contains(dep.as_str()) {
                    dangling.push(BuildError::warning(format!(
                        "{}: dependency {dep} matches no post; it is rebuilt every time",
                        post.path()
                    )));
                }
            }
        }
        for err in dangling {
            self.ctx.warn(err);
        }
    }

    fn finalize_cache(&mut self) {
        let cache = self.ctx.cache();
        if !cache.is_enabled() {
            return;
        }
        let failed = cache.failed_paths();
        for post in &self.ctx.posts {
            if failed.contains(post.path()) {
                debug!(path = post.path(), "artifact failed, not marking built");
                cache.forget_input(post.path());
            } else if post.has_input_hash() {
                cache.mark_built(post.path(), &post.input_hash, &post.template);
            }
        }
        let live: BTreeSet<&str> = self.ctx.posts.iter().map(|p| p.path()).collect();
        cache.retain_paths(&live);
        if let Err(e) = cache.save() {
            warn!(error = %e, "could not persist build cache");
            self.ctx
                .warn(BuildError::warning(format!("could not persist build cache: {e}")));
        }
    }

    fn fill_report(&mut self, started: Instant) {
        self.report.warnings = self.ctx.warnings().iter().map(|w| w.to_string()).collect();
        self.report.cache = self.ctx.cache().stats();
        self.report.posts = self.ctx.posts.len();
        self.report.elapsed = started.elapsed();
    }
}

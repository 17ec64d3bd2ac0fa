//! Plugin capability set.
//!
//! A plugin participates in any subset of the stages. It declares which
//! through [`Plugin::stages`] and implements the matching hook methods;
//! every hook defaults to a no-op. The manager snapshots the declared set
//! at registration into a [`PluginRecord`], where absence is an explicit
//! `false`, and never calls a hook the plugin didn't declare.
//!
//! Two ways to write a plugin:
//!
//! - implement [`Plugin`] on a struct (the built-ins in [`crate::plugins`]
//!   do this), or
//! - assemble a [`FnPlugin`] from closures, one per stage.

use crate::context::BuildContext;
use crate::error::BuildError;
use crate::stage::{Priority, Stage};

/// A unit of work that plugs into one or more stages.
///
/// Plugins may hold per-run configuration, set in [`Plugin::configure`],
/// but nothing that must survive to the next build.
pub trait Plugin: Send {
    fn name(&self) -> &str;

    /// Stages this plugin participates in.
    fn stages(&self) -> &[Stage];

    /// Called once per build before the first stage, in registration order.
    fn configure(&mut self, _ctx: &mut BuildContext) -> Result<(), BuildError> {
        Ok(())
    }

    /// Position within `stage`; lower runs first.
    fn priority(&self, _stage: Stage) -> i32 {
        Priority::DEFAULT
    }

    fn discover(&mut self, _ctx: &mut BuildContext) -> Result<(), BuildError> {
        Ok(())
    }

    fn load(&mut self, _ctx: &mut BuildContext) -> Result<(), BuildError> {
        Ok(())
    }

    fn transform(&mut self, _ctx: &mut BuildContext) -> Result<(), BuildError> {
        Ok(())
    }

    fn render(&mut self, _ctx: &mut BuildContext) -> Result<(), BuildError> {
        Ok(())
    }

    fn collect(&mut self, _ctx: &mut BuildContext) -> Result<(), BuildError> {
        Ok(())
    }

    fn write(&mut self, _ctx: &mut BuildContext) -> Result<(), BuildError> {
        Ok(())
    }

    fn cleanup(&mut self, _ctx: &mut BuildContext) -> Result<(), BuildError> {
        Ok(())
    }
}

/// Invoke the hook of `plugin` for `stage`.
pub(crate) fn dispatch(
    plugin: &mut dyn Plugin,
    stage: Stage,
    ctx: &mut BuildContext,
) -> Result<(), BuildError> {
    match stage {
        Stage::Discover => plugin.discover(ctx),
        Stage::Load => plugin.load(ctx),
        Stage::Transform => plugin.transform(ctx),
        Stage::Render => plugin.render(ctx),
        Stage::Collect => plugin.collect(ctx),
        Stage::Write => plugin.write(ctx),
        Stage::Cleanup => plugin.cleanup(ctx),
    }
}

/// A registered plugin and the stages it was registered for.
pub struct PluginRecord {
    pub(crate) plugin: Box<dyn Plugin>,
    participates: [bool; Stage::ALL.len()],
    /// Registration sequence number; the tie-break for equal priorities.
    pub(crate) order: usize,
}

impl PluginRecord {
    pub(crate) fn new(plugin: Box<dyn Plugin>, order: usize) -> Self {
        let mut participates = [false; Stage::ALL.len()];
        for stage in plugin.stages() {
            participates[stage.index()] = true;
        }
        Self {
            plugin,
            participates,
            order,
        }
    }

    pub fn name(&self) -> &str {
        self.plugin.name()
    }

    pub fn participates_in(&self, stage: Stage) -> bool {
        self.participates[stage.index()]
    }
}

type Hook = Box<dyn FnMut(&mut BuildContext) -> Result<(), BuildError> + Send>;

struct StageHook {
    priority: i32,
    run: Hook,
}

/// A plugin assembled from per-stage closures.
///
/// ```
/// use simple_press::plugin::FnPlugin;
/// use simple_press::stage::{Priority, Stage};
///
/// let plugin = FnPlugin::new("shout").on(Stage::Transform, Priority::LATE, |ctx| {
///     for post in &mut ctx.posts {
///         post.content = post.content.to_uppercase();
///     }
///     Ok(())
/// });
/// ```
pub struct FnPlugin {
    name: String,
    stages: Vec<Stage>,
    hooks: [Option<StageHook>; Stage::ALL.len()],
    configure: Option<Hook>,
}

impl FnPlugin {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            hooks: Default::default(),
            configure: None,
        }
    }

    /// Attach `run` to `stage`, replacing any earlier hook for that stage.
    pub fn on<F>(mut self, stage: Stage, priority: i32, run: F) -> Self
    where
        F: FnMut(&mut BuildContext) -> Result<(), BuildError> + Send + 'static,
    {
        if !self.stages.contains(&stage) {
            self.stages.push(stage);
            self.stages.sort();
        }
        self.hooks[stage.index()] = Some(StageHook {
            priority,
            run: Box::new(run),
        });
        self
    }

    pub fn on_configure<F>(mut self, run: F) -> Self
    where
        F: FnMut(&mut BuildContext) -> Result<(), BuildError> + Send + 'static,
    {
        self.configure = Some(Box::new(run));
        self
    }

    fn call(&mut self, stage: Stage, ctx: &mut BuildContext) -> Result<(), BuildError> {
        match self.hooks[stage.index()].as_mut() {
            Some(hook) => (hook.run)(ctx),
            None => Ok(()),
        }
    }
}

impl Plugin for FnPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn stages(&self) -> &[Stage] {
        &self.stages
    }

    fn configure(&mut self, ctx: &mut BuildContext) -> Result<(), BuildError> {
        match self.configure.as_mut() {
            Some(run) => run(ctx),
            None => Ok(()),
        }
    }

    fn priority(&self, stage: Stage) -> i32 {
        self.hooks[stage.index()]
            .as_ref()
            .map(|h| h.priority)
            .unwrap_or(Priority::DEFAULT)
    }

    fn discover(&mut self, ctx: &mut BuildContext) -> Result<(), BuildError> {
        self.call(Stage::Discover, ctx)
    }

    fn load(&mut self, ctx: &mut BuildContext) -> Result<(), BuildError> {
        self.call(Stage::Load, ctx)
    }

    fn transform(&mut self, ctx: &mut BuildContext) -> Result<(), BuildError> {
        self.call(Stage::Transform, ctx)
    }

    fn render(&mut self, ctx: &mut BuildContext) -> Result<(), BuildError> {
        self.call(Stage::Render, ctx)
    }

    fn collect(&mut self, ctx: &mut BuildContext) -> Result<(), BuildError> {
        self.call(Stage::Collect, ctx)
    }

    fn write(&mut self, ctx: &mut BuildContext) -> Result<(), BuildError> {
        self.call(Stage::Write, ctx)
    }

    fn cleanup(&mut self, ctx: &mut BuildContext) -> Result<(), BuildError> {
        self.call(Stage::Cleanup, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::test_context;

    #[test]
    fn record_snapshots_declared_stages() {
        let plugin = FnPlugin::new("p")
            .on(Stage::Render, 0, |_| Ok(()))
            .on(Stage::Load, 0, |_| Ok(()));
        let record = PluginRecord::new(Box::new(plugin), 0);
        assert!(record.participates_in(Stage::Load));
        assert!(record.participates_in(Stage::Render));
        assert!(!record.participates_in(Stage::Write));
        assert_eq!(record.name(), "p");
    }

    #[test]
    fn fn_plugin_stages_sorted_and_deduplicated() {
        let plugin = FnPlugin::new("p")
            .on(Stage::Write, 0, |_| Ok(()))
            .on(Stage::Discover, 0, |_| Ok(()))
            .on(Stage::Write, 5, |_| Ok(()));
        assert_eq!(plugin.stages(), &[Stage::Discover, Stage::Write]);
        assert_eq!(plugin.priority(Stage::Write), 5);
    }

    #[test]
    fn fn_plugin_priority_defaults_for_absent_stage() {
        let plugin = FnPlugin::new("p").on(Stage::Render, Priority::LATE, |_| Ok(()));
        assert_eq!(plugin.priority(Stage::Render), Priority::LATE);
        assert_eq!(plugin.priority(Stage::Load), Priority::DEFAULT);
    }

    #[test]
    fn dispatch_routes_to_stage_hook() {
        let mut plugin = FnPlugin::new("p").on(Stage::Collect, 0, |ctx| {
            ctx.files.push("collected".into());
            Ok(())
        });
        let mut ctx = test_context();
        dispatch(&mut plugin, Stage::Render, &mut ctx).unwrap();
        assert!(ctx.files.is_empty());
        dispatch(&mut plugin, Stage::Collect, &mut ctx).unwrap();
        assert_eq!(ctx.files.len(), 1);
    }

    #[test]
    fn configure_hook_runs() {
        let mut plugin = FnPlugin::new("p").on_configure(|ctx| {
            ctx.set_workers(3);
            Ok(())
        });
        let mut ctx = test_context();
        plugin.configure(&mut ctx).unwrap();
        assert_eq!(ctx.workers(), 3);
    }
}

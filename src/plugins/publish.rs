//! Write the site to disk.
//!
//! Collects every rendered artifact (post documents, then feed indexes) and
//! writes it under `output_dir`. Two artifacts resolving to the same output
//! path are a warning, not a failure: the later one wins and the build goes
//! on. Every written path is recorded in the cache's output list so
//! [`CleanStale`](super::clean::CleanStale) can remove what a later build
//! no longer produces.
//!
//! Settings, under `[plugins.publish]`:
//!
//! ```toml
//! [plugins.publish]
//! skip_unchanged = true   # leave files whose bytes already match alone
//! ```

use crate::context::BuildContext;
use crate::error::BuildError;
use crate::plugin::Plugin;
use crate::stage::Stage;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublishOptions {
    pub skip_unchanged: bool,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            skip_unchanged: true,
        }
    }
}

#[derive(Default)]
pub struct Publish {
    options: PublishOptions,
}

struct Artifact<'a> {
    source: String,
    body: &'a str,
}

/// Write `body` to `path`, creating parents. Returns false when the file
/// already held exactly `body` and `skip_unchanged` is set.
fn write_file(path: &Path, body: &str, skip_unchanged: bool) -> std::io::Result<bool> {
    if skip_unchanged && std::fs::read(path).is_ok_and(|existing| existing == body.as_bytes()) {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, body)?;
    Ok(true)
}

impl Plugin for Publish {
    fn name(&self) -> &str {
        "publish"
    }

    fn stages(&self) -> &[Stage] {
        &[Stage::Write]
    }

    fn configure(&mut self, ctx: &mut BuildContext) -> Result<(), BuildError> {
        self.options = ctx
            .config()
            .plugin_config("publish")
            .map_err(|e| BuildError::critical(format!("plugins.publish: {e}")))?
            .unwrap_or_default();
        Ok(())
    }

    fn write(&mut self, ctx: &mut BuildContext) -> Result<(), BuildError> {
        let mut artifacts: BTreeMap<String, Artifact<'_>> = BTreeMap::new();
        let mut collisions = Vec::new();
        let candidates = ctx
            .posts
            .iter()
            .filter(|p| !p.output.is_empty())
            .map(|p| (p.output_path(), p.path().to_string(), p.output.as_str()))
            .chain(ctx.feeds.iter().filter(|f| !f.output.is_empty()).map(|f| {
                (f.output_path(), format!("feed {}", f.slug), f.output.as_str())
            }));
        for (rel, source, body) in candidates {
            let artifact = Artifact { source, body };
            if let Some(previous) = artifacts.insert(rel.clone(), artifact) {
                collisions.push(BuildError::warning(format!(
                    "output path collision at {rel}: {} overwritten by {}",
                    previous.source, artifacts[&rel].source
                )));
            }
        }

        let out_dir = &ctx.config().output_dir;
        let skip_unchanged = self.options.skip_unchanged;
        let entries: Vec<(&String, &str)> = artifacts.iter().map(|(rel, a)| (rel, a.body)).collect();
        let results = ctx.pool().map_parallel(&entries, |(rel, body)| {
            write_file(&out_dir.join(rel.as_str()), body, skip_unchanged).map_err(BuildError::from)
        })?;

        let mut written = 0;
        let mut unchanged = 0;
        let mut failures = Vec::new();
        for ((rel, _), result) in entries.iter().zip(results) {
            match result {
                Ok(did_write) => {
                    ctx.cache().record_output(rel);
                    if did_write {
                        written += 1;
                    } else {
                        unchanged += 1;
                    }
                }
                Err(e) => {
                    debug!(path = %rel, error = %e, "write failed");
                    failures.push(e);
                }
            }
        }
        info!(written, unchanged, dir = %out_dir.display(), "published");

        if let Some(err) = BuildError::join(failures) {
            return Err(err);
        }
        match BuildError::join(collisions) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::BuildCache;
    use crate::context::Feed;
    use crate::error::{Classification, classify};
    use crate::post::Post;
    use crate::test_helpers::rooted_config;
    use tempfile::TempDir;

    fn rendered(path: &str, output: &str) -> Post {
        let mut p = Post::from_source(path, "x");
        p.output = output.into();
        p
    }

    fn context(tmp: &TempDir) -> BuildContext {
        BuildContext::new(rooted_config(tmp.path()), BuildCache::in_memory())
    }

    #[test]
    fn writes_posts_and_feeds() {
        let tmp = TempDir::new().unwrap();
        let mut ctx = context(&tmp);
        ctx.insert_post(rendered("blog/hello.md", "<p>hello</p>"));
        ctx.feeds.push(Feed {
            slug: "blog".into(),
            output: "<p>index</p>".into(),
            ..Default::default()
        });
        Publish::default().write(&mut ctx).unwrap();
        let out = &ctx.config().output_dir;
        assert_eq!(
            std::fs::read_to_string(out.join("blog/hello/index.html")).unwrap(),
            "<p>hello</p>"
        );
        assert_eq!(
            std::fs::read_to_string(out.join("blog/index.html")).unwrap(),
            "<p>index</p>"
        );
        let recorded = ctx.cache().current_outputs();
        assert!(recorded.contains("blog/hello/index.html"));
        assert!(recorded.contains("blog/index.html"));
    }

    #[test]
    fn collision_is_a_warning_and_later_wins() {
        let tmp = TempDir::new().unwrap();
        let mut ctx = context(&tmp);
        ctx.insert_post(rendered("blog.md", "post"));
        ctx.feeds.push(Feed {
            slug: "blog".into(),
            output: "feed".into(),
            ..Default::default()
        });
        let err = Publish::default().write(&mut ctx).unwrap_err();
        assert_eq!(classify(&err), Classification::Warning);
        assert!(err.to_string().contains("blog/index.html"));
        let written = std::fs::read_to_string(ctx.config().output_dir.join("blog/index.html")).unwrap();
        assert_eq!(written, "feed");
    }

    #[test]
    fn unrendered_posts_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let mut ctx = context(&tmp);
        ctx.insert_post(Post::from_source("draft.md", "x"));
        Publish::default().write(&mut ctx).unwrap();
        assert!(!ctx.config().output_dir.join("draft/index.html").exists());
    }

    #[test]
    fn unchanged_files_are_not_rewritten() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("f.html");
        assert!(write_file(&path, "same", true).unwrap());
        assert!(!write_file(&path, "same", true).unwrap());
        assert!(write_file(&path, "same", false).unwrap());
        assert!(write_file(&path, "different", true).unwrap());
    }

    #[test]
    fn configure_reads_plugin_table() {
        let tmp = TempDir::new().unwrap();
        let mut config = rooted_config(tmp.path());
        config.plugins.insert(
            "publish".into(),
            toml::Value::Table(toml::from_str("skip_unchanged = false").unwrap()),
        );
        let mut ctx = BuildContext::new(config, BuildCache::in_memory());
        let mut plugin = Publish::default();
        plugin.configure(&mut ctx).unwrap();
        assert!(!plugin.options.skip_unchanged);
    }

    #[test]
    fn configure_rejects_unknown_keys() {
        let tmp = TempDir::new().unwrap();
        let mut config = rooted_config(tmp.path());
        config
            .plugins
            .insert("publish".into(), toml::Value::Table(toml::from_str("bogus = 1").unwrap()));
        let mut ctx = BuildContext::new(config, BuildCache::in_memory());
        assert!(Publish::default().configure(&mut ctx).is_err());
    }
}

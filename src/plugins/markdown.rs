//! Markdown rendering.
//!
//! Renders each post's `content` into `html` with pulldown-cmark. The
//! rendered fragment depends only on the post's own input, so it is cached
//! in the [`Rendered`](ArtifactKind::Rendered) namespace without a
//! membership check.

use crate::cache::ArtifactKind;
use crate::context::BuildContext;
use crate::error::BuildError;
use crate::invalidation::{Lookup, cached_or_compute};
use crate::plugin::Plugin;
use crate::stage::Stage;
use pulldown_cmark::{Options, Parser, html};
use tracing::debug;

pub struct Markdown;

/// Render markdown to an HTML fragment.
pub fn render_markdown(source: &str) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_SMART_PUNCTUATION;
    let parser = Parser::new_ext(source, options);
    let mut out = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

impl Plugin for Markdown {
    fn name(&self) -> &str {
        "markdown"
    }

    fn stages(&self) -> &[Stage] {
        &[Stage::Render]
    }

    fn render(&mut self, ctx: &mut BuildContext) -> Result<(), BuildError> {
        ctx.for_each_post(|post, shared| {
            let lookup = cached_or_compute(
                shared.cache,
                ArtifactKind::Rendered,
                post,
                &post.template,
                shared.changed,
                None,
                || Ok::<_, BuildError>(render_markdown(&post.content)),
            )?;
            if let Lookup::Built(_, reason) = &lookup {
                debug!(path = post.path(), %reason, "rendered markdown");
            }
            post.html = lookup.into_payload();
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post::Post;
    use crate::test_helpers::test_context;

    #[test]
    fn renders_common_markdown() {
        let html = render_markdown("# Title\n\nSome *emphasis* and a | b\n");
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<em>emphasis</em>"));
    }

    #[test]
    fn renders_tables() {
        let html = render_markdown("| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.contains("<table>"));
    }

    #[test]
    fn fills_html_for_every_post() {
        let mut ctx = test_context();
        ctx.insert_post(Post::from_source("a.md", "**a**"));
        ctx.insert_post(Post::from_source("b.md", "_b_"));
        Markdown.render(&mut ctx).unwrap();
        assert!(ctx.post("a.md").unwrap().html.contains("<strong>a</strong>"));
        assert!(ctx.post("b.md").unwrap().html.contains("<em>b</em>"));
    }

    #[test]
    fn warm_cache_skips_rendering() {
        let tmp = tempfile::TempDir::new().unwrap();
        let run = || {
            let cache = crate::cache::BuildCache::load(tmp.path());
            let mut ctx = BuildContext::new(crate::config::BuildConfig::default(), cache);
            ctx.insert_post(Post::from_source("a.md", "**a**"));
            Markdown.render(&mut ctx).unwrap();
            let cache = ctx.cache();
            cache.mark_built("a.md", &ctx.posts[0].input_hash, &ctx.posts[0].template);
            cache.save().unwrap();
            (cache.stats(), ctx.posts[0].html.clone())
        };
        let (cold, first) = run();
        let (warm, second) = run();
        assert_eq!(cold.misses, 1);
        assert_eq!(warm.hits, 1);
        assert_eq!(first, second);
    }
}

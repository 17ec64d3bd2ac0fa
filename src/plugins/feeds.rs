//! Feed assignment.
//!
//! Runs late in the transform stage, once every post has its final title
//! and tags, and builds `ctx.feeds` from the configured feed list. Each
//! post's combined membership hash is stored in its side-table under
//! `membership` so later plugins can report it.
//!
//! A feed's membership hash covers everything a page rendering that feed
//! shows: the feed's own title and, in display order, each member's path
//! and title. Renaming a post therefore invalidates every page whose
//! sidebar lists it.

use crate::context::{BuildContext, Feed, FeedMember};
use crate::error::BuildError;
use crate::hash;
use crate::plugin::Plugin;
use crate::post::Post;
use crate::stage::{Priority, Stage};
use tracing::debug;

pub struct Feeds;

/// Site-root link to a post's page.
pub fn href(post: &Post) -> String {
    let out = post.output_path();
    format!("/{}", out.strip_suffix("index.html").unwrap_or(&out))
}

fn feed_hash(slug: &str, title: &str, members: &[FeedMember]) -> String {
    let mut parts: Vec<&[u8]> = vec![slug.as_bytes(), title.as_bytes()];
    for m in members {
        parts.push(m.path.as_bytes());
        parts.push(m.title.as_bytes());
    }
    hash::hash_parts(parts)
}

/// Build feeds from config. Private posts are never listed.
pub fn assemble(ctx: &BuildContext) -> Vec<Feed> {
    ctx.config()
        .feeds
        .iter()
        .map(|cfg| {
            let filter = Feed {
                tag: cfg.tag.clone(),
                ..Default::default()
            };
            let members: Vec<FeedMember> = ctx
                .posts
                .iter()
                .filter(|p| !p.meta_bool("private") && filter.admits(p))
                .map(|p| FeedMember {
                    path: p.path().to_string(),
                    title: p.title(),
                    href: href(p),
                })
                .collect();
            Feed {
                membership_hash: feed_hash(&cfg.slug, &cfg.title, &members),
                slug: cfg.slug.clone(),
                title: cfg.title.clone(),
                tag: cfg.tag.clone(),
                members,
                output: String::new(),
            }
        })
        .collect()
}

impl Plugin for Feeds {
    fn name(&self) -> &str {
        "feeds"
    }

    fn stages(&self) -> &[Stage] {
        &[Stage::Transform]
    }

    fn priority(&self, _stage: Stage) -> i32 {
        Priority::LATE
    }

    fn transform(&mut self, ctx: &mut BuildContext) -> Result<(), BuildError> {
        ctx.feeds = assemble(ctx);
        for feed in &ctx.feeds {
            debug!(feed = %feed.slug, members = feed.members.len(), "assembled feed");
        }
        let hashes: Vec<String> = ctx.posts.iter().map(|p| ctx.membership_of(p.path())).collect();
        for (post, membership) in ctx.posts.iter_mut().zip(hashes) {
            post.set_meta("membership", membership);
        }
        Ok(())
    }
}

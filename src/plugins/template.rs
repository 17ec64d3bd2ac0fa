//! Page templates.
//!
//! Wraps each post's rendered fragment into a complete HTML document in
//! `output`. Two templates exist:
//!
//! | Template | Layout |
//! |----------|--------|
//! | `post`   | article plus a sidebar listing every feed the post is in |
//! | `page`   | article only |
//!
//! A `post` page shows other posts' titles, so its cached document is
//! checked against the post's feed membership hash as well as its own
//! input. A `page` document depends on nothing but the post itself.

use crate::cache::ArtifactKind;
use crate::context::{self, BuildContext, Feed};
use crate::error::BuildError;
use crate::invalidation::{Lookup, cached_or_compute};
use crate::plugin::Plugin;
use crate::post::Post;
use crate::stage::{Priority, Stage};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use tracing::debug;

const CSS: &str = "\
body{font-family:system-ui,sans-serif;margin:0 auto;max-width:60rem;padding:1rem;display:flex;gap:2rem}\
main{flex:1;min-width:0}\
aside{width:14rem}\
aside h2{font-size:1rem}\
.current{font-weight:bold}";

pub struct Template;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Post,
    Page,
}

impl Layout {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "post" => Some(Layout::Post),
            "page" => Some(Layout::Page),
            _ => None,
        }
    }
}

/// Shared HTML document shell.
pub(crate) fn base_document(title: &str, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                style { (PreEscaped(CSS)) }
            }
            body {
                (content)
            }
        }
    }
}

/// Sidebar block for one feed, marking `current`.
pub(crate) fn feed_nav(feed: &Feed, current: &str) -> Markup {
    html! {
        nav.feed {
            h2 { a href={ "/" (feed.slug) "/" } { (feed.title) } }
            ul {
                @for member in &feed.members {
                    li class=[(member.path == current).then_some("current")] {
                        a href=(member.href) { (member.title) }
                    }
                }
            }
        }
    }
}

fn render_page(post: &Post, layout: Layout, feeds: &[Feed]) -> String {
    let title = post.title();
    let article = html! {
        main {
            article {
                h1 { (title) }
                (PreEscaped(&post.html))
            }
        }
    };
    let body = match layout {
        Layout::Page => article,
        Layout::Post => html! {
            (article)
            aside {
                @for feed in feeds.iter().filter(|f| f.contains(post.path())) {
                    (feed_nav(feed, post.path()))
                }
            }
        },
    };
    base_document(&title, body).into_string()
}

impl Plugin for Template {
    fn name(&self) -> &str {
        "template"
    }

    fn stages(&self) -> &[Stage] {
        &[Stage::Render]
    }

    fn priority(&self, _stage: Stage) -> i32 {
        Priority::LATE
    }

    fn render(&mut self, ctx: &mut BuildContext) -> Result<(), BuildError> {
        ctx.for_each_post(|post, shared| {
            let layout = Layout::parse(&post.template).ok_or_else(|| {
                BuildError::critical(format!(
                    "{}: unknown template {:?}",
                    post.path(),
                    post.template
                ))
            })?;
            let membership = match layout {
                Layout::Post => Some(context::membership_in(shared.feeds, post.path())),
                Layout::Page => None,
            };
            let lookup = cached_or_compute(
                shared.cache,
                ArtifactKind::Full,
                post,
                &post.template,
                shared.changed,
                membership.as_deref(),
                || Ok::<_, BuildError>(render_page(post, layout, shared.feeds)),
            )?;
            if let Lookup::Built(_, reason) = &lookup {
                debug!(path = post.path(), %reason, "rendered page");
            }
            post.output = lookup.into_payload();
            Ok(())
        })
    }
}

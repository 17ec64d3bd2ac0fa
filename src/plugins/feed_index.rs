//! Feed index pages.
//!
//! Renders one listing page per feed into [`Feed::output`]. Index pages are
//! cheap and depend on the whole feed, so they are rebuilt every time.

use crate::context::{BuildContext, Feed};
use crate::error::BuildError;
use crate::plugin::Plugin;
use crate::plugins::template::base_document;
use crate::stage::Stage;
use maud::html;

pub struct FeedIndex;

pub fn render_index(feed: &Feed) -> String {
    let content = html! {
        main {
            h1 { (feed.title) }
            @if feed.members.is_empty() {
                p.empty { "Nothing here yet." }
            } @else {
                ul.feed-index {
                    @for member in &feed.members {
                        li { a href=(member.href) { (member.title) } }
                    }
                }
            }
        }
    };
    base_document(&feed.title, content).into_string()
}

impl Plugin for FeedIndex {
    fn name(&self) -> &str {
        "feed-index"
    }

    fn stages(&self) -> &[Stage] {
        &[Stage::Collect]
    }

    fn collect(&mut self, ctx: &mut BuildContext) -> Result<(), BuildError> {
        for feed in &mut ctx.feeds {
            feed.output = render_index(feed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::FeedMember;
    use crate::test_helpers::test_context;

    #[test]
    fn lists_members_in_order() {
        let feed = Feed {
            slug: "blog".into(),
            title: "Blog".into(),
            members: vec![
                FeedMember {
                    path: "b.md".into(),
                    title: "Second".into(),
                    href: "/b/".into(),
                },
                FeedMember {
                    path: "a.md".into(),
                    title: "First".into(),
                    href: "/a/".into(),
                },
            ],
            ..Default::default()
        };
        let out = render_index(&feed);
        let second = out.find("Second").unwrap();
        let first = out.find("First").unwrap();
        assert!(second < first);
        assert!(out.contains(r#"<a href="/a/">First</a>"#));
    }

    #[test]
    fn empty_feed_says_so() {
        let out = render_index(&Feed {
            title: "Empty".into(),
            ..Default::default()
        });
        assert!(out.contains("Nothing here yet."));
    }

    #[test]
    fn collect_fills_every_feed() {
        let mut ctx = test_context();
        ctx.feeds = vec![Feed::default(), Feed::default()];
        FeedIndex.collect(&mut ctx).unwrap();
        assert!(ctx.feeds.iter().all(|f| f.output.starts_with("<!DOCTYPE html>")));
    }
}

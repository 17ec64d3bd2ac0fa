//! Source loading and front matter.
//!
//! Reads every discovered file in parallel and turns it into a [`Post`].
//! A source may open with a TOML front-matter block fenced by `+++` lines:
//!
//! ```text
//! +++
//! title = "Hello"
//! tags = ["rust"]
//! template = "page"
//! private = false
//! dependencies = ["about.md"]
//! +++
//! Body in markdown.
//! ```
//!
//! Known keys land in typed post fields or the side-table; any other key is
//! copied into the side-table unchanged. Dependencies are paths relative to
//! the content directory and are normalised the way post paths are, so
//! `./about.md` and `about.md` name the same post. A file that cannot be read or whose
//! front matter does not parse is skipped with a warning; the rest of the
//! batch loads normally.

use crate::context::BuildContext;
use crate::error::BuildError;
use crate::plugin::Plugin;
use crate::post::Post;
use crate::stage::Stage;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Template used when front matter names none.
pub const DEFAULT_TEMPLATE: &str = "post";

const FENCE: &str = "+++";

pub struct Load;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FrontMatter {
    title: Option<String>,
    tags: Vec<String>,
    template: Option<String>,
    private: bool,
    dependencies: Vec<String>,
    #[serde(flatten)]
    extra: toml::Table,
}

/// Split `raw` into its front-matter block (if any) and body.
///
/// The block must start on the first line. An opening fence without a
/// closing one is an error.
pub fn split_front_matter(raw: &str) -> Result<(Option<&str>, &str), String> {
    let Some(rest) = raw
        .strip_prefix(FENCE)
        .and_then(|r| r.strip_prefix("\r\n").or_else(|| r.strip_prefix('\n')))
    else {
        return Ok((None, raw));
    };
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == FENCE {
            let body = &rest[offset + line.len()..];
            return Ok((Some(&rest[..offset]), body));
        }
        offset += line.len();
    }
    Err("front matter is not closed by a +++ line".to_string())
}

/// Build a post from its source text.
pub fn parse_post(path: &str, raw: String) -> Result<Post, String> {
    let (front, body) = split_front_matter(&raw)?;
    let front: FrontMatter = match front {
        Some(text) => toml::from_str(text).map_err(|e| format!("invalid front matter: {e}"))?,
        None => FrontMatter::default(),
    };
    let body = body.to_string();

    let mut post = Post::new(path);
    post.content = body;
    post.raw = raw;
    post.template = front.template.unwrap_or_else(|| DEFAULT_TEMPLATE.to_string());
    post.dependencies = front
        .dependencies
        .iter()
        .map(|dep| normalize_dependency(dep))
        .filter(|dep| !dep.is_empty())
        .collect();
    for (key, value) in front.extra {
        let json = serde_json::to_value(value).map_err(|e| format!("front matter key {key}: {e}"))?;
        post.set_meta(key, json);
    }
    if let Some(title) = front.title {
        post.set_meta("title", title);
    }
    if !front.tags.is_empty() {
        post.set_meta("tags", front.tags);
    }
    if front.private {
        post.set_meta("private", true);
    }
    post.refresh_input_hash();
    Ok(post)
}

fn normalize(rel: &Path) -> String {
    rel.to_string_lossy().replace('\\', "/")
}

/// Forward slashes, no `.` or empty segments, `..` folded into its parent.
pub fn normalize_dependency(dep: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in dep.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

impl Plugin for Load {
    fn name(&self) -> &str {
        "load"
    }

    fn stages(&self) -> &[Stage] {
        &[Stage::Load]
    }

    fn load(&mut self, ctx: &mut BuildContext) -> Result<(), BuildError> {
        let root = ctx.config().content_dir.clone();
        let results = ctx.pool().map_parallel(&ctx.files, |rel| {
            let path = normalize(rel);
            let raw = std::fs::read_to_string(root.join(rel))
                .map_err(|e| BuildError::warning(format!("skipping {path}: {e}")))?;
            parse_post(&path, raw).map_err(|e| BuildError::warning(format!("skipping {path}: {e}")))
        })?;

        let mut loaded = 0;
        for result in results {
            match result {
                Ok(post) => {
                    debug!(path = post.path(), "loaded");
                    ctx.insert_post(post);
                    loaded += 1;
                }
                Err(err) => ctx.warn(err),
            }
        }
        info!(loaded, "loaded posts");
        Ok(())
    }
}

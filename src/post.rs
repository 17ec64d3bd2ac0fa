//! The unit of work flowing through the pipeline.
//!
//! A [`Post`] has an immutable identity (its path) and a bag of mutable
//! fields that plugins fill in stage by stage. The core attaches no meaning
//! to any field beyond `input_hash` and `dependencies`, which drive cache
//! invalidation.

use crate::hash;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One piece of content, identified by a stable path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Post {
    path: String,
    /// Source bytes as read from disk, front matter included.
    pub raw: String,
    /// Body after front matter is stripped, before rendering.
    pub content: String,
    /// Rendered HTML fragment.
    pub html: String,
    /// Final wrapped document.
    pub output: String,
    /// Template used to wrap `html` into `output`.
    pub template: String,
    /// Fingerprint of the source bytes and the config that shapes them.
    /// Empty means "never hashed" and always forces a rebuild.
    pub input_hash: String,
    /// Paths of other posts whose change invalidates this one.
    pub dependencies: Vec<String>,
    /// Plugin-specific derived data.
    pub meta: BTreeMap<String, serde_json::Value>,
}

impl Post {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Build a post from source text and hash it immediately.
    pub fn from_source(path: impl Into<String>, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let mut post = Self {
            path: path.into(),
            content: raw.clone(),
            raw,
            ..Default::default()
        };
        post.refresh_input_hash();
        post
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Recompute `input_hash` from the raw source and template name.
    ///
    /// Must be called whenever `raw` or `template` changes, before any cache
    /// lookup keyed on the hash.
    pub fn refresh_input_hash(&mut self) {
        self.input_hash = hash::hash_parts([
            self.raw.as_bytes(),
            self.template.as_bytes(),
        ]);
    }

    /// Replace the source text and rehash.
    pub fn set_raw(&mut self, raw: impl Into<String>) {
        self.raw = raw.into();
        self.refresh_input_hash();
    }

    pub fn has_input_hash(&self) -> bool {
        !self.input_hash.is_empty()
    }

    /// Title from the side-table, falling back to the file stem.
    pub fn title(&self) -> String {
        self.meta_str("title").map(str::to_string).unwrap_or_else(|| {
            let stem = self.path.rsplit('/').next().unwrap_or(&self.path);
            stem.strip_suffix(".md").unwrap_or(stem).to_string()
        })
    }

    pub fn tags(&self) -> Vec<String> {
        match self.meta.get("tags") {
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.meta.get(key).and_then(|v| v.as_str())
    }

    pub fn meta_bool(&self, key: &str) -> bool {
        self.meta.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    pub fn set_meta(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.meta.insert(key.into(), value.into());
    }

    /// Output path relative to the site root: `blog/hello.md` → `blog/hello/index.html`.
    pub fn output_path(&self) -> String {
        let stem = self.path.strip_suffix(".md").unwrap_or(&self.path);
        format!("{stem}/index.html")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_post_has_empty_hash() {
        let post = Post::new("a.md");
        assert!(!post.has_input_hash());
        assert_eq!(post.path(), "a.md");
    }

    #[test]
    fn from_source_hashes() {
        let post = Post::from_source("a.md", "hello");
        assert!(post.has_input_hash());
        assert_eq!(post.content, "hello");
    }

    #[test]
    fn set_raw_rehashes() {
        let mut post = Post::from_source("a.md", "v1");
        let before = post.input_hash.clone();
        post.set_raw("v2");
        assert_ne!(post.input_hash, before);
    }

    #[test]
    fn template_is_part_of_input_hash() {
        let mut post = Post::from_source("a.md", "same");
        let before = post.input_hash.clone();
        post.template = "wide".into();
        post.refresh_input_hash();
        assert_ne!(post.input_hash, before);
    }

    #[test]
    fn title_falls_back_to_stem() {
        let post = Post::new("blog/hello-world.md");
        assert_eq!(post.title(), "hello-world");
    }

    #[test]
    fn title_prefers_meta() {
        let mut post = Post::new("blog/x.md");
        post.set_meta("title", "Hello");
        assert_eq!(post.title(), "Hello");
    }

    #[test]
    fn tags_ignore_non_strings() {
        let mut post = Post::new("x.md");
        post.set_meta("tags", serde_json::json!(["rust", 3, "web"]));
        assert_eq!(post.tags(), vec!["rust", "web"]);
    }

    #[test]
    fn output_path_nests_index() {
        assert_eq!(Post::new("blog/hello.md").output_path(), "blog/hello/index.html");
    }

    #[test]
    fn meta_bool_defaults_false() {
        let post = Post::new("x.md");
        assert!(!post.meta_bool("private"));
    }
}

//! Source discovery.
//!
//! Walks `content_dir` for markdown files and fills `ctx.files` with their
//! paths relative to the content root, sorted. Hidden entries (names
//! starting with `.`) are skipped, directories included.

use crate::context::BuildContext;
use crate::error::BuildError;
use crate::plugin::Plugin;
use crate::stage::{Priority, Stage};
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::{DirEntry, WalkDir};

pub struct Discover;

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

fn is_markdown(path: &Path) -> bool {
    path.extension().is_some_and(|e| e.eq_ignore_ascii_case("md"))
}

/// Markdown files under `root`, relative to it, in sorted order.
pub fn find_sources(root: &Path) -> Result<Vec<PathBuf>, BuildError> {
    if !root.is_dir() {
        return Err(BuildError::critical(format!(
            "content directory not found: {}",
            root.display()
        )));
    }
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e));
    for entry in walker {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file() && is_markdown(entry.path()) {
            if let Ok(rel) = entry.path().strip_prefix(root) {
                files.push(rel.to_path_buf());
            }
        }
    }
    files.sort();
    Ok(files)
}

impl Plugin for Discover {
    fn name(&self) -> &str {
        "discover"
    }

    fn stages(&self) -> &[Stage] {
        &[Stage::Discover]
    }

    fn priority(&self, _stage: Stage) -> i32 {
        Priority::FIRST
    }

    fn discover(&mut self, ctx: &mut BuildContext) -> Result<(), BuildError> {
        let root = ctx.config().content_dir.clone();
        ctx.files = find_sources(&root)?;
        info!(count = ctx.files.len(), root = %root.display(), "discovered sources");
        Ok(())
    }
}

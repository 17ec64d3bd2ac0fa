//! CLI output formatting.
//!
//! # Build report
//!
//! ```text
//! discover
//!     discover (-1000) 1.2ms
//! load
//!     load 8.0ms
//! transform
//!     feeds (100) 0.1ms
//! render
//!     markdown 3.4ms
//!     template (100) 2.9ms
//! ...
//!
//! Warnings
//!     [publish/write] output path collision at blog/index.html: blog.md overwritten by feed blog
//!
//! Built 12 posts in 31.0ms
//! Cache: 9 cached, 3 rebuilt (12 total)
//! ```
//!
//! Stages with no plugins are omitted. Priorities are shown only when they
//! differ from the default band.
//!
//! # Architecture
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::manager::{BuildReport, PluginRun};
use crate::stage::Priority;
use std::time::Duration;

const INDENT: &str = "    ";

fn format_duration(d: Duration) -> String {
    let ms = d.as_secs_f64() * 1000.0;
    if ms >= 1000.0 {
        format!("{:.2}s", ms / 1000.0)
    } else {
        format!("{ms:.1}ms")
    }
}

fn run_line(run: &PluginRun) -> String {
    if run.priority == Priority::DEFAULT {
        format!("{INDENT}{} {}", run.plugin, format_duration(run.elapsed))
    } else {
        format!(
            "{INDENT}{} ({}) {}",
            run.plugin,
            run.priority,
            format_duration(run.elapsed)
        )
    }
}

/// Per-stage plugin runs, warnings, and a summary.
pub fn format_build_report(report: &BuildReport) -> Vec<String> {
    let mut lines = Vec::new();
    for stage in report.stages.iter().filter(|s| !s.runs.is_empty()) {
        lines.push(stage.stage.to_string());
        lines.extend(stage.runs.iter().map(run_line));
    }

    if !report.warnings.is_empty() {
        lines.push(String::new());
        lines.push("Warnings".to_string());
        for warning in &report.warnings {
            for (i, part) in warning.lines().enumerate() {
                let pad = if i == 0 { "" } else { INDENT };
                lines.push(format!("{INDENT}{pad}{}", part.trim_start()));
            }
        }
    }

    lines.push(String::new());
    let noun = if report.posts == 1 { "post" } else { "posts" };
    lines.push(format!(
        "Built {} {noun} in {}",
        report.posts,
        format_duration(report.elapsed)
    ));
    lines.push(format!("Cache: {}", report.cache));
    lines
}

pub fn print_build_report(report: &BuildReport) {
    for line in format_build_report(report) {
        println!("{}", line);
    }
}

/// Summary for `check`: what was found, and every warning.
pub fn format_check_report(report: &BuildReport) -> Vec<String> {
    let mut lines = vec![format!("Checked {} posts", report.posts)];
    if report.warnings.is_empty() {
        lines.push("No problems found".to_string());
    } else {
        lines.push(format!("Warnings ({}):", report.warnings.len()));
        lines.extend(report.warnings.iter().map(|w| format!("{INDENT}{w}")));
    }
    lines
}

pub fn print_check_report(report: &BuildReport) {
    for line in format_check_report(report) {
        println!("{}", line);
    }
}

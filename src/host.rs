//! The surface a host CSS pipeline exposes to the engine.

use crate::css::{find_matching_brace, is_top_level_position};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub const DEFAULT_INSERTION_POINT: &str = "utilities-gen";

/// A document the engine can splice generated CSS into.
pub trait HostDocument {
    /// Replaces the children of the insertion point called `name` with
    /// `css`. Returns `false` when the document has no such insertion point.
    fn replace_insertion_point(&mut self, name: &str, css: &str) -> bool;
}

/// Receives every file the build read, so the host can rebuild when one of
/// them changes.
pub trait DependencySink {
    fn add_dependency(&mut self, path: &Path);
}

impl DependencySink for BTreeSet<PathBuf> {
    fn add_dependency(&mut self, path: &Path) {
        self.insert(path.to_path_buf());
    }
}

impl DependencySink for Vec<PathBuf> {
    fn add_dependency(&mut self, path: &Path) {
        if !self.iter().any(|existing| existing == path) {
            self.push(path.to_path_buf());
        }
    }
}

/// A stylesheet held as text. Its insertion point is a top-level
/// `@layer <name> { ... }` block, or the statement form `@layer <name>;`
/// which is expanded into a block on replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stylesheet {
    css: String,
}

impl Stylesheet {
    pub fn new(css: impl Into<String>) -> Self {
        Self { css: css.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.css
    }

    pub fn into_string(self) -> String {
        self.css
    }

    pub fn has_insertion_point(&self, name: &str) -> bool {
        find_insertion_point(&self.css, name).is_some()
    }
}

impl HostDocument for Stylesheet {
    fn replace_insertion_point(&mut self, name: &str, css: &str) -> bool {
        let Some(point) = find_insertion_point(&self.css, name) else {
            return false;
        };
        let block = render_layer_block(name, css);
        self.css.replace_range(point.start..point.end, &block);
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InsertionPoint {
    start: usize,
    end: usize,
}

fn find_insertion_point(css: &str, name: &str) -> Option<InsertionPoint> {
    let mut cursor = 0usize;

    while let Some(rel_start) = css[cursor..].find("@layer") {
        let start = cursor + rel_start;
        cursor = start + "@layer".len();
        if !is_top_level_position(css, start) {
            continue;
        }
        let rest = &css[cursor..];
        let prelude_len = rest.find(['{', ';']).unwrap_or(rest.len());
        if rest[..prelude_len].trim() != name {
            continue;
        }
        let delimiter_idx = cursor + prelude_len;
        match css[delimiter_idx..].chars().next() {
            Some(';') => {
                return Some(InsertionPoint {
                    start,
                    end: delimiter_idx + 1,
                });
            }
            Some('{') => {
                let close_idx = find_matching_brace(css, delimiter_idx)?;
                return Some(InsertionPoint {
                    start,
                    end: close_idx + 1,
                });
            }
            _ => return None,
        }
    }

    None
}

fn render_layer_block(name: &str, css: &str) -> String {
    if css.trim().is_empty() {
        return format!("@layer {} {{\n}}", name);
    }
    let body = css
        .lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("  {}", line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("@layer {} {{\n{}\n}}", name, body)
}

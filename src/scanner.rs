use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const MAX_CLASS_LENGTH: usize = 100;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid glob pattern '{pattern}': {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: globset::Error,
    },
    #[error("failed to build glob set: {0}")]
    GlobSet(#[source] globset::Error),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Attribute and call names whose string literals are scanned for classes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matchers {
    #[serde(default = "default_attributes")]
    pub attributes: Vec<String>,
    #[serde(default = "default_functions")]
    pub functions: Vec<String>,
}

impl Default for Matchers {
    fn default() -> Self {
        Self {
            attributes: default_attributes(),
            functions: default_functions(),
        }
    }
}

fn default_attributes() -> Vec<String> {
    ["class", "className", "class:list", ":class", "v-bind:class"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_functions() -> Vec<String> {
    ["clsx", "classnames", "cn", "cva", "tw"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanGlobOptions {
    pub base_path: PathBuf,
    pub respect_gitignore: bool,
    pub include_node_modules: bool,
    pub include_binary_files: bool,
    pub include_css_files: bool,
    pub include_lock_files: bool,
}

impl Default for ScanGlobOptions {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("."),
            respect_gitignore: true,
            include_node_modules: false,
            include_binary_files: false,
            include_css_files: false,
            include_lock_files: false,
        }
    }
}

/// Compiled content and ignore globs.
#[derive(Debug, Clone)]
pub struct ContentGlobs {
    include: GlobSet,
    exclude: GlobSet,
}

impl ContentGlobs {
    pub fn new(patterns: &[String], ignore_patterns: &[String]) -> Result<Self, ScanError> {
        Ok(Self {
            include: build_globset(patterns)?,
            exclude: build_globset(ignore_patterns)?,
        })
    }

    pub fn is_match(&self, path: &Path, base_path: &Path) -> bool {
        let relative_path = path.strip_prefix(base_path).unwrap_or(path);
        if !self.include.is_match(relative_path) && !self.include.is_match(path) {
            return false;
        }
        !self.is_ignored(path, base_path)
    }

    pub fn is_ignored(&self, path: &Path, base_path: &Path) -> bool {
        let relative_path = path.strip_prefix(base_path).unwrap_or(path);
        self.exclude.is_match(relative_path) || self.exclude.is_match(path)
    }
}

/// Walks `options.base_path` and returns the files matching `globs`, sorted.
pub fn collect_content_files(globs: &ContentGlobs, options: &ScanGlobOptions) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    let mut seen = HashSet::new();

    let mut builder = WalkBuilder::new(&options.base_path);
    builder
        .hidden(false)
        .git_ignore(options.respect_gitignore)
        .git_global(options.respect_gitignore)
        .git_exclude(options.respect_gitignore)
        .require_git(false);
    let walker = builder.build();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::debug!(error = %err, "skipping unreadable walk entry");
                continue;
            }
        };
        if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }
        let path = entry.path();
        if !globs.is_match(path, &options.base_path) {
            continue;
        }
        if should_skip_file(path, options) {
            continue;
        }
        if seen.insert(path.to_path_buf()) {
            paths.push(path.to_path_buf());
        }
    }

    paths.sort();
    paths
}

/// Reads `path` and extracts its classes. Invalid UTF-8 is replaced rather
/// than rejected, so one stray byte never hides the rest of the file.
pub fn scan_file(path: &Path, matchers: &Matchers) -> Result<BTreeSet<String>, ScanError> {
    let bytes = fs::read(path).map_err(|source| ScanError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(extract_classes(&text, matchers))
}

/// Returns the class-like tokens found in string literals that follow any
/// configured attribute or call. Malformed input never fails; it just yields
/// fewer classes.
pub fn extract_classes(text: &str, matchers: &Matchers) -> BTreeSet<String> {
    let mut candidates = extract_attribute_literals(text, &matchers.attributes);
    candidates.extend(extract_call_literals(text, &matchers.functions));

    let mut classes = BTreeSet::new();
    for candidate in candidates {
        for token in candidate.split_whitespace() {
            if is_valid_class_name(token) {
                classes.insert(token.to_string());
            }
        }
    }
    classes
}

/// Heuristic filter for extracted candidates; rejects paths, URLs and
/// anything that looks like a nested expression.
pub fn is_valid_class_name(token: &str) -> bool {
    if token.is_empty() || token.chars().count() > MAX_CLASS_LENGTH {
        return false;
    }
    if token.contains("://") || token.contains('\\') || token.starts_with('/') {
        return false;
    }
    if token.contains(['[', '(', '{']) {
        return false;
    }
    token
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | ':' | '.'))
}

fn extract_attribute_literals(text: &str, attributes: &[String]) -> Vec<String> {
    let mut out = Vec::new();

    for attr in attributes.iter().filter(|attr| !attr.is_empty()) {
        for (idx, _) in text.match_indices(attr.as_str()) {
            if !is_attr_boundary(text, idx, attr.len()) {
                continue;
            }
            let mut pos = idx + attr.len();
            pos = skip_whitespace(text, pos);
            if !text[pos..].starts_with('=') {
                continue;
            }
            pos += 1;
            pos = skip_whitespace(text, pos);
            let Some((ch, size)) = next_char(text, pos) else {
                continue;
            };
            match ch {
                '"' | '\'' => {
                    let (value, _) = parse_string_literal(text, pos + size, ch);
                    out.push(value);
                }
                '`' => {
                    let (values, _) = parse_template_literal(text, pos + size);
                    out.extend(values);
                }
                '{' => {
                    let (body, _) = extract_delimited(text, pos, '{', '}');
                    out.extend(extract_string_literals(body));
                }
                _ => {}
            }
        }
    }

    out
}

fn extract_call_literals(text: &str, functions: &[String]) -> Vec<String> {
    let mut out = Vec::new();

    for function in functions.iter().filter(|function| !function.is_empty()) {
        for (idx, _) in text.match_indices(function.as_str()) {
            if !is_identifier_boundary(text, idx, function.len()) {
                continue;
            }
            let pos = skip_whitespace(text, idx + function.len());
            if !text[pos..].starts_with('(') {
                continue;
            }
            let (args, _) = extract_delimited(text, pos, '(', ')');
            out.extend(extract_string_literals(args));
        }
    }

    out
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, ScanError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| ScanError::InvalidGlob {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(ScanError::GlobSet)
}

fn should_skip_file(path: &Path, options: &ScanGlobOptions) -> bool {
    if !options.include_node_modules
        && path
            .components()
            .any(|component| component.as_os_str() == "node_modules")
    {
        return true;
    }

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("");
    if !options.include_lock_files && is_common_lock_file(file_name) {
        return true;
    }

    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase());
    if let Some(ext) = ext.as_deref() {
        if !options.include_css_files && is_css_extension(ext) {
            return true;
        }
        if !options.include_binary_files && is_binary_extension(ext) {
            return true;
        }
    }

    false
}

fn is_css_extension(ext: &str) -> bool {
    matches!(ext, "css" | "scss" | "sass" | "less" | "styl" | "pcss")
}

fn is_binary_extension(ext: &str) -> bool {
    matches!(
        ext,
        "png"
            | "jpg"
            | "jpeg"
            | "gif"
            | "webp"
            | "ico"
            | "avif"
            | "mp4"
            | "webm"
            | "mp3"
            | "wav"
            | "zip"
            | "gz"
            | "pdf"
            | "woff"
            | "woff2"
            | "ttf"
            | "otf"
    )
}

fn is_common_lock_file(file_name: &str) -> bool {
    matches!(
        file_name,
        "package-lock.json" | "pnpm-lock.yaml" | "yarn.lock" | "bun.lockb" | "Cargo.lock"
    )
}

fn is_attr_boundary(text: &str, idx: usize, len: usize) -> bool {
    let prev = text[..idx].chars().last();
    let next = text[idx + len..].chars().next();

    let prev_ok = prev.is_none_or(is_boundary_char);
    let next_ok = next.is_none_or(|c| is_boundary_char(c) || c == '=');

    prev_ok && next_ok
}

fn is_identifier_boundary(text: &str, idx: usize, len: usize) -> bool {
    let prev = text[..idx].chars().last();
    let next = text[idx + len..].chars().next();

    let prev_ok = prev.is_none_or(|c| !is_identifier_char(c) && c != '.');
    let next_ok = next.is_none_or(|c| !is_identifier_char(c));

    prev_ok && next_ok
}

fn is_boundary_char(c: char) -> bool {
    !(c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == ':')
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn skip_whitespace(text: &str, mut idx: usize) -> usize {
    while let Some((ch, size)) = next_char(text, idx) {
        if !ch.is_whitespace() {
            break;
        }
        idx += size;
    }
    idx
}

/// Returns the text between the delimiter at `idx` and its match, skipping
/// delimiters inside string literals. Unbalanced input runs to the end.
fn extract_delimited(text: &str, idx: usize, open: char, close: char) -> (&str, usize) {
    let mut depth: usize = 0;
    let mut pos = idx;
    let mut start = None;

    while let Some((ch, size)) = next_char(text, pos) {
        match ch {
            c if c == open => {
                depth += 1;
                if depth == 1 {
                    start = Some(pos + size);
                }
                pos += size;
            }
            c if c == close => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    let begin = start.unwrap_or(pos);
                    return (&text[begin..pos], pos + size);
                }
                pos += size;
            }
            '"' | '\'' => {
                let (_, new_pos) = parse_string_literal(text, pos + size, ch);
                pos = new_pos;
            }
            '`' => {
                let (_, new_pos) = parse_template_literal(text, pos + size);
                pos = new_pos;
            }
            _ => pos += size,
        }
    }

    let begin = start.unwrap_or(text.len());
    (&text[begin..], text.len())
}

fn extract_string_literals(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut idx = 0;
    while let Some((ch, size)) = next_char(text, idx) {
        match ch {
            '"' | '\'' => {
                let (value, new_idx) = parse_string_literal(text, idx + size, ch);
                if !value.is_empty() {
                    out.push(value);
                }
                idx = new_idx;
            }
            '`' => {
                let (values, new_idx) = parse_template_literal(text, idx + size);
                out.extend(values);
                idx = new_idx;
            }
            _ => idx += size,
        }
    }
    out
}

fn parse_string_literal(text: &str, mut idx: usize, quote: char) -> (String, usize) {
    let mut value = String::new();
    while let Some((ch, size)) = next_char(text, idx) {
        if ch == '\\' {
            let next_idx = idx + size;
            if let Some((next, next_size)) = next_char(text, next_idx) {
                value.push('\\');
                value.push(next);
                idx = next_idx + next_size;
                continue;
            }
            idx = next_idx;
            break;
        }
        idx += size;
        if ch == quote {
            break;
        }
        value.push(ch);
    }
    (value, idx)
}

fn parse_template_literal(text: &str, mut idx: usize) -> (Vec<String>, usize) {
    let mut values = Vec::new();
    let mut current = String::new();

    while let Some((ch, size)) = next_char(text, idx) {
        if ch == '`' {
            idx += size;
            break;
        }
        if ch == '\\' {
            let next_idx = idx + size;
            if let Some((next, next_size)) = next_char(text, next_idx) {
                current.push('\\');
                current.push(next);
                idx = next_idx + next_size;
                continue;
            }
            idx = next_idx;
            break;
        }
        if ch == '$' && text[idx + size..].starts_with('{') {
            if !current.is_empty() {
                values.push(std::mem::take(&mut current));
            }
            idx = skip_braced_expression(text, idx + size + 1);
            continue;
        }
        current.push(ch);
        idx += size;
    }

    if !current.is_empty() {
        values.push(current);
    }
    (values, idx)
}

fn skip_braced_expression(text: &str, mut idx: usize) -> usize {
    let mut depth = 1;
    while depth > 0 {
        let Some((ch, size)) = next_char(text, idx) else {
            break;
        };
        if ch == '{' {
            depth += 1;
        } else if ch == '}' {
            depth -= 1;
        }
        idx += size;
    }
    idx
}

fn next_char(text: &str, idx: usize) -> Option<(char, usize)> {
    text.get(idx..)?
        .chars()
        .next()
        .map(|ch| (ch, ch.len_utf8()))
}

use crate::css::{find_matching_brace, split_declarations, strip_comments};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub category: String,
    pub key: String,
    pub reference: String,
}

/// Parsed tokens grouped by category. Categories keep first-seen order and
/// tokens keep declaration order, which is the order utilities are
/// generated in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TokenSet {
    categories: Vec<String>,
    tokens: BTreeMap<String, Vec<Token>>,
}

impl TokenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a token. A key already present in the category keeps its
    /// original position; the reference is derived from the name, so a
    /// redeclaration cannot change it.
    pub fn insert(&mut self, category: &str, key: &str) -> bool {
        if !self.tokens.contains_key(category) {
            self.categories.push(category.to_string());
        }
        let entries = self.tokens.entry(category.to_string()).or_default();
        if entries.iter().any(|token| token.key == key) {
            return false;
        }
        entries.push(Token {
            category: category.to_string(),
            key: key.to_string(),
            reference: token_reference(category, key),
        });
        true
    }

    pub fn category(&self, category: &str) -> &[Token] {
        self.tokens
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn get(&self, category: &str, key: &str) -> Option<&Token> {
        self.category(category).iter().find(|token| token.key == key)
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tokens.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn token_reference(category: &str, key: &str) -> String {
    format!("var(--{}-{})", category, key)
}

/// Reads every top-level `:root` block and classifies its custom properties
/// against `categories`. The first category (in the given order) whose
/// `--{category}-` prefix matches wins; unknown categories are ignored.
pub fn parse_tokens(source: &str, categories: &[&str]) -> TokenSet {
    let mut set = TokenSet::new();
    let css = strip_comments(source);

    for body in extract_root_blocks(&css) {
        for (name, _value) in split_declarations(body) {
            let Some(raw) = name.strip_prefix("--") else {
                continue;
            };
            let Some((category, key)) = classify(raw, categories) else {
                tracing::trace!(property = name, "token category not registered");
                continue;
            };
            if !set.insert(category, key) {
                tracing::debug!(category, key, "token redeclared, keeping first position");
            }
        }
    }

    set
}

fn classify<'a>(name: &'a str, categories: &[&'a str]) -> Option<(&'a str, &'a str)> {
    for category in categories {
        let Some(key) = name
            .strip_prefix(category)
            .and_then(|rest| rest.strip_prefix('-'))
        else {
            continue;
        };
        if key.is_empty() {
            return None;
        }
        return Some((*category, key));
    }
    None
}

/// Bodies of top-level rules whose selector list includes `:root`, such as
/// `:root { ... }` or `:root, :host { ... }`. Rules nested in at-rules are
/// skipped. An unterminated block runs to the end of input.
fn extract_root_blocks(css: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut cursor = 0usize;

    while let Some(rel_idx) = css[cursor..].find(['{', '}', ';']) {
        let idx = cursor + rel_idx;
        if css.as_bytes()[idx] != b'{' {
            cursor = idx + 1;
            continue;
        }
        let prelude = &css[cursor..idx];
        let close_idx = find_matching_brace(css, idx);
        if is_root_selector(prelude) {
            match close_idx {
                Some(close_idx) => blocks.push(&css[idx + 1..close_idx]),
                None => blocks.push(&css[idx + 1..]),
            }
        }
        let Some(close_idx) = close_idx else {
            break;
        };
        cursor = close_idx + 1;
    }

    blocks
}

fn is_root_selector(prelude: &str) -> bool {
    prelude.split(',').any(|selector| selector.trim() == ":root")
}

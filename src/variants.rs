use crate::css::{find_matching_paren, strip_comments};
use crate::registry::VariantRule;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDeclaration {
    pub name: String,
    pub condition: String,
}

/// Reads `name (condition)` declarations, one per line or `;`-terminated.
/// `@custom-media --name (condition);` is accepted as well. Statements that
/// do not have that shape are skipped.
pub fn parse_media_source(source: &str) -> Vec<MediaDeclaration> {
    let css = strip_comments(source);
    split_statements(&css)
        .into_iter()
        .filter_map(|statement| {
            let parsed = parse_statement(statement);
            if parsed.is_none() && !statement.trim().is_empty() {
                tracing::debug!(statement = statement.trim(), "skipping media declaration");
            }
            parsed
        })
        .collect()
}

fn split_statements(css: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (idx, ch) in css.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ';' | '\n' if depth == 0 => {
                statements.push(&css[start..idx]);
                start = idx + ch.len_utf8();
            }
            _ => {}
        }
    }
    statements.push(&css[start..]);

    statements
}

fn parse_statement(statement: &str) -> Option<MediaDeclaration> {
    let mut rest = statement.trim();
    if let Some(stripped) = rest.strip_prefix("@custom-media") {
        rest = stripped.trim_start();
    }

    let name_end = rest
        .find(|ch: char| ch.is_whitespace() || ch == '(')
        .unwrap_or(rest.len());
    let name = rest[..name_end].trim_start_matches("--");
    if !is_variant_name(name) {
        return None;
    }

    let condition = rest[name_end..].trim();
    if !condition.starts_with('(') {
        return None;
    }
    find_matching_paren(condition, 0)?;

    Some(MediaDeclaration {
        name: name.to_string(),
        condition: condition.to_string(),
    })
}

/// Variant names become class prefixes, so they must be plain identifiers.
fn is_variant_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
}

/// Appends a media variant for every parsed declaration whose name is not
/// already registered. Registered variants are never replaced, and a name
/// repeated in the media source keeps its first declaration.
pub fn merge_media_variants(
    registered: &[VariantRule],
    declarations: Vec<MediaDeclaration>,
) -> Vec<VariantRule> {
    let mut variants = registered.to_vec();
    let mut names = registered
        .iter()
        .map(|variant| variant.name().to_string())
        .collect::<HashSet<_>>();

    for declaration in declarations {
        if !names.insert(declaration.name.clone()) {
            tracing::debug!(
                name = declaration.name.as_str(),
                "media variant already declared, keeping existing"
            );
            continue;
        }
        variants.push(VariantRule::Media {
            name: declaration.name,
            condition: Some(declaration.condition),
        });
    }

    variants
}

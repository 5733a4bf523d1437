use crate::css::escape_class_name;
use crate::registry::{Rules, VariantRule};
use crate::tokens::TokenSet;
use std::collections::HashMap;
use std::fmt;

/// One generated rule: a lookup key (`class` or `variant:class`) and the
/// complete CSS text for it, wrappers included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniverseEntry {
    pub lookup_key: String,
    pub css: String,
}

/// Every utility class the current rules, tokens and variants can produce.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Universe {
    entries: Vec<UniverseEntry>,
    index: HashMap<String, usize>,
    base_count: usize,
}

impl Universe {
    pub fn get(&self, lookup_key: &str) -> Option<&str> {
        self.index
            .get(lookup_key)
            .map(|idx| self.entries[*idx].css.as_str())
    }

    pub fn contains(&self, lookup_key: &str) -> bool {
        self.index.contains_key(lookup_key)
    }

    /// Entries in generation order.
    pub fn entries(&self) -> &[UniverseEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries produced before variant expansion.
    pub fn base_count(&self) -> usize {
        self.base_count
    }

    pub fn raw_text(&self) -> String {
        self.entries
            .iter()
            .map(|entry| entry.css.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The entries for the given lookup keys, in generation order. Keys the
    /// universe does not know are dropped.
    pub fn select<'a, I>(&self, lookup_keys: I) -> Vec<&UniverseEntry>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut positions = lookup_keys
            .into_iter()
            .filter_map(|key| self.index.get(key).copied())
            .collect::<Vec<_>>();
        positions.sort_unstable();
        positions.dedup();
        positions
            .into_iter()
            .map(|idx| &self.entries[idx])
            .collect()
    }

    fn push(&mut self, lookup_key: String, css: String) {
        // A repeated key keeps both raw entries; lookups resolve to the later one.
        self.index.insert(lookup_key.clone(), self.entries.len());
        self.entries.push(UniverseEntry { lookup_key, css });
    }
}

impl fmt::Display for Universe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw_text())
    }
}

struct BaseRule {
    class_name: String,
    body: String,
}

/// Expands static rules, token rules and variants into the full universe.
/// Output order: rule registration order, then token order, then variant
/// order. Pure; no I/O.
pub fn generate_universe(rules: &Rules, tokens: &TokenSet, variants: &[VariantRule]) -> Universe {
    let mut bases = Vec::<BaseRule>::new();

    for rule in &rules.static_rules {
        bases.push(BaseRule {
            class_name: rule.class_name.clone(),
            body: rule.css_body.clone(),
        });
    }

    for rule in &rules.token_rules {
        for token in tokens.category(&rule.category) {
            bases.push(BaseRule {
                class_name: format!("{}{}", rule.prefix, token.key),
                body: rule.builder.build(&token.key, &token.reference),
            });
        }
    }

    let mut universe = Universe {
        base_count: bases.len(),
        ..Universe::default()
    };
    for base in &bases {
        let css = format_rule(&format!(".{}", escape_class_name(&base.class_name)), &base.body);
        universe.push(base.class_name.clone(), css);
    }

    for base in &bases {
        for variant in variants {
            let Some(css) = expand_variant(variant, &base.class_name, &base.body) else {
                continue;
            };
            universe.push(format!("{}:{}", variant.name(), base.class_name), css);
        }
    }

    tracing::debug!(
        base = universe.base_count,
        total = universe.len(),
        variants = variants.len(),
        "generated utility universe"
    );
    universe
}

/// Builds the rule text for `variant:class_name`, or `None` when the variant
/// lacks the field its kind requires.
pub fn expand_variant(variant: &VariantRule, class_name: &str, body: &str) -> Option<String> {
    let selector = format!(
        ".{}",
        escape_class_name(&format!("{}:{}", variant.name(), class_name))
    );
    match variant {
        VariantRule::Pseudo { name } => Some(format_rule(&format!("{}:{}", selector, name), body)),
        VariantRule::Media { condition, .. } => {
            let condition = condition.as_deref().map(str::trim).filter(|c| !c.is_empty())?;
            Some(wrap_condition(condition, &format_rule(&selector, body)))
        }
        VariantRule::Ancestor {
            selector: ancestor, ..
        } => {
            let ancestor = ancestor.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
            Some(format_rule(&format!("{} {}", ancestor, selector), body))
        }
    }
}

fn format_rule(selector: &str, body: &str) -> String {
    format!("{} {{ {} }}", selector, body.trim())
}

fn wrap_condition(condition: &str, rule: &str) -> String {
    if condition.starts_with('@') {
        format!("{} {{ {} }}", condition, rule)
    } else {
        format!("@media {} {{ {} }}", condition, rule)
    }
}

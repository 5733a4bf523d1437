use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticRule {
    #[serde(rename = "class")]
    pub class_name: String,
    #[serde(rename = "css")]
    pub css_body: String,
}

impl StaticRule {
    pub fn new(class_name: &str, css_body: &str) -> Self {
        Self {
            class_name: class_name.to_string(),
            css_body: css_body.to_string(),
        }
    }
}

/// A pure `(key, reference) -> css body` function with a stable identity.
///
/// The id stands in for the function when the universe content hash is
/// computed, so two builders with the same id must behave identically.
#[derive(Clone)]
pub struct CustomBuilder {
    pub id: String,
    build: Arc<dyn Fn(&str, &str) -> String + Send + Sync>,
}

impl CustomBuilder {
    pub fn new<F>(id: &str, build: F) -> Self
    where
        F: Fn(&str, &str) -> String + Send + Sync + 'static,
    {
        Self {
            id: id.to_string(),
            build: Arc::new(build),
        }
    }
}

impl fmt::Debug for CustomBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomBuilder").field("id", &self.id).finish()
    }
}

impl PartialEq for CustomBuilder {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for CustomBuilder {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CssBuilder {
    /// `property: value;` for each property. Keys listed in `overrides`
    /// emit the literal override instead of the token reference.
    Declarations {
        properties: Vec<String>,
        overrides: BTreeMap<String, String>,
    },
    Custom(CustomBuilder),
}

impl CssBuilder {
    pub fn property(property: &str) -> Self {
        Self::properties(&[property])
    }

    pub fn properties(properties: &[&str]) -> Self {
        Self::Declarations {
            properties: properties.iter().map(|p| (*p).to_string()).collect(),
            overrides: BTreeMap::new(),
        }
    }

    pub fn with_override(self, key: &str, value: &str) -> Self {
        match self {
            Self::Declarations {
                properties,
                mut overrides,
            } => {
                overrides.insert(key.to_string(), value.to_string());
                Self::Declarations {
                    properties,
                    overrides,
                }
            }
            custom => custom,
        }
    }

    pub fn build(&self, key: &str, reference: &str) -> String {
        match self {
            Self::Declarations {
                properties,
                overrides,
            } => {
                let value = overrides
                    .get(key)
                    .map(String::as_str)
                    .unwrap_or(reference);
                properties
                    .iter()
                    .map(|property| format!("{}: {};", property, value))
                    .collect::<Vec<_>>()
                    .join(" ")
            }
            Self::Custom(custom) => (custom.build)(key, reference),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRule {
    pub category: String,
    pub prefix: String,
    pub builder: CssBuilder,
}

impl TokenRule {
    pub fn new(category: &str, prefix: &str, builder: CssBuilder) -> Self {
        Self {
            category: category.to_string(),
            prefix: prefix.to_string(),
            builder,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum VariantRule {
    Pseudo {
        name: String,
    },
    Media {
        name: String,
        #[serde(default)]
        condition: Option<String>,
    },
    Ancestor {
        name: String,
        #[serde(default)]
        selector: Option<String>,
    },
}

impl VariantRule {
    pub fn pseudo(name: &str) -> Self {
        Self::Pseudo {
            name: name.to_string(),
        }
    }

    pub fn media(name: &str, condition: &str) -> Self {
        Self::Media {
            name: name.to_string(),
            condition: Some(condition.to_string()),
        }
    }

    pub fn ancestor(name: &str, selector: &str) -> Self {
        Self::Ancestor {
            name: name.to_string(),
            selector: Some(selector.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Pseudo { name } | Self::Media { name, .. } | Self::Ancestor { name, .. } => name,
        }
    }
}

/// Token rule as written in a config file: data only, no closures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRuleSpec {
    pub category: String,
    pub prefix: String,
    pub properties: Vec<String>,
    #[serde(default)]
    pub overrides: BTreeMap<String, String>,
}

impl From<&TokenRuleSpec> for TokenRule {
    fn from(spec: &TokenRuleSpec) -> Self {
        TokenRule {
            category: spec.category.clone(),
            prefix: spec.prefix.clone(),
            builder: CssBuilder::Declarations {
                properties: spec.properties.clone(),
                overrides: spec.overrides.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleExtensions {
    #[serde(default = "default_use_defaults")]
    pub use_defaults: bool,
    /// Static class names, token rule prefixes, or variant names to drop.
    #[serde(default)]
    pub disable: Vec<String>,
    #[serde(default, rename = "static")]
    pub static_rules: Vec<StaticRule>,
    #[serde(default, rename = "token")]
    pub token_rules: Vec<TokenRuleSpec>,
    #[serde(default)]
    pub variants: Vec<VariantRule>,
}

impl Default for RuleExtensions {
    fn default() -> Self {
        Self {
            use_defaults: default_use_defaults(),
            disable: Vec::new(),
            static_rules: Vec::new(),
            token_rules: Vec::new(),
            variants: Vec::new(),
        }
    }
}

fn default_use_defaults() -> bool {
    true
}

/// The effective rule set a universe is generated from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Rules {
    pub static_rules: Vec<StaticRule>,
    pub token_rules: Vec<TokenRule>,
    pub variants: Vec<VariantRule>,
}

impl Rules {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn defaults() -> Self {
        Self {
            static_rules: default_static_rules(),
            token_rules: default_token_rules(),
            variants: default_variants(),
        }
    }

    pub fn resolve(extensions: &RuleExtensions) -> Self {
        let mut rules = if extensions.use_defaults {
            Self::defaults()
        } else {
            Self::empty()
        };

        for rule in &extensions.static_rules {
            rules.add_static(rule.clone());
        }
        for spec in &extensions.token_rules {
            rules.add_token(TokenRule::from(spec));
        }
        for variant in &extensions.variants {
            rules.add_variant(variant.clone());
        }
        rules.disable(&extensions.disable);
        rules
    }

    /// Adds a static rule, replacing any rule with the same class in place.
    pub fn add_static(&mut self, rule: StaticRule) {
        match self
            .static_rules
            .iter_mut()
            .find(|existing| existing.class_name == rule.class_name)
        {
            Some(existing) => *existing = rule,
            None => self.static_rules.push(rule),
        }
    }

    /// Adds a token rule, replacing any rule with the same prefix and category.
    pub fn add_token(&mut self, rule: TokenRule) {
        match self
            .token_rules
            .iter_mut()
            .find(|existing| existing.prefix == rule.prefix && existing.category == rule.category)
        {
            Some(existing) => *existing = rule,
            None => self.token_rules.push(rule),
        }
    }

    pub fn add_variant(&mut self, variant: VariantRule) {
        match self
            .variants
            .iter_mut()
            .find(|existing| existing.name() == variant.name())
        {
            Some(existing) => *existing = variant,
            None => self.variants.push(variant),
        }
    }

    pub fn disable(&mut self, names: &[String]) {
        if names.is_empty() {
            return;
        }
        let names = names.iter().map(String::as_str).collect::<HashSet<_>>();
        self.static_rules
            .retain(|rule| !names.contains(rule.class_name.as_str()));
        self.token_rules
            .retain(|rule| !names.contains(rule.prefix.as_str()));
        self.variants
            .retain(|variant| !names.contains(variant.name()));
    }

    /// Token categories referenced by the token rules, in registration order.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.token_rules
            .iter()
            .map(|rule| rule.category.as_str())
            .filter(|category| seen.insert(*category))
            .collect()
    }

    pub fn variant_names(&self) -> HashSet<&str> {
        self.variants.iter().map(VariantRule::name).collect()
    }
}

fn default_static_rules() -> Vec<StaticRule> {
    [
        ("block", "display: block;"),
        ("inline-block", "display: inline-block;"),
        ("inline", "display: inline;"),
        ("flex", "display: flex;"),
        ("inline-flex", "display: inline-flex;"),
        ("grid", "display: grid;"),
        ("hidden", "display: none;"),
        ("flex-row", "flex-direction: row;"),
        ("flex-col", "flex-direction: column;"),
        ("flex-wrap", "flex-wrap: wrap;"),
        ("flex-1", "flex: 1 1 0%;"),
        ("items-start", "align-items: flex-start;"),
        ("items-center", "align-items: center;"),
        ("items-end", "align-items: flex-end;"),
        ("justify-start", "justify-content: flex-start;"),
        ("justify-center", "justify-content: center;"),
        ("justify-end", "justify-content: flex-end;"),
        ("justify-between", "justify-content: space-between;"),
        ("static", "position: static;"),
        ("relative", "position: relative;"),
        ("absolute", "position: absolute;"),
        ("fixed", "position: fixed;"),
        ("sticky", "position: sticky;"),
        ("w-full", "width: 100%;"),
        ("h-full", "height: 100%;"),
        ("overflow-hidden", "overflow: hidden;"),
        ("overflow-auto", "overflow: auto;"),
        (
            "truncate",
            "overflow: hidden; text-overflow: ellipsis; white-space: nowrap;",
        ),
        ("text-left", "text-align: left;"),
        ("text-center", "text-align: center;"),
        ("text-right", "text-align: right;"),
        ("font-bold", "font-weight: 700;"),
        ("italic", "font-style: italic;"),
        ("underline", "text-decoration-line: underline;"),
        ("cursor-pointer", "cursor: pointer;"),
        ("pointer-events-none", "pointer-events: none;"),
        ("select-none", "user-select: none;"),
        (
            "sr-only",
            "position: absolute; width: 1px; height: 1px; padding: 0; margin: -1px; overflow: hidden; clip: rect(0, 0, 0, 0); white-space: nowrap; border-width: 0;",
        ),
    ]
    .into_iter()
    .map(|(class_name, css_body)| StaticRule::new(class_name, css_body))
    .collect()
}

fn default_token_rules() -> Vec<TokenRule> {
    vec![
        TokenRule::new("spacing", "p-", CssBuilder::property("padding")),
        TokenRule::new(
            "spacing",
            "px-",
            CssBuilder::properties(&["padding-left", "padding-right"]),
        ),
        TokenRule::new(
            "spacing",
            "py-",
            CssBuilder::properties(&["padding-top", "padding-bottom"]),
        ),
        TokenRule::new("spacing", "pt-", CssBuilder::property("padding-top")),
        TokenRule::new("spacing", "pr-", CssBuilder::property("padding-right")),
        TokenRule::new("spacing", "pb-", CssBuilder::property("padding-bottom")),
        TokenRule::new("spacing", "pl-", CssBuilder::property("padding-left")),
        TokenRule::new("spacing", "m-", CssBuilder::property("margin")),
        TokenRule::new(
            "spacing",
            "mx-",
            CssBuilder::properties(&["margin-left", "margin-right"]),
        ),
        TokenRule::new(
            "spacing",
            "my-",
            CssBuilder::properties(&["margin-top", "margin-bottom"]),
        ),
        TokenRule::new("spacing", "mt-", CssBuilder::property("margin-top")),
        TokenRule::new("spacing", "mr-", CssBuilder::property("margin-right")),
        TokenRule::new("spacing", "mb-", CssBuilder::property("margin-bottom")),
        TokenRule::new("spacing", "ml-", CssBuilder::property("margin-left")),
        TokenRule::new("spacing", "gap-", CssBuilder::property("gap")),
        TokenRule::new("color", "text-", CssBuilder::property("color")),
        TokenRule::new("color", "bg-", CssBuilder::property("background-color")),
        TokenRule::new("color", "border-", CssBuilder::property("border-color")),
        TokenRule::new(
            "radius",
            "rounded-",
            CssBuilder::property("border-radius")
                .with_override("none", "0")
                .with_override("full", "9999px"),
        ),
        TokenRule::new(
            "shadow",
            "shadow-",
            CssBuilder::property("box-shadow").with_override("none", "none"),
        ),
        TokenRule::new("text", "text-", CssBuilder::property("font-size")),
        TokenRule::new("font", "font-", CssBuilder::property("font-family")),
        TokenRule::new("leading", "leading-", CssBuilder::property("line-height")),
        TokenRule::new("opacity", "opacity-", CssBuilder::property("opacity")),
        TokenRule::new("z", "z-", CssBuilder::property("z-index")),
    ]
}

fn default_variants() -> Vec<VariantRule> {
    vec![
        VariantRule::pseudo("hover"),
        VariantRule::pseudo("focus"),
        VariantRule::pseudo("focus-visible"),
        VariantRule::pseudo("focus-within"),
        VariantRule::pseudo("active"),
        VariantRule::pseudo("disabled"),
        VariantRule::pseudo("checked"),
        VariantRule::media("sm", "(min-width: 40rem)"),
        VariantRule::media("md", "(min-width: 48rem)"),
        VariantRule::media("lg", "(min-width: 64rem)"),
        VariantRule::media("xl", "(min-width: 80rem)"),
        VariantRule::media("2xl", "(min-width: 96rem)"),
        VariantRule::media("motion-safe", "(prefers-reduced-motion: no-preference)"),
        VariantRule::media("motion-reduce", "(prefers-reduced-motion: reduce)"),
        VariantRule::media("print", "print"),
        VariantRule::ancestor("group-hover", ".group:hover"),
        VariantRule::ancestor("group-focus", ".group:focus-within"),
    ]
}

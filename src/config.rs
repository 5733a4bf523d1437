use crate::host::DEFAULT_INSERTION_POINT;
use crate::registry::RuleExtensions;
use crate::scanner::Matchers;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Stylesheet holding the `:root` token declarations.
    #[serde(default)]
    pub tokens: Option<PathBuf>,
    /// Optional `name (condition)` media declarations.
    #[serde(default)]
    pub media: Option<PathBuf>,
    /// Content globs, relative to `base`.
    #[serde(default)]
    pub content: Vec<String>,
    #[serde(default)]
    pub ignore: Vec<String>,
    #[serde(default = "default_base")]
    pub base: PathBuf,
    /// Where to write the full-universe reference file, if anywhere.
    #[serde(default)]
    pub reference: Option<PathBuf>,
    #[serde(default = "default_insertion_point")]
    pub insertion_point: String,
    #[serde(default)]
    pub matchers: Matchers,
    #[serde(default)]
    pub rules: RuleExtensions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tokens: None,
            media: None,
            content: Vec::new(),
            ignore: Vec::new(),
            base: default_base(),
            reference: None,
            insertion_point: default_insertion_point(),
            matchers: Matchers::default(),
            rules: RuleExtensions::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Loads a TOML config. Relative paths inside it are resolved against the
/// directory the config file lives in.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let dir = path.parent().unwrap_or(Path::new(""));
    Ok(config.relative_to(dir))
}

pub fn parse(text: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(text)
}

impl Config {
    fn relative_to(mut self, dir: &Path) -> Self {
        if dir.as_os_str().is_empty() {
            return self;
        }
        let resolve = |path: PathBuf| {
            if path.is_absolute() {
                path
            } else {
                dir.join(path)
            }
        };
        self.tokens = self.tokens.map(resolve);
        self.media = self.media.map(resolve);
        self.reference = self.reference.map(resolve);
        self.base = resolve(self.base);
        self
    }
}

fn default_base() -> PathBuf {
    PathBuf::from(".")
}

fn default_insertion_point() -> String {
    DEFAULT_INSERTION_POINT.to_string()
}

//! One build pass: tokens and rules to universe, content files to used
//! classes, and the intersection spliced into the host document.

use crate::cache::{BuildCache, UniverseCacheEntry, content_hash};
use crate::config::Config;
use crate::host::{DependencySink, HostDocument};
use crate::inject::{render_reference, render_used, write_if_changed};
use crate::registry::Rules;
use crate::scanner::{ContentGlobs, ScanError, ScanGlobOptions, collect_content_files, scan_file};
use crate::tokens::parse_tokens;
use crate::variants::{merge_media_variants, parse_media_source};
use crate::generator::generate_universe;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Scan(#[from] ScanError),
}

/// What a pass did. Counts refer to this pass only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub content_hash: String,
    pub universe_rebuilt: bool,
    pub universe_size: usize,
    pub files_scanned: usize,
    pub used_classes: usize,
    pub emitted: usize,
    pub injected: bool,
}

/// Classes found across every content file of one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Usage {
    pub classes: BTreeSet<String>,
    pub files: Vec<PathBuf>,
}

#[derive(Debug)]
pub struct Engine {
    config: Config,
    rules: Rules,
    rules_fingerprint: String,
    globs: ContentGlobs,
    cache: Arc<BuildCache>,
}

impl Engine {
    /// Resolves the rule set from the config's `[rules]` table.
    pub fn new(config: Config, cache: Arc<BuildCache>) -> Result<Self, EngineError> {
        let rules = Rules::resolve(&config.rules);
        Self::with_rules(config, rules, cache)
    }

    /// Uses `rules` as given; the config's `[rules]` table is ignored.
    pub fn with_rules(
        config: Config,
        rules: Rules,
        cache: Arc<BuildCache>,
    ) -> Result<Self, EngineError> {
        let globs = ContentGlobs::new(&config.content, &config.ignore)?;
        // Debug output of custom builders is their id, so this covers them.
        let rules_fingerprint = format!("{:?}", rules);
        Ok(Self {
            config,
            rules,
            rules_fingerprint,
            globs,
            cache,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    pub fn cache(&self) -> &Arc<BuildCache> {
        &self.cache
    }

    /// Returns the universe for the current token and media sources,
    /// regenerating it only when their content hash changed. The flag is
    /// `true` on regeneration.
    pub fn prepare_universe(
        &self,
        deps: &mut dyn DependencySink,
    ) -> (Arc<UniverseCacheEntry>, bool) {
        let token_source = read_source(self.config.tokens.as_deref(), "token", deps);
        let media_source = read_source(self.config.media.as_deref(), "media", deps);
        let hash = content_hash(
            &token_source,
            &media_source,
            &self.config.rules,
            &[&self.rules_fingerprint],
        );

        let (entry, rebuilt) = self.cache.universe.get_or_build(&hash, || {
            let categories = self.rules.categories();
            let tokens = parse_tokens(&token_source, &categories);
            let variants =
                merge_media_variants(&self.rules.variants, parse_media_source(&media_source));
            tracing::debug!(
                tokens = tokens.len(),
                variants = variants.len(),
                "regenerating utility universe"
            );
            generate_universe(&self.rules, &tokens, &variants)
        });

        if rebuilt {
            tracing::info!(
                hash = %&entry.content_hash[..12],
                size = entry.universe.len(),
                "utility universe generated"
            );
            self.write_reference(&entry.raw_text);
        } else {
            tracing::debug!("utility universe unchanged");
        }
        (entry, rebuilt)
    }

    fn write_reference(&self, raw_text: &str) {
        let Some(path) = self.config.reference.as_deref() else {
            return;
        };
        match write_if_changed(path, &render_reference(raw_text)) {
            Ok(true) => tracing::info!(path = %path.display(), "reference file written"),
            Ok(false) => tracing::debug!(path = %path.display(), "reference file unchanged"),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to write reference file")
            }
        }
    }

    /// Discovers content files and unions their class sets. Unchanged files
    /// are served from the file cache; unreadable files contribute nothing.
    pub fn collect_usage(&self, deps: &mut dyn DependencySink) -> Usage {
        let options = ScanGlobOptions {
            base_path: self.config.base.clone(),
            ..ScanGlobOptions::default()
        };
        let files = collect_content_files(&self.globs, &options);
        for file in &files {
            deps.add_dependency(file);
        }

        let matchers = &self.config.matchers;
        let sets = files
            .par_iter()
            .map(|path| {
                let modified = fs::metadata(path).and_then(|meta| meta.modified()).ok();
                match self
                    .cache
                    .files
                    .classes_for(path, modified, || scan_file(path, matchers))
                {
                    Ok(classes) => Some(classes),
                    Err(err) => {
                        tracing::warn!(path = %path.display(), error = %err, "skipping content file");
                        None
                    }
                }
            })
            .collect::<Vec<_>>();

        let mut classes = BTreeSet::new();
        for set in sets.into_iter().flatten() {
            classes.extend(set.iter().cloned());
        }
        Usage { classes, files }
    }

    /// Produces the filtered utility CSS without touching a document.
    pub fn render(&self, deps: &mut dyn DependencySink) -> (String, BuildReport) {
        let (entry, rebuilt) = self.prepare_universe(deps);
        let usage = self.collect_usage(deps);
        let (css, emitted) = render_used(&entry.universe, &usage.classes);
        let report = BuildReport {
            content_hash: entry.content_hash.clone(),
            universe_rebuilt: rebuilt,
            universe_size: entry.universe.len(),
            files_scanned: usage.files.len(),
            used_classes: usage.classes.len(),
            emitted,
            injected: false,
        };
        (css, report)
    }

    /// Runs one pass and replaces the document's insertion point with the
    /// used utilities. A document without an insertion point is left as is.
    pub fn process(
        &self,
        document: &mut dyn HostDocument,
        deps: &mut dyn DependencySink,
    ) -> BuildReport {
        let (css, mut report) = self.render(deps);
        report.injected = document.replace_insertion_point(&self.config.insertion_point, &css);
        if !report.injected {
            tracing::warn!(
                name = %self.config.insertion_point,
                "no insertion point found; document left unchanged"
            );
        }
        tracing::info!(
            files = report.files_scanned,
            used = report.used_classes,
            emitted = report.emitted,
            universe = report.universe_size,
            "build pass complete"
        );
        report
    }
}

fn read_source(path: Option<&Path>, kind: &str, deps: &mut dyn DependencySink) -> String {
    let Some(path) = path else {
        return String::new();
    };
    deps.add_dependency(path);
    match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "{} source unreadable; treating as empty", kind);
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Engine, EngineError};
    use crate::cache::BuildCache;
    use crate::config::Config;
    use crate::host::{HostDocument, Stylesheet};
    use crate::registry::{CssBuilder, CustomBuilder, Rules, TokenRule};
    use std::collections::BTreeSet;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    fn write(path: &Path, contents: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create dirs");
        }
        fs::write(path, contents).expect("write fixture");
    }

    fn config_in(dir: &Path) -> Config {
        Config {
            tokens: Some(dir.join("tokens.css")),
            content: vec!["src/**/*.html".to_string()],
            base: dir.to_path_buf(),
            ..Config::default()
        }
    }

    #[test]
    fn process_injects_used_utilities_and_registers_dependencies() {
        let dir = tempfile::tempdir().expect("temp dir");
        write(&dir.path().join("tokens.css"), ":root { --spacing-4: 1rem; }");
        write(
            &dir.path().join("src/index.html"),
            r#"<div class="p-4 hover:p-4 unknown"></div>"#,
        );

        let engine = Engine::new(config_in(dir.path()), Arc::new(BuildCache::new()))
            .expect("engine");
        let mut sheet = Stylesheet::new("@layer utilities-gen;");
        let mut deps = BTreeSet::<PathBuf>::new();
        let report = engine.process(&mut sheet, &mut deps);

        assert!(report.injected);
        assert!(report.universe_rebuilt);
        assert_eq!(report.files_scanned, 1);
        assert_eq!(report.used_classes, 3);
        assert_eq!(report.emitted, 2);
        assert_eq!(
            sheet.as_str(),
            "@layer utilities-gen {\n  .p-4 { padding: var(--spacing-4); }\n  .hover\\:p-4:hover { padding: var(--spacing-4); }\n}"
        );
        assert!(deps.contains(&dir.path().join("tokens.css")));
        assert!(deps.contains(&dir.path().join("src/index.html")));
    }

    #[test]
    fn missing_token_source_is_empty_not_fatal() {
        let dir = tempfile::tempdir().expect("temp dir");
        write(&dir.path().join("src/a.html"), r#"<p class="flex p-4"></p>"#);

        let engine = Engine::new(config_in(dir.path()), Arc::new(BuildCache::new()))
            .expect("engine");
        let (css, report) = engine.render(&mut Vec::new());
        assert_eq!(css, ".flex { display: flex; }");
        assert_eq!(report.emitted, 1);
        assert!(!report.injected);
    }

    #[test]
    fn content_file_with_invalid_utf8_still_contributes_classes() {
        let dir = tempfile::tempdir().expect("temp dir");
        let page = dir.path().join("src/page.html");
        fs::create_dir_all(page.parent().expect("parent")).expect("create dirs");
        fs::write(&page, b"<!-- caf\xe9 --><div class=\"flex p-4\"></div>").expect("write");

        let engine = Engine::new(config_in(dir.path()), Arc::new(BuildCache::new()))
            .expect("engine");
        let usage = engine.collect_usage(&mut Vec::new());
        assert_eq!(usage.files.len(), 1);
        assert!(usage.classes.contains("flex"));
        assert!(usage.classes.contains("p-4"));
        assert!(engine.cache().files.get(&page).is_some());
    }

    #[test]
    fn document_without_insertion_point_is_untouched() {
        let dir = tempfile::tempdir().expect("temp dir");
        let engine = Engine::new(config_in(dir.path()), Arc::new(BuildCache::new()))
            .expect("engine");
        let mut sheet = Stylesheet::new("body { margin: 0; }");
        let report = engine.process(&mut sheet, &mut Vec::new());
        assert!(!report.injected);
        assert!(!sheet.has_insertion_point("utilities-gen"));
        assert_eq!(sheet.as_str(), "body { margin: 0; }");
    }

    #[test]
    fn reference_file_is_written_on_regeneration() {
        let dir = tempfile::tempdir().expect("temp dir");
        write(&dir.path().join("tokens.css"), ":root { --z-10: 10; }");
        let reference = dir.path().join("generated/utilities.css");
        let config = Config {
            reference: Some(reference.clone()),
            ..config_in(dir.path())
        };

        let engine = Engine::new(config, Arc::new(BuildCache::new())).expect("engine");
        let _ = engine.prepare_universe(&mut Vec::new());
        let text = fs::read_to_string(&reference).expect("reference written");
        assert!(text.contains(".z-10 { z-index: var(--z-10); }"));
        assert!(text.contains(".hover\\:z-10:hover"));
    }

    #[test]
    fn custom_builder_id_changes_the_hash() {
        let dir = tempfile::tempdir().expect("temp dir");
        write(&dir.path().join("tokens.css"), ":root { --size-1: 1px; }");
        let cache = Arc::new(BuildCache::new());

        let rules_with = |id: &str| Rules {
            token_rules: vec![TokenRule::new(
                "size",
                "size-",
                CssBuilder::Custom(CustomBuilder::new(id, |_, reference| {
                    format!("width: {0}; height: {0};", reference)
                })),
            )],
            ..Rules::empty()
        };

        let first = Engine::with_rules(config_in(dir.path()), rules_with("a"), Arc::clone(&cache))
            .expect("engine");
        let (entry, _) = first.prepare_universe(&mut Vec::new());
        assert_eq!(
            entry.universe.get("size-1"),
            Some(".size-1 { width: var(--size-1); height: var(--size-1); }")
        );

        let second = Engine::with_rules(config_in(dir.path()), rules_with("b"), Arc::clone(&cache))
            .expect("engine");
        let (_, rebuilt) = second.prepare_universe(&mut Vec::new());
        assert!(rebuilt);
        assert_eq!(cache.universe.generations(), 2);
    }

    #[test]
    fn invalid_content_glob_is_an_error() {
        let config = Config {
            content: vec!["src/[".to_string()],
            ..Config::default()
        };
        let err = Engine::new(config, Arc::new(BuildCache::new())).expect_err("bad glob");
        assert!(matches!(err, EngineError::Scan(_)));
    }

    struct Recorder(Vec<String>);

    impl HostDocument for Recorder {
        fn replace_insertion_point(&mut self, name: &str, css: &str) -> bool {
            self.0.push(format!("{}={}", name, css));
            true
        }
    }

    #[test]
    fn custom_insertion_point_name_is_passed_to_the_host() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = Config {
            insertion_point: "utils".to_string(),
            ..config_in(dir.path())
        };
        let engine = Engine::new(config, Arc::new(BuildCache::new())).expect("engine");
        let mut recorder = Recorder(Vec::new());
        assert!(engine.process(&mut recorder, &mut Vec::new()).injected);
        assert_eq!(recorder.0, vec!["utils=".to_string()]);
    }
}

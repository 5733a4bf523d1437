pub mod cache;
pub mod config;
pub mod css;
pub mod engine;
pub mod generator;
pub mod host;
pub mod inject;
pub mod registry;
pub mod scanner;
pub mod tokens;
pub mod variants;

use crate::cache::BuildCache;
use crate::config::{Config, ConfigError};
use crate::engine::{BuildReport, Engine, EngineError};
use crate::host::Stylesheet;
use crate::inject::{render_reference, write_if_changed};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, mpsc::channel};
use std::time::{Duration, Instant};

/// Inputs shared by every command that runs the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildArgs {
    pub inputs: Vec<String>,
    pub config: Option<String>,
    pub tokens: Option<String>,
    pub media: Option<String>,
    pub input_css: Option<String>,
    pub out: Option<String>,
    pub reference: Option<String>,
    pub ignore: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Scan(BuildArgs),
    Universe(BuildArgs),
    Build(BuildArgs),
    Watch {
        args: BuildArgs,
        poll: bool,
        poll_interval_ms: u64,
    },
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliError {
    pub message: String,
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self {
            message: err.to_string(),
        }
    }
}

impl From<EngineError> for CliError {
    fn from(err: EngineError) -> Self {
        Self {
            message: err.to_string(),
        }
    }
}

pub fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::Scan(args) => run_scan(&args),
        Command::Universe(args) => run_universe(&args),
        Command::Build(args) => {
            let engine = build_engine(&args, Arc::new(BuildCache::new()))?;
            run_build(&engine, &args).map(|_| ())
        }
        Command::Watch {
            args,
            poll,
            poll_interval_ms,
        } => run_watch(&args, poll, poll_interval_ms),
        Command::Help => {
            print_help();
            Ok(())
        }
    }
}

pub fn run_from_env() -> Result<(), CliError> {
    let command = parse_args(env::args().skip(1))?;
    run(command)
}

pub fn parse_args<I>(args: I) -> Result<Command, CliError>
where
    I: IntoIterator<Item = String>,
{
    let mut iter = args.into_iter();
    let Some(cmd) = iter.next() else {
        return Ok(Command::Help);
    };

    match cmd.as_str() {
        "scan" => parse_build_args("scan", iter.collect(), false).map(|(args, _)| Command::Scan(args)),
        "universe" => {
            parse_build_args("universe", iter.collect(), false).map(|(args, _)| Command::Universe(args))
        }
        "build" => parse_build_args("build", iter.collect(), false).map(|(args, _)| Command::Build(args)),
        "watch" => parse_build_args("watch", iter.collect(), true).map(|(args, poll)| {
            let (poll, poll_interval_ms) = poll.unwrap_or((false, 500));
            Command::Watch {
                args,
                poll,
                poll_interval_ms,
            }
        }),
        "-h" | "--help" | "help" => Ok(Command::Help),
        _ => Err(CliError {
            message: format!("unknown command: {}", cmd),
        }),
    }
}

type PollArgs = Option<(bool, u64)>;

fn parse_build_args(
    command: &str,
    args: Vec<String>,
    allow_poll: bool,
) -> Result<(BuildArgs, PollArgs), CliError> {
    let mut parsed = BuildArgs::default();
    let mut poll = false;
    let mut poll_interval_ms = 500;
    let mut idx = 0;

    let value_for = |idx: &mut usize, flag: &str| -> Result<String, CliError> {
        *idx += 1;
        args.get(*idx).cloned().ok_or_else(|| CliError {
            message: format!("{} requires a value for {}", command, flag),
        })
    };

    while idx < args.len() {
        match args[idx].as_str() {
            "--config" | "-c" => parsed.config = Some(value_for(&mut idx, "--config")?),
            "--tokens" | "-t" => parsed.tokens = Some(value_for(&mut idx, "--tokens")?),
            "--media" | "-m" => parsed.media = Some(value_for(&mut idx, "--media")?),
            "--input-css" | "-i" | "-s" => {
                parsed.input_css = Some(value_for(&mut idx, "--input-css")?)
            }
            "--out" | "--output" | "-o" => parsed.out = Some(value_for(&mut idx, "--output")?),
            "--reference" | "-r" => parsed.reference = Some(value_for(&mut idx, "--reference")?),
            "--ignore" | "-I" => parsed.ignore.push(value_for(&mut idx, "--ignore")?),
            "--poll" if allow_poll => poll = true,
            "--poll-interval" if allow_poll => {
                let value = value_for(&mut idx, "--poll-interval")?;
                poll = true;
                poll_interval_ms = parse_u64_arg(&value, "--poll-interval")?;
            }
            value if value.starts_with('-') && value.len() > 1 => {
                return Err(CliError {
                    message: format!("{} does not accept {}", command, value),
                });
            }
            value => parsed.inputs.push(value.to_string()),
        }
        idx += 1;
    }

    if command != "universe" && parsed.inputs.is_empty() && parsed.config.is_none() {
        return Err(CliError {
            message: format!(
                "{} requires --config or at least one path or glob pattern",
                command
            ),
        });
    }

    let poll = allow_poll.then_some((poll, poll_interval_ms));
    Ok((parsed, poll))
}

/// Loads the config file, if any, and applies command-line overrides.
fn resolve_config(args: &BuildArgs) -> Result<Config, CliError> {
    let mut config = match args.config.as_deref() {
        Some(path) => config::load(Path::new(path))?,
        None => Config::default(),
    };
    if let Some(tokens) = &args.tokens {
        config.tokens = Some(PathBuf::from(tokens));
    }
    if let Some(media) = &args.media {
        config.media = Some(PathBuf::from(media));
    }
    if let Some(reference) = &args.reference {
        config.reference = Some(PathBuf::from(reference));
    }
    if !args.inputs.is_empty() {
        config.content = args.inputs.clone();
        config.base = PathBuf::from(".");
    }
    config.ignore.extend(args.ignore.iter().cloned());
    Ok(config)
}

fn build_engine(args: &BuildArgs, cache: Arc<BuildCache>) -> Result<Engine, CliError> {
    let config = resolve_config(args)?;
    Ok(Engine::new(config, cache)?)
}

fn run_scan(args: &BuildArgs) -> Result<(), CliError> {
    let engine = build_engine(args, Arc::new(BuildCache::new()))?;
    let usage = engine.collect_usage(&mut Vec::new());

    for class in &usage.classes {
        println!("{}", class);
    }

    eprintln!(
        "scanned {} files, found {} classes",
        usage.files.len(),
        usage.classes.len()
    );

    Ok(())
}

fn run_universe(args: &BuildArgs) -> Result<(), CliError> {
    let engine = build_engine(args, Arc::new(BuildCache::new()))?;
    let (entry, _) = engine.prepare_universe(&mut Vec::new());
    let text = render_reference(&entry.raw_text);

    match args.out.as_deref() {
        Some(out) => {
            write_output(Path::new(out), &text)?;
        }
        None => print!("{}", text),
    }

    eprintln!(
        "{} utilities ({} base)",
        entry.universe.len(),
        entry.universe.base_count()
    );
    Ok(())
}

/// One pass with `engine`. Returns the report and every file the pass read.
fn run_build(engine: &Engine, args: &BuildArgs) -> Result<(BuildReport, Vec<PathBuf>), CliError> {
    let mut deps = Vec::<PathBuf>::new();
    if let Some(config) = args.config.as_deref() {
        deps.push(PathBuf::from(config));
    }
    let start = Instant::now();

    let (css, report) = match args.input_css.as_deref() {
        Some(input) => {
            let input_path = Path::new(input);
            let template = fs::read_to_string(input_path).map_err(|err| CliError {
                message: format!("failed to read {}: {}", input_path.display(), err),
            })?;
            deps.push(input_path.to_path_buf());
            let mut sheet = Stylesheet::new(template);
            let report = engine.process(&mut sheet, &mut deps);
            if !report.injected {
                return Err(CliError {
                    message: format!(
                        "{} has no `@layer {}` insertion point",
                        input_path.display(),
                        engine.config().insertion_point
                    ),
                });
            }
            (sheet.into_string(), report)
        }
        None => engine.render(&mut deps),
    };

    let css = if css.is_empty() || css.ends_with('\n') {
        css
    } else {
        format!("{}\n", css)
    };
    match args.out.as_deref() {
        Some(out) => {
            let written = write_output(Path::new(out), &css)?;
            if !written {
                tracing::debug!(path = out, "output unchanged");
            }
        }
        None => print!("{}", css),
    }

    eprintln!(
        "scanned {} files, emitted {} of {} used classes in {:.2?}",
        report.files_scanned,
        report.emitted,
        report.used_classes,
        start.elapsed()
    );
    Ok((report, deps))
}

fn write_output(path: &Path, contents: &str) -> Result<bool, CliError> {
    write_if_changed(path, contents).map_err(|err| CliError {
        message: format!("failed to write {}: {}", path.display(), err),
    })
}

fn print_help() {
    println!("tokenwind");
    println!();
    println!("USAGE:");
    println!("  tokenwind scan [--config <path>] [--ignore <glob>] <glob...>");
    println!(
        "  tokenwind universe [--config <path>] [--tokens <path>] [--media <path>] [--output <path>]"
    );
    println!(
        "  tokenwind build [--config <path>] [--tokens <path>] [--media <path>] [--input-css <path>] [--output <path>] [--reference <path>] [--ignore <glob>] <glob...>"
    );
    println!(
        "  tokenwind watch [build options] [--poll] [--poll-interval <ms>] <glob...>"
    );
    println!();
    println!("EXAMPLES:");
    println!("  tokenwind scan \"src/**/*.{{html,tsx}}\"");
    println!("  tokenwind universe -t styles/tokens.css -m styles/media.css");
    println!(
        "  tokenwind build -t styles/tokens.css -i src/app.css -o dist/app.css \"src/**/*.{{html,tsx}}\""
    );
    println!("  tokenwind build -c tokenwind.toml -o dist/utilities.css");
    println!("  tokenwind watch -c tokenwind.toml -i src/app.css -o dist/app.css");
    println!("  tokenwind watch --poll --poll-interval 250 -c tokenwind.toml");
    println!();
    println!("Logging is controlled with RUST_LOG (default: tokenwind=info).");
}

/// One watch pass. The config file is re-read every time so edits to it
/// take effect; both cache tiers carry over through `cache`.
fn watch_pass(
    args: &BuildArgs,
    cache: &Arc<BuildCache>,
) -> Result<(Engine, BuildReport, Vec<PathBuf>), CliError> {
    let engine = build_engine(args, Arc::clone(cache))?;
    let (report, deps) = run_build(&engine, args)?;
    let dropped = cache.files.retain_paths(&deps);
    if dropped > 0 {
        tracing::debug!(dropped, "forgot deleted content files");
    }
    Ok((engine, report, deps))
}

/// Coalesces bursts of file events. A change inside the window after the
/// last pass is deferred, not dropped, and runs once the window has passed.
#[derive(Debug, Clone)]
struct Debounce {
    window: Duration,
    last_run: Option<Instant>,
    pending: bool,
}

impl Debounce {
    fn new(window: Duration) -> Self {
        Self {
            window,
            last_run: None,
            pending: false,
        }
    }

    /// Records a change. Returns whether a pass should run now.
    fn on_change(&mut self, now: Instant) -> bool {
        self.pending = true;
        self.on_idle(now)
    }

    /// Returns whether a deferred change is due.
    fn on_idle(&mut self, now: Instant) -> bool {
        if !self.pending {
            return false;
        }
        if self
            .last_run
            .is_some_and(|last| now.saturating_duration_since(last) < self.window)
        {
            return false;
        }
        self.pending = false;
        self.last_run = Some(now);
        true
    }
}

fn run_watch(args: &BuildArgs, poll: bool, poll_interval_ms: u64) -> Result<(), CliError> {
    let cache = Arc::new(BuildCache::new());
    let (engine, _, _) = watch_pass(args, &cache)?;

    let (tx, rx) = channel();
    let mut ignore_set = build_globset(&engine.config().ignore).ok();
    let mut outputs = output_paths(engine.config(), args);
    let mut watcher: Box<dyn notify::Watcher> = if poll {
        Box::new(
            notify::PollWatcher::new(
                tx,
                notify::Config::default()
                    .with_poll_interval(Duration::from_millis(poll_interval_ms)),
            )
            .map_err(|err| CliError {
                message: format!("failed to start poll watcher: {}", err),
            })?,
        )
    } else {
        Box::new(notify::recommended_watcher(tx).map_err(|err| CliError {
            message: format!("failed to start watcher: {}", err),
        })?)
    };

    let mut watched = std::collections::HashSet::new();
    for root in watch_roots_for_build(engine.config(), args) {
        watcher
            .watch(&root, notify::RecursiveMode::Recursive)
            .map_err(|err| CliError {
                message: format!("failed to watch {}: {}", root.display(), err),
            })?;
        watched.insert(root);
    }

    if poll {
        eprintln!("watching for changes (polling, press Ctrl+C to stop)...");
    } else {
        eprintln!("watching for changes (press Ctrl+C to stop)...");
    }

    let mut debounce = Debounce::new(Duration::from_millis(200));
    loop {
        let due = match rx.recv_timeout(Duration::from_millis(200)) {
            Ok(Ok(event)) => {
                if should_ignore_event(&event, ignore_set.as_ref(), &outputs) {
                    continue;
                }
                debounce.on_change(Instant::now())
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "watch error");
                continue;
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => debounce.on_idle(Instant::now()),
            Err(_) => break,
        };
        if !due {
            continue;
        }

        tracing::info!("change detected, rebuilding");
        let engine = match watch_pass(args, &cache) {
            Ok((engine, _, _)) => engine,
            Err(err) => {
                tracing::warn!(error = %err.message, "build failed");
                continue;
            }
        };
        ignore_set = build_globset(&engine.config().ignore).ok();
        outputs = output_paths(engine.config(), args);
        for root in watch_roots_for_build(engine.config(), args) {
            if watched.contains(&root) {
                continue;
            }
            match watcher.watch(&root, notify::RecursiveMode::Recursive) {
                Ok(()) => {
                    watched.insert(root);
                }
                Err(err) => tracing::warn!(path = %root.display(), error = %err, "failed to watch"),
            }
        }
    }

    Ok(())
}

/// Files the build itself writes; events on them never trigger a pass.
fn output_paths(config: &Config, args: &BuildArgs) -> Vec<PathBuf> {
    [args.out.as_deref(), config.reference.as_deref().and_then(Path::to_str)]
        .into_iter()
        .flatten()
        .map(absolute)
        .collect()
}

fn watch_roots(patterns: &[String]) -> Vec<PathBuf> {
    let mut roots = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for pattern in patterns {
        let root = glob_root(pattern);
        let normalized = if root.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            root
        };
        if seen.insert(normalized.clone()) {
            roots.push(normalized);
        }
    }

    roots
}

/// Directories to watch: content glob roots under the base directory, plus
/// the parents of the token source, media source, input stylesheet and
/// config file.
fn watch_roots_for_build(config: &Config, args: &BuildArgs) -> Vec<PathBuf> {
    let content = config
        .content
        .iter()
        .map(|pattern| config.base.join(pattern).to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    let extras = [
        config.tokens.as_deref().and_then(Path::to_str),
        config.media.as_deref().and_then(Path::to_str),
        args.input_css.as_deref(),
        args.config.as_deref(),
    ];

    let mut patterns = content;
    patterns.extend(extras.into_iter().flatten().map(String::from));
    let roots = watch_roots(&patterns);
    if roots.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        roots
    }
}

fn glob_root(pattern: &str) -> PathBuf {
    let first_meta = pattern.find(['*', '?', '[', '{']);

    let Some(first_meta) = first_meta else {
        if pattern.ends_with('/') || pattern.ends_with('\\') {
            return PathBuf::from(pattern);
        }
        let path = Path::new(pattern);
        if path.extension().is_some() {
            return path.parent().unwrap_or(Path::new(".")).to_path_buf();
        }
        return path.to_path_buf();
    };

    let prefix = &pattern[..first_meta];
    match prefix.rfind(['/', '\\']) {
        Some(idx) => PathBuf::from(&prefix[..=idx]),
        None => PathBuf::from("."),
    }
}

fn parse_u64_arg(value: &str, flag: &str) -> Result<u64, CliError> {
    value.parse::<u64>().map_err(|_| CliError {
        message: format!("{} requires a positive integer, got '{}'", flag, value),
    })
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, CliError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|err| CliError {
            message: format!("invalid glob pattern '{}': {}", pattern, err),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|err| CliError {
        message: format!("failed to build ignore glob set: {}", err),
    })
}

fn absolute(path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        return path.to_path_buf();
    }
    env::current_dir()
        .map(|dir| dir.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// An event is ignored when every path it touches matches an ignore glob or
/// is one of the files the build itself writes.
fn should_ignore_event(
    event: &notify::Event,
    ignore_set: Option<&GlobSet>,
    outputs: &[PathBuf],
) -> bool {
    if event.paths.is_empty() {
        return false;
    }
    event.paths.iter().all(|path| {
        outputs.iter().any(|out| out == path)
            || ignore_set.is_some_and(|set| set.is_match(path))
    })
}

#[cfg(test)]
mod tests {
    use super::{
        BuildArgs, Command, Debounce, glob_root, parse_args, resolve_config, should_ignore_event,
        watch_pass, watch_roots_for_build,
    };
    use crate::cache::BuildCache;
    use crate::config::Config;
    use globset::{Glob, GlobSetBuilder};
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn no_args_prints_help() {
        assert_eq!(parse_args(Vec::new()).expect("help"), Command::Help);
        assert_eq!(parse_args(args(&["--help"])).expect("help"), Command::Help);
    }

    #[test]
    fn parses_build_flags() {
        let command = parse_args(args(&[
            "build",
            "-t",
            "tokens.css",
            "--media",
            "media.css",
            "-i",
            "app.css",
            "-o",
            "dist/app.css",
            "--reference",
            "gen/all.css",
            "-I",
            "**/gen/**",
            "src/**/*.html",
        ]))
        .expect("build should parse");

        assert_eq!(
            command,
            Command::Build(BuildArgs {
                inputs: vec!["src/**/*.html".to_string()],
                config: None,
                tokens: Some("tokens.css".to_string()),
                media: Some("media.css".to_string()),
                input_css: Some("app.css".to_string()),
                out: Some("dist/app.css".to_string()),
                reference: Some("gen/all.css".to_string()),
                ignore: vec!["**/gen/**".to_string()],
            })
        );
    }

    #[test]
    fn config_alone_is_enough_for_build() {
        let command = parse_args(args(&["build", "-c", "tokenwind.toml"])).expect("parse");
        assert!(matches!(command, Command::Build(BuildArgs { config: Some(_), .. })));
    }

    #[test]
    fn universe_needs_no_content() {
        let command = parse_args(args(&["universe", "-t", "tokens.css"])).expect("parse");
        assert!(matches!(command, Command::Universe(_)));
    }

    #[test]
    fn parses_watch_polling() {
        let command =
            parse_args(args(&["watch", "--poll-interval", "250", "src/**/*.tsx"])).expect("parse");
        match command {
            Command::Watch {
                args,
                poll,
                poll_interval_ms,
            } => {
                assert!(poll);
                assert_eq!(poll_interval_ms, 250);
                assert_eq!(args.inputs, vec!["src/**/*.tsx".to_string()]);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        let command = parse_args(args(&["watch", "src"])).expect("parse");
        assert!(matches!(
            command,
            Command::Watch {
                poll: false,
                poll_interval_ms: 500,
                ..
            }
        ));
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(parse_args(args(&["frobnicate"])).is_err());
        assert!(parse_args(args(&["build"])).is_err());
        assert!(parse_args(args(&["build", "--output"])).is_err());
        assert!(parse_args(args(&["build", "--poll", "src"])).is_err());
        let err = parse_args(args(&["watch", "--poll-interval", "soon", "src"])).expect_err("bad");
        assert!(err.message.contains("--poll-interval"));
    }

    #[test]
    fn cli_flags_override_config_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("tokenwind.toml");
        fs::write(
            &path,
            "tokens = \"tokens.css\"\ncontent = [\"src/**/*.html\"]\nignore = [\"a/**\"]\n",
        )
        .expect("write config");

        let resolved = resolve_config(&BuildArgs {
            config: Some(path.to_string_lossy().into_owned()),
            media: Some("media.css".to_string()),
            ignore: vec!["b/**".to_string()],
            ..BuildArgs::default()
        })
        .expect("config");
        assert_eq!(resolved.tokens, Some(dir.path().join("tokens.css")));
        assert_eq!(resolved.media, Some(PathBuf::from("media.css")));
        assert_eq!(resolved.content, vec!["src/**/*.html".to_string()]);
        assert_eq!(resolved.ignore, vec!["a/**".to_string(), "b/**".to_string()]);

        let resolved = resolve_config(&BuildArgs {
            config: Some(path.to_string_lossy().into_owned()),
            inputs: vec!["pages/*.html".to_string()],
            ..BuildArgs::default()
        })
        .expect("config");
        assert_eq!(resolved.content, vec!["pages/*.html".to_string()]);
        assert_eq!(resolved.base, PathBuf::from("."));
    }

    #[test]
    fn glob_root_stops_at_first_meta_character() {
        assert_eq!(glob_root("src/**/*.html"), PathBuf::from("src/"));
        assert_eq!(glob_root("src/pages*.html"), PathBuf::from("src/"));
        assert_eq!(glob_root("*.html"), PathBuf::from("."));
        assert_eq!(glob_root("styles/tokens.css"), PathBuf::from("styles"));
        assert_eq!(glob_root("src"), PathBuf::from("src"));
        assert_eq!(glob_root("./src/**/*.html"), PathBuf::from("./src/"));
        assert_eq!(glob_root("a/b/c*/d.html"), PathBuf::from("a/b/"));
        assert_eq!(glob_root("/abs/**/*.tsx"), PathBuf::from("/abs/"));
    }

    #[test]
    fn watch_pass_rereads_the_config_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config_path = dir.path().join("tokenwind.toml");
        fs::write(dir.path().join("tokens.css"), ":root { --spacing-4: 1rem; }").expect("tokens");
        fs::create_dir_all(dir.path().join("src")).expect("src");
        fs::write(
            dir.path().join("src/index.html"),
            r#"<p class="p-4 hover:p-4"></p>"#,
        )
        .expect("page");
        let base = "tokens = \"tokens.css\"\ncontent = [\"src/**/*.html\"]\n";
        fs::write(&config_path, base).expect("config");

        let args = BuildArgs {
            config: Some(config_path.to_string_lossy().into_owned()),
            out: Some(dir.path().join("out.css").to_string_lossy().into_owned()),
            ..BuildArgs::default()
        };
        let cache = Arc::new(BuildCache::new());

        let (_, first, deps) = watch_pass(&args, &cache).expect("first pass");
        assert!(first.universe_rebuilt);
        assert_eq!(first.emitted, 2);
        assert!(deps.contains(&config_path));

        fs::write(&config_path, format!("{}[rules]\ndisable = [\"hover\"]\n", base))
            .expect("edit config");
        let (engine, second, _) = watch_pass(&args, &cache).expect("second pass");
        assert!(second.universe_rebuilt);
        assert_ne!(first.content_hash, second.content_hash);
        assert_eq!(second.emitted, 1);
        assert_eq!(cache.universe.generations(), 2);
        assert!(!engine.rules().variant_names().contains("hover"));
        let out = fs::read_to_string(dir.path().join("out.css")).expect("output");
        assert!(!out.contains("hover"));
    }

    #[test]
    fn watch_pass_forgets_deleted_content_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        fs::create_dir_all(dir.path().join("src")).expect("src");
        let gone = dir.path().join("src/gone.html");
        fs::write(&gone, r#"<p class="flex"></p>"#).expect("page");
        fs::write(dir.path().join("src/kept.html"), r#"<p class="block"></p>"#).expect("page");
        let config_path = dir.path().join("tokenwind.toml");
        fs::write(&config_path, "content = [\"src/**/*.html\"]\n").expect("config");

        let args = BuildArgs {
            config: Some(config_path.to_string_lossy().into_owned()),
            out: Some(dir.path().join("out.css").to_string_lossy().into_owned()),
            ..BuildArgs::default()
        };
        let cache = Arc::new(BuildCache::new());
        let _ = watch_pass(&args, &cache).expect("first pass");
        assert_eq!(cache.files.len(), 2);

        fs::remove_file(&gone).expect("delete page");
        let _ = watch_pass(&args, &cache).expect("second pass");
        assert_eq!(cache.files.len(), 1);
        assert!(cache.files.get(&gone).is_none());
    }

    #[test]
    fn debounce_defers_changes_inside_the_window() {
        let window = Duration::from_millis(200);
        let start = Instant::now();
        let mut debounce = Debounce::new(window);

        assert!(!debounce.on_idle(start));
        assert!(debounce.on_change(start));
        assert!(!debounce.on_idle(start + Duration::from_millis(50)));

        // A second save right after the pass must not be lost.
        assert!(!debounce.on_change(start + Duration::from_millis(50)));
        assert!(!debounce.on_idle(start + Duration::from_millis(150)));
        assert!(debounce.on_idle(start + window));
        assert!(!debounce.on_idle(start + window * 3));

        assert!(debounce.on_change(start + window * 3));
    }

    #[test]
    fn watch_roots_include_sources_and_inputs() {
        let config = Config {
            tokens: Some(PathBuf::from("styles/tokens.css")),
            content: vec!["src/**/*.html".to_string()],
            ..Config::default()
        };
        let roots = watch_roots_for_build(
            &config,
            &BuildArgs {
                input_css: Some("app/main.css".to_string()),
                ..BuildArgs::default()
            },
        );
        assert_eq!(
            roots,
            vec![
                PathBuf::from("./src"),
                PathBuf::from("styles"),
                PathBuf::from("app")
            ]
        );

        assert_eq!(
            watch_roots_for_build(&Config::default(), &BuildArgs::default()),
            vec![PathBuf::from(".")]
        );
    }

    #[test]
    fn ignores_events_only_touching_ignored_or_output_paths() {
        let mut builder = GlobSetBuilder::new();
        builder.add(Glob::new("**/generated/**").expect("glob"));
        let ignore = builder.build().expect("globset");
        let out = PathBuf::from("/proj/dist/app.css");

        let event = |paths: &[&str]| {
            let mut event = notify::Event::new(notify::EventKind::Any);
            for path in paths {
                event = event.add_path(PathBuf::from(path));
            }
            event
        };

        assert!(should_ignore_event(
            &event(&["/proj/generated/a.css", "/proj/dist/app.css"]),
            Some(&ignore),
            &[out.clone()]
        ));
        assert!(!should_ignore_event(
            &event(&["/proj/src/a.html", "/proj/dist/app.css"]),
            Some(&ignore),
            &[out.clone()]
        ));
        assert!(!should_ignore_event(&event(&[]), Some(&ignore), &[out]));
    }
}

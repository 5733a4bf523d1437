use crate::generator::Universe;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;

const REFERENCE_HEADER: &str = "/*\n * Generated by tokenwind. Do not edit.\n *\n * Every utility class the current tokens, media declarations and rules\n * can produce. Only the classes found in content files are emitted into\n * the stylesheet.\n */\n";

/// Filtered CSS for the used classes, one rule per line in universe order,
/// plus the number of rules emitted.
pub fn render_used(universe: &Universe, used: &BTreeSet<String>) -> (String, usize) {
    let selected = universe.select(used.iter().map(String::as_str));
    let count = selected.len();
    let css = selected
        .into_iter()
        .map(|entry| entry.css.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    (css, count)
}

pub fn render_reference(raw_text: &str) -> String {
    if raw_text.is_empty() {
        return REFERENCE_HEADER.to_string();
    }
    format!("{}\n{}\n", REFERENCE_HEADER, raw_text)
}

/// Writes `contents` to `path` unless the file already holds exactly those
/// bytes. Returns whether a write happened.
pub fn write_if_changed(path: &Path, contents: &str) -> io::Result<bool> {
    match fs::read(path) {
        Ok(existing) if existing == contents.as_bytes() => return Ok(false),
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    Ok(true)
}

//! Resolving the configured input into concrete source files.

use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Extensions the pipeline accepts, lowercase and without the dot.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Return the lowercase extension of `path` if it is one the pipeline accepts.
#[must_use]
pub fn supported_extension(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    SUPPORTED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Expand `input` into the list of paths to process.
///
/// A directory yields its regular files (one level, sorted by name); anything
/// else is treated as a glob pattern. Extension filtering is left to the
/// pipeline so unsupported matches are reported rather than silently dropped.
pub fn resolve_input(input: &str) -> Result<Vec<PathBuf>> {
    let path = Path::new(input);
    if path.is_dir() {
        return list_directory(path);
    }
    expand_glob(input)
}

/// Re-glob a single path reported by the filesystem watcher. The path is
/// matched literally, so a file that vanished before we looked yields nothing.
pub fn resolve_event_path(path: &Path) -> Result<Vec<PathBuf>> {
    let literal = Pattern::escape(&path.to_string_lossy());
    expand_glob(&literal)
}

/// Directory to subscribe to for a given input: the input itself when it is
/// a directory, otherwise the parent of the pattern.
#[must_use]
pub fn watch_dir(input: &str) -> PathBuf {
    let path = Path::new(input);
    if path.is_dir() {
        return path.to_path_buf();
    }
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let entries = glob::glob(pattern).map_err(|source| Error::Pattern {
        pattern: pattern.to_string(),
        source,
    })?;
    let mut out = Vec::new();
    for entry in entries {
        match entry {
            Ok(p) => out.push(p),
            Err(err) => warn!(path = %err.path().display(), "unreadable glob match: {}", err.error()),
        }
    }
    debug!(pattern, matches = out.len(), "glob expanded");
    Ok(out)
}

fn list_directory(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(dir).to_path_buf();
            Error::io(path, err.into())
        })?;
        if entry.file_type().is_file() {
            out.push(entry.into_path());
        }
    }
    debug!(dir = %dir.display(), matches = out.len(), "directory listed");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn extension_check_is_case_insensitive() {
        assert_eq!(supported_extension(Path::new("a/B.JPG")).as_deref(), Some("jpg"));
        assert_eq!(supported_extension(Path::new("b.Jpeg")).as_deref(), Some("jpeg"));
        assert_eq!(supported_extension(Path::new("c.png")).as_deref(), Some("png"));
        assert_eq!(supported_extension(Path::new("notes.txt")), None);
        assert_eq!(supported_extension(Path::new("no_extension")), None);
    }

    #[test]
    fn watch_dir_strips_pattern_to_parent() {
        assert_eq!(watch_dir("/photos/incoming/*.jpg"), PathBuf::from("/photos/incoming"));
        assert_eq!(watch_dir("*.jp*g"), PathBuf::from("."));
    }

    #[test]
    fn watch_dir_keeps_directories() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path().to_string_lossy().to_string();
        assert_eq!(watch_dir(&dir), tmp.path());
    }

    #[test]
    fn glob_and_directory_inputs_resolve() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        fs::write(root.join("b.jpg"), b"x").unwrap();
        fs::write(root.join("a.jpeg"), b"x").unwrap();
        fs::write(root.join("notes.txt"), b"x").unwrap();
        fs::create_dir(root.join("nested")).unwrap();
        fs::write(root.join("nested").join("c.jpg"), b"x").unwrap();

        let pattern = format!("{}/*.jp*g", root.display());
        let globbed = resolve_input(&pattern).unwrap();
        assert_eq!(globbed, vec![root.join("a.jpeg"), root.join("b.jpg")]);

        let listed = resolve_input(&root.to_string_lossy()).unwrap();
        assert_eq!(
            listed,
            vec![root.join("a.jpeg"), root.join("b.jpg"), root.join("notes.txt")]
        );
    }

    #[test]
    fn event_paths_match_literally() {
        let tmp = tempdir().unwrap();
        let odd = tmp.path().join("shot[1].jpg");
        fs::write(&odd, b"x").unwrap();
        assert_eq!(resolve_event_path(&odd).unwrap(), vec![odd.clone()]);
        assert!(resolve_event_path(&tmp.path().join("gone.jpg")).unwrap().is_empty());
    }

    #[test]
    fn bad_pattern_is_reported() {
        assert!(matches!(resolve_input("[unclosed"), Err(Error::Pattern { .. })));
    }
}

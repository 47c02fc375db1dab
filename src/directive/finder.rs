//! Locating directive files inside a tier directory.
//!
//! Lookup tries the conventional layouts first (`core/{name}.md`,
//! `custom/{name}.md`, `{name}.md` at the root) and only then falls back to a
//! recursive scan, so hot lookups stay cheap on large trees. A candidate file
//! counts as a match when its declared `name` attribute equals the requested
//! name; files without a readable declaration fall back to file-stem
//! comparison so hand-dropped files still resolve.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::debug;

static NAME_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<directive[^>]*name\s*=\s*["']([^"']+)["']"#).unwrap());

/// Find the file backing `name` under `root`, or `None`.
///
/// A missing or non-directory root is a normal miss, never an error — tiers
/// are optional.
pub fn find_directive_file(root: &Path, name: &str) -> Option<PathBuf> {
    if !root.is_dir() {
        return None;
    }

    let conventional = [
        root.join("core").join(format!("{name}.md")),
        root.join("custom").join(format!("{name}.md")),
        root.join(format!("{name}.md")),
    ];
    for candidate in conventional {
        if candidate.is_file() && file_matches(&candidate, name) {
            return Some(candidate);
        }
    }

    scan_tree(root, name)
}

/// Recursive fallback over every `.md` file under `root`.
fn scan_tree(dir: &Path, name: &str) -> Option<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(dir = %dir.display(), error = %err, "skipping unreadable directory");
            return None;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if let Some(found) = scan_tree(&path, name) {
                return Some(found);
            }
        } else if path.extension().is_some_and(|ext| ext == "md") && file_matches(&path, name) {
            return Some(path);
        }
    }
    None
}

/// Does this file declare (or imply, by stem) the given directive name?
fn file_matches(path: &Path, name: &str) -> bool {
    match declared_name(path) {
        Some(declared) => declared == name,
        // No declaration or unreadable: the file stem decides.
        None => path.file_stem().is_some_and(|stem| stem == name),
    }
}

/// The `name` attribute declared in the file's directive tag, if any.
pub fn declared_name(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    NAME_ATTR_RE
        .captures(&content)
        .map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn directive(name: &str) -> String {
        format!("<directive name=\"{name}\" version=\"1.0.0\">\n</directive>\n")
    }

    #[test]
    fn finds_in_core_subdir() {
        let tmp = TempDir::new().unwrap();
        let path = write(tmp.path(), "core/deploy.md", &directive("deploy"));
        assert_eq!(find_directive_file(tmp.path(), "deploy"), Some(path));
    }

    #[test]
    fn finds_in_custom_and_root() {
        let tmp = TempDir::new().unwrap();
        let custom = write(tmp.path(), "custom/lint.md", &directive("lint"));
        let root = write(tmp.path(), "fmt.md", &directive("fmt"));
        assert_eq!(find_directive_file(tmp.path(), "lint"), Some(custom));
        assert_eq!(find_directive_file(tmp.path(), "fmt"), Some(root));
    }

    #[test]
    fn recursive_scan_finds_nested_files() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            tmp.path(),
            "patterns/auth/jwt_auth.md",
            &directive("jwt_auth"),
        );
        assert_eq!(find_directive_file(tmp.path(), "jwt_auth"), Some(path));
    }

    #[test]
    fn declared_name_beats_filename() {
        let tmp = TempDir::new().unwrap();
        // File named one thing, declares another.
        write(tmp.path(), "core/old_name.md", &directive("new_name"));
        assert_eq!(find_directive_file(tmp.path(), "old_name"), None);
        let found = find_directive_file(tmp.path(), "new_name").unwrap();
        assert!(found.ends_with("core/old_name.md"));
    }

    #[test]
    fn stem_fallback_without_declaration() {
        let tmp = TempDir::new().unwrap();
        let path = write(tmp.path(), "notes.md", "# plain markdown, no tag\n");
        assert_eq!(find_directive_file(tmp.path(), "notes"), Some(path));
    }

    #[test]
    fn missing_root_is_none() {
        assert_eq!(
            find_directive_file(Path::new("/nonexistent/tier"), "anything"),
            None
        );
    }

    #[test]
    fn non_md_files_ignored() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "nested/deploy.txt", &directive("deploy"));
        assert_eq!(find_directive_file(tmp.path(), "deploy"), None);
    }
}

use anyhow::{Context, Result};
use path_absolutize::Absolutize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::cancel::CancelToken;
use crate::error::ScopeError;
use crate::ledger::LEDGER_FILE_NAME;
use crate::model::{self, Candidate};

/// Which entries under a working directory are candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    /// Absolute working directory.
    pub root: PathBuf,
    pub recursive: bool,
    pub include_directories: bool,
    pub include_hidden: bool,
    /// Deepest depth emitted (0 = unlimited).
    pub max_depth: usize,
    /// Lower-cased extension filters, each starting with `.`.
    pub extensions: Vec<String>,
}

impl Scope {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            recursive: false,
            include_directories: false,
            include_hidden: false,
            max_depth: 0,
            extensions: Vec::new(),
        }
    }
}

/// Resolve the working directory (defaulting to the current one) to an
/// absolute path and ensure it is a directory.
pub fn resolve_working_dir(path: Option<&Path>) -> Result<PathBuf> {
    let raw = match path {
        Some(path) => path.to_path_buf(),
        None => std::env::current_dir().context("determine working directory")?,
    };
    let absolute = raw
        .absolutize()
        .with_context(|| format!("resolve working directory {}", raw.display()))?
        .into_owned();
    let meta = std::fs::metadata(&absolute)
        .with_context(|| format!("stat working directory {}", absolute.display()))?;
    if !meta.is_dir() {
        return Err(ScopeError::NotADirectory(absolute).into());
    }
    Ok(absolute)
}

/// Parse a `|`-delimited extension list such as `.jpg|.PNG` into
/// lower-cased, deduplicated filters.
pub fn parse_extensions(raw: &str) -> Result<Vec<String>, ScopeError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for token in raw.split('|') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(ScopeError::EmptyExtension);
        }
        if !trimmed.starts_with('.') {
            return Err(ScopeError::MissingDot(trimmed.to_string()));
        }
        let normalized = trimmed.to_lowercase();
        if seen.insert(normalized.clone()) {
            result.push(normalized);
        }
    }
    Ok(result)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|name| name.starts_with('.'))
}

fn matches_extension(name: &str, filters: &[String]) -> bool {
    let lower = name.to_lowercase();
    filters
        .iter()
        .any(|ext| lower.len() > ext.len() && lower.ends_with(ext.as_str()))
}

/// Enumerate candidates under `scope` in file-name order.
///
/// Hidden directories are pruned, symlinked directories are listed but never
/// followed, and the ledger file is never offered.
pub fn enumerate(scope: &Scope, cancel: &CancelToken) -> Result<Vec<Candidate>> {
    let mut walker = WalkDir::new(&scope.root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name();
    if !scope.recursive {
        walker = walker.max_depth(1);
    } else if scope.max_depth > 0 {
        walker = walker.max_depth(scope.max_depth + 1);
    }

    let include_hidden = scope.include_hidden;
    let entries = walker
        .into_iter()
        .filter_entry(move |entry| {
            entry.depth() == 0 || include_hidden || !is_hidden(entry.file_name())
        });

    let mut candidates = Vec::new();
    for entry in entries {
        cancel.check()?;
        let entry = entry.context("failed to walk working directory")?;
        let relative = entry
            .path()
            .strip_prefix(&scope.root)
            .context("walked outside the working directory")?;
        let Some(relative) = model::to_slash(relative) else {
            tracing::warn!(path = %entry.path().display(), "skipping non UTF-8 path");
            continue;
        };
        if relative == LEDGER_FILE_NAME {
            continue;
        }

        let is_dir = entry.file_type().is_dir();
        if is_dir && !scope.include_directories {
            continue;
        }
        if !is_dir && !scope.extensions.is_empty() {
            let name = relative.rsplit('/').next().unwrap_or(&relative);
            if !matches_extension(name, &scope.extensions) {
                continue;
            }
        }

        let size = if is_dir {
            0
        } else {
            entry.metadata().map(|meta| meta.len()).unwrap_or(0)
        };
        candidates.push(Candidate::new(&scope.root, &relative, is_dir, size));
    }

    tracing::debug!(
        root = %scope.root.display(),
        candidates = candidates.len(),
        "enumerated candidates"
    );
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("b.txt"), "bb").unwrap();
        fs::write(root.join("a.JPG"), "a").unwrap();
        fs::write(root.join(".hidden"), "h").unwrap();
        fs::write(root.join(LEDGER_FILE_NAME), "").unwrap();
        fs::create_dir_all(root.join("sub/deeper")).unwrap();
        fs::write(root.join("sub/c.txt"), "c").unwrap();
        fs::write(root.join("sub/deeper/d.txt"), "d").unwrap();
        fs::create_dir(root.join(".git")).unwrap();
        fs::write(root.join(".git/config"), "x").unwrap();
        dir
    }

    fn paths(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.relative_path.as_str()).collect()
    }

    #[test]
    fn test_flat_listing_skips_dirs_hidden_and_ledger() {
        let dir = fixture();
        let scope = Scope::new(dir.path());
        let found = enumerate(&scope, &CancelToken::new()).unwrap();
        assert_eq!(paths(&found), vec!["a.JPG", "b.txt"]);
        assert_eq!(found[1].size, 2);
    }

    #[test]
    fn test_recursive_listing_with_dirs() {
        let dir = fixture();
        let mut scope = Scope::new(dir.path());
        scope.recursive = true;
        scope.include_directories = true;
        let found = enumerate(&scope, &CancelToken::new()).unwrap();
        assert_eq!(
            paths(&found),
            vec!["a.JPG", "b.txt", "sub", "sub/c.txt", "sub/deeper", "sub/deeper/d.txt"]
        );
        let deep = found.iter().find(|c| c.relative_path == "sub/deeper/d.txt").unwrap();
        assert_eq!(deep.depth, 2);
    }

    #[test]
    fn test_max_depth_and_hidden() {
        let dir = fixture();
        let mut scope = Scope::new(dir.path());
        scope.recursive = true;
        scope.include_hidden = true;
        scope.max_depth = 1;
        let found = enumerate(&scope, &CancelToken::new()).unwrap();
        assert_eq!(
            paths(&found),
            vec![".git/config", ".hidden", "a.JPG", "b.txt", "sub/c.txt"]
        );
    }

    #[test]
    fn test_extension_filter_is_case_insensitive() {
        let dir = fixture();
        let mut scope = Scope::new(dir.path());
        scope.recursive = true;
        scope.extensions = parse_extensions(".jpg|.JPG").unwrap();
        assert_eq!(scope.extensions, vec![".jpg".to_string()]);
        let found = enumerate(&scope, &CancelToken::new()).unwrap();
        assert_eq!(paths(&found), vec!["a.JPG"]);
    }

    #[test]
    fn test_parse_extensions_rejects_bad_tokens() {
        assert!(matches!(parse_extensions(".a||.b"), Err(ScopeError::EmptyExtension)));
        assert!(matches!(parse_extensions("txt"), Err(ScopeError::MissingDot(_))));
        assert!(parse_extensions("  ").unwrap().is_empty());
    }

    #[test]
    fn test_cancelled_enumeration_stops() {
        let dir = fixture();
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(enumerate(&Scope::new(dir.path()), &cancel).is_err());
    }

    #[test]
    fn test_resolve_working_dir_rejects_files() {
        let dir = fixture();
        assert!(resolve_working_dir(Some(&dir.path().join("b.txt"))).is_err());
        let resolved = resolve_working_dir(Some(dir.path())).unwrap();
        assert!(resolved.is_absolute());
    }
}

//! File enumeration by glob pattern.
//!
//! Patterns are resolved against a root directory and matched fresh on every
//! call; nothing is cached between cycles.

use std::{
    fs,
    path::{Component, Path, PathBuf},
};

use glob::{MatchOptions, Pattern};
use pagewright_core::ContentFile;
use thiserror::Error;
use tracing::{debug, trace};

/// Enumeration errors.
#[derive(Debug, Error)]
pub enum EnumerateError {
    /// The glob pattern does not parse.
    #[error("invalid glob pattern {pattern}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// A matched path could not be inspected or read.
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for enumeration.
pub type Result<T> = std::result::Result<T, EnumerateError>;

pub(crate) fn match_options() -> MatchOptions {
    MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        // hidden files are never content
        require_literal_leading_dot: true,
    }
}

/// Return every path under `root` matching `pattern`, in matcher order.
pub fn matching_paths(root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full = format!(
        "{}/{}",
        Pattern::escape(&root.to_string_lossy()),
        pattern.trim_start_matches("./")
    );

    let entries = glob::glob_with(&full, match_options()).map_err(|source| {
        EnumerateError::Pattern {
            pattern: pattern.to_string(),
            source,
        }
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| EnumerateError::Io {
            path: e.path().to_path_buf(),
            source: e.into_error(),
        })?;
        trace!(path = %path.display(), "matched");
        paths.push(path);
    }

    debug!(pattern, count = paths.len(), "enumerated paths");
    Ok(paths)
}

/// Read every file under `root` matching `pattern`.
///
/// Directories that happen to match are skipped. A path that vanishes
/// between matching and reading is an error.
pub fn read_matching(root: &Path, pattern: &str) -> Result<Vec<ContentFile>> {
    let mut files = Vec::new();

    for path in matching_paths(root, pattern)? {
        let io_err = |source| EnumerateError::Io {
            path: path.clone(),
            source,
        };

        if fs::metadata(&path).map_err(io_err)?.is_dir() {
            continue;
        }

        let contents = fs::read_to_string(&path).map_err(io_err)?;
        files.push(ContentFile {
            path: relative_display(root, &path),
            contents,
        });
    }

    Ok(files)
}

/// Directory prefix of a glob, up to the first wildcard component.
pub fn glob_base(pattern: &str) -> String {
    pattern
        .trim_start_matches("./")
        .split('/')
        .take_while(|c| !c.contains(['*', '?', '[', '{']))
        .collect::<Vec<_>>()
        .join("/")
}

/// Render `path` relative to `root` with `/` separators.
pub fn relative_display(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            Component::ParentDir => Some("..".into()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

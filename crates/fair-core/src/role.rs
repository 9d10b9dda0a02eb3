//! Role path helpers.
//!
//! A role path is a slash-delimited sequence of non-empty segments
//! (`"eng"`, `"eng/ml/training"`). Framework ids without slashes are
//! single-segment paths.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoleError {
    #[error("role path is empty")]
    Empty,

    #[error("role path '{0}' has an empty segment")]
    EmptySegment(String),

    #[error("role path '{0}' contains a '.' or '..' segment")]
    RelativeSegment(String),

    #[error("role path '{0}' contains whitespace")]
    Whitespace(String),
}

/// Check that `path` is a well-formed role path.
pub fn validate(path: &str) -> Result<(), RoleError> {
    if path.is_empty() {
        return Err(RoleError::Empty);
    }
    if path.chars().any(char::is_whitespace) {
        return Err(RoleError::Whitespace(path.to_string()));
    }
    for segment in path.split('/') {
        match segment {
            "" => return Err(RoleError::EmptySegment(path.to_string())),
            "." | ".." => return Err(RoleError::RelativeSegment(path.to_string())),
            _ => {}
        }
    }
    Ok(())
}

/// The parent path, or `None` for a top-level path.
pub fn parent(path: &str) -> Option<&str> {
    path.rsplit_once('/').map(|(parent, _)| parent)
}

/// `path` and each of its ancestors, most specific first.
///
/// `"a/b/c"` yields `"a/b/c"`, `"a/b"`, `"a"`.
pub fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    std::iter::successors(Some(path), |p| parent(p))
}

/// Each prefix of `path`, root first.
///
/// `"a/b/c"` yields `"a"`, `"a/b"`, `"a/b/c"`.
pub fn prefixes(path: &str) -> impl Iterator<Item = &str> {
    path.match_indices('/')
        .map(move |(idx, _)| &path[..idx])
        .chain(std::iter::once(path))
}

/// True if `path` equals `root` or lies in the subtree rooted at `root`.
pub fn is_at_or_below(path: &str, root: &str) -> bool {
    match path.strip_prefix(root) {
        Some("") => true,
        Some(rest) => rest.starts_with('/'),
        None => false,
    }
}

#![forbid(unsafe_code)]

pub const ROOT_PATH: &str = "/";

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("path must not be empty")]
    Empty,
    #[error("path segment {segment:?} is not allowed in {path}")]
    InvalidSegment { path: String, segment: String },
    #[error("path contains control characters: {0:?}")]
    ContainsControl(String),
    #[error("the repository root has no parent")]
    RootHasNoParent,
}

/// Canonical form: leading `/`, single separators, no trailing `/`.
pub fn normalize_path(raw: &str) -> Result<String, PathError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PathError::Empty);
    }
    if trimmed.chars().any(char::is_control) {
        return Err(PathError::ContainsControl(trimmed.to_string()));
    }

    let mut out = String::with_capacity(trimmed.len() + 1);
    for segment in trimmed.split('/').filter(|s| !s.is_empty()) {
        if segment == "." || segment == ".." {
            return Err(PathError::InvalidSegment {
                path: trimmed.to_string(),
                segment: segment.to_string(),
            });
        }
        out.push('/');
        out.push_str(segment);
    }

    if out.is_empty() {
        out.push('/');
    }
    Ok(out)
}

/// Splits a normalized path into its parent path and last segment.
pub fn split_path(path: &str) -> Result<(&str, &str), PathError> {
    if path == ROOT_PATH {
        return Err(PathError::RootHasNoParent);
    }
    match path.rfind('/') {
        Some(0) => Ok((ROOT_PATH, &path[1..])),
        Some(idx) => Ok((&path[..idx], &path[idx + 1..])),
        None => Err(PathError::InvalidSegment {
            path: path.to_string(),
            segment: path.to_string(),
        }),
    }
}

pub fn join_path(parent: &str, name: &str) -> String {
    if parent == ROOT_PATH {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_separators() {
        assert_eq!(normalize_path("trunk//src/").unwrap(), "/trunk/src");
        assert_eq!(normalize_path(" /a ").unwrap(), "/a");
        assert_eq!(normalize_path("/").unwrap(), "/");
        assert_eq!(normalize_path("///").unwrap(), "/");
    }

    #[test]
    fn normalize_rejects_bad_input() {
        assert_eq!(normalize_path("  ").unwrap_err(), PathError::Empty);
        assert!(matches!(
            normalize_path("/a/../b").unwrap_err(),
            PathError::InvalidSegment { .. }
        ));
        assert!(matches!(
            normalize_path("/a/\u{0007}").unwrap_err(),
            PathError::ContainsControl(_)
        ));
    }

    #[test]
    fn split_and_join() {
        assert_eq!(split_path("/trunk").unwrap(), ("/", "trunk"));
        assert_eq!(split_path("/trunk/a.txt").unwrap(), ("/trunk", "a.txt"));
        assert_eq!(split_path("/").unwrap_err(), PathError::RootHasNoParent);
        assert_eq!(join_path("/", "trunk"), "/trunk");
        assert_eq!(join_path("/trunk", "a.txt"), "/trunk/a.txt");
    }
}

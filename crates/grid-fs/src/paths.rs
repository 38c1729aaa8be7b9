//! Path normalization for the facade.
//!
//! Every public operation normalizes its path arguments before anything else
//! touches the cache or the wire: collapse repeated separators, strip
//! trailing separators, resolve relative paths against the account's home
//! collection. Parent traversal is rejected outright.

use grid_wire::GridError;

/// Normalize `path` into an absolute, canonical form.
///
/// Relative paths are resolved against `home`. Returns `InvalidArgument` for
/// empty paths and for any path containing a `..` segment.
pub fn normalize(path: &str, home: &str) -> Result<String, GridError> {
    if path.is_empty() {
        return Err(GridError::InvalidArgument("empty path".into()));
    }

    let absolute = if path.starts_with('/') {
        path.to_owned()
    } else {
        format!("{home}/{path}")
    };

    let mut segments = Vec::new();
    for segment in absolute.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                return Err(GridError::InvalidArgument(format!(
                    "parent traversal in path {path:?}"
                )));
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return Ok("/".to_owned());
    }
    Ok(format!("/{}", segments.join("/")))
}

/// Parent of a normalized path; the root is its own parent.
#[must_use]
pub fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

/// Last segment of a normalized path.
#[must_use]
pub fn basename(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Append `name` to a normalized directory path.
#[must_use]
pub fn join(dir: &str, name: &str) -> String {
    if dir == "/" {
        format!("/{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// Whether `path` lies at or under `ancestor` (both normalized).
#[must_use]
pub fn is_descendant_or_self(path: &str, ancestor: &str) -> bool {
    path == ancestor
        || (path.starts_with(ancestor)
            && (ancestor == "/" || path.as_bytes().get(ancestor.len()) == Some(&b'/')))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOME: &str = "/zone/home/rods";

    #[test]
    fn absolute_paths_are_canonicalized() {
        assert_eq!(normalize("/zone//home/rods/", HOME).unwrap(), "/zone/home/rods");
        assert_eq!(normalize("/zone/./x", HOME).unwrap(), "/zone/x");
        assert_eq!(normalize("/", HOME).unwrap(), "/");
        assert_eq!(normalize("///", HOME).unwrap(), "/");
    }

    #[test]
    fn relative_paths_resolve_against_home() {
        assert_eq!(normalize("data/f.txt", HOME).unwrap(), "/zone/home/rods/data/f.txt");
        assert_eq!(normalize(".", HOME).unwrap(), HOME);
    }

    #[test]
    fn parent_traversal_is_rejected() {
        assert!(matches!(
            normalize("/zone/../etc", HOME),
            Err(GridError::InvalidArgument(_))
        ));
        assert!(matches!(
            normalize("..", HOME),
            Err(GridError::InvalidArgument(_))
        ));
    }

    #[test]
    fn dirname_and_basename() {
        assert_eq!(dirname("/zone/home/rods"), "/zone/home");
        assert_eq!(dirname("/zone"), "/");
        assert_eq!(dirname("/"), "/");
        assert_eq!(basename("/zone/home/rods"), "rods");
        assert_eq!(basename("/"), "");
    }

    #[test]
    fn descendant_check_respects_segment_boundaries() {
        assert!(is_descendant_or_self("/a/b/c", "/a/b"));
        assert!(is_descendant_or_self("/a/b", "/a/b"));
        assert!(!is_descendant_or_self("/a/bc", "/a/b"));
        assert!(is_descendant_or_self("/a", "/"));
    }
}

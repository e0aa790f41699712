//! Pure string algorithms over '/'-separated paths.
//!
//! Node identity in the dependency graph is the *normalized path string*,
//! so two spellings of the same file collapse to one node. Everything here
//! is text manipulation; actual filesystem probes live in [`crate::resolve`]
//! and [`crate::scan`].

use crate::error::{Error, Result};

/// Collapse `//`, `/./` and `seg/../` in `path`.
///
/// A `..` that would climb past the front of a relative path is an error;
/// on an absolute path it collapses against the root instead.
pub fn normalize(path: &str) -> Result<String> {
    let absolute = path.starts_with('/');
    let mut segs: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                if segs.pop().is_none() && !absolute {
                    return Err(Error::PathEscape(path.to_string()));
                }
            }
            s => segs.push(s),
        }
    }
    let joined = segs.join("/");
    Ok(if absolute {
        format!("/{joined}")
    } else {
        joined
    })
}

/// Directory part of `path`: everything before the final '/'.
/// A bare filename lives in `"."`.
pub fn dirname(path: &str) -> String {
    match path.rfind('/') {
        Some(0) => "/".to_string(),
        Some(pos) => path[..pos].to_string(),
        None => ".".to_string(),
    }
}

/// Final component of `path`.
pub fn file_tail(path: &str) -> &str {
    match path.rfind('/') {
        Some(pos) => &path[pos + 1..],
        None => path,
    }
}

pub fn join(dir: &str, name: &str) -> String {
    format!("{dir}/{name}")
}

/// Remove `prefix` (and one separating '/') from the front of `path`,
/// when present. An empty prefix strips nothing.
pub fn strip_prefix(path: &str, prefix: &str) -> String {
    if prefix.is_empty() {
        return path.to_string();
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.strip_prefix('/').unwrap_or(rest).to_string(),
        None => path.to_string(),
    }
}

/// Drop trailing slashes, keeping at least one character.
pub fn trim_trailing_slashes(path: &str) -> String {
    let mut s = path;
    while s.len() > 1 && s.ends_with('/') {
        s = &s[..s.len() - 1];
    }
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_dot_segments() {
        assert_eq!(normalize("a/./b").unwrap(), "a/b");
        assert_eq!(normalize("./x.cc").unwrap(), "x.cc");
    }

    #[test]
    fn normalize_collapses_parent_segments() {
        assert_eq!(normalize("a/b/../c").unwrap(), "a/c");
        assert_eq!(normalize("a/b/c/../../d").unwrap(), "a/d");
    }

    #[test]
    fn normalize_collapses_double_slashes() {
        assert_eq!(normalize("a//b").unwrap(), "a/b");
        assert_eq!(normalize("a///b/").unwrap(), "a/b");
    }

    #[test]
    fn normalize_rejects_leading_parent_on_relative_paths() {
        assert!(normalize("../x").is_err());
        assert!(normalize("a/../../x").is_err());
    }

    #[test]
    fn normalize_clamps_parent_at_absolute_root() {
        assert_eq!(normalize("/a/../b").unwrap(), "/b");
        assert_eq!(normalize("/../x").unwrap(), "/x");
    }

    #[test]
    fn dirname_of_bare_name_is_dot() {
        assert_eq!(dirname("x.cc"), ".");
        assert_eq!(dirname("a/b/x.cc"), "a/b");
        assert_eq!(dirname("/x.cc"), "/");
    }

    #[test]
    fn strip_prefix_eats_separator() {
        assert_eq!(strip_prefix("src/a/x", "src"), "a/x");
        assert_eq!(strip_prefix("src/a/x", ""), "src/a/x");
        assert_eq!(strip_prefix("other/x", "src"), "other/x");
    }

    #[test]
    fn trim_trailing_slashes_keeps_root() {
        assert_eq!(trim_trailing_slashes("src///"), "src");
        assert_eq!(trim_trailing_slashes("/"), "/");
    }
}

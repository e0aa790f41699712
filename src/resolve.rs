//! Search-path resolution for one raw `#include` string.
//!
//! Resolution probes the filesystem in a fixed priority order; the first
//! path that exists wins. Literal-extension handling and phantom nodes are
//! layered on top of this in [`crate::graph::session`].

use std::path::Path;

use crate::paths;

fn exists(candidate: &str) -> bool {
    Path::new(candidate).exists()
}

/// Find the on-disk path an include named `name` refers to, relative to a
/// file living in `includer_dir`, against `search` path entries.
///
/// Priority order:
/// 1. each search entry joined with `name`;
/// 2. the includer's own directory;
/// 3. each relative search entry re-anchored at the includer's directory;
/// 4. `name` itself, against the working directory.
pub fn locate(includer_dir: &str, name: &str, search: &[String]) -> Option<String> {
    for dir in search {
        let candidate = paths::join(dir, name);
        if exists(&candidate) {
            return Some(candidate);
        }
    }

    let candidate = paths::join(includer_dir, name);
    if exists(&candidate) {
        return Some(candidate);
    }

    for dir in search {
        if dir.starts_with('/') {
            continue;
        }
        let candidate = paths::join(&paths::join(includer_dir, dir), name);
        if exists(&candidate) {
            return Some(candidate);
        }
    }

    if exists(name) {
        return Some(name.to_string());
    }
    None
}

//! Graph records: file nodes, link groups, and their arena handles.
//!
//! Nodes live in a flat arena owned by [`crate::graph::Session`]; all
//! cross-references are u32 handles rather than pointers, so merged link
//! groups can be replaced by repointing members.

use crate::config::Config;
use crate::paths;

/// Handle into the session's node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub(crate) u32);

impl FileId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle into the session's group arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub(crate) u32);

impl GroupId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn raw(self) -> u32 {
        self.0
    }
}

/// Compile-closure scan state, for detecting `#include` recursion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    NotStarted,
    InProgress,
    Complete,
}

/// One file known to the graph, keyed by its normalized path.
///
/// The four dependency lists are memoized on first demand; `None` means
/// "not computed yet". Phantom nodes stand for `<...>` includes recorded
/// without a filesystem check, literal nodes for includes matched by
/// extension alone.
#[derive(Debug)]
pub struct FileNode {
    path: String,
    rootname: String,
    stripped: String,
    extension: String,
    dir: String,
    pub(crate) literal: bool,
    pub(crate) phantom: bool,
    pruned: bool,
    pub(crate) header_only: bool,
    pub(crate) parse_state: ParseState,
    pub(crate) direct_cdeps: Option<Vec<FileId>>,
    pub(crate) nested_cdeps: Option<Vec<FileId>>,
    pub(crate) direct_ldeps: Option<Vec<FileId>>,
    pub(crate) nested_ldeps: Option<Vec<FileId>>,
    pub(crate) group: Option<GroupId>,
    /// Visit stamp for the link-closure worklist.
    pub(crate) epoch: u32,
}

impl FileNode {
    pub(crate) fn new(path: String, config: &Config) -> Self {
        let dot = path.rfind('.').unwrap_or(path.len());
        let rootname = path[..dot].to_string();
        let extension = path[dot..].to_string();
        let stripped = paths::strip_prefix(&rootname, &config.strip_prefix);
        let dir = paths::dirname(&path);
        let pruned = is_pruned_path(&path, &extension, config);
        Self {
            path,
            rootname,
            stripped,
            extension,
            dir,
            literal: false,
            phantom: false,
            pruned,
            header_only: false,
            parse_state: ParseState::NotStarted,
            direct_cdeps: None,
            nested_cdeps: None,
            direct_ldeps: None,
            nested_ldeps: None,
            group: None,
            epoch: 0,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path minus extension.
    pub fn rootname(&self) -> &str {
        &self.rootname
    }

    /// Rootname with the configured strip-prefix removed; the stem used
    /// for object-file targets.
    pub fn stripped_name(&self) -> &str {
        &self.stripped
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn dir(&self) -> &str {
        &self.dir
    }

    pub fn is_phantom(&self) -> bool {
        self.phantom
    }

    pub fn is_literal(&self) -> bool {
        self.literal
    }

    pub fn is_pruned(&self) -> bool {
        self.pruned
    }

    pub fn is_header_only(&self) -> bool {
        self.header_only
    }

    pub fn is_source_file(&self, config: &Config) -> bool {
        config.source_exts.iter().any(|e| *e == self.extension)
    }

    pub fn is_header_file(&self, config: &Config) -> bool {
        config.header_exts.iter().any(|e| *e == self.extension)
    }

    pub fn is_source_or_header(&self, config: &Config) -> bool {
        self.is_source_file(config) || self.is_header_file(config)
    }
}

fn is_pruned_path(path: &str, extension: &str, config: &Config) -> bool {
    for dir in &config.prune_dirs {
        if path.contains(&format!("{dir}/")) {
            return true;
        }
    }
    config.prune_exts.iter().any(|e| e == extension)
}

/// A set of translation units that must be linked together because their
/// link dependencies are mutually recursive. Every unit starts in a
/// singleton group; cycles merge groups.
#[derive(Debug)]
pub struct LinkGroup {
    pub(crate) members: Vec<FileId>,
    /// Memoized topological level; `None` until first demanded.
    pub(crate) level: Option<u32>,
}

impl LinkGroup {
    pub(crate) fn singleton(member: FileId) -> Self {
        Self {
            members: vec![member],
            level: None,
        }
    }

    pub fn members(&self) -> &[FileId] {
        &self.members
    }
}

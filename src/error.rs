//! Error types for dependency analysis.
//!
//! Every fatal condition is a variant here; the library propagates them with
//! `?` and the binary turns them into a message on stderr plus a non-zero
//! exit. Non-fatal conditions (unresolvable includes, compile cycles) are
//! reported through `tracing` instead and never reach this type.

use std::io;

use thiserror::Error;

use crate::paths;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A `..` segment would escape the front of a relative path.
    #[error("used '../' at beginning of path: '{0}'")]
    PathEscape(String),

    /// An opened `#include` delimiter was never closed before end-of-file.
    #[error("in {file}: premature end-of-file; runaway #include directive?")]
    RunawayInclude { file: String },

    /// A format spec did not match `(group,)? prefix : pattern...`.
    #[error("invalid format spec (missing colon): '{0}'")]
    InvalidFormatSpec(String),

    /// `transform_strict` found no matching pattern for a source file.
    #[error("no {set} pattern matched source file: {file}")]
    UnmatchedFormat { set: String, file: String },

    /// A `--srcdir` argument that does not exist on disk.
    #[error("no such source file: '{0}'")]
    MissingSource(String),

    #[error("no source directories specified (use --srcdir)")]
    NoSourceDirs,

    #[error("couldn't read options file {path}: {source}")]
    OptionsFile { path: String, source: io::Error },

    #[error("missing argument for --options-file")]
    MissingOptionsFileArg,

    #[error("couldn't read directory {path}: {source}")]
    ReadDir { path: String, source: io::Error },

    /// Open/stat failure on an explicitly named input, with best-effort
    /// extra diagnosis appended (e.g. an editor placeholder symlink).
    #[error("couldn't open {path}: {source}{hint}")]
    Open {
        path: String,
        source: io::Error,
        hint: String,
    },

    #[error("couldn't mmap {path}: {source}")]
    Map { path: String, source: io::Error },

    #[error("output error: {0}")]
    Output(#[from] io::Error),
}

impl Error {
    pub(crate) fn open(path: &str, source: io::Error) -> Self {
        Error::Open {
            path: path.to_string(),
            source,
            hint: diagnose_open_failure(path),
        }
    }
}

/// Assuming an open on `path` has already failed, try to say something more
/// useful than the raw errno. An emacs autosave placeholder is a dangling
/// symlink named `.#<file>`; hitting one usually means an unsaved buffer.
fn diagnose_open_failure(path: &str) -> String {
    let meta = match std::fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(_) => return String::new(),
    };
    if !meta.file_type().is_symlink() {
        return String::new();
    }
    let target = match std::fs::read_link(path) {
        Ok(t) => t,
        Err(_) => return String::new(),
    };

    let tail = paths::file_tail(path);
    if let Some(real) = tail.strip_prefix(".#") {
        return format!(
            "\n\t(make sure you have saved all your editor buffers;\
             \n\t {} appears to be an editor placeholder\
             \n\t for the unsaved file {}/{} pointing to\
             \n\t {})",
            path,
            paths::dirname(path),
            real,
            target.display()
        );
    }
    String::new()
}

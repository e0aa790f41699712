//! `#include` extraction from a single memory-mapped file.
//!
//! The scan is byte-level and deliberately not a preprocessor: comments and
//! disabled `#if` blocks are not interpreted, so a commented-out include
//! still counts as a dependency. The result is at worst pessimistic, which
//! is the safe direction for build rules.

use std::fs::File;
use std::time::SystemTime;

use memmap2::Mmap;
use tracing::{trace, warn};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeKind {
    /// `#include "name"`
    Quoted,
    /// `#include <name>`
    Angled,
}

#[derive(Debug, Clone)]
pub struct Include {
    pub name: String,
    pub kind: IncludeKind,
}

/// Map `path` and extract its include directives in file order.
///
/// Angle-bracket directives are only recognized when `accept_angle` is set;
/// otherwise the line is skipped without recording anything. A modification
/// time later than `start_time` draws a clock-skew warning, since a file
/// changing mid-scan can make the emitted rules stale on arrival.
pub fn scan_includes(
    path: &str,
    accept_angle: bool,
    start_time: SystemTime,
) -> Result<Vec<Include>> {
    let file = File::open(path).map_err(|e| Error::open(path, e))?;
    let meta = file.metadata().map_err(|e| Error::open(path, e))?;
    if let Ok(mtime) = meta.modified() {
        if mtime > start_time {
            warn!(file = %path, "modification time is in the future (clock skew?)");
        }
    }
    if meta.len() == 0 {
        return Ok(Vec::new());
    }
    // Safety: read-only private mapping; sources are not expected to be
    // truncated while a scan is in flight.
    let map = unsafe { Mmap::map(&file) }.map_err(|e| Error::Map {
        path: path.to_string(),
        source: e,
    })?;
    let found = extract(path, &map, accept_angle)?;
    trace!(file = %path, count = found.len(), "scanned includes");
    Ok(found)
}

/// The actual scan, separated from I/O so it is testable on raw bytes.
///
/// A directive is a line whose first byte is `#`, followed by optional
/// whitespace, the literal `include`, optional whitespace, and a `"` or `<`
/// delimiter. An opened delimiter that never closes before end-of-file is
/// fatal: it almost always means a corrupt or truncated source.
fn extract(path: &str, bytes: &[u8], accept_angle: bool) -> Result<Vec<Include>> {
    const TOKEN: &[u8] = b"include";

    let mut found = Vec::new();
    let n = bytes.len();
    let mut p = 0usize;
    let mut first = true;
    'lines: loop {
        if !first {
            while p < n && bytes[p] != b'\n' {
                p += 1;
            }
            if p == n {
                break;
            }
            p += 1;
        }
        first = false;
        if p >= n {
            break;
        }

        if bytes[p] != b'#' {
            continue 'lines;
        }
        p += 1;
        while p < n && bytes[p].is_ascii_whitespace() {
            p += 1;
        }
        if p + TOKEN.len() > n || &bytes[p..p + TOKEN.len()] != TOKEN {
            continue 'lines;
        }
        p += TOKEN.len();
        while p < n && bytes[p].is_ascii_whitespace() {
            p += 1;
        }
        if p >= n {
            break;
        }
        let kind = match bytes[p] {
            b'"' => IncludeKind::Quoted,
            b'<' if accept_angle => IncludeKind::Angled,
            _ => continue 'lines,
        };
        p += 1;
        let close = match kind {
            IncludeKind::Quoted => b'"',
            IncludeKind::Angled => b'>',
        };
        let start = p;
        while p < n && bytes[p] != close {
            p += 1;
        }
        if p >= n {
            return Err(Error::RunawayInclude {
                file: path.to_string(),
            });
        }
        found.push(Include {
            name: String::from_utf8_lossy(&bytes[start..p]).into_owned(),
            kind,
        });
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn names(src: &str, accept_angle: bool) -> Vec<String> {
        extract("test.cc", src.as_bytes(), accept_angle)
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect()
    }

    #[test]
    fn finds_quoted_includes_in_file_order() {
        let src = "#include \"a.h\"\nint x;\n#include \"b.h\"\n";
        assert_eq!(names(src, false), vec!["a.h", "b.h"]);
    }

    #[test]
    fn hash_must_start_the_line() {
        let src = "  #include \"a.h\"\nx; #include \"b.h\"\n";
        assert!(names(src, false).is_empty());
    }

    #[test]
    fn whitespace_around_token_is_allowed() {
        let src = "#  include   \"a.h\"\n#\tinclude\t\"b.h\"\n";
        assert_eq!(names(src, false), vec!["a.h", "b.h"]);
    }

    #[test]
    fn angled_includes_are_gated() {
        let src = "#include <sys/types.h>\n#include \"a.h\"\n";
        assert_eq!(names(src, false), vec!["a.h"]);

        let all = extract("test.cc", src.as_bytes(), true).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].kind, IncludeKind::Angled);
        assert_eq!(all[0].name, "sys/types.h");
        assert_eq!(all[1].kind, IncludeKind::Quoted);
    }

    #[test]
    fn commented_out_includes_still_count() {
        // The scanner is not a preprocessor.
        let src = "// #include \"dead.h\"\n#include \"live.h\"\n#if 0\n#include \"gated.h\"\n#endif\n";
        assert_eq!(names(src, false), vec!["live.h", "gated.h"]);
    }

    #[test]
    fn unclosed_delimiter_is_fatal() {
        let src = "#include \"never-closed.h\n";
        assert!(matches!(
            extract("test.cc", src.as_bytes(), false),
            Err(Error::RunawayInclude { .. })
        ));
    }

    #[test]
    fn non_include_directives_are_skipped() {
        let src = "#pragma once\n#define X 1\n#include \"a.h\"\n";
        assert_eq!(names(src, false), vec!["a.h"]);
    }

    #[test]
    fn scan_includes_reads_a_real_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.cc");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "#include \"y.h\"").unwrap();
        drop(f);

        let found =
            scan_includes(path.to_str().unwrap(), false, SystemTime::now()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "y.h");
    }

    #[test]
    fn empty_file_scans_clean() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.h");
        std::fs::File::create(&path).unwrap();
        let found =
            scan_includes(path.to_str().unwrap(), false, SystemTime::now()).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn missing_file_is_fatal() {
        assert!(scan_includes("no/such/file.cc", false, SystemTime::now()).is_err());
    }
}

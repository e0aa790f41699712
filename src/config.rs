//! Run configuration: search paths, extension classes, output selection.
//!
//! A [`Config`] is assembled by the CLI (or directly by tests), then
//! [`Config::finalize`] fills the defaults that depend on what was left
//! unset. After that it is read-only for the rest of the run.

use std::collections::VecDeque;
use std::fs;
use std::time::SystemTime;

use crate::error::{Error, Result};
use crate::format::FormatSet;

/// Bit set selecting which outputs a run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutputMode(u32);

impl OutputMode {
    /// One `file --> includes` line per scanned source or header.
    pub const DIRECT_CDEPS: Self = Self(1 << 0);
    /// Makefile compile rules, one per translation unit (the default).
    pub const COMPILE_DEPS: Self = Self(1 << 1);
    /// Makefile link rules driven by the format sets.
    pub const LINK_DEPS: Self = Self(1 << 2);
    pub const LDEP_GROUPS: Self = Self(1 << 3);
    pub const LDEP_LEVELS: Self = Self(1 << 4);
    pub const LDEP_LEVELSV: Self = Self(1 << 5);
    pub const LDEP_ADJACENCY: Self = Self(1 << 6);
    pub const LDEP_RAW: Self = Self(1 << 7);

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True when any of the link-dependency report modes is selected.
    pub fn wants_ldep_report(self) -> bool {
        self.contains(Self(
            Self::LDEP_GROUPS.0
                | Self::LDEP_LEVELS.0
                | Self::LDEP_LEVELSV.0
                | Self::LDEP_ADJACENCY.0
                | Self::LDEP_RAW.0,
        ))
    }
}

/// Diagnostic volume, from `--verbosity`. Levels below `Normal` suppress
/// warnings; levels above enable progressively chattier tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Silent,
    Quiet,
    Normal,
    Verbose,
    Noisy,
}

impl Verbosity {
    pub fn from_level(level: i32) -> Self {
        match level {
            i32::MIN..=-1 => Verbosity::Silent,
            0 => Verbosity::Quiet,
            1 => Verbosity::Normal,
            2 => Verbosity::Verbose,
            _ => Verbosity::Noisy,
        }
    }

    /// Default `tracing` filter directive for this level.
    pub fn env_filter(self) -> &'static str {
        match self {
            Verbosity::Silent | Verbosity::Quiet => "error",
            Verbosity::Normal => "warn",
            Verbosity::Verbose => "info",
            Verbosity::Noisy => "trace",
        }
    }
}

#[derive(Debug)]
pub struct Config {
    /// Directories searched for `#include "..."`, in order.
    pub user_ipath: Vec<String>,
    /// Directories searched for `#include <...>` under `--checksys`.
    pub sys_ipath: Vec<String>,
    /// Extensions whose includes are recorded verbatim, never opened.
    pub literal_exts: Vec<String>,
    pub source_exts: Vec<String>,
    pub header_exts: Vec<String>,
    /// Object suffixes emitted as compile-rule targets.
    pub obj_exts: Vec<String>,
    /// Prepended to every compile-rule target, with a trailing '/'.
    pub obj_prefix: String,
    pub exe_formats: FormatSet,
    pub link_formats: FormatSet,
    pub phantom_link_formats: FormatSet,
    /// Resolve `<...>` includes against `sys_ipath`; a miss is a warning.
    pub check_sys_deps: bool,
    /// Record `<...>` includes as phantom nodes without touching the
    /// filesystem (the default; turned off by `--checksys`).
    pub phantom_sys_deps: bool,
    pub verbosity: Verbosity,
    pub output_mode: OutputMode,
    /// Extensions excluded from scanning entirely.
    pub prune_exts: Vec<String>,
    /// Directory entry names never descended into.
    pub prune_dirs: Vec<String>,
    /// Removed from the front of rootnames when forming object names.
    pub strip_prefix: String,
    /// Scan start; files modified after this draw a clock-skew warning.
    pub start_time: SystemTime,
}

impl Config {
    pub fn new() -> Self {
        Self {
            user_ipath: Vec::new(),
            sys_ipath: vec!["/usr/include".into(), "/usr/include/linux".into()],
            literal_exts: Vec::new(),
            source_exts: vec![".cc".into(), ".C".into(), ".c".into(), ".cpp".into()],
            header_exts: vec![".h".into(), ".H".into(), ".hh".into(), ".hpp".into()],
            obj_exts: Vec::new(),
            obj_prefix: String::new(),
            exe_formats: FormatSet::new("--exeformat"),
            link_formats: FormatSet::new("--linkformat"),
            phantom_link_formats: FormatSet::new("--phantomlinkformat"),
            check_sys_deps: false,
            phantom_sys_deps: true,
            verbosity: Verbosity::Normal,
            output_mode: OutputMode::default(),
            prune_exts: Vec::new(),
            prune_dirs: vec!["RCS".into(), "CVS".into(), ".svn".into()],
            strip_prefix: String::new(),
            start_time: SystemTime::now(),
        }
    }

    /// Fill the defaults that depend on what the caller left unset.
    pub fn finalize(&mut self) {
        if self.output_mode.is_empty() {
            self.output_mode.insert(OutputMode::COMPILE_DEPS);
        }
        if self.obj_exts.is_empty() {
            self.obj_exts.push(".o".into());
        }
        if !self.obj_prefix.is_empty() && !self.obj_prefix.ends_with('/') {
            self.obj_prefix.push('/');
        }
    }

    /// Comment marker for the generated-file banner: none in raw mode
    /// (the output is fed to other tools line-by-line), `%` for the
    /// MATLAB adjacency dump, `#` otherwise.
    pub fn comment_marker(&self) -> Option<&'static str> {
        if self.output_mode.contains(OutputMode::LDEP_RAW) {
            None
        } else if self.output_mode.contains(OutputMode::LDEP_ADJACENCY) {
            Some("%")
        } else {
            Some("#")
        }
    }

    pub fn ldep_raw_mode(&self) -> bool {
        self.output_mode.contains(OutputMode::LDEP_RAW)
    }

    /// Dump the effective option state to stderr, for `--inspect`.
    pub fn inspect(&self, roots: &[String]) {
        eprintln!("user_ipath: {:?}", self.user_ipath);
        eprintln!("sys_ipath: {:?}", self.sys_ipath);
        eprintln!("sources: {roots:?}");
        eprintln!("source_exts: {:?}", self.source_exts);
        eprintln!("header_exts: {:?}", self.header_exts);
        eprintln!("literal_exts: {:?}", self.literal_exts);
        eprintln!("obj_exts: {:?}", self.obj_exts);
        eprintln!("obj_prefix: '{}'", self.obj_prefix);
        eprintln!("strip_prefix: '{}'", self.strip_prefix);
        eprintln!("prune_dirs: {:?}", self.prune_dirs);
        eprintln!("prune_exts: {:?}", self.prune_exts);
        eprintln!(
            "check_sys_deps: {}, phantom_sys_deps: {}",
            self.check_sys_deps, self.phantom_sys_deps
        );
        eprintln!();
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// Splice `--options-file FILE` arguments into the argument list, before
/// option parsing. One option per line; an argument follows its option on
/// the same line after the first space. `#` lines and blank lines are
/// skipped. Files may nest.
pub fn expand_options_files(args: Vec<String>) -> Result<Vec<String>> {
    let mut out = Vec::new();
    let mut queue: VecDeque<String> = args.into();
    while let Some(arg) = queue.pop_front() {
        if arg == "--options-file" {
            let path = queue.pop_front().ok_or(Error::MissingOptionsFileArg)?;
            out.extend(read_options_file(&path)?);
        } else {
            out.push(arg);
        }
    }
    Ok(out)
}

fn read_options_file(path: &str) -> Result<Vec<String>> {
    let text = fs::read_to_string(path).map_err(|e| Error::OptionsFile {
        path: path.to_string(),
        source: e,
    })?;
    let mut flat = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.split_once(' ') {
            Some((opt, value)) => {
                flat.push(opt.to_string());
                flat.push(value.trim().to_string());
            }
            None => flat.push(line.to_string()),
        }
    }
    expand_options_files(flat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn finalize_fills_defaults() {
        let mut config = Config::new();
        config.finalize();
        assert!(config.output_mode.contains(OutputMode::COMPILE_DEPS));
        assert_eq!(config.obj_exts, vec![".o".to_string()]);
    }

    #[test]
    fn finalize_terminates_obj_prefix() {
        let mut config = Config::new();
        config.obj_prefix = "build/obj".into();
        config.finalize();
        assert_eq!(config.obj_prefix, "build/obj/");
    }

    #[test]
    fn comment_marker_tracks_output_mode() {
        let mut config = Config::new();
        config.finalize();
        assert_eq!(config.comment_marker(), Some("#"));

        config.output_mode = OutputMode::LDEP_ADJACENCY;
        assert_eq!(config.comment_marker(), Some("%"));

        config.output_mode = OutputMode::LDEP_RAW;
        assert_eq!(config.comment_marker(), None);
    }

    #[test]
    fn output_mode_bits_compose() {
        let mut mode = OutputMode::default();
        assert!(mode.is_empty());
        mode.insert(OutputMode::LINK_DEPS);
        mode.insert(OutputMode::LDEP_LEVELS);
        assert!(mode.contains(OutputMode::LINK_DEPS));
        assert!(!mode.contains(OutputMode::COMPILE_DEPS));
        assert!(mode.wants_ldep_report());
    }

    #[test]
    fn verbosity_maps_out_of_range_levels() {
        assert_eq!(Verbosity::from_level(-5), Verbosity::Silent);
        assert_eq!(Verbosity::from_level(1), Verbosity::Normal);
        assert_eq!(Verbosity::from_level(9), Verbosity::Noisy);
    }

    #[test]
    fn options_file_expands_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opts");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "# a comment").unwrap();
        writeln!(f, "--srcdir src").unwrap();
        writeln!(f).unwrap();
        writeln!(f, "--checksys").unwrap();
        drop(f);

        let args = vec![
            "cppdeps".to_string(),
            "--options-file".to_string(),
            path.to_str().unwrap().to_string(),
            "--verbosity".to_string(),
            "2".to_string(),
        ];
        let expanded = expand_options_files(args).unwrap();
        assert_eq!(
            expanded,
            vec!["cppdeps", "--srcdir", "src", "--checksys", "--verbosity", "2"]
        );
    }

    #[test]
    fn options_file_missing_argument_is_an_error() {
        let args = vec!["cppdeps".to_string(), "--options-file".to_string()];
        assert!(expand_options_files(args).is_err());
    }
}

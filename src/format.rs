//! Filename-rewriting format specs for link rules.
//!
//! A spec reads `(group,)? prefix : pattern...`. A formatter matches any
//! source path starting with `prefix`; the matched path's stem (prefix and
//! extension removed) is spliced into each pattern at its `*` wildcard.
//! Later registrations shadow earlier ones, so a set is consulted in
//! reverse order and the first match wins.

use std::cell::Cell;

use tracing::warn;

use crate::error::{Error, Result};

/// One whitespace-separated token of a format spec, with at most one `*`.
#[derive(Debug, Clone)]
pub struct LinkPattern {
    pattern: String,
    wildcard: Option<usize>,
}

impl LinkPattern {
    fn new(pattern: &str) -> Self {
        Self {
            wildcard: pattern.find('*'),
            pattern: pattern.to_string(),
        }
    }

    fn has_wildcard(&self) -> bool {
        self.wildcard.is_some()
    }

    fn substitute(&self, stem: &str) -> String {
        match self.wildcard {
            Some(pos) => {
                let mut out = self.pattern.clone();
                out.replace_range(pos..pos + 1, stem);
                out
            }
            None => self.pattern.clone(),
        }
    }
}

#[derive(Debug)]
pub struct Formatter {
    group: Option<String>,
    prefix: String,
    patterns: Vec<LinkPattern>,
    ever_matched: Cell<bool>,
}

impl Formatter {
    pub fn parse(spec: &str) -> Result<Self> {
        let (group, rest) = match spec.find(',') {
            Some(comma) => (Some(spec[..comma].trim().to_string()), &spec[comma + 1..]),
            None => (None, spec),
        };
        let colon = rest
            .find(':')
            .ok_or_else(|| Error::InvalidFormatSpec(spec.to_string()))?;
        let prefix = rest[..colon].trim().to_string();
        let patterns = rest[colon + 1..]
            .split_whitespace()
            .map(LinkPattern::new)
            .collect();
        Ok(Self {
            group: group.filter(|g| !g.is_empty()),
            prefix,
            patterns,
            ever_matched: Cell::new(false),
        })
    }

    /// Prefix test. Records a hit so unused formatters can be reported
    /// after the run.
    pub fn matches(&self, srcfile: &str) -> bool {
        let hit = srcfile.starts_with(&self.prefix);
        if hit {
            self.ever_matched.set(true);
        }
        hit
    }

    /// Rewrite a matched source path. Wildcard-free specs are emitted
    /// verbatim; otherwise the stem replaces each pattern's `*`.
    pub fn transform(&self, srcfile: &str) -> String {
        if !self.patterns.iter().any(LinkPattern::has_wildcard) {
            return self
                .patterns
                .iter()
                .map(|p| p.pattern.as_str())
                .collect::<Vec<_>>()
                .join(" ");
        }
        let tail = &srcfile[self.prefix.len()..];
        let stem = match tail.rfind('.') {
            Some(pos) => &tail[..pos],
            None => tail,
        };
        self.patterns
            .iter()
            .map(|p| p.substitute(stem))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    fn describe(&self) -> String {
        let pats = self
            .patterns
            .iter()
            .map(|p| p.pattern.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        format!("{}:{}", self.prefix, pats)
    }
}

/// An ordered collection of formatters registered under one option name.
#[derive(Debug)]
pub struct FormatSet {
    name: String,
    formatters: Vec<Formatter>,
}

impl FormatSet {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            formatters: Vec::new(),
        }
    }

    pub fn add(&mut self, spec: &str) -> Result<()> {
        self.formatters.push(Formatter::parse(spec)?);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.formatters.is_empty()
    }

    fn find(&self, srcfile: &str) -> Option<&Formatter> {
        self.formatters.iter().rev().find(|f| f.matches(srcfile))
    }

    /// Rewrite `srcfile` through the most recently registered matching
    /// formatter, or `None` when nothing matches.
    pub fn transform(&self, srcfile: &str) -> Option<String> {
        self.find(srcfile).map(|f| f.transform(srcfile))
    }

    /// Like [`FormatSet::transform`] but also yields the formatter's group
    /// tag, for emitting `group: target` rules.
    pub fn transform_with_group(&self, srcfile: &str) -> Option<(String, Option<String>)> {
        self.find(srcfile)
            .map(|f| (f.transform(srcfile), f.group().map(str::to_string)))
    }

    /// Rewrite `srcfile`, treating a miss as fatal.
    pub fn transform_strict(&self, srcfile: &str) -> Result<String> {
        self.transform(srcfile).ok_or_else(|| Error::UnmatchedFormat {
            set: self.name.clone(),
            file: srcfile.to_string(),
        })
    }

    /// Descriptions of formatters that never matched any source file,
    /// in registration order.
    pub fn never_matched(&self) -> Vec<String> {
        self.formatters
            .iter()
            .filter(|f| !f.ever_matched.get())
            .map(Formatter::describe)
            .collect()
    }

    pub fn warn_never_matched(&self) {
        for desc in self.never_matched() {
            warn!(set = %self.name, spec = %desc, "format spec never matched any source file");
        }
    }
}

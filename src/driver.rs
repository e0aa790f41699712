//! Tree walk and per-file output dispatch.
//!
//! The driver owns a [`Session`] and a list of root files or directories.
//! Directories are expanded onto a worklist with their entries sorted, so a
//! rerun over an unchanged tree emits byte-identical output; files are
//! dispatched to whichever printers the output mode selects. The global
//! link-dependency reports run once, after the walk.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::trace;

use crate::config::{Config, OutputMode, Verbosity};
use crate::error::{Error, Result};
use crate::graph::{FileId, Session};
use crate::paths;
use crate::report;

pub struct Driver {
    session: Session,
    roots: Vec<String>,
}

impl Driver {
    pub fn new(config: Config, roots: Vec<String>) -> Self {
        Self {
            session: Session::new(config),
            roots,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Walk every root and write the selected outputs to `out`.
    pub fn run<W: Write>(&mut self, out: &mut W) -> Result<()> {
        if let Some(marker) = self.session.config().comment_marker() {
            writeln!(
                out,
                "{marker} Do not edit this file! It is automatically generated. Changes will be lost."
            )?;
        }

        let mut worklist: Vec<String> = self.roots.iter().rev().cloned().collect();
        while let Some(current) = worklist.pop() {
            if Path::new(&current).is_dir() {
                trace!(dir = %current, "reading directory");
                let mut entries: Vec<String> = Vec::new();
                let rd = fs::read_dir(&current).map_err(|e| Error::ReadDir {
                    path: current.clone(),
                    source: e,
                })?;
                for entry in rd {
                    let entry = entry.map_err(|e| Error::ReadDir {
                        path: current.clone(),
                        source: e,
                    })?;
                    let name = entry.file_name().to_string_lossy().into_owned();
                    if self.prune_entry(&name) {
                        trace!(dir = %current, entry = %name, "pruned");
                        continue;
                    }
                    entries.push(paths::join(&current, &name));
                }
                entries.sort();
                // LIFO worklist, so push in reverse to visit in sorted order
                for e in entries.into_iter().rev() {
                    worklist.push(e);
                }
            } else {
                self.process_file(&current, out)?;
            }
        }

        self.session.config().exe_formats.warn_never_matched();
        self.session.config().link_formats.warn_never_matched();
        self.session.config().phantom_link_formats.warn_never_matched();

        let mode = self.session.config().output_mode;
        if mode.contains(OutputMode::LDEP_GROUPS) {
            report::dump_groups(&mut self.session, out)?;
        }
        if mode.contains(OutputMode::LDEP_LEVELS) {
            report::dump_levels(&mut self.session, out, false)?;
        }
        if mode.contains(OutputMode::LDEP_LEVELSV) {
            report::dump_levels(&mut self.session, out, true)?;
        }
        if mode.contains(OutputMode::LDEP_ADJACENCY) {
            report::dump_adjacency(&mut self.session, out)?;
        }
        if mode.contains(OutputMode::LDEP_RAW) {
            report::dump_raw(&mut self.session, out)?;
        }
        Ok(())
    }

    fn prune_entry(&self, name: &str) -> bool {
        name == "."
            || name == ".."
            || self.session.config().prune_dirs.iter().any(|d| d == name)
    }

    fn process_file<W: Write>(&mut self, path: &str, out: &mut W) -> Result<()> {
        let id = self.session.get_or_create(path)?;
        let mode = self.session.config().output_mode;
        if mode.contains(OutputMode::DIRECT_CDEPS) {
            self.print_direct_cdeps(id, out)?;
        }
        if mode.contains(OutputMode::COMPILE_DEPS) {
            self.print_compile_rule(id, out)?;
        }
        if mode.contains(OutputMode::LINK_DEPS) {
            self.print_link_rules(id, out)?;
        }
        // the global reports need every unit's link closure on hand
        if mode.wants_ldep_report()
            && self.session.node(id).is_source_file(self.session.config())
        {
            self.session.nested_ldeps(id)?;
        }
        Ok(())
    }

    /// `file --> include include ...` for one scanned source or header.
    fn print_direct_cdeps<W: Write>(&mut self, id: FileId, out: &mut W) -> Result<()> {
        if !self
            .session
            .node(id)
            .is_source_or_header(self.session.config())
        {
            trace!(file = %self.session.node(id).path(), "not a source or header, skipped");
            return Ok(());
        }
        let deps = self.session.direct_cdeps(id)?;
        write!(out, "{} -->", self.session.node(id).path())?;
        for dep in deps {
            if self.session.node(dep).is_phantom() {
                continue;
            }
            write!(out, " {}", self.session.node(dep).path())?;
        }
        writeln!(out)?;
        Ok(())
    }

    /// One Makefile rule per translation unit: every configured object
    /// target, then the unit's full compile closure (minus phantoms).
    fn print_compile_rule<W: Write>(&mut self, id: FileId, out: &mut W) -> Result<()> {
        if !self.session.node(id).is_source_file(self.session.config()) {
            return Ok(());
        }
        let deps = self.session.nested_cdeps(id)?;
        let stem = self.session.node(id).stripped_name().to_string();
        let config = self.session.config();
        let targets: Vec<String> = config
            .obj_exts
            .iter()
            .map(|ext| format!("{}{}{}", config.obj_prefix, stem, ext))
            .collect();
        write!(out, "{}:", targets.join(" "))?;
        for dep in deps {
            if self.session.node(dep).is_phantom() {
                continue;
            }
            write!(out, " {}", self.session.node(dep).path())?;
        }
        writeln!(out)?;
        Ok(())
    }

    /// Link rules for one executable: the group tag rule, an `ALLEXECS`
    /// accumulator line, one rule per linked object (everything in the
    /// unit's link closure run through `--linkformat`), and one rule per
    /// phantom dependency that `--phantomlinkformat` knows a target for.
    fn print_link_rules<W: Write>(&mut self, id: FileId, out: &mut W) -> Result<()> {
        if !self.session.node(id).is_source_file(self.session.config()) {
            return Ok(());
        }
        let srcfile = self.session.node(id).path().to_string();
        let (exe, group) = match self
            .session
            .config()
            .exe_formats
            .transform_with_group(&srcfile)
        {
            Some(found) => found,
            None => {
                // not an executable; at higher verbosity still compute the
                // closure so cycle diagnostics cover the whole tree
                if self.session.config().verbosity >= Verbosity::Verbose {
                    self.session.nested_ldeps(id)?;
                }
                return Ok(());
            }
        };
        if let Some(group) = group {
            writeln!(out, "{group}: {exe}")?;
        }
        writeln!(out, "ALLEXECS += {exe}")?;

        let closure = self.session.nested_ldeps(id)?;
        let mut links: BTreeSet<String> = BTreeSet::new();
        for &dep in &closure {
            let node = self.session.node(dep);
            if node.is_phantom() || node.is_pruned() {
                continue;
            }
            let path = node.path().to_string();
            let target = self.session.config().link_formats.transform_strict(&path)?;
            if !target.is_empty() {
                links.insert(target);
            }
        }
        for target in &links {
            writeln!(out, "{exe}: {target}")?;
        }

        let mut phantoms: BTreeSet<String> = BTreeSet::new();
        for &dep in &closure {
            let node = self.session.node(dep);
            if !node.is_phantom() || node.is_pruned() {
                continue;
            }
            let path = node.path().to_string();
            if let Some(target) = self.session.config().phantom_link_formats.transform(&path) {
                if !target.is_empty() {
                    phantoms.insert(target);
                }
            }
        }
        for target in &phantoms {
            writeln!(out, "{exe}: {target}")?;
        }
        Ok(())
    }
}

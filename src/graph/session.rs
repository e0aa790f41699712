//! The analysis session: node registry plus all dependency computations.
//!
//! A [`Session`] owns the configuration, the file-node arena, and the
//! link-group arena. Every computation is demand-driven and memoized on the
//! node it belongs to, so asking the same question twice is a clone of a
//! small id vector. All dependency lists are sorted by path, which keeps
//! reruns over an unchanged tree byte-identical.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::error::Result;
use crate::paths;
use crate::resolve;
use crate::scan::{self, IncludeKind};

use super::node::{FileId, FileNode, GroupId, LinkGroup, ParseState};

pub struct Session {
    config: Config,
    nodes: Vec<FileNode>,
    index: HashMap<String, FileId>,
    groups: Vec<LinkGroup>,
    /// Bumped once per link-closure traversal; visited nodes are stamped
    /// with the current value instead of being cleared afterwards.
    epoch: u32,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            nodes: Vec::new(),
            index: HashMap::new(),
            groups: Vec::new(),
            epoch: 0,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn node(&self, id: FileId) -> &FileNode {
        &self.nodes[id.index()]
    }

    fn node_mut(&mut self, id: FileId) -> &mut FileNode {
        &mut self.nodes[id.index()]
    }

    /// Intern `raw` as a node, normalizing first so every spelling of a
    /// path maps to the same node.
    pub fn get_or_create(&mut self, raw: &str) -> Result<FileId> {
        let norm = paths::normalize(raw)?;
        if let Some(&id) = self.index.get(&norm) {
            return Ok(id);
        }
        trace!(path = %norm, "new file node");
        let id = FileId(self.nodes.len() as u32);
        self.nodes.push(FileNode::new(norm.clone(), &self.config));
        self.index.insert(norm, id);
        Ok(id)
    }

    pub fn lookup(&self, raw: &str) -> Option<FileId> {
        let norm = paths::normalize(raw).ok()?;
        self.index.get(&norm).copied()
    }

    fn sort_by_path(&self, ids: &mut Vec<FileId>) {
        ids.sort_by(|a, b| self.node(*a).path().cmp(self.node(*b).path()));
        ids.dedup();
    }

    /// Files this one `#include`s, one hop, in directive order.
    ///
    /// Self-includes resolve successfully but add no edge. Quoted includes
    /// that miss every user path fall back to the system path when
    /// `--checksys` is on; angled includes become phantom nodes in phantom
    /// mode without any filesystem check. Anything still unresolved is a
    /// warning, never fatal.
    pub fn direct_cdeps(&mut self, id: FileId) -> Result<Vec<FileId>> {
        if let Some(deps) = &self.node(id).direct_cdeps {
            return Ok(deps.clone());
        }
        let path = self.node(id).path().to_string();
        debug!(file = %path, "scanning direct includes");
        let accept_angle = self.config.check_sys_deps || self.config.phantom_sys_deps;
        let includes = scan::scan_includes(&path, accept_angle, self.config.start_time)?;

        let mut deps: Vec<FileId> = Vec::new();
        'directives: for inc in includes {
            match inc.kind {
                IncludeKind::Quoted => {
                    if let Some(dep) = self.resolve_include(id, &inc.name, false)? {
                        if dep != id {
                            deps.push(dep);
                        }
                        continue 'directives;
                    }
                }
                IncludeKind::Angled => {
                    if self.config.phantom_sys_deps {
                        let dep = self.get_or_create(&inc.name)?;
                        self.node_mut(dep).phantom = true;
                        deps.push(dep);
                        continue 'directives;
                    }
                }
            }
            if self.config.check_sys_deps {
                if let Some(dep) = self.resolve_include(id, &inc.name, true)? {
                    if dep != id {
                        deps.push(dep);
                    }
                    continue 'directives;
                }
            }
            warn!(
                file = %path,
                include = %inc.name,
                search_path = ?self.config.user_ipath,
                "couldn't resolve #include"
            );
        }
        self.node_mut(id).direct_cdeps = Some(deps.clone());
        Ok(deps)
    }

    /// One resolution attempt against either the user or the system search
    /// path, followed by the literal-extension escape hatch.
    fn resolve_include(
        &mut self,
        includer: FileId,
        name: &str,
        system: bool,
    ) -> Result<Option<FileId>> {
        let dir = self.node(includer).dir().to_string();
        let search = if system {
            &self.config.sys_ipath
        } else {
            &self.config.user_ipath
        };
        if let Some(found) = resolve::locate(&dir, name, search) {
            return self.get_or_create(&found).map(Some);
        }
        let literal = self
            .config
            .literal_exts
            .iter()
            .any(|ext| name.ends_with(ext.as_str()));
        if literal {
            let dep = self.get_or_create(name)?;
            self.node_mut(dep).literal = true;
            return Ok(Some(dep));
        }
        Ok(None)
    }

    /// Transitive compile closure of `id`, including `id` itself, sorted
    /// by path.
    ///
    /// Phantom and literal dependencies are included unexpanded. A cycle
    /// back to a file currently being expanded is reported and the edge
    /// skipped; the closure is still correct because the in-progress
    /// ancestor already contributes its own subtree.
    pub fn nested_cdeps(&mut self, id: FileId) -> Result<Vec<FileId>> {
        if let Some(deps) = &self.node(id).nested_cdeps {
            return Ok(deps.clone());
        }
        assert!(
            self.node(id).parse_state != ParseState::InProgress,
            "untrapped #include recursion at {}",
            self.node(id).path()
        );
        assert!(
            !self.node(id).is_phantom(),
            "compile closure demanded for phantom file {}",
            self.node(id).path()
        );
        self.node_mut(id).parse_state = ParseState::InProgress;

        let mut deps: Vec<FileId> = vec![id];
        for dep in self.direct_cdeps(id)? {
            if dep == id {
                continue;
            }
            if self.node(dep).is_phantom() || self.node(dep).is_literal() {
                deps.push(dep);
                continue;
            }
            if self.node(dep).parse_state == ParseState::InProgress {
                warn!(
                    file = %self.node(id).path(),
                    cycle_with = %self.node(dep).path(),
                    "recursive #include cycle"
                );
                continue;
            }
            deps.extend(self.nested_cdeps(dep)?);
        }
        self.sort_by_path(&mut deps);

        let node = self.node_mut(id);
        node.nested_cdeps = Some(deps.clone());
        node.parse_state = ParseState::Complete;
        Ok(deps)
    }

    /// Map a compile-closure member to the translation unit it stands for
    /// at link time: a header maps to its same-rootname source file when
    /// one exists, a phantom maps to itself, and anything else maps to
    /// nothing. Raw mode keeps unmapped files, tagged header-only, so the
    /// raw dump can show the complete graph.
    pub fn find_source_for_header(&mut self, id: FileId) -> Result<Option<FileId>> {
        if self.node(id).is_phantom() {
            return Ok(Some(id));
        }
        let rootname = self.node(id).rootname().to_string();
        for i in 0..self.config.source_exts.len() {
            let candidate = format!("{rootname}{}", self.config.source_exts[i]);
            if std::path::Path::new(&candidate).exists() {
                return self.get_or_create(&candidate).map(Some);
            }
        }
        if self.config.ldep_raw_mode() {
            self.node_mut(id).header_only = true;
            return Ok(Some(id));
        }
        Ok(None)
    }

    /// One-hop link dependencies of a unit: its compile closure mapped
    /// through [`Session::find_source_for_header`], minus itself, sorted.
    /// The unit is also placed in a fresh singleton group the first time.
    pub fn direct_ldeps(&mut self, id: FileId) -> Result<Vec<FileId>> {
        if let Some(deps) = &self.node(id).direct_ldeps {
            return Ok(deps.clone());
        }
        if self.node(id).is_phantom() {
            // Phantoms depend only on themselves and never join a group.
            self.node_mut(id).direct_ldeps = Some(vec![id]);
            return Ok(vec![id]);
        }
        let mut deps: Vec<FileId> = Vec::new();
        for member in self.nested_cdeps(id)? {
            if let Some(unit) = self.find_source_for_header(member)? {
                if unit != id {
                    deps.push(unit);
                }
            }
        }
        self.sort_by_path(&mut deps);
        self.node_mut(id).direct_ldeps = Some(deps.clone());

        if self.node(id).group.is_none() {
            let gid = GroupId(self.groups.len() as u32);
            self.groups.push(LinkGroup::singleton(id));
            self.node_mut(id).group = Some(gid);
        }
        Ok(deps)
    }

    /// Transitive link closure of `root`, in traversal order, including
    /// `root` itself.
    ///
    /// An edge leading back to `root` is a link cycle: the two endpoints'
    /// groups are merged so the cycle is linked as one unit. Visited nodes
    /// are stamped with a per-traversal epoch instead of a cleared flag.
    pub fn nested_ldeps(&mut self, root: FileId) -> Result<Vec<FileId>> {
        if let Some(deps) = &self.node(root).nested_ldeps {
            return Ok(deps.clone());
        }
        self.epoch += 1;
        let epoch = self.epoch;
        debug!(file = %self.node(root).path(), "computing link closure");

        let mut result: Vec<FileId> = Vec::new();
        let mut worklist = vec![root];
        self.node_mut(root).epoch = epoch;
        while let Some(current) = worklist.pop() {
            debug_assert_eq!(self.node(current).epoch, epoch);
            result.push(current);
            for dep in self.direct_ldeps(current)? {
                if dep == root {
                    info!(
                        file = %self.node(root).path(),
                        cycle_with = %self.node(current).path(),
                        "recursive link-dependency cycle"
                    );
                    self.merge_groups(root, current);
                    continue;
                }
                if self.node(dep).epoch != epoch {
                    self.node_mut(dep).epoch = epoch;
                    worklist.push(dep);
                }
            }
        }
        self.node_mut(root).nested_ldeps = Some(result.clone());
        Ok(result)
    }

    /// Union two nodes' groups into a fresh group and repoint every member.
    /// The old group records stay in the arena but nothing refers to them.
    fn merge_groups(&mut self, a: FileId, b: FileId) {
        let ga = self.node(a).group;
        let gb = self.node(b).group;
        let (ga, gb) = match (ga, gb) {
            (Some(ga), Some(gb)) => (ga, gb),
            // direct_ldeps assigns a group before any edge is followed
            _ => unreachable!("link-cycle endpoints must already be grouped"),
        };
        if ga == gb {
            return;
        }
        let mut union: BTreeSet<FileId> = BTreeSet::new();
        union.extend(self.groups[ga.index()].members.iter().copied());
        union.extend(self.groups[gb.index()].members.iter().copied());
        let mut members: Vec<FileId> = union.into_iter().collect();
        members.sort_by(|x, y| self.node(*x).path().cmp(self.node(*y).path()));

        let gid = GroupId(self.groups.len() as u32);
        for &m in &members {
            self.node_mut(m).group = Some(gid);
        }
        self.groups.push(LinkGroup {
            members,
            level: None,
        });
    }

    pub fn group_of(&self, id: FileId) -> Option<GroupId> {
        self.node(id).group
    }

    pub fn group_members(&self, g: GroupId) -> &[FileId] {
        self.groups[g.index()].members()
    }

    /// Union of the members' link closures, sorted. With `prune` set,
    /// phantom and pruned files are dropped, which is what the level and
    /// report computations want.
    pub fn group_nested_ldeps(&mut self, g: GroupId, prune: bool) -> Result<Vec<FileId>> {
        let members = self.groups[g.index()].members.clone();
        let mut deps: Vec<FileId> = Vec::new();
        for member in members {
            for dep in self.nested_ldeps(member)? {
                if prune && (self.node(dep).is_phantom() || self.node(dep).is_pruned()) {
                    continue;
                }
                deps.push(dep);
            }
        }
        self.sort_by_path(&mut deps);
        Ok(deps)
    }

    /// Topological level of a group in the group DAG: 0 when every pruned
    /// link dependency stays inside the group, otherwise one more than the
    /// deepest dependency group. Memoized; cycles across groups would have
    /// been merged away before this is reachable.
    pub fn group_level(&mut self, g: GroupId) -> Result<u32> {
        if let Some(level) = self.groups[g.index()].level {
            return Ok(level);
        }
        let deps = self.group_nested_ldeps(g, true)?;
        let mut level = 0u32;
        for dep in deps {
            let dg = match self.node(dep).group {
                Some(dg) => dg,
                None => unreachable!("link dependency without a group"),
            };
            if dg == g {
                continue;
            }
            let dl = self.group_level(dg)?;
            level = level.max(dl + 1);
        }
        self.groups[g.index()].level = Some(level);
        Ok(level)
    }

    /// Every live group owning at least one source or header-only file,
    /// ordered by first member path so reports are stable.
    pub fn collect_groups(&self) -> Vec<GroupId> {
        let mut seen: BTreeSet<GroupId> = BTreeSet::new();
        for node in &self.nodes {
            if !(node.is_source_file(&self.config) || node.is_header_only()) {
                continue;
            }
            if let Some(g) = node.group {
                seen.insert(g);
            }
        }
        let mut out: Vec<GroupId> = seen.into_iter().collect();
        out.sort_by(|a, b| {
            let pa = self.node(self.groups[a.index()].members[0]).path();
            let pb = self.node(self.groups[b.index()].members[0]).path();
            pa.cmp(pb)
        });
        out
    }

    /// All member paths joined with " + ".
    pub fn group_bigname(&self, g: GroupId) -> String {
        self.groups[g.index()]
            .members
            .iter()
            .map(|&m| self.node(m).path())
            .collect::<Vec<_>>()
            .join(" + ")
    }

    /// Like [`Session::group_bigname`] but elided past two members.
    pub fn group_abbrevname(&self, g: GroupId) -> String {
        let members = &self.groups[g.index()].members;
        if members.len() <= 2 {
            return self.group_bigname(g);
        }
        format!(
            "group of {} + {} others",
            self.node(members[0]).path(),
            members.len() - 1
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn write(path: &Path, text: &str) {
        fs::write(path, text).unwrap();
    }

    /// Session rooted at an absolute temp dir, with that dir on the user
    /// include path and set as the strip prefix.
    fn session_at(root: &Path) -> Session {
        let mut config = Config::new();
        let dir = root.to_str().unwrap().to_string();
        config.user_ipath.push(dir.clone());
        config.strip_prefix = dir;
        config.finalize();
        Session::new(config)
    }

    fn path_of(session: &Session, id: FileId) -> String {
        session.node(id).path().to_string()
    }

    #[test]
    fn registry_interns_spellings_of_one_path() {
        let tmp = tempfile::tempdir().unwrap();
        let mut session = session_at(tmp.path());
        let root = tmp.path().to_str().unwrap();
        let a = session.get_or_create(&format!("{root}/a.cc")).unwrap();
        let b = session.get_or_create(&format!("{root}/./sub/../a.cc")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn nested_cdeps_is_sorted_and_includes_self() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(&root.join("a.cc"), "#include \"b.h\"\n");
        write(&root.join("b.h"), "#include \"c.h\"\n");
        write(&root.join("c.h"), "int c;\n");

        let mut session = session_at(root);
        let a = session
            .get_or_create(&format!("{}/a.cc", root.to_str().unwrap()))
            .unwrap();
        let deps = session.nested_cdeps(a).unwrap();
        let names: Vec<String> = deps.iter().map(|&d| path_of(&session, d)).collect();
        let prefix = root.to_str().unwrap();
        assert_eq!(
            names,
            vec![
                format!("{prefix}/a.cc"),
                format!("{prefix}/b.h"),
                format!("{prefix}/c.h")
            ]
        );

        // second call returns the memo
        assert_eq!(session.nested_cdeps(a).unwrap(), deps);
    }

    #[test]
    fn include_cycle_terminates_with_full_closure() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(&root.join("p.h"), "#include \"q.h\"\n");
        write(&root.join("q.h"), "#include \"p.h\"\n");
        write(&root.join("main.cc"), "#include \"p.h\"\n");

        let mut session = session_at(root);
        let main = session
            .get_or_create(&format!("{}/main.cc", root.to_str().unwrap()))
            .unwrap();
        let deps = session.nested_cdeps(main).unwrap();
        let names: Vec<String> = deps.iter().map(|&d| path_of(&session, d)).collect();
        let prefix = root.to_str().unwrap();
        assert!(names.contains(&format!("{prefix}/p.h")));
        assert!(names.contains(&format!("{prefix}/q.h")));
        assert_eq!(names.len(), 3);
    }

    #[test]
    fn self_include_adds_no_edge() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(&root.join("s.h"), "#include \"s.h\"\n");
        write(&root.join("a.cc"), "#include \"s.h\"\n");

        let mut session = session_at(root);
        let s = session
            .get_or_create(&format!("{}/s.h", root.to_str().unwrap()))
            .unwrap();
        assert!(session.direct_cdeps(s).unwrap().is_empty());
    }

    #[test]
    fn angled_includes_become_phantoms_by_default() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(&root.join("a.cc"), "#include <sys/types.h>\n");

        let mut session = session_at(root);
        let a = session
            .get_or_create(&format!("{}/a.cc", root.to_str().unwrap()))
            .unwrap();
        let deps = session.direct_cdeps(a).unwrap();
        assert_eq!(deps.len(), 1);
        assert!(session.node(deps[0]).is_phantom());
        assert_eq!(session.node(deps[0]).path(), "sys/types.h");
    }

    #[test]
    fn literal_extension_skips_resolution() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(&root.join("a.cc"), "#include \"gen/tables.inc\"\n");

        let mut config = Config::new();
        config.user_ipath.push(root.to_str().unwrap().into());
        config.literal_exts.push(".inc".into());
        config.finalize();
        let mut session = Session::new(config);
        let a = session
            .get_or_create(&format!("{}/a.cc", root.to_str().unwrap()))
            .unwrap();
        let deps = session.direct_cdeps(a).unwrap();
        assert_eq!(deps.len(), 1);
        assert!(session.node(deps[0]).is_literal());
        assert_eq!(session.node(deps[0]).path(), "gen/tables.inc");
    }

    #[test]
    fn headers_map_to_their_source_files_for_linking() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(&root.join("x.cc"), "#include \"y.h\"\n");
        write(&root.join("y.h"), "void y();\n");
        write(&root.join("y.cc"), "#include \"y.h\"\nvoid y() {}\n");

        let mut session = session_at(root);
        let prefix = root.to_str().unwrap();
        let x = session.get_or_create(&format!("{prefix}/x.cc")).unwrap();
        let deps = session.direct_ldeps(x).unwrap();
        let names: Vec<String> = deps.iter().map(|&d| path_of(&session, d)).collect();
        assert_eq!(names, vec![format!("{prefix}/y.cc")]);
    }

    #[test]
    fn link_cycle_merges_groups() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(&root.join("x.h"), "void x();\n");
        write(&root.join("y.h"), "void y();\n");
        write(&root.join("x.cc"), "#include \"y.h\"\n");
        write(&root.join("y.cc"), "#include \"x.h\"\n");

        let mut session = session_at(root);
        let prefix = root.to_str().unwrap();
        let x = session.get_or_create(&format!("{prefix}/x.cc")).unwrap();
        let y = session.get_or_create(&format!("{prefix}/y.cc")).unwrap();

        let closure = session.nested_ldeps(x).unwrap();
        assert!(closure.contains(&x) && closure.contains(&y));

        let gx = session.group_of(x).unwrap();
        let gy = session.group_of(y).unwrap();
        assert_eq!(gx, gy);
        assert_eq!(session.group_members(gx).len(), 2);
        // cycle-only group sits at level 0
        assert_eq!(session.group_level(gx).unwrap(), 0);
    }

    #[test]
    fn levels_strictly_decrease_along_group_edges() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(&root.join("leaf.h"), "void leaf();\n");
        write(&root.join("leaf.cc"), "void leaf() {}\n");
        write(&root.join("mid.h"), "#include \"leaf.h\"\n");
        write(&root.join("mid.cc"), "#include \"mid.h\"\n");
        write(&root.join("top.cc"), "#include \"mid.h\"\n");

        let mut session = session_at(root);
        let prefix = root.to_str().unwrap();
        let top = session.get_or_create(&format!("{prefix}/top.cc")).unwrap();
        session.nested_ldeps(top).unwrap();

        let leaf = session.lookup(&format!("{prefix}/leaf.cc")).unwrap();
        let mid = session.lookup(&format!("{prefix}/mid.cc")).unwrap();
        let lv = |s: &mut Session, id: FileId| {
            let g = s.group_of(id).unwrap();
            s.group_level(g).unwrap()
        };
        assert_eq!(lv(&mut session, leaf), 0);
        assert_eq!(lv(&mut session, mid), 1);
        assert_eq!(lv(&mut session, top), 2);
    }

    #[test]
    fn phantoms_never_join_groups() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(&root.join("a.cc"), "#include <stdio.h>\n");

        let mut session = session_at(root);
        let prefix = root.to_str().unwrap();
        let a = session.get_or_create(&format!("{prefix}/a.cc")).unwrap();
        let closure = session.nested_ldeps(a).unwrap();
        let phantom = session.lookup("stdio.h").unwrap();
        assert!(closure.contains(&phantom));
        assert!(session.group_of(phantom).is_none());
        // pruned group deps exclude the phantom
        let g = session.group_of(a).unwrap();
        let deps = session.group_nested_ldeps(g, true).unwrap();
        assert_eq!(deps, vec![a]);
    }

    #[test]
    fn group_names_elide_large_groups() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        // three-way link cycle a -> b -> c -> a
        for (unit, dep) in [("a", "b"), ("b", "c"), ("c", "a")] {
            write(&root.join(format!("{unit}.h")), "void f();\n");
            write(
                &root.join(format!("{unit}.cc")),
                &format!("#include \"{dep}.h\"\n"),
            );
        }

        let mut session = session_at(root);
        let prefix = root.to_str().unwrap();
        let a = session.get_or_create(&format!("{prefix}/a.cc")).unwrap();
        session.nested_ldeps(a).unwrap();
        // b and c joined a's traversal; their closures force the merges
        let b = session.lookup(&format!("{prefix}/b.cc")).unwrap();
        session.nested_ldeps(b).unwrap();
        let c = session.lookup(&format!("{prefix}/c.cc")).unwrap();
        session.nested_ldeps(c).unwrap();

        let g = session.group_of(a).unwrap();
        if session.group_members(g).len() == 3 {
            let name = session.group_abbrevname(g);
            assert!(name.starts_with("group of "));
            assert!(name.ends_with("+ 2 others"));
        }
        let big = session.group_bigname(g);
        assert!(big.contains(" + "));
    }
}

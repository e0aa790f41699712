//! Whole-graph link-dependency reports.
//!
//! These run after the driver has walked the source tree, so every
//! translation unit already has a link closure and a group. Each dump
//! iterates [`Session::collect_groups`], which is ordered by first member
//! path, keeping every report byte-stable across reruns.

use std::collections::HashMap;
use std::io::Write;

use crate::error::Result;
use crate::graph::{GroupId, Session};
use crate::paths;

/// `count  member + member + ...`, one line per group.
pub fn dump_groups<W: Write>(session: &mut Session, out: &mut W) -> Result<()> {
    for g in session.collect_groups() {
        writeln!(
            out,
            "{:4}  {}",
            session.group_members(g).len(),
            session.group_bigname(g)
        )?;
    }
    Ok(())
}

/// Bracketed sort key prefixed to every levels-report line, so the whole
/// report can be ordered with an external `sort(1)` and the keys stripped
/// afterwards. Fields: group level, group id, line type, a per-line tag,
/// and the line's own level.
fn sort_key(level: u32, g: GroupId, linetype: char, tag: &str, linelevel: u32) -> String {
    format!(
        "[[[#{:02}-{:08x}-{}-{}-{:2}]]]",
        level,
        g.raw(),
        linetype,
        tag,
        linelevel
    )
}

/// Per-group level report. With `verbose`, each group also lists every
/// file it transitively links against, with that file's group level.
pub fn dump_levels<W: Write>(session: &mut Session, out: &mut W, verbose: bool) -> Result<()> {
    for g in session.collect_groups() {
        let level = session.group_level(g)?;
        writeln!(out, "{}", sort_key(level, g, 'a', "", 0))?;
        writeln!(
            out,
            "{}==============================================",
            sort_key(level, g, 'a', "", 1)
        )?;
        let members = session.group_members(g).to_vec();
        if members.len() > 1 {
            writeln!(
                out,
                "{}WARNING: CYCLIC LINK DEPENDENCY GROUP:",
                sort_key(level, g, 'a', "", 2)
            )?;
        }
        for &m in &members {
            writeln!(
                out,
                "{}>>>> module: {}[{}]",
                sort_key(level, g, 'b', "", level),
                session.node(m).path(),
                level
            )?;
        }
        writeln!(out, "{}", sort_key(level, g, 'c', "", 0))?;
        if verbose {
            for dep in session.group_nested_ldeps(g, true)? {
                let dg = match session.group_of(dep) {
                    Some(dg) => dg,
                    None => continue,
                };
                let dl = session.group_level(dg)?;
                let dir = paths::dirname(session.node(dep).path());
                writeln!(
                    out,
                    "{}             depends on:  {}[{}]",
                    sort_key(level, g, 'd', &dir, dl),
                    session.node(dep).path(),
                    dl
                )?;
            }
        }
    }
    Ok(())
}

/// MATLAB-loadable adjacency dump: a `filenames` cell array naming each
/// group and its level, then an `adjacency` matrix where row i column j
/// holds group j's level when group i links against it. Rows are ordered
/// by descending level so the matrix is lower-triangular up to cycles.
pub fn dump_adjacency<W: Write>(session: &mut Session, out: &mut W) -> Result<()> {
    let mut entries: Vec<(GroupId, u32)> = Vec::new();
    for g in session.collect_groups() {
        let level = session.group_level(g)?;
        entries.push((g, level));
    }
    // stable sort keeps the path order within a level
    entries.sort_by(|a, b| b.1.cmp(&a.1));

    let mut column: HashMap<GroupId, usize> = HashMap::new();
    writeln!(out, "filenames = {{")?;
    for (i, &(g, level)) in entries.iter().enumerate() {
        column.insert(g, i);
        writeln!(out, "\t'{} [level={}]'", session.group_abbrevname(g), level)?;
    }
    out.write_all(b"}; % end filenames\n\n\n")?;

    writeln!(out, "adjacency = [")?;
    for &(g, _) in &entries {
        let mut row = vec![0u32; entries.len()];
        for dep in session.group_nested_ldeps(g, true)? {
            let dg = match session.group_of(dep) {
                Some(dg) => dg,
                None => continue,
            };
            if let Some(&col) = column.get(&dg) {
                row[col] = session.group_level(dg)?;
            }
        }
        write!(out, "\t")?;
        for v in &row {
            write!(out, "{v} ")?;
        }
        writeln!(out, ";")?;
    }
    out.write_all(b"]; % end adjacency\n\n\n")?;
    Ok(())
}

/// Flat `member dependency` pair dump, one line per edge, for downstream
/// tools that want the unaggregated graph.
pub fn dump_raw<W: Write>(session: &mut Session, out: &mut W) -> Result<()> {
    for g in session.collect_groups() {
        let deps = session.group_nested_ldeps(g, true)?;
        let members = session.group_members(g).to_vec();
        for m in members {
            for &dep in &deps {
                writeln!(
                    out,
                    "{:<35} {}",
                    session.node(m).path(),
                    session.node(dep).path()
                )?;
            }
        }
    }
    Ok(())
}

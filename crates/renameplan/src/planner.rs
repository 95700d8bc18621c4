//! Orders user rename intents into a sequence of safe primitive steps.
//!
//! The desired end state is trivial; the constraint is that every
//! intermediate state must be legal on a filesystem where names within a
//! directory are unique. Renames whose target is free are emitted directly.
//! Renames that chain onto each other (`a -> b` while `b -> c`) are emitted
//! from the free end backwards. Cycles (`a -> b`, `b -> a`) are broken by
//! parking one entry on a deterministic temporary name first.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::PlanError;
use crate::types::{Arc, Clause};
use crate::vfs::Vfs;

/// Convert `clauses` into an ordered arc sequence that never lands on an
/// occupied slot.
///
/// Replaying the returned arcs in order — virtually on `vfs`, or with the OS
/// rename primitive on the real tree — realizes every clause's intent: each
/// source inode ends up at a path carrying the requested basename. The
/// sequence is deterministic for a given input: components are resolved in
/// order of first appearance in `clauses`.
///
/// `vfs` is left in the planned end state, which callers can inspect for dry
/// runs.
///
/// # Errors
///
/// - [`PlanError::SourceMissing`] — a clause's source is absent from the
///   filesystem (or left it mid-plan, which can happen when one clause moves
///   a directory out from under another's source in a contradictory way).
/// - [`PlanError::DuplicateTarget`] — two clauses want the same final path.
/// - [`PlanError::TargetCollision`] — a target is occupied by an entry no
///   clause is moving away.
///
/// Nothing has been renamed on disk when an error comes back.
pub fn secure_clauses(vfs: &mut Vfs, clauses: &[Clause]) -> Result<Vec<Arc>, PlanError> {
    vfs.close_over(clauses.iter().map(Clause::source))?;

    let mut target_of: HashMap<PathBuf, usize> = HashMap::with_capacity(clauses.len());
    for (i, clause) in clauses.iter().enumerate() {
        if let Some(&first) = target_of.get(&clause.target()) {
            return Err(PlanError::DuplicateTarget {
                target: clause.target(),
                first: clauses[first].source().to_path_buf(),
                second: clause.source().to_path_buf(),
            });
        }
        target_of.insert(clause.target(), i);
    }

    let source_of: HashMap<&Path, usize> = clauses
        .iter()
        .enumerate()
        .map(|(i, clause)| (clause.source(), i))
        .collect();

    // Clause graph: i -> j iff i's target is j's source. Targets are unique
    // (out-degree <= 1) and sources are unique (in-degree <= 1), so every
    // component is a simple path or a simple cycle.
    let next: Vec<Option<usize>> = clauses
        .iter()
        .map(|clause| source_of.get(clause.target().as_path()).copied())
        .collect();
    let mut prev: Vec<Option<usize>> = vec![None; clauses.len()];
    for (i, link) in next.iter().enumerate() {
        if let Some(j) = *link {
            prev[j] = Some(i);
        }
    }

    // Sources as they stand right now: directory renames re-anchor the
    // sources of still-pending clauses, and targets are recomputed from the
    // current source at emission time.
    let mut current: Vec<PathBuf> = clauses
        .iter()
        .map(|clause| clause.source().to_path_buf())
        .collect();
    let mut arcs: Vec<Arc> = Vec::with_capacity(clauses.len() + 1);
    let mut done = vec![false; clauses.len()];

    for start in 0..clauses.len() {
        if done[start] {
            continue;
        }

        // Walk back towards the head of the component; coming back around to
        // `start` means it is a cycle.
        let mut head = start;
        let mut is_cycle = false;
        while let Some(p) = prev[head] {
            if p == start {
                is_cycle = true;
                break;
            }
            head = p;
        }

        if is_cycle {
            let mut members = vec![start];
            let mut i = start;
            while let Some(j) = next[i] {
                if j == start {
                    break;
                }
                members.push(j);
                i = j;
            }

            // Park the first member on a temporary name; the cycle becomes a
            // chain ending at the vacated slot.
            let parked = current[start].clone();
            if !vfs.contains(&parked) {
                return Err(PlanError::SourceMissing { source: parked });
            }
            let temp = vfs.fresh_sibling(&parked);
            emit(
                Arc::new(clauses[start].inode(), parked, temp),
                vfs,
                &mut current,
                &mut arcs,
            );

            for &member in members[1..].iter().rev() {
                emit_clause(member, clauses, vfs, &mut current, &mut arcs)?;
                done[member] = true;
            }

            // The parked entry takes its requested slot, vacated just above.
            emit_clause(start, clauses, vfs, &mut current, &mut arcs)?;
            done[start] = true;
        } else {
            let mut chain = vec![head];
            let mut i = head;
            while let Some(j) = next[i] {
                chain.push(j);
                i = j;
            }

            // The tail's target is the only one not vacated by the chain
            // itself; anything sitting there is staying there.
            let tail = i;
            let tail_target = current[tail].with_file_name(clauses[tail].new_name());
            if vfs.contains(&tail_target) {
                return Err(PlanError::TargetCollision {
                    source: current[tail].clone(),
                    target: tail_target,
                });
            }

            for &member in chain.iter().rev() {
                emit_clause(member, clauses, vfs, &mut current, &mut arcs)?;
                done[member] = true;
            }
        }
    }

    debug!(
        clauses = clauses.len(),
        arcs = arcs.len(),
        "planned rename sequence"
    );
    Ok(arcs)
}

/// Emit the arc realizing clause `index` from its current source.
fn emit_clause(
    index: usize,
    clauses: &[Clause],
    vfs: &mut Vfs,
    current: &mut [PathBuf],
    arcs: &mut Vec<Arc>,
) -> Result<(), PlanError> {
    let source = current[index].clone();
    if !vfs.contains(&source) {
        return Err(PlanError::SourceMissing { source });
    }
    let target = source.with_file_name(clauses[index].new_name());
    emit(
        Arc::new(clauses[index].inode(), source, target),
        vfs,
        current,
        arcs,
    );
    Ok(())
}

/// Apply one arc to the virtual state and re-anchor pending sources that sat
/// under a renamed directory.
fn emit(arc: Arc, vfs: &mut Vfs, current: &mut [PathBuf], arcs: &mut Vec<Arc>) {
    vfs.apply_rename(&arc.source, &arc.target);
    for source in current.iter_mut() {
        if *source == arc.source {
            *source = arc.target.clone();
        } else if source.starts_with(&arc.source) {
            if let Ok(rest) = source.strip_prefix(&arc.source) {
                *source = arc.target.join(rest);
            }
        }
    }
    arcs.push(arc);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Inode;

    fn vfs(entries: &[&str]) -> Vfs {
        Vfs::pure(entries.iter().map(PathBuf::from))
    }

    fn clauses(specs: &[(&str, &str)]) -> Vec<Clause> {
        specs
            .iter()
            .enumerate()
            .map(|(i, (source, name))| {
                Clause::new(Inode(i as u64 + 1), PathBuf::from(source), name).unwrap()
            })
            .collect()
    }

    fn pairs(arcs: &[Arc]) -> Vec<(PathBuf, PathBuf)> {
        arcs.iter()
            .map(|arc| (arc.source.clone(), arc.target.clone()))
            .collect()
    }

    fn pair(source: &str, target: &str) -> (PathBuf, PathBuf) {
        (PathBuf::from(source), PathBuf::from(target))
    }

    #[test]
    fn test_simple_rename() {
        let mut fs = vfs(&["/d/a", "/d/b"]);
        let arcs = secure_clauses(&mut fs, &clauses(&[("/d/a", "c")])).unwrap();
        assert_eq!(pairs(&arcs), vec![pair("/d/a", "/d/c")]);
        assert!(fs.contains(Path::new("/d/b")));
        assert!(fs.contains(Path::new("/d/c")));
        assert!(!fs.contains(Path::new("/d/a")));
    }

    #[test]
    fn test_chain_emitted_in_reverse() {
        let mut fs = vfs(&["/d/a", "/d/b", "/d/c"]);
        let arcs = secure_clauses(&mut fs, &clauses(&[("/d/a", "b"), ("/d/b", "c")])).unwrap();
        assert_eq!(
            pairs(&arcs),
            vec![pair("/d/b", "/d/c"), pair("/d/a", "/d/b")]
        );
        assert!(fs.contains(Path::new("/d/b")));
        assert!(fs.contains(Path::new("/d/c")));
        assert!(!fs.contains(Path::new("/d/a")));
    }

    #[test]
    fn test_swap_uses_temporary() {
        let entries = ["/d/a", "/d/b"];
        let temp = vfs(&entries).fresh_sibling(Path::new("/d/a"));
        let mut fs = vfs(&entries);
        let arcs = secure_clauses(&mut fs, &clauses(&[("/d/a", "b"), ("/d/b", "a")])).unwrap();
        assert_eq!(
            pairs(&arcs),
            vec![
                (PathBuf::from("/d/a"), temp.clone()),
                pair("/d/b", "/d/a"),
                (temp.clone(), PathBuf::from("/d/b")),
            ]
        );
        assert!(!fs.contains(&temp));
    }

    #[test]
    fn test_cycle_of_three() {
        let entries = ["/d/a", "/d/b", "/d/c"];
        let temp = vfs(&entries).fresh_sibling(Path::new("/d/a"));
        let mut fs = vfs(&entries);
        let arcs = secure_clauses(
            &mut fs,
            &clauses(&[("/d/a", "b"), ("/d/b", "c"), ("/d/c", "a")]),
        )
        .unwrap();
        assert_eq!(
            pairs(&arcs),
            vec![
                (PathBuf::from("/d/a"), temp.clone()),
                pair("/d/c", "/d/a"),
                pair("/d/b", "/d/c"),
                (temp.clone(), PathBuf::from("/d/b")),
            ]
        );
        assert!(!fs.contains(&temp));
    }

    #[test]
    fn test_directory_rename_propagates() {
        let mut fs = vfs(&["/d/dir", "/d/dir/x", "/d/dir/y"]);
        let arcs = secure_clauses(&mut fs, &clauses(&[("/d/dir", "dir2")])).unwrap();
        assert_eq!(pairs(&arcs), vec![pair("/d/dir", "/d/dir2")]);
        assert!(fs.contains(Path::new("/d/dir2")));
        assert!(fs.contains(Path::new("/d/dir2/x")));
        assert!(fs.contains(Path::new("/d/dir2/y")));
    }

    #[test]
    fn test_target_collision_with_bystander() {
        let mut fs = vfs(&["/d/a", "/d/b"]);
        let err = secure_clauses(&mut fs, &clauses(&[("/d/a", "b")])).unwrap_err();
        assert!(matches!(
            err,
            PlanError::TargetCollision { source, target }
                if source == Path::new("/d/a") && target == Path::new("/d/b")
        ));
    }

    #[test]
    fn test_duplicate_target_rejected() {
        let mut fs = vfs(&["/d/a", "/d/b"]);
        let err = secure_clauses(&mut fs, &clauses(&[("/d/a", "x"), ("/d/b", "x")])).unwrap_err();
        assert!(matches!(
            err,
            PlanError::DuplicateTarget { target, .. } if target == Path::new("/d/x")
        ));
    }

    #[test]
    fn test_missing_source_rejected() {
        let mut fs = vfs(&["/d/a"]);
        let err = secure_clauses(&mut fs, &clauses(&[("/d/ghost", "x")])).unwrap_err();
        assert!(matches!(err, PlanError::SourceMissing { .. }));
    }

    #[test]
    fn test_components_resolved_in_input_order() {
        let mut fs = vfs(&["/d/a", "/d/x"]);
        let arcs = secure_clauses(&mut fs, &clauses(&[("/d/x", "x2"), ("/d/a", "a2")])).unwrap();
        assert_eq!(
            pairs(&arcs),
            vec![pair("/d/x", "/d/x2"), pair("/d/a", "/d/a2")]
        );
    }

    #[test]
    fn test_descendant_clause_follows_directory_rename() {
        let mut fs = vfs(&["/d/dir", "/d/dir/x", "/d/other"]);
        let arcs = secure_clauses(
            &mut fs,
            &clauses(&[("/d/dir", "dir2"), ("/d/dir/x", "y")]),
        )
        .unwrap();
        assert_eq!(
            pairs(&arcs),
            vec![pair("/d/dir", "/d/dir2"), pair("/d/dir2/x", "/d/dir2/y")]
        );
        assert!(fs.contains(Path::new("/d/dir2/y")));
        assert!(!fs.contains(Path::new("/d/dir2/x")));
    }

    #[test]
    fn test_descendant_clause_listed_first_converges_to_same_tree() {
        let mut fs = vfs(&["/d/dir", "/d/dir/x", "/d/other"]);
        let arcs = secure_clauses(
            &mut fs,
            &clauses(&[("/d/dir/x", "y"), ("/d/dir", "dir2")]),
        )
        .unwrap();
        assert_eq!(
            pairs(&arcs),
            vec![pair("/d/dir/x", "/d/dir/y"), pair("/d/dir", "/d/dir2")]
        );
        assert!(fs.contains(Path::new("/d/dir2/y")));
    }

    #[test]
    fn test_long_chain() {
        let mut fs = vfs(&["/d/a", "/d/b", "/d/c", "/d/d"]);
        let arcs = secure_clauses(
            &mut fs,
            &clauses(&[("/d/a", "b"), ("/d/b", "c"), ("/d/c", "d"), ("/d/d", "e")]),
        )
        .unwrap();
        assert_eq!(
            pairs(&arcs),
            vec![
                pair("/d/d", "/d/e"),
                pair("/d/c", "/d/d"),
                pair("/d/b", "/d/c"),
                pair("/d/a", "/d/b"),
            ]
        );
    }

    #[test]
    fn test_plan_is_deterministic() {
        let specs = [("/d/a", "b"), ("/d/b", "a"), ("/d/x", "z")];
        let entries = ["/d/a", "/d/b", "/d/x"];
        let first = secure_clauses(&mut vfs(&entries), &clauses(&specs)).unwrap();
        let second = secure_clauses(&mut vfs(&entries), &clauses(&specs)).unwrap();
        assert_eq!(first, second);
    }
}

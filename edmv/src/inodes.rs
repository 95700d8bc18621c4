use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use renameplan::Inode;

/// Pair each path with its stable identifier, preserving input order.
///
/// Hardlinked duplicates (two selected paths, one inode) keep the first
/// occurrence only. The planner requires at most one clause per inode.
///
/// # Errors
///
/// The underlying `stat` error for a path that cannot be inspected.
pub fn inode_map(paths: &[PathBuf]) -> io::Result<Vec<(Inode, PathBuf)>> {
    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(paths.len());
    for (index, path) in paths.iter().enumerate() {
        let inode = identify(path, index)?;
        if seen.insert(inode) {
            entries.push((inode, path.clone()));
        }
    }
    Ok(entries)
}

#[cfg(unix)]
fn identify(path: &Path, _index: usize) -> io::Result<Inode> {
    use std::os::unix::fs::MetadataExt;
    Ok(Inode(std::fs::symlink_metadata(path)?.ino()))
}

/// Platforms without a visible inode get a per-run identifier. Undo only
/// groups journal records by identifier, so per-run uniqueness suffices.
#[cfg(not(unix))]
fn identify(path: &Path, index: usize) -> io::Result<Inode> {
    std::fs::symlink_metadata(path)?;
    Ok(Inode(index as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_maps_each_path() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        fs::write(&a, "a").unwrap();
        fs::write(&b, "b").unwrap();

        let entries = inode_map(&[a.clone(), b.clone()]).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].1, a);
        assert_eq!(entries[1].1, b);
        assert_ne!(entries[0].0, entries[1].0);
    }

    #[test]
    fn test_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let ghost = dir.path().join("ghost");
        assert!(inode_map(&[ghost]).is_err());
    }

    #[test]
    #[cfg(unix)]
    fn test_hardlinked_duplicate_keeps_first() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let link = dir.path().join("link.txt");
        fs::write(&a, "a").unwrap();
        fs::hard_link(&a, &link).unwrap();

        let entries = inode_map(&[a.clone(), link]).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].1, a);
    }
}

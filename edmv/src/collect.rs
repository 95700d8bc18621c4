use std::fs;
use std::path::PathBuf;

use tracing::warn;
use walkdir::WalkDir;

/// Expand the command-line inputs into the entries to rename.
///
/// Without `recursive`, each input names itself. With it, directory inputs
/// are replaced by everything beneath them (the directory itself excluded, as
/// its name was not asked about). The result is sorted and deduplicated so
/// the listing order is stable; inputs that do not exist are returned
/// separately so the caller can abort before the editor ever opens.
#[must_use]
pub fn collect_paths(inputs: &[PathBuf], recursive: bool) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let mut found = Vec::new();
    let mut missing = Vec::new();

    for path in inputs {
        if fs::symlink_metadata(path).is_err() {
            missing.push(path.clone());
            continue;
        }

        if !recursive || !path.is_dir() {
            found.push(path.clone());
            continue;
        }

        for entry in WalkDir::new(path).sort_by_file_name() {
            match entry {
                Ok(entry) => {
                    if entry.path() != path {
                        found.push(entry.path().to_path_buf());
                    }
                }
                Err(err) => warn!(%err, "skipping unreadable entry"),
            }
        }
    }

    found.sort();
    found.dedup();
    (found, missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_collect_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("test.txt");
        fs::write(&file, "hello").unwrap();

        let (found, missing) = collect_paths(std::slice::from_ref(&file), false);
        assert_eq!(found, vec![file]);
        assert!(missing.is_empty());
    }

    #[test]
    fn test_collect_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("here.txt");
        let absent = dir.path().join("gone.txt");
        fs::write(&present, "x").unwrap();

        let (found, missing) = collect_paths(&[present.clone(), absent.clone()], false);
        assert_eq!(found, vec![present]);
        assert_eq!(missing, vec![absent]);
    }

    #[test]
    fn test_non_recursive_keeps_directory_itself() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("inner.txt"), "x").unwrap();

        let (found, _) = collect_paths(std::slice::from_ref(&sub), false);
        assert_eq!(found, vec![sub]);
    }

    #[test]
    fn test_recursive_expands_directory() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        let a = dir.path().join("a.txt");
        let b = sub.join("b.txt");
        fs::write(&a, "a").unwrap();
        fs::write(&b, "b").unwrap();

        let (found, _) = collect_paths(&[dir.path().to_path_buf()], true);
        assert!(found.contains(&a));
        assert!(found.contains(&b));
        assert!(found.contains(&sub));
        assert!(!found.contains(&dir.path().to_path_buf()), "root is excluded");
    }

    #[test]
    fn test_recursive_output_is_sorted_and_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        fs::write(&a, "a").unwrap();

        let (found, _) =
            collect_paths(&[dir.path().to_path_buf(), a.clone(), a.clone()], true);
        assert_eq!(found, vec![a]);
    }

    #[test]
    #[cfg(unix)]
    fn test_dangling_symlink_counts_as_present() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(dir.path().join("nowhere"), &link).unwrap();

        let (found, missing) = collect_paths(std::slice::from_ref(&link), false);
        assert_eq!(found, vec![link]);
        assert!(missing.is_empty());
    }
}

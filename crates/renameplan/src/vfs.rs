//! The virtual filesystem the planner reasons against.
//!
//! A [`Vfs`] owns the set of paths believed to exist. In pure mode that set
//! is the whole world, which makes plans reproducible in tests and dry runs.
//! In concrete mode, existence and sibling queries go to the real filesystem;
//! mutations still only touch the owned set, so planning never moves a real
//! file.
//!
//! Name-collision checks are only sound once the set contains every sibling
//! of every entry being renamed — that is what [`Vfs::close_over`] is for.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::PlanError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Pure,
    Concrete,
}

/// The set of paths the planner believes exist.
#[derive(Clone, Debug)]
pub struct Vfs {
    mode: Mode,
    paths: BTreeSet<PathBuf>,
}

impl Vfs {
    /// A fully in-memory filesystem seeded with `paths`.
    pub fn pure<I>(paths: I) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        Self {
            mode: Mode::Pure,
            paths: paths.into_iter().collect(),
        }
    }

    /// A filesystem that answers existence and sibling queries from the real
    /// one. Starts empty; [`Vfs::close_over`] imports the siblings of
    /// interest.
    #[must_use]
    pub fn concrete() -> Self {
        Self {
            mode: Mode::Concrete,
            paths: BTreeSet::new(),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        match self.mode {
            Mode::Pure => self.paths.contains(path),
            // symlink_metadata so a dangling symlink still counts as an entry
            Mode::Concrete => fs::symlink_metadata(path).is_ok(),
        }
    }

    fn siblings(&self, path: &Path) -> Vec<PathBuf> {
        let Some(parent) = path.parent() else {
            return Vec::new();
        };
        match self.mode {
            Mode::Pure => self.children(parent).cloned().collect(),
            Mode::Concrete => match fs::read_dir(parent) {
                Ok(entries) => entries
                    .filter_map(Result::ok)
                    .map(|entry| entry.path())
                    .collect(),
                Err(err) => {
                    warn!(parent = %parent.display(), %err, "cannot list siblings");
                    Vec::new()
                }
            },
        }
    }

    /// Import the siblings of every source so later collision checks are
    /// total. Calling this twice is the same as calling it once.
    ///
    /// # Errors
    ///
    /// [`PlanError::SourceMissing`] if any source is not a known path. The
    /// set is not modified in that case.
    pub fn close_over<'a, I>(&mut self, sources: I) -> Result<(), PlanError>
    where
        I: IntoIterator<Item = &'a Path>,
    {
        let mut imported: Vec<PathBuf> = Vec::new();
        for source in sources {
            if !self.exists(source) {
                return Err(PlanError::SourceMissing {
                    source: source.to_path_buf(),
                });
            }
            imported.extend(self.siblings(source));
        }
        debug!(imported = imported.len(), "closed over source siblings");
        self.paths.extend(imported);
        Ok(())
    }

    /// Whether `path` is in the known set.
    ///
    /// After [`Vfs::close_over`] this answers collision questions for any
    /// sibling of a source, in both modes.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    /// Known paths whose parent is exactly `parent`.
    pub fn children<'a>(&'a self, parent: &'a Path) -> impl Iterator<Item = &'a PathBuf> {
        self.paths
            .iter()
            .filter(move |path| path.parent() == Some(parent))
    }

    /// Iterate over every known path.
    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.paths.iter()
    }

    /// A deterministic sibling of `path` guaranteed absent from the set.
    ///
    /// The stem is the truncated sha-256 digest of the original stem, so
    /// repeated planning runs pick the same temporary first; an integer
    /// suffix bumps past occupied slots. The extension is preserved.
    #[must_use]
    pub fn fresh_sibling(&self, path: &Path) -> PathBuf {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let digest = format!("{:x}", Sha256::digest(stem.as_bytes()));
        let digest = &digest[..32];
        let extension = path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let mut suffix = 0u64;
        loop {
            let candidate = path.with_file_name(format!("{digest}-{suffix}{extension}"));
            if !self.paths.contains(&candidate) {
                return candidate;
            }
            suffix += 1;
        }
    }

    /// Apply a rename virtually, re-anchoring every descendant of `source`.
    ///
    /// Preconditions, maintained by the planner: `source` is in the set,
    /// `target` is not, and both share a parent.
    pub fn apply_rename(&mut self, source: &Path, target: &Path) {
        debug_assert!(self.paths.contains(source));
        debug_assert!(!self.paths.contains(target));
        debug_assert_eq!(source.parent(), target.parent());

        let moved: Vec<PathBuf> = self
            .paths
            .iter()
            .filter(|path| path.starts_with(source))
            .cloned()
            .collect();
        for path in moved {
            self.paths.remove(&path);
            if let Ok(rest) = path.strip_prefix(source) {
                if rest.as_os_str().is_empty() {
                    self.paths.insert(target.to_path_buf());
                } else {
                    self.paths.insert(target.join(rest));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn pure(paths: &[&str]) -> Vfs {
        Vfs::pure(paths.iter().map(PathBuf::from))
    }

    fn snapshot(vfs: &Vfs) -> BTreeSet<PathBuf> {
        vfs.iter().cloned().collect()
    }

    #[test]
    fn test_pure_close_over_is_validation_only() {
        let mut vfs = pure(&["/d/a", "/d/b"]);
        let before = snapshot(&vfs);
        vfs.close_over([Path::new("/d/a")]).unwrap();
        assert_eq!(snapshot(&vfs), before);
    }

    #[test]
    fn test_close_over_missing_source() {
        let mut vfs = pure(&["/d/a"]);
        let err = vfs.close_over([Path::new("/d/ghost")]).unwrap_err();
        assert!(matches!(err, PlanError::SourceMissing { source } if source == Path::new("/d/ghost")));
    }

    #[test]
    fn test_close_over_idempotent() {
        let mut once = pure(&["/d/a", "/d/b", "/e/c"]);
        once.close_over([Path::new("/d/a")]).unwrap();
        let mut twice = once.clone();
        twice.close_over([Path::new("/d/a")]).unwrap();
        assert_eq!(snapshot(&once), snapshot(&twice));
    }

    #[test]
    fn test_children_filters_by_parent() {
        let vfs = pure(&["/d/a", "/d/b", "/d/sub/c", "/e/x"]);
        let kids: Vec<PathBuf> = vfs.children(Path::new("/d")).cloned().collect();
        // grandchildren are not children: /d/sub/c hangs off /d/sub, not /d
        assert_eq!(kids, vec![PathBuf::from("/d/a"), PathBuf::from("/d/b")]);
    }

    #[test]
    fn test_fresh_sibling_deterministic() {
        let vfs = pure(&["/d/a.txt", "/d/b.txt"]);
        let first = vfs.fresh_sibling(Path::new("/d/a.txt"));
        let second = vfs.fresh_sibling(Path::new("/d/a.txt"));
        assert_eq!(first, second);
        assert_eq!(first.parent(), Some(Path::new("/d")));
        assert_eq!(
            first.extension().map(|e| e.to_string_lossy().into_owned()),
            Some("txt".to_owned())
        );
        assert!(!vfs.contains(&first));
    }

    #[test]
    fn test_fresh_sibling_bumps_suffix() {
        let vfs = pure(&["/d/a.txt"]);
        let first = vfs.fresh_sibling(Path::new("/d/a.txt"));
        let mut crowded = vfs.clone();
        crowded.paths.insert(first.clone());
        let second = crowded.fresh_sibling(Path::new("/d/a.txt"));
        assert_ne!(first, second);
        assert!(second.to_string_lossy().ends_with("-1.txt"));
    }

    #[test]
    fn test_fresh_sibling_no_extension() {
        let vfs = pure(&["/d/Makefile"]);
        let temp = vfs.fresh_sibling(Path::new("/d/Makefile"));
        assert_eq!(temp.extension(), None);
        assert!(temp.to_string_lossy().ends_with("-0"));
    }

    #[test]
    fn test_apply_rename_moves_single_entry() {
        let mut vfs = pure(&["/d/a", "/d/b"]);
        vfs.apply_rename(Path::new("/d/a"), Path::new("/d/c"));
        assert!(!vfs.contains(Path::new("/d/a")));
        assert!(vfs.contains(Path::new("/d/c")));
        assert!(vfs.contains(Path::new("/d/b")));
    }

    #[test]
    fn test_apply_rename_propagates_to_descendants() {
        let mut vfs = pure(&["/d/dir", "/d/dir/x", "/d/dir/sub/y", "/d/other"]);
        vfs.apply_rename(Path::new("/d/dir"), Path::new("/d/dir2"));
        let expected: BTreeSet<PathBuf> = ["/d/dir2", "/d/dir2/x", "/d/dir2/sub/y", "/d/other"]
            .iter()
            .map(PathBuf::from)
            .collect();
        assert_eq!(snapshot(&vfs), expected);
    }

    #[test]
    fn test_apply_rename_prefix_is_component_wise() {
        // "/d/dir" is not an ancestor of "/d/dirt"
        let mut vfs = pure(&["/d/dir", "/d/dirt"]);
        vfs.apply_rename(Path::new("/d/dir"), Path::new("/d/x"));
        assert!(vfs.contains(Path::new("/d/dirt")));
        assert!(vfs.contains(Path::new("/d/x")));
    }

    #[test]
    fn test_concrete_close_over_imports_real_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, "a").unwrap();
        std::fs::write(&b, "b").unwrap();

        let mut vfs = Vfs::concrete();
        vfs.close_over([a.as_path()]).unwrap();
        assert!(vfs.contains(&a));
        assert!(vfs.contains(&b));
    }

    #[test]
    fn test_concrete_close_over_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let ghost = dir.path().join("ghost");
        let mut vfs = Vfs::concrete();
        let err = vfs.close_over([ghost.as_path()]).unwrap_err();
        assert!(matches!(err, PlanError::SourceMissing { .. }));
    }

    #[test]
    #[cfg(unix)]
    fn test_concrete_counts_dangling_symlink_as_entry() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(dir.path().join("nowhere"), &link).unwrap();

        let mut vfs = Vfs::concrete();
        vfs.close_over([link.as_path()]).unwrap();
        assert!(vfs.contains(&link));
    }
}

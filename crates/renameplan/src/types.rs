use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::ClauseError;

/// Stable identifier of a filesystem object, as reported by the OS.
///
/// Inodes survive renames within a device, which is what lets an edited name
/// list be matched back to its entries even if something on disk moved in the
/// meantime. They are used as keys only; the numeric value carries no meaning
/// and no order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Inode(pub u64);

impl fmt::Display for Inode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user intent: give the object at `source` the basename `new_name`.
///
/// Construction validates what the listing parser cannot guarantee on its
/// own: the new name is a single non-empty path segment and actually differs
/// from the current basename.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Clause {
    inode: Inode,
    source: PathBuf,
    new_name: String,
}

impl Clause {
    /// Build a validated clause.
    ///
    /// # Errors
    ///
    /// Returns [`ClauseError`] if `new_name` is empty (or `.`/`..`), contains
    /// a path separator, or equals the current basename of `source`.
    pub fn new(inode: Inode, source: PathBuf, new_name: &str) -> Result<Self, ClauseError> {
        if new_name.is_empty() || new_name == "." || new_name == ".." {
            return Err(ClauseError::EmptyName { source });
        }
        if new_name.chars().any(std::path::is_separator) {
            return Err(ClauseError::SeparatorInName {
                source,
                new_name: new_name.to_owned(),
            });
        }
        if source
            .file_name()
            .is_some_and(|name| name.to_string_lossy() == new_name)
        {
            return Err(ClauseError::UnchangedName { source });
        }
        Ok(Self {
            inode,
            source,
            new_name: new_name.to_owned(),
        })
    }

    #[must_use]
    pub const fn inode(&self) -> Inode {
        self.inode
    }

    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }

    #[must_use]
    pub fn new_name(&self) -> &str {
        &self.new_name
    }

    /// The final path this clause asks for: a sibling of `source` carrying
    /// `new_name`.
    #[must_use]
    pub fn target(&self) -> PathBuf {
        self.source.with_file_name(&self.new_name)
    }
}

/// A single directory-local rename step, stamped with the inode it moves.
///
/// Arcs are the only primitive the renamer executes. Source and target always
/// share a parent directory; a cross-directory pair is a planning bug, never
/// an arc.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Arc {
    pub inode: Inode,
    pub source: PathBuf,
    pub target: PathBuf,
}

impl Arc {
    #[must_use]
    pub fn new(inode: Inode, source: PathBuf, target: PathBuf) -> Self {
        debug_assert_eq!(source.parent(), target.parent());
        Self {
            inode,
            source,
            target,
        }
    }

    /// The rename that exactly undoes this one.
    #[must_use]
    pub fn inverse(&self) -> Self {
        Self {
            inode: self.inode,
            source: self.target.clone(),
            target: self.source.clone(),
        }
    }

    /// Whether source and target live in the same directory.
    #[must_use]
    pub fn is_directory_local(&self) -> bool {
        self.source.parent() == self.target.parent()
    }
}

impl fmt::Display for Arc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source.display(), self.target.display())
    }
}

/// Number of distinct inodes an arc sequence touches.
///
/// Cycle-breaking moves the same inode twice, so this is the honest count for
/// "N items renamed" messages.
#[must_use]
pub fn distinct_inodes(arcs: &[Arc]) -> usize {
    arcs.iter().map(|arc| arc.inode).collect::<HashSet<_>>().len()
}

//! Error types for clause validation, planning, and execution.
//!
//! Planning errors ([`PlanError`]) are returned before anything touches the
//! real filesystem. Execution errors ([`RenameError`]) distinguish the
//! recoverable case (one step failed, the journal matches the disk, rollback
//! is mandatory) from the unrecoverable one (rollback itself failed and the
//! journal is left on disk as evidence).

use std::fmt;
use std::io;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// ClauseError
// ---------------------------------------------------------------------------

/// A rename intent that is malformed on its face.
#[derive(Debug)]
pub enum ClauseError {
    /// The requested name is empty, `.`, or `..`.
    EmptyName {
        /// The entry the name was meant for.
        source: PathBuf,
    },

    /// The requested name contains a path separator.
    SeparatorInName {
        /// The entry the name was meant for.
        source: PathBuf,
        /// The offending name.
        new_name: String,
    },

    /// The requested name equals the current basename.
    UnchangedName {
        /// The entry the name was meant for.
        source: PathBuf,
    },
}

impl fmt::Display for ClauseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName { source } => {
                write!(
                    f,
                    "cannot rename '{}': the new name is empty",
                    source.display()
                )
            }
            Self::SeparatorInName { source, new_name } => {
                write!(
                    f,
                    "cannot rename '{}' to '{new_name}': names may not contain a path separator",
                    source.display()
                )
            }
            Self::UnchangedName { source } => {
                write!(
                    f,
                    "'{}' already carries the requested name",
                    source.display()
                )
            }
        }
    }
}

impl std::error::Error for ClauseError {}

// ---------------------------------------------------------------------------
// PlanError
// ---------------------------------------------------------------------------

/// A planning failure. Nothing has been renamed when one of these comes back.
#[derive(Debug)]
pub enum PlanError {
    /// A clause's source is absent from the filesystem being planned against.
    SourceMissing {
        /// The path that was expected to exist.
        source: PathBuf,
    },

    /// A clause's target slot is occupied by an entry no clause is moving
    /// away.
    TargetCollision {
        /// The entry being renamed.
        source: PathBuf,
        /// The occupied slot it was aimed at.
        target: PathBuf,
    },

    /// Two clauses request the same final path.
    DuplicateTarget {
        /// The contested path.
        target: PathBuf,
        /// The first entry aimed at it.
        first: PathBuf,
        /// The second entry aimed at it.
        second: PathBuf,
    },
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceMissing { source } => {
                write!(f, "cannot rename '{}': no such entry", source.display())
            }
            Self::TargetCollision { source, target } => {
                write!(
                    f,
                    "cannot rename '{}' to '{}': the name is taken by an entry that is not being renamed",
                    source.display(),
                    target.display()
                )
            }
            Self::DuplicateTarget {
                target,
                first,
                second,
            } => {
                write!(
                    f,
                    "both '{}' and '{}' want to become '{}'",
                    first.display(),
                    second.display(),
                    target.display()
                )
            }
        }
    }
}

impl std::error::Error for PlanError {}

// ---------------------------------------------------------------------------
// RenameError
// ---------------------------------------------------------------------------

/// An execution failure.
#[derive(Debug)]
pub enum RenameError {
    /// One rename step failed. The journal matches the on-disk state and the
    /// caller must roll back.
    Recoverable {
        /// The entry being moved when the failure hit.
        from: PathBuf,
        /// Where it was headed.
        to: PathBuf,
        /// The underlying OS error.
        source: io::Error,
    },

    /// An inverse rename failed during rollback. The journal stays on disk;
    /// user intervention is required.
    Unrecoverable {
        /// The entry being moved back when the failure hit.
        from: PathBuf,
        /// Where it was headed.
        to: PathBuf,
        /// The underlying OS error.
        source: io::Error,
    },

    /// A cross-directory arc reached the renamer. Arcs are directory-local by
    /// construction, so this is a planner bug, not a user error.
    CrossDirectory {
        /// The offending source.
        from: PathBuf,
        /// The offending target.
        to: PathBuf,
    },

    /// The journal file could not be read or written.
    Journal {
        /// Path of the journal file.
        path: PathBuf,
        /// The underlying OS error.
        source: io::Error,
    },

    /// The journal contents could not be parsed.
    JournalParse {
        /// 1-based line number of the offending line.
        line: usize,
        /// What was wrong with it.
        detail: String,
    },
}

impl fmt::Display for RenameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recoverable { from, to, source } => {
                write!(
                    f,
                    "renaming '{}' to '{}' failed: {source}",
                    from.display(),
                    to.display()
                )
            }
            Self::Unrecoverable { from, to, source } => {
                write!(
                    f,
                    "rollback failed while moving '{}' back to '{}': {source}",
                    from.display(),
                    to.display()
                )
            }
            Self::CrossDirectory { from, to } => {
                write!(
                    f,
                    "refusing cross-directory rename '{}' -> '{}'",
                    from.display(),
                    to.display()
                )
            }
            Self::Journal { path, source } => {
                write!(f, "journal '{}': {source}", path.display())
            }
            Self::JournalParse { line, detail } => {
                write!(f, "journal line {line}: {detail}")
            }
        }
    }
}

impl std::error::Error for RenameError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Recoverable { source, .. }
            | Self::Unrecoverable { source, .. }
            | Self::Journal { source, .. } => Some(source),
            Self::CrossDirectory { .. } | Self::JournalParse { .. } => None,
        }
    }
}

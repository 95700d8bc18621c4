//! The editable text round-trip.
//!
//! The listing groups entries per parent directory under a `# <parent>`
//! comment line; each row is `inode<TAB>basename`. Users edit the name
//! column. Rows are matched back by inode, so reordering or deleting rows is
//! harmless and an entry that moved on disk since the listing was written is
//! still renamed correctly.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use renameplan::{Clause, ClauseError, Inode};

/// A defect in the edited text.
#[derive(Debug)]
pub enum ListingError {
    /// A non-comment line is not `inode<TAB>name`.
    Malformed {
        /// 1-based line number.
        line: usize,
        /// The offending line.
        text: String,
    },

    /// A row names an inode that was never listed.
    UnknownInode {
        /// 1-based line number.
        line: usize,
        /// The unrecognized identifier.
        inode: Inode,
    },

    /// Two rows name the same inode.
    DuplicateInode {
        /// 1-based line number of the second row.
        line: usize,
        /// The repeated identifier.
        inode: Inode,
    },

    /// A row's new name is not a usable basename.
    BadName {
        /// 1-based line number.
        line: usize,
        /// Why the name was rejected.
        source: ClauseError,
    },
}

impl fmt::Display for ListingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { line, text } => {
                write!(f, "line {line}: expected 'inode<TAB>name', got '{text}'")
            }
            Self::UnknownInode { line, inode } => {
                write!(f, "line {line}: unknown entry id {inode}")
            }
            Self::DuplicateInode { line, inode } => {
                write!(f, "line {line}: entry id {inode} appears twice")
            }
            Self::BadName { line, source } => {
                write!(f, "line {line}: {source}")
            }
        }
    }
}

impl std::error::Error for ListingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::BadName { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Render the entries as editable text.
///
/// Entries arrive sorted by path, so parent-directory sections come out
/// grouped without further work.
#[must_use]
pub fn format_listing(entries: &[(Inode, PathBuf)]) -> String {
    let mut out = String::new();
    let mut current_parent: Option<&Path> = None;
    for (inode, path) in entries {
        let parent = path.parent().unwrap_or_else(|| Path::new("/"));
        if current_parent != Some(parent) {
            if current_parent.is_some() {
                out.push('\n');
            }
            out.push_str(&format!("# {}\n", parent.display()));
            current_parent = Some(parent);
        }
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        out.push_str(&format!("{inode}\t{name}\n"));
    }
    out
}

/// Parse the edited text back into clauses.
///
/// Rows whose name is unchanged produce no clause; an empty result means
/// there is nothing to do.
///
/// # Errors
///
/// [`ListingError`] for malformed rows, unknown or repeated inodes, and
/// unusable names.
pub fn parse_listing(
    text: &str,
    entries: &[(Inode, PathBuf)],
) -> Result<Vec<Clause>, ListingError> {
    let by_inode: HashMap<Inode, &PathBuf> =
        entries.iter().map(|(inode, path)| (*inode, path)).collect();

    let mut seen = HashSet::new();
    let mut clauses = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        if raw.trim().is_empty() || raw.trim_start().starts_with('#') {
            continue;
        }
        let Some((id_text, name)) = raw.split_once('\t') else {
            return Err(ListingError::Malformed {
                line,
                text: raw.to_owned(),
            });
        };
        let Ok(id) = id_text.trim().parse::<u64>() else {
            return Err(ListingError::Malformed {
                line,
                text: raw.to_owned(),
            });
        };
        let inode = Inode(id);
        // editors on some platforms leave CRLF endings behind
        let name = name.strip_suffix('\r').unwrap_or(name);

        if !seen.insert(inode) {
            return Err(ListingError::DuplicateInode { line, inode });
        }
        let Some(source) = by_inode.get(&inode) else {
            return Err(ListingError::UnknownInode { line, inode });
        };
        if source
            .file_name()
            .is_some_and(|current| current.to_string_lossy() == name)
        {
            continue;
        }
        let clause = Clause::new(inode, (*source).clone(), name)
            .map_err(|source| ListingError::BadName { line, source })?;
        clauses.push(clause);
    }
    Ok(clauses)
}

//! Safe bulk-rename planning and journaled execution.
//!
//! Renaming a batch of files is trivial until the names overlap: `a -> b`
//! while `b -> c`, or a straight swap, or a directory rename that drags its
//! descendants along. `renameplan` turns a set of rename intents
//! ([`Clause`]s) into an ordered sequence of directory-local steps
//! ([`Arc`]s) where no step ever lands on an occupied name, then executes
//! them while journaling each applied step so the whole session can be
//! rolled back or undone exactly.
//!
//! # Examples
//!
//! ```
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::path::PathBuf;
//! use renameplan::{secure_clauses, Clause, Inode, Vfs};
//!
//! // a swap: "a" and "b" trade names
//! let mut vfs = Vfs::pure(["/d/a", "/d/b"].map(PathBuf::from));
//! let clauses = vec![
//!     Clause::new(Inode(1), PathBuf::from("/d/a"), "b")?,
//!     Clause::new(Inode(2), PathBuf::from("/d/b"), "a")?,
//! ];
//! let arcs = secure_clauses(&mut vfs, &clauses)?;
//! // three steps: park "a" on a temporary, move "b", unpark
//! assert_eq!(arcs.len(), 3);
//! # Ok(())
//! # }
//! ```
//!
//! Planning is pure: it mutates only the [`Vfs`] handed to it. Execution is
//! the [`Renamer`]'s job, and everything it applies lands in a [`Journal`]
//! whose most recent committed session can be inverted for undo.

mod error;
mod journal;
mod planner;
mod renamer;
mod types;
mod vfs;

pub use error::{ClauseError, PlanError, RenameError};
pub use journal::{inverse_arcs, parse_sessions, Journal, Session, SessionState};
pub use planner::secure_clauses;
pub use renamer::{Outcome, Renamer};
pub use types::{distinct_inodes, Arc, Clause, Inode};
pub use vfs::Vfs;

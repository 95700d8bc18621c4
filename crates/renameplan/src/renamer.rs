//! Executes planned arcs against the real filesystem, journaling as it goes.
//!
//! Each arc is applied with the OS rename primitive, which is atomic within a
//! directory. A record hits the journal (and is flushed) after each success
//! and before the next attempt, so at any moment the journal matches the disk
//! up to the arc currently in flight. On the first failure the caller rolls
//! back; on a crash, [`Renamer::recover`] rolls the dangling session back from
//! the journal on the next run.

use std::fs;
use std::io;
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use tracing::{info, warn};

use crate::error::RenameError;
use crate::journal::{self, Journal, SessionState};
use crate::types::Arc;

/// Terminal states of a renaming run, for the host to map to exit codes. The
/// core never exits the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Every arc was applied and journaled.
    Committed,
    /// Nothing needed doing; the filesystem is untouched.
    AbortedNoChanges,
    /// A step failed and the applied prefix was rolled back.
    RolledBack,
    /// Rollback itself failed; the journal points at what was applied.
    Unrecoverable,
}

/// Applies arc sequences and remembers what it did.
#[derive(Debug)]
pub struct Renamer {
    journal: Journal,
    applied: Vec<Arc>,
    session_open: bool,
}

impl Renamer {
    #[must_use]
    pub const fn new(journal: Journal) -> Self {
        Self {
            journal,
            applied: Vec::new(),
            session_open: false,
        }
    }

    #[must_use]
    pub fn journal_path(&self) -> &Path {
        self.journal.path()
    }

    /// Apply `arcs` in order and return how many were applied. An empty
    /// sequence opens no session.
    ///
    /// # Errors
    ///
    /// [`RenameError::Recoverable`] when an arc fails: the journal matches
    /// the on-disk state and [`Renamer::rollback`] must be called next.
    /// [`RenameError::CrossDirectory`] flags a planner bug before any
    /// syscall. Journal I/O failures also stop the run and require rollback.
    pub fn perform(&mut self, arcs: &[Arc]) -> Result<usize, RenameError> {
        if arcs.is_empty() {
            return Ok(0);
        }
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        self.journal.begin_session(&timestamp)?;
        self.session_open = true;
        for arc in arcs {
            self.apply(arc)?;
        }
        self.journal.commit_session()?;
        self.session_open = false;
        info!(count = arcs.len(), "rename session committed");
        Ok(arcs.len())
    }

    fn apply(&mut self, arc: &Arc) -> Result<(), RenameError> {
        if !arc.is_directory_local() {
            return Err(RenameError::CrossDirectory {
                from: arc.source.clone(),
                to: arc.target.clone(),
            });
        }
        // The planner guarantees a free slot; this catches the window where
        // something else occupied it since planning. fs::rename would
        // silently clobber on unix.
        if fs::symlink_metadata(&arc.target).is_ok() {
            return Err(RenameError::Recoverable {
                from: arc.source.clone(),
                to: arc.target.clone(),
                source: io::Error::new(io::ErrorKind::AlreadyExists, "target already exists"),
            });
        }
        fs::rename(&arc.source, &arc.target).map_err(|err| RenameError::Recoverable {
            from: arc.source.clone(),
            to: arc.target.clone(),
            source: err,
        })?;
        info!(from = %arc.source.display(), to = %arc.target.display(), "renamed");
        self.applied.push(arc.clone());
        self.journal.record(arc)
    }

    /// Undo the arcs applied so far in this run, last first, then close the
    /// session as aborted. Returns how many renames were reverted.
    ///
    /// # Errors
    ///
    /// [`RenameError::Unrecoverable`] when an inverse rename fails — for
    /// instance because the vacated slot has been reoccupied externally.
    pub fn rollback(&mut self) -> Result<usize, RenameError> {
        let mut undone = 0;
        while let Some(arc) = self.applied.pop() {
            undo_arc(&arc)?;
            undone += 1;
        }
        if self.session_open {
            self.journal.abort_session()?;
            self.session_open = false;
            warn!(count = undone, "rename session rolled back");
        }
        Ok(undone)
    }

    /// Roll back a session that died without a footer, if any, and close it.
    /// Returns how many renames were reverted.
    ///
    /// Re-running after a partial recovery is safe: a record whose target is
    /// gone and whose source is back counts as already undone.
    ///
    /// # Errors
    ///
    /// [`RenameError::Unrecoverable`] when the journal and the disk disagree
    /// in a way an inverse rename cannot fix; journal I/O and parse errors
    /// are surfaced as-is.
    pub fn recover(&mut self) -> Result<usize, RenameError> {
        let contents = self.journal.read()?;
        let sessions = journal::parse_sessions(&contents)?;
        let Some(last) = sessions.last() else {
            return Ok(0);
        };
        if last.state != SessionState::Incomplete {
            return Ok(0);
        }
        warn!(records = last.records.len(), "recovering interrupted session");
        let mut undone = 0;
        for arc in last.records.iter().rev() {
            let target_present = fs::symlink_metadata(&arc.target).is_ok();
            let source_present = fs::symlink_metadata(&arc.source).is_ok();
            match (target_present, source_present) {
                (true, false) => {
                    undo_arc(arc)?;
                    undone += 1;
                }
                // already undone by an earlier partial recovery
                (false, true) => {}
                (true, true) => {
                    return Err(conflict(arc, "both old and new names exist"));
                }
                (false, false) => {
                    return Err(conflict(arc, "the entry is gone entirely"));
                }
            }
        }
        self.journal.abort_session()?;
        Ok(undone)
    }

    /// The arcs that would undo the most recent committed session, ready to
    /// be passed to [`Renamer::perform`]. Performing them opens a fresh
    /// session, so an undo can itself be undone.
    ///
    /// # Errors
    ///
    /// Journal I/O and parse errors.
    pub fn arcs_for_undo(&self) -> Result<Vec<Arc>, RenameError> {
        journal::inverse_arcs(&self.journal.read()?)
    }
}

fn undo_arc(arc: &Arc) -> Result<(), RenameError> {
    let inverse = arc.inverse();
    if fs::symlink_metadata(&inverse.target).is_ok() {
        return Err(conflict(arc, "the original name is occupied again"));
    }
    fs::rename(&inverse.source, &inverse.target).map_err(|err| RenameError::Unrecoverable {
        from: inverse.source.clone(),
        to: inverse.target.clone(),
        source: err,
    })?;
    info!(from = %inverse.source.display(), to = %inverse.target.display(), "rolled back");
    Ok(())
}

fn conflict(arc: &Arc, detail: &str) -> RenameError {
    RenameError::Unrecoverable {
        from: arc.target.clone(),
        to: arc.source.clone(),
        source: io::Error::new(io::ErrorKind::AlreadyExists, detail.to_owned()),
    }
}

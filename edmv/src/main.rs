mod cli;
mod collect;
mod editor;
mod inodes;
mod listing;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use renameplan::{
    distinct_inodes, secure_clauses, Arc, Clause, Inode, Journal, Outcome, Renamer, Vfs,
};

use cli::Cli;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    let journal = match journal_path(args.journal.clone()) {
        Ok(path) => path,
        Err(message) => {
            eprintln!("edmv: {message}");
            return ExitCode::FAILURE;
        }
    };

    if args.undo {
        run_undo(&journal)
    } else {
        run_rename(&args, &journal)
    }
}

fn exit_code(outcome: Outcome) -> ExitCode {
    match outcome {
        Outcome::Committed | Outcome::AbortedNoChanges => ExitCode::SUCCESS,
        Outcome::RolledBack => ExitCode::FAILURE,
        Outcome::Unrecoverable => ExitCode::from(2),
    }
}

fn run_rename(args: &Cli, journal: &Path) -> ExitCode {
    let mut inputs = args.paths.clone();
    if let Some(file) = &args.file {
        match fs::read_to_string(file) {
            Ok(text) => inputs.extend(text.lines().filter(|l| !l.is_empty()).map(PathBuf::from)),
            Err(err) => {
                eprintln!("edmv: cannot read '{}': {err}", file.display());
                return ExitCode::FAILURE;
            }
        }
    }
    if inputs.is_empty() {
        eprintln!("edmv: no files specified");
        return ExitCode::FAILURE;
    }

    let (paths, missing) = collect::collect_paths(&inputs, args.recursive);
    if !missing.is_empty() {
        for path in &missing {
            eprintln!("edmv: '{}': not found", path.display());
        }
        return ExitCode::FAILURE;
    }
    // anything without a basename (e.g. "/") cannot be renamed
    let paths: Vec<PathBuf> = paths
        .into_iter()
        .filter(|path| path.file_name().is_some())
        .collect();
    if paths.is_empty() {
        println!("edmv: nothing to rename");
        return exit_code(Outcome::AbortedNoChanges);
    }

    let mut renamer = Renamer::new(Journal::new(journal.to_path_buf()));
    match renamer.recover() {
        Ok(0) => {}
        Ok(n) => eprintln!("edmv: rolled back {n} rename(s) left over from an interrupted session"),
        Err(err) => {
            eprintln!("edmv: cannot recover the interrupted session: {err}");
            eprintln!(
                "edmv: the journal at '{}' lists what was applied",
                journal.display()
            );
            return exit_code(Outcome::Unrecoverable);
        }
    }

    let entries = match inodes::inode_map(&paths) {
        Ok(entries) => entries,
        Err(err) => {
            eprintln!("edmv: {err}");
            return ExitCode::FAILURE;
        }
    };
    info!(count = entries.len(), "entries selected for editing");

    let clauses = match edited_clauses(&entries) {
        Ok(clauses) => clauses,
        Err(message) => {
            eprintln!("edmv: {message}");
            return ExitCode::FAILURE;
        }
    };
    if clauses.is_empty() {
        println!("edmv: nothing was changed in the name list");
        return exit_code(Outcome::AbortedNoChanges);
    }
    info!(count = clauses.len(), "clauses parsed from the edited list");

    let arcs = match secure_clauses(&mut Vfs::concrete(), &clauses) {
        Ok(arcs) => arcs,
        Err(err) => {
            eprintln!("edmv: {err}");
            return ExitCode::FAILURE;
        }
    };

    let outcome = perform(&mut renamer, &arcs, args.verbose);
    if outcome == Outcome::Committed {
        match distinct_inodes(&arcs) {
            1 => println!("edmv: one item renamed"),
            n => println!("edmv: all {n} items renamed"),
        }
    }
    exit_code(outcome)
}

fn run_undo(journal: &Path) -> ExitCode {
    let mut renamer = Renamer::new(Journal::new(journal.to_path_buf()));
    match renamer.recover() {
        Ok(0) => {}
        Ok(n) => eprintln!("edmv: rolled back {n} rename(s) left over from an interrupted session"),
        Err(err) => {
            eprintln!("edmv: cannot recover the interrupted session: {err}");
            return exit_code(Outcome::Unrecoverable);
        }
    }

    let arcs = match renamer.arcs_for_undo() {
        Ok(arcs) => arcs,
        Err(err) => {
            eprintln!("edmv: cannot read the journal: {err}");
            return exit_code(Outcome::Unrecoverable);
        }
    };
    if arcs.is_empty() {
        println!("edmv: no completed renaming session to undo");
        return exit_code(Outcome::AbortedNoChanges);
    }

    let outcome = perform(&mut renamer, &arcs, false);
    if outcome == Outcome::Committed {
        match distinct_inodes(&arcs) {
            1 => println!("edmv: the sole rename was undone; run 'edmv -u' again to restore"),
            n => println!("edmv: all {n} renames were undone; run 'edmv -u' again to restore"),
        }
    }
    exit_code(outcome)
}

/// Apply `arcs`, rolling back on failure. Reports errors itself; the caller
/// only announces success.
fn perform(renamer: &mut Renamer, arcs: &[Arc], verbose: bool) -> Outcome {
    match renamer.perform(arcs) {
        Ok(_) => {
            if verbose {
                for arc in arcs {
                    println!("{arc}");
                }
            }
            Outcome::Committed
        }
        Err(err) => {
            eprintln!("edmv: {err}");
            match renamer.rollback() {
                Ok(0) => {
                    eprintln!("edmv: no renames had been applied; nothing to roll back");
                    Outcome::RolledBack
                }
                Ok(n) => {
                    eprintln!("edmv: all {n} applied rename(s) were rolled back");
                    Outcome::RolledBack
                }
                Err(rollback_err) => {
                    eprintln!("edmv: rollback failed: {rollback_err}");
                    eprintln!(
                        "edmv: the journal at '{}' lists what was applied",
                        renamer.journal_path().display()
                    );
                    Outcome::Unrecoverable
                }
            }
        }
    }
}

/// Write the listing, hand it to the editor, and parse what came back.
fn edited_clauses(entries: &[(Inode, PathBuf)]) -> Result<Vec<Clause>, String> {
    let file = tempfile::Builder::new()
        .prefix("edmv-")
        .suffix(".tsv")
        .tempfile()
        .map_err(|err| format!("cannot create the listing file: {err}"))?;
    fs::write(file.path(), listing::format_listing(entries))
        .map_err(|err| format!("cannot write the listing file: {err}"))?;

    let command = editor::editor_command().map_err(|err| err.to_string())?;
    editor::edit_file(&command, file.path()).map_err(|err| err.to_string())?;

    let edited = fs::read_to_string(file.path())
        .map_err(|err| format!("cannot read the edited listing: {err}"))?;
    listing::parse_listing(&edited, entries).map_err(|err| err.to_string())
}

fn journal_path(explicit: Option<PathBuf>) -> Result<PathBuf, String> {
    if let Some(path) = explicit {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|err| format!("cannot create '{}': {err}", parent.display()))?;
            }
        }
        return Ok(path);
    }
    let base = dirs_next::data_dir()
        .ok_or_else(|| "cannot determine the user data directory; pass --journal".to_owned())?;
    let dir = base.join("edmv");
    fs::create_dir_all(&dir)
        .map_err(|err| format!("cannot create '{}': {err}", dir.display()))?;
    Ok(dir.join("journal.tsv"))
}

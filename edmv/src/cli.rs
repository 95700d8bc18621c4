use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "edmv",
    version,
    about = "Bulk-rename files and directories in your text editor",
    long_about = "Opens the selected names in your editor. On save, the renames \
                  are ordered so no step overwrites anything (swaps and chains \
                  go through temporary names), applied, and journaled so the \
                  whole session can be undone with -u."
)]
pub struct Cli {
    /// Undo the renamings of the previous session
    #[arg(short, long, conflicts_with_all = ["file", "recursive", "paths"])]
    pub undo: bool,

    /// Read the paths to rename from a file (one per line)
    #[arg(short, long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Expand directory arguments into everything beneath them
    #[arg(short, long)]
    pub recursive: bool,

    /// Print each applied rename
    #[arg(short, long)]
    pub verbose: bool,

    /// Journal file to read and append (default: in the user data directory)
    #[arg(long, value_name = "PATH")]
    pub journal: Option<PathBuf>,

    /// Files and directories to rename
    pub paths: Vec<PathBuf>,
}

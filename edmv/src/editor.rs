use std::env;
use std::fmt;
use std::io;
use std::path::Path;
use std::process::Command;

use tracing::{debug, warn};

/// Editors tried when neither `$VISUAL` nor `$EDITOR` is set, first hit on
/// `$PATH` wins.
#[cfg(target_os = "macos")]
const FALLBACK_EDITORS: &[&str] = &["open -t -W"];
#[cfg(not(target_os = "macos"))]
const FALLBACK_EDITORS: &[&str] = &["nano", "vi"];

#[derive(Debug)]
pub enum EditorError {
    /// No editor configured and none of the fallbacks is on `$PATH`.
    NoEditor,

    /// `$VISUAL`/`$EDITOR` could not be split into a command line.
    BadCommand {
        /// The unusable value.
        value: String,
        /// What was wrong with it.
        detail: String,
    },

    /// The editor could not be started.
    Launch {
        /// The command that failed to start.
        command: String,
        /// The underlying OS error.
        source: io::Error,
    },

    /// The editor exited unsuccessfully; the edit is discarded.
    Failed {
        /// The command that was run.
        command: String,
    },
}

impl fmt::Display for EditorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoEditor => {
                write!(f, "no text editor found; set $VISUAL or $EDITOR")
            }
            Self::BadCommand { value, detail } => {
                write!(f, "cannot parse editor command '{value}': {detail}")
            }
            Self::Launch { command, source } => {
                write!(f, "cannot launch editor '{command}': {source}")
            }
            Self::Failed { command } => {
                write!(f, "the editor command '{command}' reported failure")
            }
        }
    }
}

impl std::error::Error for EditorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Launch { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Resolve the editor command line: `$VISUAL`, then `$EDITOR`, then the
/// platform fallbacks.
///
/// # Errors
///
/// [`EditorError::BadCommand`] for an unsplittable environment value,
/// [`EditorError::NoEditor`] when nothing usable is found.
pub fn editor_command() -> Result<Vec<String>, EditorError> {
    for var in ["VISUAL", "EDITOR"] {
        match env::var(var) {
            Ok(value) if !value.trim().is_empty() => {
                debug!(var, value = %value, "using configured editor");
                return shell_words::split(&value).map_err(|err| EditorError::BadCommand {
                    value: value.clone(),
                    detail: err.to_string(),
                });
            }
            _ => {}
        }
    }

    for candidate in FALLBACK_EDITORS {
        if let Ok(command) = shell_words::split(candidate) {
            if command.first().is_some_and(|program| on_path(program)) {
                debug!(editor = candidate, "using fallback editor");
                return Ok(command);
            }
        }
    }
    warn!("no editor configured and no fallback available");
    Err(EditorError::NoEditor)
}

/// Launch the editor on `path` and wait for it to exit.
///
/// # Errors
///
/// [`EditorError::Launch`] when the process cannot start,
/// [`EditorError::Failed`] when it exits non-zero.
pub fn edit_file(command: &[String], path: &Path) -> Result<(), EditorError> {
    let Some((program, args)) = command.split_first() else {
        return Err(EditorError::NoEditor);
    };
    debug!(editor = %program, file = %path.display(), "launching editor");
    let status = Command::new(program)
        .args(args)
        .arg(path)
        .status()
        .map_err(|source| EditorError::Launch {
            command: command.join(" "),
            source,
        })?;
    if status.success() {
        Ok(())
    } else {
        Err(EditorError::Failed {
            command: command.join(" "),
        })
    }
}

fn on_path(program: &str) -> bool {
    let Some(paths) = env::var_os("PATH") else {
        return false;
    };
    env::split_paths(&paths).any(|dir| dir.join(program).is_file())
}

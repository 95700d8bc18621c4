//! Line-oriented journal of applied renames.
//!
//! One record per applied arc (`inode<TAB>from<TAB>to`), bounded by session
//! marker lines. The file is append-only: a session closed by `#end` was
//! committed, one closed by `#aborted` was rolled back in-process, and a
//! missing footer means the process died mid-run and the session still needs
//! rolling back. Undo reads the most recent committed session.
//!
//! Tabs, newlines, carriage returns, `%`, control bytes, and non-UTF-8 bytes
//! inside path fields are percent-escaped so every record stays on one line
//! and decodes back to the original bytes.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::RenameError;
use crate::types::{Arc, Inode};

const SESSION_MARK: &str = "#session";
const END_MARK: &str = "#end";
const ABORT_MARK: &str = "#aborted";

/// Completion state of a journal session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Every arc was applied and the footer was written.
    Committed,
    /// The session was rolled back in-process.
    Aborted,
    /// No footer: the process died mid-run.
    Incomplete,
}

/// One parsed journal session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    /// Timestamp text from the session header.
    pub started: String,
    /// The arcs applied, in application order.
    pub records: Vec<Arc>,
    /// How the session ended.
    pub state: SessionState,
}

/// Append-only journal file.
#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole journal. A journal that does not exist yet reads as
    /// empty.
    ///
    /// # Errors
    ///
    /// [`RenameError::Journal`] on any I/O failure other than the file being
    /// absent.
    pub fn read(&self) -> Result<String, RenameError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(contents),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(err) => Err(self.io_error(err)),
        }
    }

    /// Open a new session.
    ///
    /// # Errors
    ///
    /// [`RenameError::Journal`] on I/O failure.
    pub fn begin_session(&self, timestamp: &str) -> Result<(), RenameError> {
        self.append(&format!("{SESSION_MARK} {timestamp}\n"))
    }

    /// Record one applied arc. The record is flushed to the OS before this
    /// returns, so a crash loses at most the arc currently in flight.
    ///
    /// # Errors
    ///
    /// [`RenameError::Journal`] on I/O failure.
    pub fn record(&self, arc: &Arc) -> Result<(), RenameError> {
        self.append(&format!(
            "{}\t{}\t{}\n",
            arc.inode,
            escape_path(&arc.source),
            escape_path(&arc.target)
        ))
    }

    /// Close the current session as committed.
    ///
    /// # Errors
    ///
    /// [`RenameError::Journal`] on I/O failure.
    pub fn commit_session(&self) -> Result<(), RenameError> {
        self.append(&format!("{END_MARK}\n"))
    }

    /// Close the current session as rolled back.
    ///
    /// # Errors
    ///
    /// [`RenameError::Journal`] on I/O failure.
    pub fn abort_session(&self) -> Result<(), RenameError> {
        self.append(&format!("{ABORT_MARK}\n"))
    }

    fn append(&self, line: &str) -> Result<(), RenameError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| self.io_error(err))?;
        file.write_all(line.as_bytes())
            .and_then(|()| file.sync_data())
            .map_err(|err| self.io_error(err))
    }

    fn io_error(&self, err: std::io::Error) -> RenameError {
        RenameError::Journal {
            path: self.path.clone(),
            source: err,
        }
    }
}

/// Parse journal contents into sessions, oldest first.
///
/// Parsing is read-only and repeatable; it never mutates the file.
///
/// # Errors
///
/// [`RenameError::JournalParse`] on malformed records, unknown marker lines,
/// or records outside a session.
pub fn parse_sessions(contents: &str) -> Result<Vec<Session>, RenameError> {
    let mut sessions: Vec<Session> = Vec::new();
    let mut open: Option<Session> = None;

    for (index, line) in contents.lines().enumerate() {
        let lineno = index + 1;
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix(SESSION_MARK) {
            // a new header closes a dangling session as incomplete
            if let Some(session) = open.take() {
                sessions.push(session);
            }
            open = Some(Session {
                started: rest.trim().to_owned(),
                records: Vec::new(),
                state: SessionState::Incomplete,
            });
        } else if line == END_MARK || line == ABORT_MARK {
            let Some(mut session) = open.take() else {
                return Err(RenameError::JournalParse {
                    line: lineno,
                    detail: format!("'{line}' without an open session"),
                });
            };
            session.state = if line == END_MARK {
                SessionState::Committed
            } else {
                SessionState::Aborted
            };
            sessions.push(session);
        } else if line.starts_with('#') {
            return Err(RenameError::JournalParse {
                line: lineno,
                detail: format!("unknown marker '{line}'"),
            });
        } else {
            let Some(session) = open.as_mut() else {
                return Err(RenameError::JournalParse {
                    line: lineno,
                    detail: "record outside a session".to_owned(),
                });
            };
            session.records.push(parse_record(line, lineno)?);
        }
    }

    if let Some(session) = open.take() {
        sessions.push(session);
    }
    Ok(sessions)
}

/// Reverse arc sequence of the most recent committed session, ready to be
/// performed as an undo run. Empty when no committed session exists.
///
/// # Errors
///
/// [`RenameError::JournalParse`] if the contents do not parse.
pub fn inverse_arcs(contents: &str) -> Result<Vec<Arc>, RenameError> {
    let sessions = parse_sessions(contents)?;
    Ok(sessions
        .iter()
        .rev()
        .find(|session| session.state == SessionState::Committed)
        .map(|session| session.records.iter().rev().map(Arc::inverse).collect())
        .unwrap_or_default())
}

fn parse_record(line: &str, lineno: usize) -> Result<Arc, RenameError> {
    let malformed = |detail: &str| RenameError::JournalParse {
        line: lineno,
        detail: detail.to_owned(),
    };
    let mut fields = line.split('\t');
    let inode = fields
        .next()
        .and_then(|text| text.parse::<u64>().ok())
        .ok_or_else(|| malformed("bad inode field"))?;
    let from = fields.next().ok_or_else(|| malformed("missing from field"))?;
    let to = fields.next().ok_or_else(|| malformed("missing to field"))?;
    if fields.next().is_some() {
        return Err(malformed("too many fields"));
    }
    Ok(Arc {
        inode: Inode(inode),
        source: unescape_path(from, lineno)?,
        target: unescape_path(to, lineno)?,
    })
}

#[cfg(unix)]
fn path_bytes(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(not(unix))]
fn path_bytes(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

#[cfg(unix)]
fn path_from_bytes(bytes: Vec<u8>) -> PathBuf {
    use std::os::unix::ffi::OsStringExt;
    std::ffi::OsString::from_vec(bytes).into()
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: Vec<u8>) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(&bytes).into_owned())
}

fn must_escape(byte: u8) -> bool {
    matches!(byte, b'\t' | b'\n' | b'\r' | b'%') || byte.is_ascii_control() || byte == 0x7F
}

fn escape_path(path: &Path) -> String {
    let bytes = path_bytes(path);
    let mut out = String::with_capacity(bytes.len());
    if let Ok(text) = std::str::from_utf8(&bytes) {
        for ch in text.chars() {
            if ch.is_ascii() && must_escape(ch as u8) {
                out.push_str(&format!("%{:02X}", ch as u8));
            } else {
                out.push(ch);
            }
        }
    } else {
        // not valid UTF-8: escape byte-wise so the journal stays UTF-8 text
        for &byte in &bytes {
            if byte.is_ascii() && !must_escape(byte) {
                out.push(byte as char);
            } else {
                out.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    out
}

fn unescape_path(field: &str, lineno: usize) -> Result<PathBuf, RenameError> {
    let mut bytes = Vec::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(ch) = chars.next() {
        if ch == '%' {
            let hi = chars.next();
            let lo = chars.next();
            let byte = match (hi, lo) {
                (Some(hi), Some(lo)) => u8::from_str_radix(&format!("{hi}{lo}"), 16).ok(),
                _ => None,
            };
            let Some(byte) = byte else {
                return Err(RenameError::JournalParse {
                    line: lineno,
                    detail: "bad percent escape".to_owned(),
                });
            };
            bytes.push(byte);
        } else {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
        }
    }
    Ok(path_from_bytes(bytes))
}

//! Lazy listing of the immediate subdirectories of a directory.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::EngineError;
use crate::reset::ResetFlag;

/// Open `path` for listing. Entries are produced on demand and the sequence
/// ends early, without error, once `reset` is raised.
pub fn list_subdirectories(path: &Path, reset: &ResetFlag) -> Result<Subdirectories, EngineError> {
    let entries = fs::read_dir(path).map_err(|source| EngineError::OpenDir {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Subdirectories {
        dir: path.to_path_buf(),
        entries,
        reset: reset.clone(),
        done: false,
    })
}

/// Names (not paths) of the subdirectories of one directory.
///
/// `.` and `..` are never produced. Symlinks to directories are not
/// directories here. Single-pass; once it has ended it stays ended.
#[derive(Debug)]
pub struct Subdirectories {
    dir: PathBuf,
    entries: fs::ReadDir,
    reset: ResetFlag,
    done: bool,
}

impl Iterator for Subdirectories {
    type Item = OsString;

    fn next(&mut self) -> Option<OsString> {
        while !self.done {
            if self.reset.is_set() {
                self.done = true;
                break;
            }
            let entry = match self.entries.next() {
                Some(Ok(entry)) => entry,
                Some(Err(err)) => {
                    tracing::warn!(dir = %self.dir.display(), error = %err, "skipping unreadable entry");
                    continue;
                }
                None => {
                    self.done = true;
                    break;
                }
            };
            let name = entry.file_name();
            if name == "." || name == ".." {
                continue;
            }
            if is_directory(entry.file_type(), &entry.path()) {
                return Some(name);
            }
        }
        None
    }
}

/// Decide from the type the listing reported when it is conclusive, and fall
/// back to a metadata probe (which follows symlinks) when it is not.
fn is_directory(reported: io::Result<fs::FileType>, path: &Path) -> bool {
    match reported {
        Ok(ft) if ft.is_dir() => true,
        Ok(ft) if ft.is_file() || ft.is_symlink() => false,
        _ => probe_is_dir(path),
    }
}

fn probe_is_dir(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(meta) => meta.is_dir(),
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "type probe failed");
            false
        }
    }
}

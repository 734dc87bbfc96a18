//! Directory path resolution.
//!
//! Every directory path the engine stores or hands to the policy carries a
//! trailing separator, so templates can concatenate `directory` and a name.

use std::ffi::{OsStr, OsString};
use std::fs;
use std::io::ErrorKind;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use crate::error::{io_err, EngineError};

/// Canonicalize `path` (resolving `.`, `..` and symlinks) and check it names a
/// directory. The result ends with `/`.
pub fn resolve_directory(path: &Path) -> Result<PathBuf, EngineError> {
    let canonical = fs::canonicalize(path).map_err(|err| {
        if err.kind() == ErrorKind::NotFound {
            EngineError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            io_err(path, err)
        }
    })?;
    let meta = fs::metadata(&canonical).map_err(|e| io_err(&canonical, e))?;
    if !meta.is_dir() {
        return Err(EngineError::NotADirectory {
            path: path.to_path_buf(),
        });
    }
    Ok(with_trailing_separator(canonical))
}

/// Append `/` unless the path already ends with one.
pub fn with_trailing_separator(path: PathBuf) -> PathBuf {
    let mut raw: OsString = path.into_os_string();
    if !raw.as_bytes().ends_with(b"/") {
        raw.push("/");
    }
    PathBuf::from(raw)
}

/// `parent` + `name` + `/`.
pub fn child_dir(parent: &Path, name: &OsStr) -> PathBuf {
    with_trailing_separator(parent.join(name))
}

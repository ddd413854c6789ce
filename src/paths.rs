//! Small filesystem path helpers.

use std::fs::{File, FileTimes};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::Result;

/// Render `path` with the home directory prefix replaced by `~`.
///
/// Paths outside the home directory are returned unchanged.
pub fn tilde(path: impl AsRef<Path>) -> String {
    match dirs::home_dir() {
        Some(home) => tilde_with(path.as_ref(), &home),
        None => path.as_ref().display().to_string(),
    }
}

fn tilde_with(path: &Path, home: &Path) -> String {
    match path.strip_prefix(home) {
        Ok(rest) if rest.as_os_str().is_empty() => "~".to_string(),
        Ok(rest) => format!("~/{}", rest.display()),
        Err(_) => path.display().to_string(),
    }
}

/// Set the access and modification times of `path` to now.
///
/// Works on directories and read-only files; the file is only opened for
/// reading. A missing path is an error.
pub fn timestamp_now(path: impl AsRef<Path>) -> Result<()> {
    let now = SystemTime::now();
    File::open(path)?.set_times(FileTimes::new().set_accessed(now).set_modified(now))?;
    Ok(())
}

/// Find `name` in `start` or the nearest ancestor that contains it.
pub fn findup(name: impl AsRef<Path>, start: impl AsRef<Path>) -> Option<PathBuf> {
    let name = name.as_ref();
    start
        .as_ref()
        .ancestors()
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.exists())
}

//! External command helpers.
//!
//! `command` runs a program through `tokio::process` and captures its output;
//! `command_blocking` does the same on the calling thread. A non-zero exit is
//! an error carrying the program's stderr.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Output;

use tracing::debug;

use crate::cache::Cached;
use crate::error::{HutiError, Result};

/// Captured result of a successful command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `-1` when the process was terminated by a signal.
    pub status: i32,
    /// Lossily decoded stdout without the trailing newline.
    pub stdout: String,
    /// Lossily decoded stderr without the trailing newline.
    pub stderr: String,
}

/// Run `program` with `args` and wait for it to finish.
pub async fn command<I, S>(program: &str, args: I) -> Result<CommandOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    debug!(program, "Running command");
    let output = tokio::process::Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| spawn_error(program, e))?;
    finish(program, output)
}

/// Blocking variant of [`command`].
pub fn command_blocking<I, S>(program: &str, args: I) -> Result<CommandOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    debug!(program, "Running command");
    let output = std::process::Command::new(program)
        .args(args)
        .output()
        .map_err(|e| spawn_error(program, e))?;
    finish(program, output)
}

fn spawn_error(program: &str, err: std::io::Error) -> HutiError {
    if err.kind() == std::io::ErrorKind::NotFound {
        HutiError::CommandNotFound(program.to_string())
    } else {
        HutiError::Io(err)
    }
}

fn finish(program: &str, output: Output) -> Result<CommandOutput> {
    let status = output.status.code().unwrap_or(-1);
    let stdout = decode(&output.stdout);
    let stderr = decode(&output.stderr);
    if !output.status.success() {
        return Err(HutiError::Command {
            program: program.to_string(),
            code: status,
            stderr,
        });
    }
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
    })
}

fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches(['\n', '\r'])
        .to_string()
}

type Lookup = fn(String) -> Option<PathBuf>;

thread_local! {
    static WHICH: Cached<Lookup, String, Option<PathBuf>> =
        Cached::new(lookup as Lookup).named("which");
}

/// Locate an executable on `PATH`.
///
/// Names containing a path separator are checked as given. Answers are
/// memoized per thread, so later changes to `PATH` are not observed for a
/// name that was already looked up.
pub fn which(name: &str) -> Option<PathBuf> {
    WHICH.with(|cached| cached.call(name.to_string()))
}

/// Like [`which`], but a missing executable is an error.
pub fn require(name: &str) -> Result<PathBuf> {
    which(name).ok_or_else(|| HutiError::CommandNotFound(name.to_string()))
}

fn lookup(name: String) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }
    let candidate = Path::new(&name);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(&name))
        .find(|path| is_executable(path))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

//! Gzipped tarball helpers.
//!
//! [`tardir`] packs a directory into `<name>.tar.gz` with every entry under a
//! top-level `<name>/` directory; [`gz`] unpacks such an archive and returns
//! the directory it produced. [`aiogz`] runs [`gz`] on tokio's blocking pool.

use std::ffi::OsString;
use std::fs::File;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::debug;

use crate::error::{HutiError, Result};

/// Compress directory `src` to `<basename>.tar.gz` in the current directory.
///
/// Returns the absolute archive path. Compressing the current directory
/// itself is refused.
pub fn tardir(src: impl AsRef<Path>) -> Result<PathBuf> {
    tardir_into(src, std::env::current_dir()?)
}

/// Compress directory `src` to `<basename>.tar.gz` inside `dest_dir`.
///
/// `dest_dir` must not be `src` or lie inside it.
pub fn tardir_into(src: impl AsRef<Path>, dest_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let src = src.as_ref().canonicalize()?;
    let dest_dir = dest_dir.as_ref().canonicalize()?;
    if dest_dir.starts_with(&src) {
        return Err(HutiError::Archive(format!(
            "can't compress {} into itself",
            src.display()
        )));
    }
    let name = src
        .file_name()
        .ok_or_else(|| HutiError::Archive(format!("{} has no name", src.display())))?
        .to_owned();

    let mut file_name = name.clone();
    file_name.push(".tar.gz");
    let archive = dest_dir.join(file_name);

    let encoder = GzEncoder::new(File::create(&archive)?, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.append_dir_all(&name, &src)?;
    builder.into_inner()?.finish()?;

    debug!(src = %src.display(), archive = %archive.display(), "Archived directory");
    Ok(archive)
}

/// Uncompress the `.tar.gz` at `src` into `dest`.
///
/// Returns the absolute path of the top-level directory of the archive
/// (`dest/<basename>` for archives made by [`tardir`]).
pub fn gz(src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<PathBuf> {
    let src = src.as_ref();
    let dest = dest.as_ref();
    std::fs::create_dir_all(dest)?;

    let mut archive = tar::Archive::new(GzDecoder::new(File::open(src)?));
    let mut top: Option<OsString> = None;
    for entry in archive.entries()? {
        let mut entry = entry?;
        if top.is_none() {
            top = entry.path()?.components().find_map(|c| match c {
                Component::Normal(part) => Some(part.to_owned()),
                _ => None,
            });
        }
        entry.unpack_in(dest)?;
    }

    let top = top.ok_or_else(|| HutiError::Archive(format!("{} is empty", src.display())))?;
    let extracted = dest.join(top).canonicalize()?;
    debug!(archive = %src.display(), dest = %extracted.display(), "Extracted archive");
    Ok(extracted)
}

/// [`gz`] without blocking the async runtime.
pub async fn aiogz(src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<PathBuf> {
    let src = src.as_ref().to_path_buf();
    let dest = dest.as_ref().to_path_buf();
    tokio::task::spawn_blocking(move || gz(src, dest))
        .await
        .map_err(|e| HutiError::Io(std::io::Error::other(e)))?
}

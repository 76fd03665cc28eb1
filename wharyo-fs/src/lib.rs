//! Shared filesystem helpers built on `cap-std` and `camino`.
//!
//! File-based feature stores keep one directory per layer under a home
//! directory. The helpers here resolve those directories, probe them, and
//! stage rewritten files inside a [`LayerTransaction`].
#![forbid(unsafe_code)]

mod transaction;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs::OpenOptions, fs_utf8};
use std::io::{self, Seek, SeekFrom, Write};

pub use transaction::LayerTransaction;

/// Directory holding the files of `layer` beneath `home`.
///
/// Callers validate `layer` as a single path segment first.
#[must_use]
pub fn layer_dir(home: &Utf8Path, layer: &str) -> Utf8PathBuf {
    home.join(layer)
}

/// Resolve an ambient directory for the given path and return the directory with the file name.
pub fn open_dir_and_file(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, String)> {
    let parent = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::other("target should include a file name"))?
        .to_owned();
    let dir = fs_utf8::Dir::open_ambient_dir(parent, ambient_authority())?;
    Ok((dir, file_name))
}

/// Return whether anything exists at `path`, following symbolic links.
///
/// Missing paths, including those below a missing directory, yield
/// `Ok(false)`.
pub fn path_exists(path: &Utf8Path) -> io::Result<bool> {
    match open_dir_and_file(path).and_then(|(dir, name)| dir.metadata(name.as_str())) {
        Ok(_) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Return whether a path exists and is a regular file using capability-based IO.
///
/// Missing paths yield `Ok(false)`.
pub fn file_is_file(path: &Utf8Path) -> io::Result<bool> {
    let probe = open_dir_and_file(path).and_then(|(dir, name)| dir.metadata(name.as_str()));
    match probe {
        Ok(meta) => Ok(meta.is_file()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Return whether a path exists and is a directory.
///
/// Missing paths yield `Ok(false)`.
pub fn dir_is_dir(path: &Utf8Path) -> io::Result<bool> {
    match fs_utf8::Dir::open_ambient_dir(path, ambient_authority()) {
        Ok(dir) => dir.dir_metadata().map(|meta| meta.is_dir()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Return whether the file at `path` is flagged read-only.
pub fn file_is_read_only(path: &Utf8Path) -> io::Result<bool> {
    let (dir, name) = open_dir_and_file(path)?;
    dir.metadata(name.as_str())
        .map(|meta| meta.permissions().readonly())
}

/// Read a UTF-8 text file.
pub fn read_to_string(path: &Utf8Path) -> io::Result<String> {
    let (dir, name) = open_dir_and_file(path)?;
    dir.read_to_string(name.as_str())
}

/// Read a whole file as bytes.
pub fn read(path: &Utf8Path) -> io::Result<Vec<u8>> {
    let (dir, name) = open_dir_and_file(path)?;
    dir.read(name.as_str())
}

/// Overwrite `bytes` at `offset` inside an existing file without truncating it.
///
/// Returns `Ok(false)` and leaves the file alone when it is too short to hold
/// the patched range.
pub fn patch_bytes(path: &Utf8Path, offset: u64, bytes: &[u8]) -> io::Result<bool> {
    let (dir, name) = open_dir_and_file(path)?;
    let mut options = OpenOptions::new();
    options.write(true);
    let mut file = dir.open_with(name.as_str(), &options)?;
    let end = offset.saturating_add(u64::try_from(bytes.len()).unwrap_or(u64::MAX));
    if file.metadata()?.len() < end {
        return Ok(false);
    }
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(true)
}

//! Scoped write transactions over the files of one layer directory.
//!
//! A transaction stages every rewritten file next to its target under a
//! hidden name. [`LayerTransaction::commit`] moves the current targets
//! aside, renames the staged files into place and puts the originals back
//! if any rename fails, so the layer ends up entirely old or entirely new.
//! [`LayerTransaction::rollback`] and dropping an unfinished transaction
//! remove whatever was staged. Release failures are logged and never mask
//! the outcome of the write itself.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use log::warn;

const STAGING_PREFIX: &str = ".wharyo-tx.";
const BACKUP_PREFIX: &str = ".wharyo-bak.";

/// Staged rewrite of the files in one layer directory.
///
/// Staged names keep the target's extension, so writers that derive sibling
/// files from a main path (`.shp` to `.shx` and `.dbf`) stage those
/// siblings under matching names.
///
/// # Examples
///
/// ```no_run
/// use camino::Utf8Path;
/// use wharyo_fs::LayerTransaction;
///
/// # fn main() -> std::io::Result<()> {
/// let mut tx = LayerTransaction::begin(Utf8Path::new("/data/layers/parcels"))?;
/// tx.write("parcels.geojson", br#"{"type":"FeatureCollection","features":[]}"#)?;
/// tx.commit()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct LayerTransaction {
    dir: fs_utf8::Dir,
    root: Utf8PathBuf,
    targets: Vec<String>,
    finished: bool,
}

fn staged_name(target: &str) -> String {
    format!("{STAGING_PREFIX}{target}")
}

fn backup_name(target: &str) -> String {
    format!("{BACKUP_PREFIX}{target}")
}

impl LayerTransaction {
    /// Open a transaction over the existing directory `root`.
    ///
    /// # Errors
    ///
    /// Fails when the directory cannot be opened.
    pub fn begin(root: &Utf8Path) -> io::Result<Self> {
        let dir = fs_utf8::Dir::open_ambient_dir(root, ambient_authority())?;
        Ok(Self {
            dir,
            root: root.to_owned(),
            targets: Vec::new(),
            finished: false,
        })
    }

    /// Register `target` and return the absolute path its replacement must
    /// be written to.
    ///
    /// Use this for writers that only accept filesystem paths.
    pub fn stage(&mut self, target: &str) -> Utf8PathBuf {
        if !self.targets.iter().any(|known| known == target) {
            self.targets.push(target.to_owned());
        }
        self.root.join(staged_name(target))
    }

    /// Stage `contents` as the replacement for `target`.
    ///
    /// # Errors
    ///
    /// Fails when the staged file cannot be written.
    pub fn write(&mut self, target: &str, contents: &[u8]) -> io::Result<()> {
        self.stage(target);
        self.dir.write(staged_name(target), contents)
    }

    /// Move every staged file over its target.
    ///
    /// Existing targets are renamed to backups first. When any step fails,
    /// targets already installed are removed and the backups renamed back,
    /// leaving the directory as it was before the commit.
    ///
    /// # Errors
    ///
    /// Returns the first rename failure, or an
    /// [`io::ErrorKind::IsADirectory`] error when a target names a
    /// directory. Staged files are removed when the transaction is dropped.
    pub fn commit(mut self) -> io::Result<()> {
        let mut backed_up = Vec::new();
        let mut installed = Vec::new();
        if let Err(err) = self.swap_in(&mut backed_up, &mut installed) {
            self.restore(&backed_up, &installed);
            return Err(err);
        }
        self.finished = true;
        for target in &backed_up {
            if let Err(err) = self.dir.remove_file(backup_name(target)) {
                warn!("failed to remove backup of {target} in {}: {err}", self.root);
            }
        }
        Ok(())
    }

    fn swap_in(&self, backed_up: &mut Vec<String>, installed: &mut Vec<String>) -> io::Result<()> {
        for target in &self.targets {
            match self.dir.symlink_metadata(target) {
                Ok(meta) if meta.is_dir() => {
                    return Err(io::Error::new(
                        io::ErrorKind::IsADirectory,
                        format!("{target} in {} is a directory", self.root),
                    ));
                }
                Ok(_) => {
                    self.dir.rename(target, &self.dir, backup_name(target))?;
                    backed_up.push(target.clone());
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(err),
            }
        }
        for target in &self.targets {
            self.dir.rename(staged_name(target), &self.dir, target)?;
            installed.push(target.clone());
        }
        Ok(())
    }

    fn restore(&self, backed_up: &[String], installed: &[String]) {
        // Restoring a backup replaces the installed file in the same rename.
        for target in installed.iter().filter(|target| !backed_up.contains(target)) {
            if let Err(err) = self.dir.remove_file(target) {
                warn!("failed to remove {target} in {} after a failed commit: {err}", self.root);
            }
        }
        for target in backed_up {
            if let Err(err) = self.dir.rename(backup_name(target), &self.dir, target) {
                warn!("failed to restore {target} in {}: {err}", self.root);
            }
        }
    }

    /// Discard every staged file.
    ///
    /// # Errors
    ///
    /// Returns the first removal failure; remaining files are still
    /// attempted.
    pub fn rollback(mut self) -> io::Result<()> {
        self.finished = true;
        self.release()
    }

    fn release(&self) -> io::Result<()> {
        let mut first_error = None;
        for target in &self.targets {
            match self.dir.remove_file(staged_name(target)) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => {
                    warn!(
                        "failed to remove staged file for {target} in {}: {err}",
                        self.root
                    );
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for LayerTransaction {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(err) = self.release() {
            warn!("failed to release transaction in {}: {err}", self.root);
        }
    }
}

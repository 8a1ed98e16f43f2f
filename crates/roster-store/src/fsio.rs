//! File plumbing shared by the whole-file rewrite backends.
//!
//! [`BackingFile`] owns the path of one store file, serializes operations on
//! it, and tracks whether the store has been closed. Rewrites are staged in a
//! temporary file next to the target and renamed over it.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};

/// Exclusive access to one store file for the lifetime of a backend.
#[derive(Debug)]
pub(crate) struct BackingFile {
    path: PathBuf,
    sync_writes: bool,
    /// `true` while the store is open.
    open: Mutex<bool>,
}

/// Proof that the caller holds the store lock on an open store.
pub(crate) struct OpenGuard<'a> {
    _guard: MutexGuard<'a, bool>,
}

impl BackingFile {
    /// Open the file at `path`, creating it with `initial` contents if it is
    /// missing or empty.
    pub(crate) fn open(path: &Path, initial: &[u8], sync_writes: bool) -> StoreResult<Self> {
        let backing = Self {
            path: path.to_path_buf(),
            sync_writes,
            open: Mutex::new(true),
        };
        match fs::metadata(path) {
            Ok(meta) if meta.len() == 0 && !initial.is_empty() => backing.replace(initial)?,
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                ensure_parent(path)?;
                let mut file = OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(false)
                    .open(path)?;
                file.write_all(initial)?;
                if sync_writes {
                    file.sync_all()?;
                }
                info!(path = %path.display(), "created store file");
            }
            Err(e) => return Err(e.into()),
        }
        Ok(backing)
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Lock the store, failing if it has been closed.
    pub(crate) fn lock(&self) -> StoreResult<OpenGuard<'_>> {
        let guard = self.open.lock().map_err(|_| StoreError::Poisoned)?;
        if !*guard {
            return Err(StoreError::Closed);
        }
        Ok(OpenGuard { _guard: guard })
    }

    /// Mark the store closed. Safe to call repeatedly.
    pub(crate) fn close(&self) {
        match self.open.lock() {
            Ok(mut open) => *open = false,
            Err(poisoned) => *poisoned.into_inner() = false,
        }
    }

    /// Read the whole file. A missing file reads as empty.
    pub(crate) fn read(&self, _guard: &OpenGuard<'_>) -> StoreResult<Vec<u8>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Append bytes at the end of the file.
    pub(crate) fn append(&self, _guard: &OpenGuard<'_>, bytes: &[u8]) -> StoreResult<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(bytes)?;
        if self.sync_writes {
            file.sync_data()?;
        }
        debug!(path = %self.path.display(), len = bytes.len(), "store append");
        Ok(())
    }

    /// Replace the whole file with `bytes`.
    pub(crate) fn rewrite(&self, _guard: &OpenGuard<'_>, bytes: &[u8]) -> StoreResult<()> {
        self.replace(bytes)
    }

    /// Stage `bytes` in a temp file next to the real target, then rename it
    /// over the target.
    ///
    /// A symlinked store path is resolved first so the link itself survives.
    /// The staged file takes over the target's permissions.
    fn replace(&self, bytes: &[u8]) -> StoreResult<()> {
        let target = match fs::canonicalize(&self.path) {
            Ok(resolved) => resolved,
            Err(e) if e.kind() == io::ErrorKind::NotFound => self.path.clone(),
            Err(e) => return Err(e.into()),
        };
        let mut staged = tempfile::NamedTempFile::new_in(parent_dir(&target))?;
        staged.write_all(bytes)?;
        match fs::metadata(&target) {
            Ok(meta) => staged.as_file().set_permissions(meta.permissions())?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        if self.sync_writes {
            staged.as_file().sync_all()?;
        }
        staged.persist(&target).map_err(|e| StoreError::Io(e.error))?;
        debug!(path = %self.path.display(), len = bytes.len(), "store rewrite");
        Ok(())
    }
}

/// Directory holding `path`, with `.` standing in for a bare file name.
pub(crate) fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Create the directory that will hold `path`.
pub(crate) fn ensure_parent(path: &Path) -> StoreResult<()> {
    fs::create_dir_all(parent_dir(path))?;
    Ok(())
}

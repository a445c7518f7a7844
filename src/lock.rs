//! Locking and atomic writes for the task tree
//!
//! - [`FileLock`]: fs2/flock advisory lock on `<root>/.taskmd.lock`, taken by
//!   directory-level migrations so two processes never copy/relink/delete the
//!   same tree at once
//! - [`TaskLocks`]: in-process lock registry keyed by task id, held for the
//!   whole of a multi-file relationship update
//! - [`write_atomic`]: temp file in the target directory + rename

use std::collections::{BTreeSet, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use fs2::FileExt;
use tempfile::NamedTempFile;

use crate::error::{Error, Result};

/// Default lock timeout in milliseconds
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5000;

/// Default retry interval when waiting for a lock
const LOCK_RETRY_INTERVAL_MS: u64 = 50;

fn is_lock_contended(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::WouldBlock {
        return true;
    }

    // On Windows, fs2/libc can surface lock/sharing violations as "Other".
    #[cfg(windows)]
    {
        matches!(err.raw_os_error(), Some(32) | Some(33))
    }
    #[cfg(not(windows))]
    {
        false
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?)
}

/// A file lock guard that releases the lock when dropped
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Acquire an exclusive lock on a file with timeout
    ///
    /// If the file doesn't exist, it will be created.
    pub fn acquire(path: impl AsRef<Path>, timeout_ms: u64) -> Result<Self> {
        let path = path.as_ref();
        let file = open_lock_file(path)?;

        let start = Instant::now();
        let timeout = Duration::from_millis(timeout_ms);
        let retry_interval = Duration::from_millis(LOCK_RETRY_INTERVAL_MS);

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    return Ok(FileLock {
                        file,
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if is_lock_contended(&e) => {
                    if start.elapsed() >= timeout {
                        return Err(Error::LockFailed(path.to_path_buf()));
                    }
                    tracing::debug!(path = %path.display(), "waiting for file lock");
                    std::thread::sleep(retry_interval);
                }
                Err(e) => {
                    return Err(Error::Io(e));
                }
            }
        }
    }

    /// Try to acquire a lock without waiting
    ///
    /// Returns `Ok(Some(lock))` if acquired, `Ok(None)` if would block.
    pub fn try_acquire(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        let file = open_lock_file(path)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(FileLock {
                file,
                path: path.to_path_buf(),
            })),
            Err(e) if is_lock_contended(&e) => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Get the path to the locked file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Atomically write data to a file
///
/// Writes a temporary file in the same directory, then renames it over the
/// target, so readers see either the old or the new content.
pub fn write_atomic(path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(data)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|err| Error::Io(err.error))?;
    Ok(())
}

/// Atomically write string data to a file
pub fn write_atomic_str(path: impl AsRef<Path>, data: &str) -> Result<()> {
    write_atomic(path, data.as_bytes())
}

#[derive(Debug, Default)]
struct LockState {
    held: HashSet<String>,
    exclusive: bool,
}

/// In-process lock registry keyed by task id.
///
/// A guard covers a whole set of ids, acquired all-or-nothing, so callers
/// never hold one id while waiting on another. [`TaskLocks::lock_all`] waits
/// for every id guard to drain and blocks new ones.
#[derive(Debug, Default)]
pub struct TaskLocks {
    state: Mutex<LockState>,
    released: Condvar,
}

impl TaskLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, LockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until every id in `ids` is free, then hold them all
    pub fn lock_ids<I, S>(&self, ids: I) -> TaskLockGuard<'_>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: BTreeSet<String> = ids.into_iter().map(Into::into).collect();
        let mut state = self.state();
        while state.exclusive || ids.iter().any(|id| state.held.contains(id)) {
            state = self
                .released
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.held.extend(ids.iter().cloned());
        TaskLockGuard {
            locks: self,
            ids,
            exclusive: false,
        }
    }

    /// Block until no id is held, then hold the whole tree
    pub fn lock_all(&self) -> TaskLockGuard<'_> {
        let mut state = self.state();
        while state.exclusive || !state.held.is_empty() {
            state = self
                .released
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.exclusive = true;
        TaskLockGuard {
            locks: self,
            ids: BTreeSet::new(),
            exclusive: true,
        }
    }

    /// Ids currently held by some guard
    pub fn held(&self) -> Vec<String> {
        let mut held: Vec<String> = self.state().held.iter().cloned().collect();
        held.sort();
        held
    }
}

/// Releases its ids (or the exclusive hold) on drop
#[derive(Debug)]
pub struct TaskLockGuard<'a> {
    locks: &'a TaskLocks,
    ids: BTreeSet<String>,
    exclusive: bool,
}

impl TaskLockGuard<'_> {
    /// True if this guard covers `id`
    pub fn covers(&self, id: &str) -> bool {
        self.exclusive || self.ids.contains(id)
    }

    /// True if this guard covers every id in `ids`
    pub fn covers_all<'i, I: IntoIterator<Item = &'i String>>(&self, ids: I) -> bool {
        ids.into_iter().all(|id| self.covers(id))
    }
}

impl Drop for TaskLockGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.locks.state();
        if self.exclusive {
            state.exclusive = false;
        }
        for id in &self.ids {
            state.held.remove(id);
        }
        drop(state);
        self.locks.released.notify_all();
    }
}

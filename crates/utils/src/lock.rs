//! Host-scoped, non-blocking advisory locks for stage families.
//!
//! A stage tries the lock once. If another process (or another open handle in
//! this process) holds it, [`StageLock::try_acquire`] returns `Ok(None)` and
//! the caller is expected to exit cleanly without writing anything.

use std::{
    fs::{File, OpenOptions, TryLockError},
    io::Write,
    path::{Path, PathBuf},
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("IO error on lock file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Guard for an exclusive file lock (`flock` on unix); released when dropped.
#[derive(Debug)]
pub struct StageLock {
    file: File,
    path: PathBuf,
}

impl StageLock {
    pub fn try_acquire(path: &Path) -> Result<Option<StageLock>, LockError> {
        let io_err = |source| LockError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .map_err(io_err)?;

        if !try_lock_exclusive(&file).map_err(io_err)? {
            tracing::debug!("Lock busy: {}", path.display());
            return Ok(None);
        }

        let mut lock = StageLock {
            file,
            path: path.to_path_buf(),
        };
        lock.write_owner();
        Ok(Some(lock))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_owner(&mut self) {
        // Owner info is informational only.
        let _ = self.file.set_len(0);
        let _ = writeln!(self.file, "pid={}", std::process::id());
    }
}

impl Drop for StageLock {
    fn drop(&mut self) {
        unlock(&self.file);
    }
}

fn try_lock_exclusive(file: &File) -> std::io::Result<bool> {
    match file.try_lock() {
        Ok(()) => Ok(true),
        Err(TryLockError::WouldBlock) => Ok(false),
        Err(TryLockError::Error(err)) => Err(err),
    }
}

fn unlock(file: &File) {
    let _ = file.unlock();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_refused_until_release() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("locks/production.lock");

        let first = StageLock::try_acquire(&path).unwrap();
        assert!(first.is_some());

        let second = StageLock::try_acquire(&path).unwrap();
        assert!(second.is_none());

        drop(first);
        let third = StageLock::try_acquire(&path).unwrap();
        assert!(third.is_some());
    }

    #[test]
    fn distinct_families_do_not_contend() {
        let tmp = tempfile::TempDir::new().unwrap();
        let production = StageLock::try_acquire(&tmp.path().join("production.lock")).unwrap();
        let publish = StageLock::try_acquire(&tmp.path().join("publish.lock")).unwrap();
        assert!(production.is_some());
        assert!(publish.is_some());
    }
}

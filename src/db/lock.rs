// src/db/lock.rs

//! Advisory lock file serializing mutating transactions across processes

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Exclusive lock on `<db>.lock`, taken without waiting
#[derive(Debug)]
pub struct DatabaseLock {
    path: PathBuf,
    file: Option<File>,
}

impl DatabaseLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Take the lock, failing immediately with `WouldBlock` if another holder has it
    pub fn acquire(&mut self) -> io::Result<()> {
        if self.file.is_some() {
            return Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                "lock already held by this handle",
            ));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;

        if let Err(e) = file.try_lock_exclusive() {
            return Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                format!("{} is locked by another process ({})", self.path.display(), e),
            ));
        }

        debug!("Acquired lock {}", self.path.display());
        self.file = Some(file);
        Ok(())
    }

    pub fn release(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = FileExt::unlock(&file) {
                warn!("Failed to unlock {}: {}", self.path.display(), e);
            }
            debug!("Released lock {}", self.path.display());
        }
    }
}

impl Drop for DatabaseLock {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_second_holder_is_refused() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("pkcore.db.lock");

        let mut first = DatabaseLock::new(&path);
        first.acquire().unwrap();
        assert!(first.is_held());
        assert_eq!(first.path(), path.as_path());

        let mut second = DatabaseLock::new(&path);
        let err = second.acquire().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
        assert!(!second.is_held());

        first.release();
        second.acquire().unwrap();
    }

    #[test]
    fn test_drop_releases() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("pkcore.db.lock");

        {
            let mut lock = DatabaseLock::new(&path);
            lock.acquire().unwrap();
        }

        let mut again = DatabaseLock::new(&path);
        again.acquire().unwrap();
    }

    #[test]
    fn test_release_without_acquire_is_noop() {
        let mut lock = DatabaseLock::new("/nonexistent/pkcore.lock");
        lock.release();
        assert!(!lock.is_held());
    }
}

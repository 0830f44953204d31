//! Advisory, filesystem-backed locks for generation directories.
//!
//! Two lock namespaces live inside a chain's base directory:
//!
//! - `.SHUFFLE` guards rotation of the whole chain.
//! - `.FILES-<valid-time>` guards one valid time while a writer finalizes it.
//!
//! A lock is a sentinel file created with `create_new`, so acquisition is
//! atomic on local filesystems. Locks are cooperative: a sentinel older than
//! its takeover age, or one still present after the retry budget, is assumed
//! abandoned and seized with a warning.

use crate::error::{FieldStoreError, Result};
use crate::tstamp::Timestamp;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime};
use tracing::{debug, error, warn};

/// Shuffle-lock sentinel file name.
pub const SHUFFLE_LOCK_FILE: &str = ".SHUFFLE";

/// Prefix of per-valid-time file-lock sentinels.
pub const FILE_LOCK_PREFIX: &str = ".FILES-";

/// Default pause between lock attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Default attempts before a shuffle lock is taken over.
pub const DEFAULT_SHUFFLE_ATTEMPTS: u32 = 120;

/// Default attempts before a file lock is taken over.
pub const DEFAULT_FILE_ATTEMPTS: u32 = 300;

/// Default attempts a file-lock request waits for a shuffle to finish.
pub const DEFAULT_SHUFFLE_WAIT_ATTEMPTS: u32 = 300;

/// Default attempts a shuffle waits for outstanding file locks to drain.
pub const DEFAULT_DRAIN_ATTEMPTS: u32 = 60;

/// Default age after which a shuffle lock is considered abandoned.
pub const DEFAULT_SHUFFLE_TAKEOVER_AGE: Duration = Duration::from_secs(120);

/// Default age after which a file lock is considered abandoned.
pub const DEFAULT_FILE_TAKEOVER_AGE: Duration = Duration::from_secs(300);

/// Timing parameters for lock acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockConfig {
    /// Pause between attempts.
    pub retry_interval: Duration,
    /// Attempts before a held shuffle lock is taken over.
    pub shuffle_attempts: u32,
    /// Attempts before a held file lock is taken over.
    pub file_attempts: u32,
    /// Attempts a file-lock request waits for a shuffle to clear.
    pub shuffle_wait_attempts: u32,
    /// Attempts a shuffle waits for file locks to drain.
    pub drain_attempts: u32,
    /// Sentinel age after which a shuffle lock is seized immediately.
    pub shuffle_takeover_age: Duration,
    /// Sentinel age after which a file lock is seized immediately.
    pub file_takeover_age: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            retry_interval: DEFAULT_RETRY_INTERVAL,
            shuffle_attempts: DEFAULT_SHUFFLE_ATTEMPTS,
            file_attempts: DEFAULT_FILE_ATTEMPTS,
            shuffle_wait_attempts: DEFAULT_SHUFFLE_WAIT_ATTEMPTS,
            drain_attempts: DEFAULT_DRAIN_ATTEMPTS,
            shuffle_takeover_age: DEFAULT_SHUFFLE_TAKEOVER_AGE,
            file_takeover_age: DEFAULT_FILE_TAKEOVER_AGE,
        }
    }
}

impl LockConfig {
    /// Sets the pause between attempts.
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Sets the shuffle-lock attempt budget.
    pub fn with_shuffle_attempts(mut self, attempts: u32) -> Self {
        self.shuffle_attempts = attempts;
        self
    }

    /// Sets the file-lock attempt budget.
    pub fn with_file_attempts(mut self, attempts: u32) -> Self {
        self.file_attempts = attempts;
        self
    }

    /// Sets how long a file-lock request waits for a shuffle.
    pub fn with_shuffle_wait_attempts(mut self, attempts: u32) -> Self {
        self.shuffle_wait_attempts = attempts;
        self
    }

    /// Sets how long a shuffle waits for file locks to drain.
    pub fn with_drain_attempts(mut self, attempts: u32) -> Self {
        self.drain_attempts = attempts;
        self
    }

    /// Sets the shuffle-lock takeover age.
    pub fn with_shuffle_takeover_age(mut self, age: Duration) -> Self {
        self.shuffle_takeover_age = age;
        self
    }

    /// Sets the file-lock takeover age.
    pub fn with_file_takeover_age(mut self, age: Duration) -> Self {
        self.file_takeover_age = age;
        self
    }
}

/// Path of the shuffle-lock sentinel for a chain base directory.
pub fn shuffle_lock_path(dir: &Path) -> PathBuf {
    dir.join(SHUFFLE_LOCK_FILE)
}

/// Path of the file-lock sentinel for one valid time.
pub fn file_lock_path(dir: &Path, vtime: &Timestamp) -> PathBuf {
    dir.join(format!("{}{}", FILE_LOCK_PREFIX, vtime))
}

/// Held shuffle lock. Released when dropped.
#[derive(Debug)]
#[must_use = "the shuffle lock is released when the guard is dropped"]
pub struct ShuffleLock {
    sentinel: Sentinel,
}

impl ShuffleLock {
    /// Sentinel path.
    pub fn path(&self) -> &Path {
        &self.sentinel.path
    }

    /// Releases the lock now. Returns false if the sentinel could not be
    /// removed.
    pub fn release(mut self) -> bool {
        self.sentinel.release()
    }
}

/// Held file lock for one valid time. Released when dropped.
#[derive(Debug)]
#[must_use = "the file lock is released when the guard is dropped"]
pub struct FileLock {
    sentinel: Sentinel,
}

impl FileLock {
    /// Sentinel path.
    pub fn path(&self) -> &Path {
        &self.sentinel.path
    }

    /// Releases the lock now. Returns false if the sentinel could not be
    /// removed.
    pub fn release(mut self) -> bool {
        self.sentinel.release()
    }
}

#[derive(Debug)]
struct Sentinel {
    path: PathBuf,
    held: bool,
}

impl Sentinel {
    fn release(&mut self) -> bool {
        if !self.held {
            return true;
        }
        self.held = false;
        unlock(&self.path)
    }
}

impl Drop for Sentinel {
    fn drop(&mut self) {
        self.release();
    }
}

/// Acquires and releases chain locks with a fixed timing policy.
///
/// # Examples
/// ```rust,ignore
/// use alopex_fieldstore::lock::{LockConfig, LockManager};
///
/// let locks = LockManager::new(LockConfig::default());
/// let guard = locks.acquire_shuffle(base_dir)?;
/// // rotate the chain
/// drop(guard);
/// ```
#[derive(Debug, Clone, Default)]
pub struct LockManager {
    config: LockConfig,
}

impl LockManager {
    /// Creates a lock manager.
    pub fn new(config: LockConfig) -> Self {
        Self { config }
    }

    /// Returns the timing policy.
    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Acquires the shuffle lock on a chain base directory.
    ///
    /// After the lock is held, outstanding file locks are given
    /// `drain_attempts` intervals to clear. Any that remain are force-released
    /// and the shuffle proceeds.
    pub fn acquire_shuffle(&self, dir: &Path) -> Result<ShuffleLock> {
        let path = shuffle_lock_path(dir);
        let sentinel = self.acquire(
            path,
            self.config.shuffle_attempts,
            self.config.shuffle_takeover_age,
        )?;
        let guard = ShuffleLock { sentinel };

        if !self.file_locks_released(dir, self.config.drain_attempts) {
            warn!(
                "Not all file locks released in {}, forcing release",
                dir.display()
            );
            if !release_all_file_locks(dir) {
                return Err(FieldStoreError::LockUnavailable(guard.path().to_path_buf()));
            }
        }
        Ok(guard)
    }

    /// Acquires the file lock for one valid time in a chain base directory.
    ///
    /// Fails if a shuffle lock on the directory does not clear within
    /// `shuffle_wait_attempts` intervals.
    pub fn acquire_file(&self, dir: &Path, vtime: &Timestamp) -> Result<FileLock> {
        let shuffle = shuffle_lock_path(dir);
        if !wait_for_absence(
            &shuffle,
            self.config.retry_interval,
            self.config.shuffle_wait_attempts,
        ) {
            error!("Shuffle lock still held on {}", dir.display());
            return Err(FieldStoreError::LockUnavailable(shuffle));
        }
        let sentinel = self.acquire(
            file_lock_path(dir, vtime),
            self.config.file_attempts,
            self.config.file_takeover_age,
        )?;
        Ok(FileLock { sentinel })
    }

    /// Polls until no file locks remain in `dir`, up to `attempts` intervals.
    pub fn file_locks_released(&self, dir: &Path, attempts: u32) -> bool {
        let attempts = attempts.max(1);
        for attempt in 0..attempts {
            let locks = list_file_locks(dir);
            if locks.is_empty() {
                return true;
            }
            debug!(
                "Directory {} has {} file locks: {:?}",
                dir.display(),
                locks.len(),
                locks
            );
            if attempt + 1 < attempts {
                thread::sleep(self.config.retry_interval);
            }
        }
        list_file_locks(dir).is_empty()
    }

    fn acquire(&self, path: PathBuf, attempts: u32, takeover_age: Duration) -> Result<Sentinel> {
        for attempt in 0..attempts {
            match try_lock(&path) {
                Ok(true) => return Ok(Sentinel { path, held: true }),
                Ok(false) => {}
                Err(err) => {
                    error!("Cannot create lock {}: {:?}", path.display(), err);
                    return Err(err.into());
                }
            }
            if sentinel_age(&path).is_some_and(|age| age >= takeover_age) {
                warn!("Taking over stale lock {}", path.display());
                unlock(&path);
                continue;
            }
            if attempt + 1 < attempts {
                thread::sleep(self.config.retry_interval);
            }
        }

        warn!("Taking over lock {}", path.display());
        unlock(&path);
        match try_lock(&path) {
            Ok(true) => Ok(Sentinel { path, held: true }),
            Ok(false) => {
                error!("Unable to take over lock {}", path.display());
                Err(FieldStoreError::LockUnavailable(path))
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Force-releases every file lock in `dir`. Returns false if any sentinel
/// could not be removed.
pub fn release_all_file_locks(dir: &Path) -> bool {
    let mut ok = true;
    for name in list_file_locks(dir) {
        ok &= unlock(&dir.join(name));
    }
    ok
}

/// Names of file-lock sentinels present in `dir`.
pub fn list_file_locks(dir: &Path) -> Vec<String> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(err) => {
            warn!("Cannot list {}: {:?}", dir.display(), err);
            return Vec::new();
        }
    };
    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.starts_with(FILE_LOCK_PREFIX))
        .collect();
    names.sort();
    names
}

fn try_lock(path: &Path) -> io::Result<bool> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(_) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(err) => Err(err),
    }
}

fn unlock(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(err) if err.kind() == io::ErrorKind::NotFound => true,
        Err(err) => {
            error!("Unable to release lock {}: {:?}", path.display(), err);
            false
        }
    }
}

fn sentinel_age(path: &Path) -> Option<Duration> {
    let modified = fs::metadata(path).and_then(|meta| meta.modified()).ok()?;
    SystemTime::now().duration_since(modified).ok()
}

fn wait_for_absence(path: &Path, interval: Duration, attempts: u32) -> bool {
    for attempt in 0..attempts.max(1) {
        if !path.exists() {
            return true;
        }
        if attempt + 1 < attempts {
            thread::sleep(interval);
        }
    }
    !path.exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn quick() -> LockManager {
        LockManager::new(
            LockConfig::default()
                .with_retry_interval(Duration::from_millis(1))
                .with_shuffle_attempts(3)
                .with_file_attempts(3)
                .with_shuffle_wait_attempts(3)
                .with_drain_attempts(2),
        )
    }

    #[test]
    fn test_shuffle_lock_guard_releases() {
        let dir = TempDir::new().unwrap();
        let locks = quick();
        let guard = locks.acquire_shuffle(dir.path()).unwrap();
        assert!(shuffle_lock_path(dir.path()).exists());
        drop(guard);
        assert!(!shuffle_lock_path(dir.path()).exists());
    }

    #[test]
    fn test_explicit_release_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let locks = quick();
        let vtime = Timestamp::parse("1991:238:12").unwrap();
        let guard = locks.acquire_file(dir.path(), &vtime).unwrap();
        let path = guard.path().to_path_buf();
        assert_eq!(path.file_name().unwrap(), ".FILES-1991:238:12");
        fs::remove_file(&path).unwrap();
        assert!(guard.release());
    }

    #[test]
    fn test_file_lock_blocked_by_shuffle() {
        let dir = TempDir::new().unwrap();
        let locks = quick();
        let _shuffle = locks.acquire_shuffle(dir.path()).unwrap();
        let vtime = Timestamp::parse("1991:238:12").unwrap();
        let result = locks.acquire_file(dir.path(), &vtime);
        assert!(matches!(result, Err(FieldStoreError::LockUnavailable(_))));
    }

    #[test]
    fn test_held_lock_taken_over_after_attempts() {
        let dir = TempDir::new().unwrap();
        let locks = quick();
        let vtime = Timestamp::parse("1991:238:12").unwrap();
        let first = locks.acquire_file(dir.path(), &vtime).unwrap();
        let second = locks.acquire_file(dir.path(), &vtime).unwrap();
        assert!(second.path().exists());
        assert!(second.release());
        assert!(first.release());
    }

    #[test]
    fn test_drain_force_releases_file_locks() {
        let dir = TempDir::new().unwrap();
        let locks = quick();
        let vtime = Timestamp::parse("1991:238:12").unwrap();
        let held = locks.acquire_file(dir.path(), &vtime).unwrap();
        let _shuffle = locks.acquire_shuffle(dir.path()).unwrap();
        assert!(list_file_locks(dir.path()).is_empty());
        assert!(held.release());
    }
}

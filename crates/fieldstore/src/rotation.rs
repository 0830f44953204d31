//! Generation chains and their rotation.
//!
//! A chain is a base directory holding the newest generation, with each
//! older generation nested one `Prev` level deeper. Stamped generations
//! carry their run time in a `Dstamp` file.
//!
//! ```text
//! <base>/Dstamp            1991:239:00
//! <base>/Prev/Dstamp       1991:238:12
//! <base>/Prev/Prev/        (empty slot)
//! ```
//!
//! Fitting a run time older than a generation's stamp shuffles that
//! generation down the chain first: every regular file moves one level
//! deeper and the deepest generation's files are discarded.

use crate::error::{FieldStoreError, Result};
use crate::lock::{LockManager, SHUFFLE_LOCK_FILE};
use crate::tstamp::Timestamp;
use std::cmp::Ordering;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// Run-time stamp file name.
pub const STAMP_FILE: &str = "Dstamp";

/// Previous-generation directory name.
pub const PREV_DIR: &str = "Prev";

/// Path of the stamp file of a generation.
pub fn stamp_path(dir: &Path) -> PathBuf {
    dir.join(STAMP_FILE)
}

/// Path of the previous generation below `dir`.
pub fn prev_dir(dir: &Path) -> PathBuf {
    dir.join(PREV_DIR)
}

/// Path of the generation `depth` levels below `base`.
pub fn generation_dir(base: &Path, depth: usize) -> PathBuf {
    let mut dir = base.to_path_buf();
    for _ in 0..depth {
        dir.push(PREV_DIR);
    }
    dir
}

/// Reads the run-time stamp of a generation.
///
/// Returns `Ok(None)` if the generation has no stamp, and an error if the
/// stamp cannot be read or its first token is not a canonical timestamp.
pub fn read_stamp(dir: &Path) -> Result<Option<Timestamp>> {
    let text = match fs::read_to_string(stamp_path(dir)) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let token = text
        .split_whitespace()
        .next()
        .ok_or_else(|| FieldStoreError::InvalidTimestamp(String::new()))?;
    Timestamp::parse(token).map(Some)
}

/// Writes the run-time stamp of a generation.
pub fn write_stamp(dir: &Path, rtime: &Timestamp) -> Result<()> {
    fs::write(stamp_path(dir), format!("{}\n", rtime))?;
    debug!("Stamped {} with {}", dir.display(), rtime);
    Ok(())
}

/// Stamps of every generation from `base` down, stopping at the first
/// generation that is missing, unstamped or unreadable.
pub fn chain_run_times(base: &Path) -> Vec<Timestamp> {
    let mut times = Vec::new();
    let mut dir = base.to_path_buf();
    while dir.is_dir() {
        match read_stamp(&dir) {
            Ok(Some(stamp)) => times.push(stamp),
            Ok(None) => break,
            Err(err) => {
                debug!("Chain walk stopped at {}: {:?}", dir.display(), err);
                break;
            }
        }
        dir = prev_dir(&dir);
    }
    times
}

/// Moves the files of a generation one level down the chain.
///
/// A stamped generation with a `Prev` directory first shuffles `Prev`
/// recursively, then hands its own files down. Anywhere else the files are
/// discarded. Sub-directories and the shuffle sentinel stay in place.
pub fn shuffle_directory(dir: &Path) -> Result<()> {
    let prev = prev_dir(dir);
    let shift = stamp_path(dir).is_file() && prev.is_dir();
    if shift {
        shuffle_directory(&prev)?;
    }

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        if name == SHUFFLE_LOCK_FILE {
            continue;
        }
        let path = entry.path();
        if shift {
            move_file(&path, &prev.join(&name))?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

fn move_file(from: &Path, to: &Path) -> Result<()> {
    match fs::hard_link(from, to) {
        Ok(()) => fs::remove_file(from)?,
        Err(err) => {
            debug!(
                "Cannot link {} to {}: {:?}, renaming",
                from.display(),
                to.display(),
                err
            );
            fs::rename(from, to)?;
        }
    }
    Ok(())
}

/// Fits run times into generation chains under the shuffle lock.
///
/// # Examples
/// ```rust,ignore
/// use alopex_fieldstore::rotation::RotationEngine;
///
/// let engine = RotationEngine::new(env.locks());
/// let dir = engine.fit(&base, Some(&rtime), true)?;
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RotationEngine<'a> {
    locks: &'a LockManager,
}

impl<'a> RotationEngine<'a> {
    /// Creates an engine using the given lock policy.
    pub fn new(locks: &'a LockManager) -> Self {
        Self { locks }
    }

    /// Selects the generation for `rtime` in the chain rooted at `base`.
    ///
    /// Walks down from `base`. A generation stamped with `rtime`, with no
    /// stamp, or with an unreadable stamp is selected as is. A generation
    /// with an older stamp is shuffled down and then selected. Newer stamps
    /// are skipped. When `stamped` is set the selected generation is
    /// stamped with `rtime`.
    ///
    /// Fails with [`FieldStoreError::RunTooOld`] when the walk leaves the
    /// chain. The shuffle lock is released on every path.
    pub fn fit(&self, base: &Path, rtime: Option<&Timestamp>, stamped: bool) -> Result<PathBuf> {
        if stamped && rtime.is_none() {
            return Err(FieldStoreError::IncompleteDescriptor("run time"));
        }

        let guard = self.locks.acquire_shuffle(base)?;
        let mut dir = base.to_path_buf();
        loop {
            if !dir.is_dir() {
                let rtime = rtime.map(Timestamp::to_string).unwrap_or_default();
                error!(
                    "Cannot fit run time \"{}\" into {}: chain exhausted at {}",
                    rtime,
                    base.display(),
                    dir.display()
                );
                return Err(FieldStoreError::RunTooOld {
                    rtime,
                    dir: base.to_path_buf(),
                });
            }

            let stamp = match read_stamp(&dir) {
                Ok(Some(stamp)) => stamp,
                Ok(None) => break,
                Err(err) => {
                    debug!("Reusing {} with unreadable stamp: {:?}", dir.display(), err);
                    break;
                }
            };
            let Some(rtime) = rtime else {
                break;
            };
            match stamp.compare(rtime, 0.0) {
                Ordering::Equal => break,
                Ordering::Less => {
                    debug!(
                        "Shuffling {} (stamp {} older than {})",
                        dir.display(),
                        stamp,
                        rtime
                    );
                    shuffle_directory(&dir)?;
                    break;
                }
                Ordering::Greater => dir = prev_dir(&dir),
            }
        }

        if stamped {
            if let Some(rtime) = rtime {
                write_stamp(&dir, rtime)?;
            }
        }
        if !guard.release() {
            warn!("Cannot release shuffle lock on {}", base.display());
        }
        Ok(dir)
    }
}

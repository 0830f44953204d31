//! Source directory resolution.
//!
//! A source's base directory is `<root of directory tag>/<path>/<subpath>`.
//! Rotated sources keep older runs in nested `Prev` generations below it
//! (see [`crate::rotation`]).

use crate::descriptor::{FieldDescriptor, FieldUpdate};
use crate::environ::Environ;
use crate::error::{FieldStoreError, Result};
use crate::registry::SourceDef;
use crate::rotation::{self, generation_dir, prev_dir, stamp_path, RotationEngine};
use crate::tstamp::Timestamp;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use tracing::{debug, error, warn};

/// Resolves and prepares generation directories for sources.
///
/// # Examples
/// ```rust,ignore
/// let resolver = env.resolver();
/// let dir = resolver.prepare_source_directory_by_name("GEM", "", Some("1991:238:12"))?;
/// let same = resolver.source_directory_by_name("GEM", "", Some("1991:238:12"))?;
/// assert_eq!(Some(dir), same);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct DirectoryResolver<'a> {
    env: &'a Environ,
}

impl<'a> DirectoryResolver<'a> {
    /// Creates a resolver bound to a context.
    pub fn new(env: &'a Environ) -> Self {
        Self { env }
    }

    /// Composes a base directory from a directory tag, path and sub-path.
    ///
    /// A blank tag leaves `path` relative to the working directory.
    pub fn data_directory_path(&self, tag: &str, path: &str, subpath: &str) -> Result<PathBuf> {
        let mut dir = if tag.trim().is_empty() {
            PathBuf::new()
        } else {
            self.env
                .registry()
                .directory(tag)
                .map(Path::to_path_buf)
                .ok_or_else(|| {
                    error!(
                        "Cannot build directory name for tag \"{}\" path \"{}\" subpath \"{}\"",
                        tag, path, subpath
                    );
                    FieldStoreError::UnknownDirectoryTag(tag.into())
                })?
        };
        for part in [path, subpath] {
            if !part.is_empty() {
                dir.push(part);
            }
        }
        Ok(dir)
    }

    /// Finds the generation holding `rtime` below a base directory.
    ///
    /// Returns the base directory itself when no run time is requested or
    /// the base carries no stamp. Returns `None` when the base directory is
    /// missing, or the chain runs out or hits an unreadable stamp before a
    /// matching generation.
    pub fn find_data_directory(
        &self,
        tag: &str,
        path: &str,
        subpath: &str,
        rtime: Option<&Timestamp>,
    ) -> Result<Option<PathBuf>> {
        let base = self.data_directory_path(tag, path, subpath)?;
        if !base.is_dir() {
            warn!("Cannot find directory: {}", base.display());
            return Ok(None);
        }
        let Some(rtime) = rtime else {
            return Ok(Some(base));
        };
        if !stamp_path(&base).is_file() {
            return Ok(Some(base));
        }

        let mut dir = base;
        while dir.is_dir() {
            match rotation::read_stamp(&dir) {
                Ok(Some(stamp)) if stamp.matches(rtime) => return Ok(Some(dir)),
                Ok(Some(_)) => dir = prev_dir(&dir),
                Ok(None) => return Ok(None),
                Err(err) => {
                    debug!("Unreadable stamp in {}: {:?}", dir.display(), err);
                    return Ok(None);
                }
            }
        }
        Ok(None)
    }

    /// Base directory of the descriptor's source and sub-source, whether or
    /// not it exists.
    pub fn base_directory(&self, desc: &FieldDescriptor) -> Result<PathBuf> {
        let (source, subpath) = self.source_of(desc)?;
        self.data_directory_path(&source.directory_tag, &source.path, subpath)
    }

    /// Base directory of the descriptor's source, if it exists.
    pub fn existing_base_directory(&self, desc: &FieldDescriptor) -> Result<Option<PathBuf>> {
        let (source, subpath) = self.source_of(desc)?;
        self.find_data_directory(&source.directory_tag, &source.path, subpath, None)
    }

    /// The descriptor's run time in its source's minutes convention.
    pub fn normalized_run_time(&self, desc: &FieldDescriptor) -> Option<Timestamp> {
        let source = desc.source().map(|id| self.env.registry().source(id))?;
        desc.run_time()
            .map(|rtime| rtime.for_minutes_rule(source.minutes_required))
    }

    /// Resolves the generation directory for the descriptor's run time.
    pub fn source_directory(&self, desc: &FieldDescriptor) -> Result<Option<PathBuf>> {
        let (source, subpath) = self.source_of(desc)?;
        let rtime = self.normalized_run_time(desc);
        self.find_data_directory(&source.directory_tag, &source.path, subpath, rtime.as_ref())
    }

    /// Resolves the generation directory for a named source and run time.
    pub fn source_directory_by_name(
        &self,
        name: &str,
        subname: &str,
        rtime: Option<&str>,
    ) -> Result<Option<PathBuf>> {
        let desc = self.descriptor_by_name(name, subname, rtime)?;
        self.source_directory(&desc)
    }

    /// Full path of a file in the generation directory of a named source.
    pub fn source_path_by_name(
        &self,
        name: &str,
        subname: &str,
        rtime: Option<&str>,
        ident: &str,
    ) -> Result<Option<PathBuf>> {
        let dir = self.source_directory_by_name(name, subname, rtime)?;
        Ok(dir.map(|dir| dir.join(ident)))
    }

    /// Resolves the generation directory for the descriptor's run time,
    /// creating the chain and rotating it as needed.
    ///
    /// Guidance and Allied generations are stamped with the run time. An
    /// existing unstamped generation selected for a blank run time is an
    /// error for those source types.
    pub fn prepare_source_directory(&self, desc: &FieldDescriptor) -> Result<PathBuf> {
        let (source, subpath) = self.source_of(desc)?;
        let rtime = self.normalized_run_time(desc);
        let (tag, path) = (&source.directory_tag, &source.path);

        if let Some(dir) = self.find_data_directory(tag, path, subpath, rtime.as_ref())? {
            return stamp_existing(dir, source, rtime.as_ref());
        }

        let base = self.data_directory_path(tag, path, subpath)?;
        let deepest = generation_dir(&base, source.layers.max(1) - 1);
        let existed = deepest.is_dir();
        if let Err(err) = fs::create_dir_all(&deepest) {
            // Another process may be creating the same chain.
            thread::sleep(self.env.locks().config().retry_interval);
            if let Some(dir) = self.find_data_directory(tag, path, subpath, rtime.as_ref())? {
                debug!("Directory {} was just created elsewhere", dir.display());
                return Ok(dir);
            }
            error!("Cannot create directory {}: {:?}", deepest.display(), err);
            return Err(err.into());
        }
        if !existed {
            debug!(
                "Created directory chain {} ({} layers)",
                base.display(),
                source.layers
            );
        }

        RotationEngine::new(self.env.locks()).fit(
            &base,
            rtime.as_ref(),
            source.source_type.is_stamped(),
        )
    }

    /// Prepares the generation directory for a named source and run time.
    pub fn prepare_source_directory_by_name(
        &self,
        name: &str,
        subname: &str,
        rtime: Option<&str>,
    ) -> Result<PathBuf> {
        let desc = self.descriptor_by_name(name, subname, rtime)?;
        self.prepare_source_directory(&desc)
    }

    /// Run times of every stamped generation, most recent first.
    ///
    /// Only Guidance and Allied sources carry run times; other sources give
    /// an empty list.
    pub fn source_run_time_list(&self, desc: &FieldDescriptor) -> Result<Vec<Timestamp>> {
        let (source, subpath) = self.source_of(desc)?;
        if !source.source_type.is_stamped() {
            return Ok(Vec::new());
        }
        let base = self.existing_base_directory(desc)?;
        Ok(base
            .map(|base| rotation::chain_run_times(&base))
            .unwrap_or_default())
    }

    /// Builds a descriptor for a source, sub-source and run time by name.
    pub fn descriptor_by_name(
        &self,
        name: &str,
        subname: &str,
        rtime: Option<&str>,
    ) -> Result<FieldDescriptor> {
        let registry = self.env.registry();
        let (source, subsource) = registry.identify_source(name, subname).ok_or_else(|| {
            error!("Unknown source \"{}\" sub-source \"{}\"", name, subname);
            FieldStoreError::UnknownSource {
                source_name: name.into(),
                subsource: subname.into(),
            }
        })?;
        FieldDescriptor::with_updates(
            registry,
            [
                FieldUpdate::Source(Some(source)),
                FieldUpdate::SubSource(subsource),
                FieldUpdate::RunTime(rtime.unwrap_or_default().into()),
            ],
        )
    }

    fn source_of(&self, desc: &FieldDescriptor) -> Result<(&'a SourceDef, &'a str)> {
        let registry = self.env.registry();
        let source = desc
            .source()
            .ok_or(FieldStoreError::IncompleteDescriptor("source"))?;
        let subpath = desc
            .subsource()
            .map_or("", |id| registry.subsource(id).subpath.as_str());
        Ok((registry.source(source), subpath))
    }
}

fn stamp_existing(dir: PathBuf, source: &SourceDef, rtime: Option<&Timestamp>) -> Result<PathBuf> {
    if !source.source_type.is_stamped() || stamp_path(&dir).is_file() {
        return Ok(dir);
    }
    let Some(rtime) = rtime else {
        error!(
            "Cannot stamp {} for source \"{}\" without a run time",
            dir.display(),
            source.name
        );
        return Err(FieldStoreError::IncompleteDescriptor("run time"));
    };
    rotation::write_stamp(&dir, rtime)?;
    Ok(dir)
}

//! Metafile path resolution.
//!
//! Combines directory resolution and the identifier codec to name the file
//! that holds a field, then confirms the file exists and holds the field
//! through a [`ContentIndex`]. Daily and static fields fall back to the
//! file of the same local day, or the most recent preceding file.

use crate::descriptor::FieldDescriptor;
use crate::environ::{Environ, MapIndex};
use crate::error::{FieldStoreError, Result};
use crate::ident::{self, IdentFormat};
use crate::index::list_files;
use crate::registry::{
    AlliedEntry, ElementId, FieldId, LevelId, Registry, SourceType, TimeDepMask, TimeDependence,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Name of the standard depiction source.
pub const DEPICTION_SOURCE: &str = "depict";

/// Depiction scratch file name.
pub const SCRATCH_FILE: &str = "Scratch";

/// Depiction links file name.
pub const LINKS_FILE: &str = "Links";

/// Directory tag of the background map files.
pub const MAPS_DIRECTORY_TAG: &str = "Maps";

/// Directory tag of the background map files shared between setups.
/// Background names starting with `+` resolve here.
pub const COMMON_MAPS_DIRECTORY_TAG: &str = "CommonMaps";

/// Which table of a source's allied entries to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlliedKind {
    /// A program, found in its data directory without run time or sub-source.
    Program,
    /// A data file, found in the generation directory of the run time.
    File,
}

/// Answers which fields a metafile holds.
///
/// Implemented by the field-content codecs. [`NameIndex`] derives the
/// answer from the file name alone.
pub trait ContentIndex: Send + Sync {
    /// Fields held by the metafile at `path`.
    fn fields_in(&self, registry: &Registry, path: &Path) -> Result<Vec<FieldId>>;

    /// Fields whose link chains are held by the link file at `path`.
    fn linked_fields_in(&self, registry: &Registry, path: &Path) -> Result<Vec<FieldId>>;
}

/// Content index that trusts the file name: a metafile holds exactly the
/// field its identifier names.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameIndex;

impl ContentIndex for NameIndex {
    fn fields_in(&self, registry: &Registry, path: &Path) -> Result<Vec<FieldId>> {
        let Some(name) = file_name(path) else {
            return Ok(Vec::new());
        };
        Ok(ident::decode(registry, name)
            .ok()
            .and_then(|ident| registry.identify_field(ident.element, ident.level))
            .into_iter()
            .collect())
    }

    fn linked_fields_in(&self, registry: &Registry, path: &Path) -> Result<Vec<FieldId>> {
        let Some(name) = file_name(path) else {
            return Ok(Vec::new());
        };
        Ok(ident::decode_link(registry, name)
            .ok()
            .and_then(|(element, level)| registry.identify_field(element, level))
            .into_iter()
            .collect())
    }
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}

/// Resolves metafile, link file and depiction file paths.
///
/// Every lookup returns `Ok(None)` when the descriptor lacks the source,
/// element or level it needs, or when no file qualifies.
///
/// # Examples
/// ```rust,ignore
/// let metafiles = env.metafiles();
/// if let Some(path) = metafiles.find_meta_filename(&desc)? {
///     // decode the field from `path`
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct MetafileResolver<'a> {
    env: &'a Environ,
}

impl<'a> MetafileResolver<'a> {
    /// Creates a resolver bound to a context.
    pub fn new(env: &'a Environ) -> Self {
        Self { env }
    }

    /// Expected new format metafile path, whether or not it exists.
    pub fn construct_meta_filename(&self, desc: &FieldDescriptor) -> Result<Option<PathBuf>> {
        self.meta_filename(desc, IdentFormat::New)
    }

    /// Expected old format metafile path, whether or not it exists.
    pub fn build_meta_filename(&self, desc: &FieldDescriptor) -> Result<Option<PathBuf>> {
        self.meta_filename(desc, IdentFormat::Old)
    }

    /// Path of the existing metafile holding the descriptor's field.
    ///
    /// The new format name is tried first, then the old format name.
    pub fn check_meta_filename(&self, desc: &FieldDescriptor) -> Result<Option<PathBuf>> {
        let path = match self.construct_meta_filename(desc)? {
            Some(path) if path.is_file() => path,
            _ => match self.build_meta_filename(desc)? {
                Some(path) if path.is_file() => path,
                _ => return Ok(None),
            },
        };

        let registry = self.env.registry();
        let fields = self.env.content_index().fields_in(registry, &path)?;
        match desc.field() {
            Some(field) if fields.contains(&field) => Ok(Some(path)),
            Some(field) => {
                warn!(
                    "Cannot find field \"{}\" in file {}",
                    field_name(registry, field),
                    path.display()
                );
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Like [`MetafileResolver::check_meta_filename`], with a fallback for
    /// daily and static fields when the exact file is absent.
    ///
    /// A daily field whose local valid time lies inside its daily window
    /// resolves to the file of the same local day. A static field resolves
    /// to the file with the latest valid time not after the requested one.
    pub fn find_meta_filename(&self, desc: &FieldDescriptor) -> Result<Option<PathBuf>> {
        if let Some(path) = self.check_meta_filename(desc)? {
            return Ok(Some(path));
        }

        let registry = self.env.registry();
        let (Some(source), Some(field), Some(vtime)) =
            (desc.source(), desc.field(), desc.valid_time())
        else {
            return Ok(None);
        };
        let element = registry.element(registry.field(field).element);
        let candidate = desc.with_valid_time(None);
        let index = self.env.index();

        match element.time_dependence {
            TimeDependence::Daily => {
                let local = vtime.to_local(desc.center_lon());
                let vhour = f64::from(local.hour()) + f64::from(local.minute()) / 60.0;
                let (mut begin, mut end) = (
                    f64::from(element.daily.begin),
                    f64::from(element.daily.end),
                );
                while end < begin {
                    end += 24.0;
                }
                while end - begin > 24.0 {
                    end -= 24.0;
                }
                while vhour > end {
                    begin += 24.0;
                    end += 24.0;
                }
                while vhour < begin {
                    begin -= 24.0;
                    end -= 24.0;
                }
                if vhour < begin || vhour > end {
                    debug!("{} outside daily window of \"{}\"", local, element.name);
                    return Ok(None);
                }

                let same_day = index
                    .valid_time_list(&candidate, TimeDepMask::DAILY)?
                    .into_iter()
                    .find(|t| t.year() == local.year() && t.jday() == local.jday());
                match same_day {
                    Some(time) => self.check_meta_filename(&candidate.with_valid_time(Some(time))),
                    None => Ok(None),
                }
            }
            TimeDependence::Static => {
                let minutes_required = registry.source(source).minutes_required;
                let vstamp = vtime.for_minutes_rule(minutes_required);
                let preceding = index
                    .valid_time_list(&candidate, TimeDepMask::STATIC)?
                    .into_iter()
                    .rev()
                    .find(|t| *t <= vstamp);
                match preceding {
                    Some(time) => self.check_meta_filename(&candidate.with_valid_time(Some(time))),
                    None => Ok(None),
                }
            }
            TimeDependence::Normal => Ok(None),
        }
    }

    /// Expected link file path, whether or not it exists.
    pub fn construct_link_filename(&self, desc: &FieldDescriptor) -> Result<Option<PathBuf>> {
        let registry = self.env.registry();
        let (Some(element), Some(level)) = (desc.element(), desc.level()) else {
            return Ok(None);
        };
        let Some(dir) = self.data_directory(desc)? else {
            return Ok(None);
        };
        let ident = self.env.codec().construct_link_identifier(
            &registry.element(element).name,
            &registry.level(level).name,
        );
        match ident {
            Ok(ident) => Ok(Some(dir.join(ident))),
            Err(err) => {
                debug!("No link identifier: {}", err);
                Ok(None)
            }
        }
    }

    /// Path of the existing link file holding link chains for the
    /// descriptor's field.
    pub fn check_link_filename(&self, desc: &FieldDescriptor) -> Result<Option<PathBuf>> {
        let Some(path) = self.construct_link_filename(desc)? else {
            return Ok(None);
        };
        if !path.is_file() {
            return Ok(None);
        }
        let registry = self.env.registry();
        let fields = self.env.content_index().linked_fields_in(registry, &path)?;
        match desc.field() {
            Some(field) if fields.contains(&field) => Ok(Some(path)),
            Some(field) => {
                warn!(
                    "Cannot find link chains for field \"{}\" in file {}",
                    field_name(registry, field),
                    path.display()
                );
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Scratch file of the standard depiction source.
    pub fn depiction_scratch_file(&self) -> Result<Option<PathBuf>> {
        self.depiction_file(SCRATCH_FILE)
    }

    /// Links file of the standard depiction source.
    pub fn depiction_link_file(&self) -> Result<Option<PathBuf>> {
        self.depiction_file(LINKS_FILE)
    }

    /// A named file of the standard depiction source.
    pub fn named_depiction_file(&self, name: &str) -> Result<Option<PathBuf>> {
        if name.trim().is_empty() {
            return Ok(None);
        }
        self.depiction_file(name)
    }

    /// Expected path of the allied program or file registered under
    /// `alias` for the descriptor's source, whether or not it exists.
    ///
    /// Files resolve through the sub-source and the normalized run time;
    /// programs through the source path alone.
    pub fn allied_file_path(
        &self,
        desc: &FieldDescriptor,
        kind: AlliedKind,
        alias: &str,
    ) -> Result<Option<PathBuf>> {
        let registry = self.env.registry();
        let Some(source) = desc.source().map(|id| registry.source(id)) else {
            return Ok(None);
        };
        let entry = match kind {
            AlliedKind::Program => source.allied_program(alias),
            AlliedKind::File => source.allied_file(alias),
        };
        let Some(entry) = entry else {
            debug!("No allied {:?} \"{}\" for source \"{}\"", kind, alias, source.name);
            return Ok(None);
        };

        let resolver = self.env.resolver();
        let dir = match kind {
            AlliedKind::Program => {
                resolver.find_data_directory(&entry.directory_tag, &source.path, "", None)
            }
            AlliedKind::File => {
                let subpath = desc
                    .subsource()
                    .map_or("", |id| registry.subsource(id).subpath.as_str());
                let rtime = resolver.normalized_run_time(desc);
                resolver.find_data_directory(
                    &entry.directory_tag,
                    &source.path,
                    subpath,
                    rtime.as_ref(),
                )
            }
        };
        Ok(missing_tag_as_none(dir)?.map(|dir| allied_join(&dir, entry)))
    }

    /// Path of the existing allied program or file registered under `alias`.
    pub fn check_allied_file(
        &self,
        desc: &FieldDescriptor,
        kind: AlliedKind,
        alias: &str,
    ) -> Result<Option<PathBuf>> {
        Ok(self
            .allied_file_path(desc, kind, alias)?
            .filter(|path| path.is_file()))
    }

    /// Path of an existing background map file.
    ///
    /// Relative names resolve against the [`MAPS_DIRECTORY_TAG`] directory,
    /// or against the [`COMMON_MAPS_DIRECTORY_TAG`] directory when prefixed
    /// with `+`. Absolute names are used as given.
    pub fn background_file(&self, name: &str) -> Result<Option<PathBuf>> {
        let name = name.trim();
        let (tag, name) = match name.strip_prefix('+') {
            Some(rest) => (COMMON_MAPS_DIRECTORY_TAG, rest.trim_start()),
            None => (MAPS_DIRECTORY_TAG, name),
        };
        if name.is_empty() {
            return Ok(None);
        }

        let path = if Path::new(name).is_absolute() {
            PathBuf::from(name)
        } else {
            match self.env.registry().directory(tag) {
                Some(dir) => dir.join(name),
                None => {
                    debug!("No directory for tag \"{}\"", tag);
                    return Ok(None);
                }
            }
        };
        if path.exists() {
            Ok(Some(path))
        } else {
            debug!("Cannot find background file {}", path.display());
            Ok(None)
        }
    }

    fn depiction_file(&self, name: &str) -> Result<Option<PathBuf>> {
        let resolver = self.env.resolver();
        let desc = match resolver.descriptor_by_name(DEPICTION_SOURCE, "", None) {
            Ok(desc) => desc,
            Err(err) => {
                debug!("No depiction source: {}", err);
                return Ok(None);
            }
        };
        Ok(resolver
            .existing_base_directory(&desc)?
            .map(|dir| dir.join(name)))
    }

    fn data_directory(&self, desc: &FieldDescriptor) -> Result<Option<PathBuf>> {
        let resolver = self.env.resolver();
        match desc.source_type(self.env.registry()) {
            Some(SourceType::Depiction) => resolver.existing_base_directory(desc),
            Some(SourceType::Guidance | SourceType::Allied) => resolver.source_directory(desc),
            _ => Ok(None),
        }
    }

    fn meta_filename(&self, desc: &FieldDescriptor, format: IdentFormat) -> Result<Option<PathBuf>> {
        let registry = self.env.registry();
        let (Some(source), Some(element), Some(level)) =
            (desc.source(), desc.element(), desc.level())
        else {
            return Ok(None);
        };
        let source = registry.source(source);

        if source.source_type == SourceType::Maps {
            return match self.env.resolver().existing_base_directory(desc)? {
                Some(dir) => self.map_file_path(&dir, element, level),
                None => Ok(None),
            };
        }
        let Some(dir) = self.data_directory(desc)? else {
            return Ok(None);
        };

        let vtime = desc
            .valid_time()
            .map(|vtime| vtime.for_minutes_rule(source.minutes_required));
        let codec = self.env.codec();
        let (element, level) = (&registry.element(element).name, &registry.level(level).name);
        let ident = match format {
            IdentFormat::New => codec.construct_file_identifier(element, level, vtime.as_ref()),
            IdentFormat::Old => codec.build_file_identifier(element, level, vtime.as_ref()),
        };
        match ident {
            Ok(ident) => Ok(Some(dir.join(ident))),
            Err(err) => {
                debug!("No {:?} format identifier: {}", format, err);
                Ok(None)
            }
        }
    }

    /// First file in a map directory holding the field of `element` and
    /// `level`. The directory is indexed once per context.
    fn map_file_path(
        &self,
        dir: &Path,
        element: ElementId,
        level: LevelId,
    ) -> Result<Option<PathBuf>> {
        let registry = self.env.registry();
        let Some(field) = registry.identify_field(element, level) else {
            return Ok(None);
        };

        let index = match self.env.map_index(dir) {
            Some(index) => index,
            None => {
                let index = self.build_map_index(dir)?;
                self.env.store_map_index(dir, index.clone());
                index
            }
        };
        Ok(index
            .iter()
            .find(|(_, fields)| fields.contains(&field))
            .map(|(name, _)| dir.join(name)))
    }

    fn build_map_index(&self, dir: &Path) -> Result<MapIndex> {
        let registry = self.env.registry();
        let mut names = list_files(dir)?;
        names.sort();
        let mut entries = Vec::new();
        for name in names {
            match self.env.content_index().fields_in(registry, &dir.join(&name)) {
                Ok(fields) if !fields.is_empty() => entries.push((name, fields)),
                Ok(_) => {}
                Err(err) => debug!("Skipping map file {}: {:?}", name, err),
            }
        }
        Ok(Arc::new(entries))
    }
}

fn allied_join(dir: &Path, entry: &AlliedEntry) -> PathBuf {
    if entry.path.is_empty() {
        dir.to_path_buf()
    } else {
        dir.join(&entry.path)
    }
}

fn missing_tag_as_none(dir: Result<Option<PathBuf>>) -> Result<Option<PathBuf>> {
    match dir {
        Err(FieldStoreError::UnknownDirectoryTag(tag)) => {
            debug!("No directory for allied tag \"{}\"", tag);
            Ok(None)
        }
        other => other,
    }
}

fn field_name(registry: &Registry, field: FieldId) -> String {
    let def = registry.field(field);
    format!(
        "{} {}",
        registry.element(def.element).name,
        registry.level(def.level).name
    )
}

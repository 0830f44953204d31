//! Configuration registry for sources, elements, levels and fields.
//!
//! The registry is loaded once, either built in memory or parsed from TOML,
//! and hands out small interned ids. Field descriptors hold ids rather than
//! references, so two descriptors name the same field exactly when their ids
//! are equal.

use crate::error::{FieldStoreError, Result};
use bitflags::bitflags;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

macro_rules! registry_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

registry_id!(
    /// Stable identity of a registered source.
    SourceId
);
registry_id!(
    /// Stable identity of a registered sub-source.
    SubSourceId
);
registry_id!(
    /// Stable identity of a registered element.
    ElementId
);
registry_id!(
    /// Stable identity of a registered level.
    LevelId
);
registry_id!(
    /// Stable identity of a registered field (element and level pair).
    FieldId
);

/// How a source's data is organized on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Interactive depictions; no run time, no rotation stamp.
    Depiction,
    /// Model guidance; rotated by run time.
    Guidance,
    /// Allied model output; rotated by run time.
    Allied,
    /// Static map files.
    Maps,
    /// Directly addressed files.
    Direct,
}

impl SourceType {
    /// True for source types whose generations carry a run-time stamp.
    pub fn is_stamped(self) -> bool {
        matches!(self, Self::Guidance | Self::Allied)
    }

    /// True for source types whose directories hold valid-time metafiles.
    pub fn has_valid_times(self) -> bool {
        matches!(self, Self::Depiction | Self::Guidance | Self::Allied)
    }
}

/// Time dependence class of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeDependence {
    /// One field per local day at a configured local time.
    Daily,
    /// Valid until superseded.
    Static,
    /// Ordinary time-varying field.
    #[default]
    Normal,
}

impl TimeDependence {
    /// Returns the single-class mask for this dependence.
    pub fn mask(self) -> TimeDepMask {
        match self {
            Self::Daily => TimeDepMask::DAILY,
            Self::Static => TimeDepMask::STATIC,
            Self::Normal => TimeDepMask::NORMAL,
        }
    }
}

bitflags! {
    /// Filter over time dependence classes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TimeDepMask: u8 {
        /// Daily fields.
        const DAILY = 0b001;
        /// Static fields.
        const STATIC = 0b010;
        /// Normal fields.
        const NORMAL = 0b100;
        /// Every class.
        const ANY = Self::DAILY.bits() | Self::STATIC.bits() | Self::NORMAL.bits();
    }
}

/// Field data type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Continuous surface.
    #[default]
    Continuous,
    /// Vector surface.
    Vector,
    /// Discrete areas.
    Discrete,
    /// Wind areas.
    Wind,
    /// Line features.
    Line,
    /// Scattered points.
    Scattered,
    /// Link chains.
    Lchain,
    /// Plotted values.
    Plot,
}

impl FieldType {
    const NAMES: [(&'static str, FieldType); 8] = [
        ("continuous", FieldType::Continuous),
        ("vector", FieldType::Vector),
        ("discrete", FieldType::Discrete),
        ("wind", FieldType::Wind),
        ("line", FieldType::Line),
        ("scattered", FieldType::Scattered),
        ("lchain", FieldType::Lchain),
        ("plot", FieldType::Plot),
    ];

    /// Lower-case configuration name.
    pub fn name(self) -> &'static str {
        Self::NAMES
            .iter()
            .find(|(_, ty)| *ty == self)
            .map(|(name, _)| *name)
            .unwrap_or("continuous")
    }
}

impl FromStr for FieldType {
    type Err = FieldStoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::NAMES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s.trim()))
            .map(|(_, ty)| *ty)
            .ok_or_else(|| FieldStoreError::Registry(format!("unknown field type \"{}\"", s)))
    }
}

/// Local time-of-day window for a daily element, in hours.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct DailyWindow {
    /// Local hour the daily period begins.
    #[serde(default)]
    pub begin: f32,
    /// Local hour the daily period ends.
    #[serde(default = "DailyWindow::default_end")]
    pub end: f32,
    /// Local hour the daily field is nominally valid.
    #[serde(default = "DailyWindow::default_normal")]
    pub normal: f32,
}

impl DailyWindow {
    fn default_end() -> f32 {
        24.0
    }

    fn default_normal() -> f32 {
        12.0
    }

    /// Creates a window from begin, end and normal hours.
    pub fn new(begin: f32, end: f32, normal: f32) -> Self {
        Self { begin, end, normal }
    }
}

impl Default for DailyWindow {
    fn default() -> Self {
        Self {
            begin: 0.0,
            end: Self::default_end(),
            normal: Self::default_normal(),
        }
    }
}

/// A named sub-source of a source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubSourceDef {
    /// Sub-source name.
    pub name: String,
    /// Directory below the source path.
    #[serde(default)]
    pub subpath: String,
}

/// A program or file kept alongside a source's data, found by alias.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AlliedEntry {
    /// Name the entry is looked up by (case-insensitive).
    pub alias: String,
    /// Directory tag of the data directory the entry lives in.
    pub directory_tag: String,
    /// Path of the entry below that data directory.
    pub path: String,
}

impl AlliedEntry {
    /// Creates an allied entry.
    pub fn new(
        alias: impl Into<String>,
        directory_tag: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            alias: alias.into(),
            directory_tag: directory_tag.into(),
            path: path.into(),
        }
    }
}

/// A registered data source.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceDef {
    /// Source name.
    pub name: String,
    /// Organization of the source on disk.
    #[serde(rename = "type")]
    pub source_type: SourceType,
    /// Directory tag resolved through the registry's directory table.
    pub directory_tag: String,
    /// Path below the tagged directory.
    #[serde(default)]
    pub path: String,
    /// Number of generations kept for rotated sources.
    #[serde(default = "SourceDef::default_layers")]
    pub layers: usize,
    /// Whether timestamps in this source encode minutes.
    #[serde(default)]
    pub minutes_required: bool,
    /// Named sub-sources.
    #[serde(default)]
    pub subsources: Vec<SubSourceDef>,
    /// Allied programs, resolved without run time or sub-source.
    #[serde(default)]
    pub programs: Vec<AlliedEntry>,
    /// Allied files, resolved in the run's generation directory.
    #[serde(default)]
    pub files: Vec<AlliedEntry>,
}

impl SourceDef {
    fn default_layers() -> usize {
        1
    }

    /// Creates a source with one layer and no sub-sources.
    pub fn new(
        name: impl Into<String>,
        source_type: SourceType,
        directory_tag: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source_type,
            directory_tag: directory_tag.into(),
            path: path.into(),
            layers: Self::default_layers(),
            minutes_required: false,
            subsources: Vec::new(),
            programs: Vec::new(),
            files: Vec::new(),
        }
    }

    /// Sets the number of generations kept.
    pub fn with_layers(mut self, layers: usize) -> Self {
        self.layers = layers;
        self
    }

    /// Sets the minutes-required flag.
    pub fn with_minutes_required(mut self, minutes_required: bool) -> Self {
        self.minutes_required = minutes_required;
        self
    }

    /// Adds a sub-source.
    pub fn with_subsource(mut self, name: impl Into<String>, subpath: impl Into<String>) -> Self {
        self.subsources.push(SubSourceDef {
            name: name.into(),
            subpath: subpath.into(),
        });
        self
    }

    /// Adds an allied program.
    pub fn with_allied_program(mut self, program: AlliedEntry) -> Self {
        self.programs.push(program);
        self
    }

    /// Adds an allied file.
    pub fn with_allied_file(mut self, file: AlliedEntry) -> Self {
        self.files.push(file);
        self
    }

    /// Allied program registered under `alias`.
    pub fn allied_program(&self, alias: &str) -> Option<&AlliedEntry> {
        find_allied(&self.programs, alias)
    }

    /// Allied file registered under `alias`.
    pub fn allied_file(&self, alias: &str) -> Option<&AlliedEntry> {
        find_allied(&self.files, alias)
    }
}

fn find_allied<'a>(entries: &'a [AlliedEntry], alias: &str) -> Option<&'a AlliedEntry> {
    let alias = alias.trim();
    if alias.is_empty() {
        return None;
    }
    entries.iter().find(|e| e.alias.eq_ignore_ascii_case(alias))
}

/// A registered element.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ElementDef {
    /// Element name.
    pub name: String,
    /// Identifier used in new format file names.
    #[serde(default)]
    pub file_ident: String,
    /// Identifier used in old format file names (two characters).
    #[serde(default)]
    pub file_id: String,
    /// Time dependence class.
    #[serde(default)]
    pub time_dependence: TimeDependence,
    /// Local window for daily elements.
    #[serde(default)]
    pub daily: DailyWindow,
    /// Data type of fields of this element.
    #[serde(default)]
    pub field_type: FieldType,
}

impl ElementDef {
    /// Creates a normal, continuous element.
    pub fn new(
        name: impl Into<String>,
        file_ident: impl Into<String>,
        file_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            file_ident: file_ident.into(),
            file_id: file_id.into(),
            time_dependence: TimeDependence::Normal,
            daily: DailyWindow::default(),
            field_type: FieldType::Continuous,
        }
    }

    /// Sets the time dependence class.
    pub fn with_time_dependence(mut self, time_dependence: TimeDependence) -> Self {
        self.time_dependence = time_dependence;
        self
    }

    /// Marks the element daily with the given local window.
    pub fn with_daily_window(mut self, daily: DailyWindow) -> Self {
        self.time_dependence = TimeDependence::Daily;
        self.daily = daily;
        self
    }

    /// Sets the field data type.
    pub fn with_field_type(mut self, field_type: FieldType) -> Self {
        self.field_type = field_type;
        self
    }
}

/// A registered level.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LevelDef {
    /// Level name.
    pub name: String,
    /// Identifier used in new format file names.
    #[serde(default)]
    pub file_ident: String,
    /// Identifier used in old format file names.
    #[serde(default)]
    pub file_id: String,
}

impl LevelDef {
    /// Creates a level.
    pub fn new(
        name: impl Into<String>,
        file_ident: impl Into<String>,
        file_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            file_ident: file_ident.into(),
            file_id: file_id.into(),
        }
    }
}

/// A registered field: a consistent element and level pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldDef {
    /// Canonical element.
    pub element: ElementId,
    /// Canonical level.
    pub level: LevelId,
}

#[derive(Debug, Deserialize)]
struct FieldEntry {
    element: String,
    level: String,
}

#[derive(Debug, Default, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    directories: HashMap<String, PathBuf>,
    #[serde(default)]
    sources: Vec<SourceDef>,
    #[serde(default)]
    elements: Vec<ElementDef>,
    #[serde(default)]
    levels: Vec<LevelDef>,
    #[serde(default)]
    fields: Vec<FieldEntry>,
}

/// In-memory configuration registry.
///
/// # Examples
/// ```rust,ignore
/// use alopex_fieldstore::registry::{Registry, SourceDef, SourceType};
///
/// let mut registry = Registry::new();
/// registry.add_directory("Data", "/fpa/data");
/// let gem = registry.add_source(
///     SourceDef::new("GEM", SourceType::Guidance, "Data", "GEM").with_layers(3),
/// )?;
/// ```
#[derive(Debug, Default, Clone)]
pub struct Registry {
    directories: HashMap<String, PathBuf>,
    sources: Vec<SourceDef>,
    subsources: Vec<(SourceId, SubSourceDef)>,
    elements: Vec<ElementDef>,
    levels: Vec<LevelDef>,
    fields: Vec<FieldDef>,
    field_index: HashMap<(ElementId, LevelId), FieldId>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a registry from TOML text.
    ///
    /// The document holds a `[directories]` table mapping tags to paths and
    /// arrays of `[[sources]]`, `[[elements]]`, `[[levels]]` and `[[fields]]`.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: RegistryFile = toml::from_str(text)?;
        let mut registry = Self::new();
        for (tag, path) in file.directories {
            registry.add_directory(tag, path);
        }
        for source in file.sources {
            registry.add_source(source)?;
        }
        for element in file.elements {
            registry.add_element(element)?;
        }
        for level in file.levels {
            registry.add_level(level)?;
        }
        for field in file.fields {
            let element = registry
                .identify_element(&field.element)
                .ok_or_else(|| FieldStoreError::UnknownElement(field.element.clone()))?;
            let level = registry
                .identify_level(&field.level)
                .ok_or_else(|| FieldStoreError::UnknownLevel(field.level.clone()))?;
            registry.add_field(element, level)?;
        }
        Ok(registry)
    }

    /// Maps a directory tag to a physical root.
    pub fn add_directory(&mut self, tag: impl Into<String>, path: impl AsRef<Path>) {
        self.directories.insert(tag.into(), path.as_ref().to_path_buf());
    }

    /// Registers a source and its sub-sources.
    pub fn add_source(&mut self, source: SourceDef) -> Result<SourceId> {
        if self.sources.iter().any(|s| s.name == source.name) {
            return Err(FieldStoreError::Registry(format!(
                "duplicate source \"{}\"",
                source.name
            )));
        }
        let id = SourceId(to_id(self.sources.len())?);
        to_id(self.subsources.len() + source.subsources.len())?;
        for sub in &source.subsources {
            self.subsources.push((id, sub.clone()));
        }
        self.sources.push(source);
        Ok(id)
    }

    /// Registers an element.
    pub fn add_element(&mut self, element: ElementDef) -> Result<ElementId> {
        if self.identify_element(&element.name).is_some() {
            return Err(FieldStoreError::Registry(format!(
                "duplicate element \"{}\"",
                element.name
            )));
        }
        let id = ElementId(to_id(self.elements.len())?);
        self.elements.push(element);
        Ok(id)
    }

    /// Registers a level.
    pub fn add_level(&mut self, level: LevelDef) -> Result<LevelId> {
        if self.identify_level(&level.name).is_some() {
            return Err(FieldStoreError::Registry(format!(
                "duplicate level \"{}\"",
                level.name
            )));
        }
        let id = LevelId(to_id(self.levels.len())?);
        self.levels.push(level);
        Ok(id)
    }

    /// Registers an element and level as a consistent field. Registering
    /// the same pair again returns the existing id.
    pub fn add_field(&mut self, element: ElementId, level: LevelId) -> Result<FieldId> {
        if let Some(id) = self.field_index.get(&(element, level)) {
            return Ok(*id);
        }
        let id = FieldId(to_id(self.fields.len())?);
        self.fields.push(FieldDef { element, level });
        self.field_index.insert((element, level), id);
        Ok(id)
    }

    /// Physical root for a directory tag.
    pub fn directory(&self, tag: &str) -> Option<&Path> {
        self.directories.get(tag).map(PathBuf::as_path)
    }

    /// Looks up a source and optional sub-source by name.
    ///
    /// A blank sub-source name selects the source itself.
    pub fn identify_source(
        &self,
        name: &str,
        subsource: &str,
    ) -> Option<(SourceId, Option<SubSourceId>)> {
        let index = self.sources.iter().position(|s| s.name == name)?;
        let id = SourceId(u32::try_from(index).ok()?);
        if subsource.trim().is_empty() {
            return Some((id, None));
        }
        let sub = self
            .subsources
            .iter()
            .position(|(owner, sub)| *owner == id && sub.name == subsource)?;
        Some((id, Some(SubSourceId(u32::try_from(sub).ok()?))))
    }

    /// Source definition for an id.
    ///
    /// # Panics
    ///
    /// Panics if the id was issued by a different registry.
    pub fn source(&self, id: SourceId) -> &SourceDef {
        &self.sources[id.index()]
    }

    /// Sub-source definition for an id.
    ///
    /// # Panics
    ///
    /// Panics if the id was issued by a different registry.
    pub fn subsource(&self, id: SubSourceId) -> &SubSourceDef {
        &self.subsources[id.index()].1
    }

    /// Owning source of a sub-source.
    ///
    /// # Panics
    ///
    /// Panics if the id was issued by a different registry.
    pub fn subsource_owner(&self, id: SubSourceId) -> SourceId {
        self.subsources[id.index()].0
    }

    /// Looks up an element by name or by either file identifier.
    pub fn identify_element(&self, name: &str) -> Option<ElementId> {
        if name.is_empty() {
            return None;
        }
        self.elements
            .iter()
            .position(|e| e.name == name)
            .or_else(|| {
                self.elements
                    .iter()
                    .position(|e| e.file_ident == name || e.file_id == name)
            })
            .and_then(|index| u32::try_from(index).ok())
            .map(ElementId)
    }

    /// Element definition for an id.
    ///
    /// # Panics
    ///
    /// Panics if the id was issued by a different registry.
    pub fn element(&self, id: ElementId) -> &ElementDef {
        &self.elements[id.index()]
    }

    /// Looks up a level by name or by either file identifier.
    pub fn identify_level(&self, name: &str) -> Option<LevelId> {
        if name.is_empty() {
            return None;
        }
        self.levels
            .iter()
            .position(|l| l.name == name)
            .or_else(|| {
                self.levels
                    .iter()
                    .position(|l| l.file_ident == name || l.file_id == name)
            })
            .and_then(|index| u32::try_from(index).ok())
            .map(LevelId)
    }

    /// Level definition for an id.
    ///
    /// # Panics
    ///
    /// Panics if the id was issued by a different registry.
    pub fn level(&self, id: LevelId) -> &LevelDef {
        &self.levels[id.index()]
    }

    /// Canonical field for an element and level, if they are consistent.
    pub fn identify_field(&self, element: ElementId, level: LevelId) -> Option<FieldId> {
        self.field_index.get(&(element, level)).copied()
    }

    /// Field definition for an id.
    ///
    /// # Panics
    ///
    /// Panics if the id was issued by a different registry.
    pub fn field(&self, id: FieldId) -> FieldDef {
        self.fields[id.index()]
    }

    /// True if the element and level form a registered field.
    pub fn consistent(&self, element: ElementId, level: LevelId) -> bool {
        self.identify_field(element, level).is_some()
    }
}

fn to_id(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| FieldStoreError::Registry("too many registry entries".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[directories]
Data = "/fpa/data"

[[sources]]
name = "GEM"
type = "guidance"
directory_tag = "Data"
path = "GEM"
layers = 3
subsources = [{ name = "reg", subpath = "regional" }]
programs = [{ alias = "ingest", directory_tag = "Exec", path = "gem_ingest" }]
files = [{ alias = "grid", directory_tag = "Data", path = "grid.def" }]

[[elements]]
name = "pressure"
file_ident = "pressure"
file_id = "pr"

[[elements]]
name = "max_temp"
file_ident = "maxtemp"
file_id = "mx"
time_dependence = "daily"
daily = { begin = 6.0, end = 30.0, normal = 15.0 }

[[levels]]
name = "msl"
file_ident = "msl"
file_id = "msl"

[[fields]]
element = "pressure"
level = "msl"
"#;

    #[test]
    fn test_from_toml() {
        let registry = Registry::from_toml_str(SAMPLE).unwrap();
        assert_eq!(registry.directory("Data"), Some(Path::new("/fpa/data")));

        let (gem, sub) = registry.identify_source("GEM", "reg").unwrap();
        assert_eq!(registry.source(gem).layers, 3);
        assert_eq!(registry.source(gem).source_type, SourceType::Guidance);
        assert_eq!(registry.subsource(sub.unwrap()).subpath, "regional");
        assert!(registry.identify_source("GEM", "nope").is_none());
        assert_eq!(registry.identify_source("GEM", "").unwrap().1, None);
        assert_eq!(registry.source(gem).allied_program("INGEST").unwrap().path, "gem_ingest");
        assert_eq!(registry.source(gem).allied_file("grid").unwrap().directory_tag, "Data");
        assert!(registry.source(gem).allied_file("ingest").is_none());

        let max = registry.identify_element("mx").unwrap();
        assert_eq!(registry.element(max).time_dependence, TimeDependence::Daily);
        assert_eq!(registry.element(max).daily.normal, 15.0);

        let pr = registry.identify_element("pressure").unwrap();
        let msl = registry.identify_level("msl").unwrap();
        assert!(registry.consistent(pr, msl));
        assert!(!registry.consistent(max, msl));
    }

    #[test]
    fn test_rejects_unknown_field_element() {
        let text = r#"
[[fields]]
element = "ghost"
level = "msl"
"#;
        assert!(matches!(
            Registry::from_toml_str(text),
            Err(FieldStoreError::UnknownElement(_))
        ));
    }

    #[test]
    fn test_field_ids_are_stable() {
        let mut registry = Registry::new();
        let e = registry.add_element(ElementDef::new("pressure", "pressure", "pr")).unwrap();
        let l = registry.add_level(LevelDef::new("msl", "msl", "msl")).unwrap();
        let first = registry.add_field(e, l).unwrap();
        let second = registry.add_field(e, l).unwrap();
        assert_eq!(first, second);
        assert_eq!(registry.field(first), FieldDef { element: e, level: l });
    }

    #[test]
    fn test_allied_lookup_ignores_blank_alias() {
        let source = SourceDef::new("GEM", SourceType::Guidance, "Data", "GEM")
            .with_allied_file(AlliedEntry::new("grid", "Data", "grid.def"))
            .with_allied_program(AlliedEntry::new("ingest", "Exec", "gem_ingest"));
        assert!(source.allied_file("  ").is_none());
        assert_eq!(source.allied_file(" Grid ").unwrap().path, "grid.def");
        assert_eq!(source.allied_program("ingest").unwrap().directory_tag, "Exec");
    }

    #[test]
    #[should_panic]
    fn test_lookup_panics_for_id_from_larger_registry() {
        let mut large = Registry::new();
        large.add_element(ElementDef::new("pressure", "pressure", "pr")).unwrap();
        let wind = large.add_element(ElementDef::new("wind", "wind", "uv")).unwrap();
        let small = Registry::new();
        let _ = small.element(wind);
    }

    #[test]
    fn test_id_conversion_reports_overflow() {
        assert_eq!(to_id(7).unwrap(), 7);
        if let Ok(len) = usize::try_from(u64::from(u32::MAX) + 1) {
            assert!(matches!(to_id(len), Err(FieldStoreError::Registry(_))));
        }
    }

    #[test]
    fn test_field_type_names() {
        assert_eq!("Vector".parse::<FieldType>().unwrap(), FieldType::Vector);
        assert_eq!(FieldType::Lchain.name(), "lchain");
        assert!("bogus".parse::<FieldType>().is_err());
    }

    #[test]
    fn test_time_dep_mask() {
        assert!(TimeDepMask::ANY.contains(TimeDependence::Static.mask()));
        assert!(!TimeDepMask::NORMAL.intersects(TimeDependence::Daily.mask()));
    }
}

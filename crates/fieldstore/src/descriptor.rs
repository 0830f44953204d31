//! Field descriptors: the key that names one field of one source.
//!
//! A descriptor is a plain value. It is built and changed only through
//! [`FieldDescriptor::apply`], which validates every [`FieldUpdate`] against
//! the registry, clears attributes whose values fail, and keeps applying the
//! rest.

use crate::error::{FieldStoreError, Result};
use crate::registry::{
    ElementId, FieldId, FieldType, LevelId, Registry, SourceId, SourceType, SubSourceId,
    TimeDependence,
};
use crate::tstamp::{matching_tstamps, Timestamp};
use tracing::error;

/// Longest accepted wind or value function name, exclusive.
pub const MAX_FUNCTION_NAME_LEN: usize = 128;

/// Map projection context of a descriptor.
///
/// Only the reference longitude takes part in time calculations; it decides
/// the local/GMT offset of daily fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MapProjection {
    /// Projection name.
    pub name: String,
    /// Reference longitude in degrees east.
    pub center_lon: f32,
}

impl MapProjection {
    /// Creates a projection.
    pub fn new(name: impl Into<String>, center_lon: f32) -> Self {
        Self {
            name: name.into(),
            center_lon,
        }
    }
}

/// One typed change to a descriptor.
///
/// Name-based variants are resolved through the registry. A blank string
/// clears the attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    /// Sets or clears the map projection.
    MapProjection(Option<MapProjection>),
    /// Overrides the directory path.
    DirectoryPath(String),
    /// Sets the source by id. Clears the sub-source.
    Source(Option<SourceId>),
    /// Sets the source by name. Clears the sub-source.
    SourceName(String),
    /// Sets the sub-source by id. Requires a source.
    SubSource(Option<SubSourceId>),
    /// Sets the sub-source by name. Requires a source.
    SubSourceName(String),
    /// Sets the run time from a time string.
    RunTime(String),
    /// Sets the run time directly.
    RunTimestamp(Option<Timestamp>),
    /// Sets the valid time from a time string.
    ValidTime(String),
    /// Sets the valid time directly.
    ValidTimestamp(Option<Timestamp>),
    /// Sets the element by id.
    Element(Option<ElementId>),
    /// Sets the element by name or file identifier.
    ElementName(String),
    /// Sets the level by id.
    Level(Option<LevelId>),
    /// Sets the level by name or file identifier.
    LevelName(String),
    /// Sets the field type from its name.
    FieldDataType(String),
    /// Sets the field type directly.
    FieldType(Option<FieldType>),
    /// Sets the wind function name.
    WindFunctionName(String),
    /// Sets the value function name.
    ValueFunctionName(String),
}

/// Key identifying a field of a source run.
///
/// # Examples
/// ```rust,ignore
/// use alopex_fieldstore::descriptor::{FieldDescriptor, FieldUpdate};
///
/// let mut desc = FieldDescriptor::new();
/// desc.apply(env.registry(), [
///     FieldUpdate::SourceName("GEM".into()),
///     FieldUpdate::RunTime("1991:238:12".into()),
///     FieldUpdate::ElementName("pressure".into()),
///     FieldUpdate::LevelName("msl".into()),
/// ])?;
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldDescriptor {
    map_projection: Option<MapProjection>,
    path: Option<String>,
    source: Option<SourceId>,
    subsource: Option<SubSourceId>,
    run_time: Option<Timestamp>,
    valid_time: Option<Timestamp>,
    element: Option<ElementId>,
    level: Option<LevelId>,
    field: Option<FieldId>,
    field_type: Option<FieldType>,
    wind_function: Option<String>,
    value_function: Option<String>,
}

impl FieldDescriptor {
    /// Creates an empty descriptor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a descriptor from a list of updates.
    pub fn with_updates(
        registry: &Registry,
        updates: impl IntoIterator<Item = FieldUpdate>,
    ) -> Result<Self> {
        let mut desc = Self::new();
        desc.apply(registry, updates)?;
        Ok(desc)
    }

    /// Applies updates in order.
    ///
    /// Every update is attempted. A failing update clears its attribute and
    /// is reported in the returned [`FieldStoreError::InvalidDescriptor`].
    /// When element and level are both set afterwards they are replaced by
    /// the registry's canonical field pair.
    pub fn apply(
        &mut self,
        registry: &Registry,
        updates: impl IntoIterator<Item = FieldUpdate>,
    ) -> Result<()> {
        let mut failures = Vec::new();
        self.field = None;

        for update in updates {
            if let Err(failure) = self.apply_one(registry, update) {
                error!("Field descriptor update failed: {}", failure);
                failures.push(failure);
            }
        }

        if let (Some(element), Some(level)) = (self.element, self.level) {
            match registry.identify_field(element, level) {
                Some(field) => {
                    let def = registry.field(field);
                    self.field = Some(field);
                    self.element = Some(def.element);
                    self.level = Some(def.level);
                }
                None => {
                    let failure = format!(
                        "no field for element \"{}\" and level \"{}\"",
                        registry.element(element).name,
                        registry.level(level).name
                    );
                    error!("Field descriptor update failed: {}", failure);
                    failures.push(failure);
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(FieldStoreError::InvalidDescriptor { failures })
        }
    }

    fn apply_one(&mut self, registry: &Registry, update: FieldUpdate) -> std::result::Result<(), String> {
        match update {
            FieldUpdate::MapProjection(mproj) => self.map_projection = mproj,
            FieldUpdate::DirectoryPath(path) => self.path = non_blank(path),
            FieldUpdate::Source(source) => {
                self.source = source;
                self.subsource = None;
            }
            FieldUpdate::SourceName(name) => {
                self.subsource = None;
                self.source = None;
                if let Some(name) = non_blank(name) {
                    let (source, _) = registry
                        .identify_source(&name, "")
                        .ok_or_else(|| format!("unknown source \"{}\"", name))?;
                    self.source = Some(source);
                }
            }
            FieldUpdate::SubSource(subsource) => {
                let Some(subsource) = subsource else {
                    self.subsource = None;
                    return Ok(());
                };
                match self.source {
                    Some(source) if registry.subsource_owner(subsource) == source => {
                        self.subsource = Some(subsource);
                    }
                    Some(source) => {
                        self.subsource = None;
                        self.source = None;
                        return Err(format!(
                            "sub-source \"{}\" does not belong to source \"{}\"",
                            registry.subsource(subsource).name,
                            registry.source(source).name
                        ));
                    }
                    None => {
                        self.subsource = None;
                        return Err(format!(
                            "sub-source \"{}\" set without a source",
                            registry.subsource(subsource).name
                        ));
                    }
                }
            }
            FieldUpdate::SubSourceName(name) => {
                let Some(name) = non_blank(name) else {
                    self.subsource = None;
                    return Ok(());
                };
                let Some(source) = self.source else {
                    self.subsource = None;
                    return Err(format!("sub-source \"{}\" set without a source", name));
                };
                let source_name = &registry.source(source).name;
                match registry.identify_source(source_name, &name) {
                    Some((_, subsource)) => self.subsource = subsource,
                    None => {
                        let failure =
                            format!("unknown sub-source \"{}\" of \"{}\"", name, source_name);
                        self.subsource = None;
                        self.source = None;
                        return Err(failure);
                    }
                }
            }
            FieldUpdate::RunTime(text) => self.run_time = parse_time(text, "run")?,
            FieldUpdate::RunTimestamp(rtime) => self.run_time = rtime,
            FieldUpdate::ValidTime(text) => self.valid_time = parse_time(text, "valid")?,
            FieldUpdate::ValidTimestamp(vtime) => self.valid_time = vtime,
            FieldUpdate::Element(element) => self.element = element,
            FieldUpdate::ElementName(name) => {
                self.element = None;
                if let Some(name) = non_blank(name) {
                    let element = registry
                        .identify_element(&name)
                        .ok_or_else(|| format!("unknown element \"{}\"", name))?;
                    self.element = Some(element);
                }
            }
            FieldUpdate::Level(level) => self.level = level,
            FieldUpdate::LevelName(name) => {
                self.level = None;
                if let Some(name) = non_blank(name) {
                    let level = registry
                        .identify_level(&name)
                        .ok_or_else(|| format!("unknown level \"{}\"", name))?;
                    self.level = Some(level);
                }
            }
            FieldUpdate::FieldDataType(name) => {
                self.field_type = None;
                if let Some(name) = non_blank(name) {
                    let field_type = name
                        .parse::<FieldType>()
                        .map_err(|_| format!("unknown field type \"{}\"", name))?;
                    self.field_type = Some(field_type);
                }
            }
            FieldUpdate::FieldType(field_type) => self.field_type = field_type,
            FieldUpdate::WindFunctionName(name) => {
                self.wind_function = function_name(name, "wind")?;
            }
            FieldUpdate::ValueFunctionName(name) => {
                self.value_function = function_name(name, "value")?;
            }
        }
        Ok(())
    }

    /// Returns a copy with a different valid time.
    pub fn with_valid_time(&self, vtime: Option<Timestamp>) -> Self {
        Self {
            valid_time: vtime,
            ..self.clone()
        }
    }

    /// Returns a copy with element, level and field cleared.
    pub(crate) fn without_field(&self) -> Self {
        Self {
            element: None,
            level: None,
            field: None,
            ..self.clone()
        }
    }

    /// Map projection, if set.
    pub fn map_projection(&self) -> Option<&MapProjection> {
        self.map_projection.as_ref()
    }

    /// Reference longitude for local time conversion; zero without a
    /// projection.
    pub fn center_lon(&self) -> f32 {
        self.map_projection.as_ref().map_or(0.0, |m| m.center_lon)
    }

    /// Directory path override.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Source.
    pub fn source(&self) -> Option<SourceId> {
        self.source
    }

    /// Sub-source.
    pub fn subsource(&self) -> Option<SubSourceId> {
        self.subsource
    }

    /// Run time.
    pub fn run_time(&self) -> Option<&Timestamp> {
        self.run_time.as_ref()
    }

    /// Valid time.
    pub fn valid_time(&self) -> Option<&Timestamp> {
        self.valid_time.as_ref()
    }

    /// Element.
    pub fn element(&self) -> Option<ElementId> {
        self.element
    }

    /// Level.
    pub fn level(&self) -> Option<LevelId> {
        self.level
    }

    /// Canonical field, set when element and level form a registered pair.
    pub fn field(&self) -> Option<FieldId> {
        self.field
    }

    /// Field type.
    pub fn field_type(&self) -> Option<FieldType> {
        self.field_type
    }

    /// Wind function name.
    pub fn wind_function(&self) -> Option<&str> {
        self.wind_function.as_deref()
    }

    /// Value function name.
    pub fn value_function(&self) -> Option<&str> {
        self.value_function.as_deref()
    }

    /// Type of the descriptor's source.
    pub fn source_type(&self, registry: &Registry) -> Option<SourceType> {
        self.source.map(|id| registry.source(id).source_type)
    }

    /// Time dependence of the descriptor's element.
    pub fn time_dependence(&self, registry: &Registry) -> Option<TimeDependence> {
        self.element
            .map(|id| registry.element(id).time_dependence)
    }

    /// Value identity, including the map projection.
    pub fn same(&self, other: &FieldDescriptor) -> bool {
        self.map_projection == other.map_projection && self.same_ignoring_map(other)
    }

    /// Value identity, ignoring the map projection.
    ///
    /// Timestamps compare by instant and locality.
    pub fn same_ignoring_map(&self, other: &FieldDescriptor) -> bool {
        self.path == other.path
            && self.source == other.source
            && self.subsource == other.subsource
            && matching_tstamps(self.run_time.as_ref(), other.run_time.as_ref())
            && self.element == other.element
            && self.level == other.level
            && self.field == other.field
            && self.field_type == other.field_type
            && matching_tstamps(self.valid_time.as_ref(), other.valid_time.as_ref())
            && self.wind_function == other.wind_function
            && self.value_function == other.value_function
    }
}

fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

fn parse_time(text: String, kind: &str) -> std::result::Result<Option<Timestamp>, String> {
    match non_blank(text) {
        None => Ok(None),
        Some(text) => Timestamp::interpret(&text)
            .map(Some)
            .ok_or_else(|| format!("bad {} time \"{}\"", kind, text)),
    }
}

fn function_name(name: String, kind: &str) -> std::result::Result<Option<String>, String> {
    match non_blank(name) {
        None => Ok(None),
        Some(name) if name.len() >= MAX_FUNCTION_NAME_LEN => Err(format!(
            "{} function name longer than {} characters",
            kind,
            MAX_FUNCTION_NAME_LEN - 1
        )),
        Some(name) => Ok(Some(name)),
    }
}

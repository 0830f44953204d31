//! File identifier codec.
//!
//! Metafiles are named after the element, level and (optionally) valid time
//! of the field they hold, in one of two formats:
//!
//! - new: `<element ident>~<level ident>[~<YYYY-JJJ-HH[-MM][L]>]`
//! - old: `<element id><level id>[_<YYYY:JJJ:HH[:MM][L]>]`, where the element
//!   id is always two characters wide.
//!
//! Link files use the new format with a fixed `Links` suffix in place of the
//! valid time.

use crate::environ::Environ;
use crate::error::{FieldStoreError, Result};
use crate::registry::{ElementId, LevelId, Registry};
use crate::tstamp::Timestamp;
use tracing::{debug, error};

/// Delimiter between parts of a new format identifier.
pub const IDENT_DELIMITER: char = '~';

/// Delimiter before the valid time of an old format identifier.
pub const VALID_DELIMITER: char = '_';

/// Suffix of link file identifiers.
pub const LINK_SUFFIX: &str = "Links";

/// Maximum length of a new format identifier.
pub const FILE_IDENT_LEN: usize = 128;

/// Maximum length of the element part of a new format identifier.
pub const ELEM_IDENT_LEN: usize = 32;

/// Maximum length of the level part of a new format identifier.
pub const LEVEL_IDENT_LEN: usize = 32;

/// Maximum length of the valid time part of either format.
pub const VALID_TIME_LEN: usize = 32;

/// Maximum length of an old format identifier.
pub const FILE_ID_LEN: usize = 64;

/// Fixed width of the element part of an old format identifier.
pub const ELEM_ID_LEN: usize = 2;

/// Maximum length of the level part of an old format identifier.
pub const LEVEL_ID_LEN: usize = 32;

/// Identifier encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentFormat {
    /// Delimiter-separated format.
    New,
    /// Fixed-width format.
    Old,
}

impl IdentFormat {
    /// Format of an identifier, judged by the presence of the new delimiter.
    pub fn of(ident: &str) -> Self {
        if ident.contains(IDENT_DELIMITER) {
            Self::New
        } else {
            Self::Old
        }
    }
}

/// A decoded file identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileIdent {
    /// Element of the field.
    pub element: ElementId,
    /// Level of the field.
    pub level: LevelId,
    /// Valid time, if the identifier carries one.
    pub valid_time: Option<Timestamp>,
    /// Encoding the identifier was read from.
    pub format: IdentFormat,
}

/// Encodes and decodes file and link identifiers against the registry.
///
/// # Examples
/// ```rust,ignore
/// let codec = env.codec();
/// let ident = codec.construct_file_identifier("pressure", "msl", Some(&vtime))?;
/// let parsed = codec.parse_file_identifier(&ident)?;
/// ```
#[derive(Debug, Clone, Copy)]
pub struct IdentCodec<'a> {
    env: &'a Environ,
}

impl<'a> IdentCodec<'a> {
    /// Creates a codec bound to a context.
    pub fn new(env: &'a Environ) -> Self {
        Self { env }
    }

    /// Builds a new format identifier from element and level names.
    pub fn construct_file_identifier(
        &self,
        element: &str,
        level: &str,
        vtime: Option<&Timestamp>,
    ) -> Result<String> {
        let (element_ident, level_ident) = self.resolve(element, level, IdentFormat::New)?;
        let vstring = vtime.map(Timestamp::metafile_string);
        let nvt = vstring.as_ref().map_or(0, |v| v.len() + 1);
        let len = element_ident.len() + 1 + level_ident.len() + nvt;
        if len > FILE_IDENT_LEN {
            error!(
                "File identifier too long for element ident \"{}\" level ident \"{}\"",
                element_ident, level_ident
            );
            return Err(FieldStoreError::IdentifierTooLong {
                len,
                max: FILE_IDENT_LEN,
            });
        }

        let mut ident = format!("{}{}{}", element_ident, IDENT_DELIMITER, level_ident);
        if let Some(vstring) = vstring {
            ident.push(IDENT_DELIMITER);
            ident.push_str(&vstring);
        }
        Ok(ident)
    }

    /// Builds an old format identifier from element and level names.
    pub fn build_file_identifier(
        &self,
        element: &str,
        level: &str,
        vtime: Option<&Timestamp>,
    ) -> Result<String> {
        let (element_id, level_id) = self.resolve(element, level, IdentFormat::Old)?;
        let vstring = vtime.map(Timestamp::to_string);
        let nvt = vstring.as_ref().map_or(0, |v| v.len() + 1);
        let len = element_id.len() + level_id.len() + nvt;
        if len > FILE_ID_LEN {
            error!(
                "File identifier too long for element id \"{}\" level id \"{}\"",
                element_id, level_id
            );
            return Err(FieldStoreError::IdentifierTooLong {
                len,
                max: FILE_ID_LEN,
            });
        }

        let mut ident = format!("{}{}", element_id, level_id);
        if let Some(vstring) = vstring {
            ident.push(VALID_DELIMITER);
            ident.push_str(&vstring);
        }
        Ok(ident)
    }

    /// Decodes an identifier in either format.
    pub fn parse_file_identifier(&self, ident: &str) -> Result<FileIdent> {
        decode(self.env.registry(), ident).map_err(|err| {
            error!("Cannot parse file identifier \"{}\": {}", ident, err);
            err
        })
    }

    /// Builds a link file identifier from element and level names.
    pub fn construct_link_identifier(&self, element: &str, level: &str) -> Result<String> {
        let (element_ident, level_ident) = self.resolve(element, level, IdentFormat::New)?;
        let len = element_ident.len() + 1 + level_ident.len() + 1 + LINK_SUFFIX.len();
        if len > FILE_IDENT_LEN {
            error!(
                "Link identifier too long for element ident \"{}\" level ident \"{}\"",
                element_ident, level_ident
            );
            return Err(FieldStoreError::IdentifierTooLong {
                len,
                max: FILE_IDENT_LEN,
            });
        }
        Ok(format!(
            "{}{d}{}{d}{}",
            element_ident,
            level_ident,
            LINK_SUFFIX,
            d = IDENT_DELIMITER
        ))
    }

    /// Decodes a link file identifier into element and level.
    pub fn parse_link_identifier(&self, ident: &str) -> Result<(ElementId, LevelId)> {
        decode_link(self.env.registry(), ident).map_err(|err| {
            error!("Cannot parse link identifier \"{}\": {}", ident, err);
            err
        })
    }

    fn resolve(&self, element: &str, level: &str, format: IdentFormat) -> Result<(String, String)> {
        let registry = self.env.registry();
        let element_id = registry.identify_element(element).ok_or_else(|| {
            error!("Unknown element \"{}\"", element);
            FieldStoreError::UnknownElement(element.into())
        })?;
        let element_ident = select(
            format,
            &registry.element(element_id).file_ident,
            &registry.element(element_id).file_id,
        );
        if element_ident.is_empty() {
            return Err(self.missing("element", element, format));
        }

        let level_id = registry.identify_level(level).ok_or_else(|| {
            error!("Unknown level \"{}\"", level);
            FieldStoreError::UnknownLevel(level.into())
        })?;
        let level_ident = select(
            format,
            &registry.level(level_id).file_ident,
            &registry.level(level_id).file_id,
        );
        if level_ident.is_empty() {
            return Err(self.missing("level", level, format));
        }

        if !registry.consistent(element_id, level_id) {
            error!("Inconsistent element \"{}\" and level \"{}\"", element, level);
            return Err(FieldStoreError::InconsistentField {
                element: element.into(),
                level: level.into(),
            });
        }
        Ok((element_ident.to_string(), level_ident.to_string()))
    }

    fn missing(&self, kind: &'static str, name: &str, format: IdentFormat) -> FieldStoreError {
        if self.env.first_report(format!("{:?}:{}:{}", format, kind, name)) {
            debug!("No {:?} format file identifier for {} \"{}\"", format, kind, name);
        }
        FieldStoreError::MissingIdentifier {
            kind,
            name: name.into(),
        }
    }
}

fn select<'s>(format: IdentFormat, new: &'s str, old: &'s str) -> &'s str {
    match format {
        IdentFormat::New => new,
        IdentFormat::Old => old,
    }
}

/// Decodes an identifier without logging.
pub(crate) fn decode(registry: &Registry, ident: &str) -> Result<FileIdent> {
    let malformed = || FieldStoreError::MalformedIdentifier(ident.into());
    if ident.is_empty() {
        return Err(malformed());
    }

    let format = IdentFormat::of(ident);
    let (element_part, level_part, valid_part) = match format {
        IdentFormat::New => {
            let (element, rest) = ident.split_once(IDENT_DELIMITER).ok_or_else(malformed)?;
            let (level, valid) = match rest.split_once(IDENT_DELIMITER) {
                Some((level, valid)) => (level, Some(valid)),
                None => (rest, None),
            };
            if element.len() > ELEM_IDENT_LEN
                || level.len() > LEVEL_IDENT_LEN
                || valid.map_or(0, str::len) > VALID_TIME_LEN
            {
                return Err(malformed());
            }
            (element, level, valid.filter(|v| !v.is_empty()))
        }
        IdentFormat::Old => {
            let (prefix, valid) = match ident.split_once(VALID_DELIMITER) {
                Some((prefix, valid)) => (prefix, Some(valid)),
                None => (ident, None),
            };
            let element = prefix.get(..ELEM_ID_LEN).ok_or_else(malformed)?;
            let level = prefix.get(ELEM_ID_LEN..).ok_or_else(malformed)?;
            if level.len() > LEVEL_ID_LEN || valid.map_or(0, str::len) > VALID_TIME_LEN {
                return Err(malformed());
            }
            (element, level, valid.filter(|v| !v.is_empty()))
        }
    };

    let valid_time = match valid_part {
        Some(text) => {
            let parsed = match format {
                IdentFormat::New => Timestamp::interpret(text),
                IdentFormat::Old => Timestamp::parse(text).ok(),
            };
            Some(parsed.ok_or_else(|| FieldStoreError::InvalidTimestamp(text.into()))?)
        }
        None => None,
    };

    let (element, level) = identify_pair(registry, element_part, level_part)?;
    Ok(FileIdent {
        element,
        level,
        valid_time,
        format,
    })
}

/// Decodes a link identifier without logging.
pub(crate) fn decode_link(registry: &Registry, ident: &str) -> Result<(ElementId, LevelId)> {
    let malformed = || FieldStoreError::MalformedIdentifier(ident.into());
    let (element, rest) = ident.split_once(IDENT_DELIMITER).ok_or_else(malformed)?;
    let (level, suffix) = rest.split_once(IDENT_DELIMITER).ok_or_else(malformed)?;
    if element.len() > ELEM_IDENT_LEN
        || level.len() > LEVEL_IDENT_LEN
        || suffix.len() > VALID_TIME_LEN
        || !suffix.eq_ignore_ascii_case(LINK_SUFFIX)
    {
        return Err(malformed());
    }
    identify_pair(registry, element, level)
}

fn identify_pair(registry: &Registry, element: &str, level: &str) -> Result<(ElementId, LevelId)> {
    let element_id = registry
        .identify_element(element)
        .ok_or_else(|| FieldStoreError::UnknownElement(element.into()))?;
    let level_id = registry
        .identify_level(level)
        .ok_or_else(|| FieldStoreError::UnknownLevel(level.into()))?;
    if !registry.consistent(element_id, level_id) {
        return Err(FieldStoreError::InconsistentField {
            element: registry.element(element_id).name.clone(),
            level: registry.level(level_id).name.clone(),
        });
    }
    Ok((element_id, level_id))
}

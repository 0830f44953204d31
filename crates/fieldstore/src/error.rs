//! Error and Result types for field store operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A convenience `Result` type for field store operations.
pub type Result<T> = std::result::Result<T, FieldStoreError>;

/// The error type for field store operations.
#[derive(Debug, Error)]
pub enum FieldStoreError {
    /// Source (and optional sub-source) not present in the registry.
    #[error("Unknown source: \"{source_name}\" \"{subsource}\"")]
    UnknownSource {
        /// Source name as requested.
        source_name: String,
        /// Sub-source name as requested (may be blank).
        subsource: String,
    },

    /// Element not present in the registry.
    #[error("Unknown element: \"{0}\"")]
    UnknownElement(String),

    /// Level not present in the registry.
    #[error("Unknown level: \"{0}\"")]
    UnknownLevel(String),

    /// Directory tag not mapped to a physical root.
    #[error("Unknown directory tag: \"{0}\"")]
    UnknownDirectoryTag(String),

    /// Element or level has no identifier string for the requested format.
    #[error("No file identifier for {kind} \"{name}\"")]
    MissingIdentifier {
        /// Either "element" or "level".
        kind: &'static str,
        /// Registry name lacking the identifier.
        name: String,
    },

    /// Element and level are not registered as a consistent pair.
    #[error("Inconsistent element \"{element}\" and level \"{level}\"")]
    InconsistentField {
        /// Element name.
        element: String,
        /// Level name.
        level: String,
    },

    /// Timestamp could not be parsed or interpreted.
    #[error("Invalid timestamp: \"{0}\"")]
    InvalidTimestamp(String),

    /// Encoded identifier exceeds the bound for its format.
    #[error("File identifier too long: {len} > {max}")]
    IdentifierTooLong {
        /// Encoded length.
        len: usize,
        /// Bound for the format.
        max: usize,
    },

    /// Identifier could not be split into element, level and valid time.
    #[error("Malformed file identifier: \"{0}\"")]
    MalformedIdentifier(String),

    /// One or more descriptor updates failed validation.
    #[error("Invalid field descriptor: {}", failures.join("; "))]
    InvalidDescriptor {
        /// Description of every failed update, in application order.
        failures: Vec<String>,
    },

    /// Descriptor lacks an attribute required by the operation.
    #[error("Field descriptor is missing {0}")]
    IncompleteDescriptor(&'static str),

    /// Base directory for a source does not exist.
    #[error("Directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    /// Requested run time is older than every generation in the chain.
    #[error("Run time \"{rtime}\" too old for {}", dir.display())]
    RunTooOld {
        /// Requested run time.
        rtime: String,
        /// Chain base directory.
        dir: PathBuf,
    },

    /// Lock could not be acquired, even after takeover.
    #[error("Cannot acquire lock {}", .0.display())]
    LockUnavailable(PathBuf),

    /// Field is not a daily field, or has no daily window.
    #[error("Field \"{0}\" is not a daily field")]
    NotDaily(String),

    /// Operation not supported for this kind of source.
    #[error("Unsupported operation for source \"{0}\"")]
    UnsupportedSource(String),

    /// Registry text could not be parsed.
    #[error("Registry parse error: {0}")]
    RegistryParse(#[from] toml::de::Error),

    /// Registry content is inconsistent.
    #[error("Registry error: {0}")]
    Registry(String),

    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
}

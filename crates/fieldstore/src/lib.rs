//! Alopex Fieldstore - generational storage layout for forecast fields
//!
//! This crate maps field descriptors (source, run time, element, level,
//! valid time) onto a directory tree of metafiles, keeps a fixed number of
//! run generations per source, and indexes the valid times present in each
//! generation.
//!
//! # Components
//!
//! - [`Environ`]: Explicit context holding the registry, lock policy and caches
//! - [`FieldDescriptor`]: Incrementally built field coordinates
//! - [`layout::DirectoryResolver`]: Source and generation directory resolution
//! - [`rotation::RotationEngine`]: Run-time fitting and generation shuffling
//! - [`index::TemporalIndex`]: Valid-time listing and matching
//! - [`metafile::MetafileResolver`]: Metafile, link file, depiction, allied and
//!   background paths
//!
//! # Example
//!
//! ```rust,ignore
//! use alopex_fieldstore::{Environ, FieldDescriptor, FieldUpdate, Registry};
//!
//! let env = Environ::new(Registry::from_toml_str(&config)?);
//!
//! // Create (or rotate into) the generation for a new run
//! let dir = env
//!     .resolver()
//!     .prepare_source_directory_by_name("GEM", "", Some("1991:238:12"))?;
//!
//! // Locate a field written by that run
//! let desc = FieldDescriptor::with_updates(
//!     env.registry(),
//!     [
//!         FieldUpdate::SourceName("GEM".into()),
//!         FieldUpdate::RunTime("1991:238:12".into()),
//!         FieldUpdate::ElementName("pressure".into()),
//!         FieldUpdate::LevelName("msl".into()),
//!         FieldUpdate::ValidTime("1991:238:18".into()),
//!     ],
//! )?;
//! let path = env.metafiles().find_meta_filename(&desc)?;
//! ```

#![deny(missing_docs)]

pub mod descriptor;
pub mod environ;
pub mod error;
pub mod ident;
pub mod index;
pub mod layout;
pub mod lock;
pub mod metafile;
pub mod registry;
pub mod rotation;
pub mod tstamp;

pub use descriptor::{FieldDescriptor, FieldUpdate, MapProjection};
pub use environ::Environ;
pub use error::{FieldStoreError, Result};
pub use ident::{FileIdent, IdentFormat};
pub use index::{ValidTimeMatch, ValidWindow};
pub use lock::LockConfig;
pub use metafile::{AlliedKind, ContentIndex, NameIndex};
pub use registry::{
    ElementId, FieldId, FieldType, LevelId, Registry, SourceId, SourceType, SubSourceId,
    TimeDepMask, TimeDependence,
};
pub use tstamp::Timestamp;

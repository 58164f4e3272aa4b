//! Logical model of a Power BI package.
//!
//! This crate holds the types every other crate in the workspace agrees on:
//!
//! - [`DocumentSlot`] and [`BlobCollection`]: the closed set of part roles
//! - [`Document`]: a decoded structured document (JSON or XML)
//! - [`LogicalModel`]: the in-memory form of one package for one conversion
//! - [`VersionMarker`]: the package format generation gate
//! - [`IdentifierMap`]: structural key to stable identifier bookkeeping
//!
//! Nothing here performs I/O.

pub mod document;
pub mod error;
pub mod identifiers;
pub mod logical;
pub mod slot;
pub mod version;

pub use document::{Document, DocumentKind, XmlDocument, XmlElement, XmlNode};
pub use error::{ModelError, Result};
pub use identifiers::{IdentifierMap, IdentifierRecord};
pub use logical::LogicalModel;
pub use slot::{BlobCollection, DocumentSlot, PartKind, VERSION_PART};
pub use version::{Generation, VersionMarker};

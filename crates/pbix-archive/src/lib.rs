//! ZIP container access for Power BI packages.
//!
//! A package is a ZIP archive whose entries ("parts") are named by
//! slash-separated paths, plus a `[Content_Types].xml` part that assigns a
//! media type to each of them. This crate lists and reads parts
//! ([`PackageReader`]) and writes new packages atomically
//! ([`PackageWriter`]). It knows nothing about what the parts contain.

pub mod content_types;
pub mod error;
pub mod reader;
pub mod writer;

pub use content_types::{CONTENT_TYPES_PART, ContentTypes};
pub use error::{ArchiveError, Result};
pub use reader::{PackageReader, PartDescriptor};
pub use writer::{Compression, PackageWriter};

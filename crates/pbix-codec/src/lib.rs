//! Part codecs for Power BI packages.
//!
//! The [`Registry`] maps every part name to a [`Codec`]: the version
//! marker, one of the fixed document slots, a blob of a binary collection,
//! or an unrecognized part kept byte-for-byte. Document codecs handle the
//! text wrapping declared for their slot and hand the text to
//! `pbix-normalization` for parsing and canonical re-encoding.

pub mod error;
pub mod registry;
pub mod wrapping;

pub use error::{CodecError, Result};
pub use registry::{BlobCodec, Codec, DocumentCodec, Registry, content_type_for_extension};
pub use wrapping::{TextEncoding, decode_text, detect_foreign_wrapping, encode_text};

//! Project folder storage.
//!
//! - [`layout`]: where each part lives in the project tree
//! - [`record`]: the `.pbixproj.json` metadata record
//! - [`folder`]: staging and transactional commit of a tree
//! - [`hash`]: source package hashing

pub mod error;
pub mod folder;
pub mod hash;
pub mod layout;
pub mod record;

pub use error::{PersistenceError, Result};
pub use folder::{
    CommitSummary, FileOps, ProjectFolder, StdFileOps, list_managed_files, validate_tree_path,
};
pub use hash::compute_file_hash;
pub use layout::{
    RECORD_FILE, TreeEntry, TreeLayout, UNRECOGNIZED_DIR, classify, collection_dir,
    document_for_path, document_path, part_name_for, sanitize_relative,
};
pub use record::{CURRENT_RECORD_VERSION, ProjectRecord, load_record};

//! Transactional project folder.
//!
//! New content is staged in a hidden directory inside the project root and
//! only moved into place by [`ProjectFolder::commit`]. Commit runs in three
//! stages:
//!
//! 1. Move every managed file of the current tree into a hidden backup
//!    directory.
//! 2. Move every staged file into place, creating parent directories.
//! 3. Prune directories left empty and drop the backup.
//!
//! Every move is journaled. If any step of 1 or 2 fails, the journal is
//! replayed backwards so the tree is left exactly as it was. If replaying
//! the journal fails too, the backup directory is kept on disk and its path
//! is returned in the error.
//!
//! Top-level entries whose names start with `.` (other than the record) are
//! never touched, so a `.git` directory survives every commit.

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use tempfile::TempDir;
use walkdir::WalkDir;

use crate::error::{PersistenceError, Result};
use crate::layout::RECORD_FILE;

const STAGE_PREFIX: &str = ".pbixproj-stage-";
const BACKUP_PREFIX: &str = ".pbixproj-backup-";

/// Filesystem primitives used by [`ProjectFolder`].
pub trait FileOps {
    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;
    fn remove_dir(&self, path: &Path) -> io::Result<()>;
}

/// [`FileOps`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFileOps;

impl FileOps for StdFileOps {
    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut file = fs::File::create(path)?;
        file.write_all(bytes)?;
        file.sync_all()
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir(path)
    }
}

/// Counts reported by a successful commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    /// Files now in the tree.
    pub written: usize,
    /// Of those, files that replaced an existing file.
    pub replaced: usize,
    /// Previously managed files that no longer exist.
    pub removed: usize,
}

/// Handle on a project root with a private staging area.
///
/// Dropping the handle without committing discards the staging area and
/// leaves the tree untouched.
pub struct ProjectFolder<O: FileOps = StdFileOps> {
    root: PathBuf,
    stage: TempDir,
    staged: BTreeSet<String>,
    ops: O,
}

impl ProjectFolder<StdFileOps> {
    /// Open (creating if needed) the project root at `root`.
    pub fn open(root: &Path) -> Result<Self> {
        Self::open_with(root, StdFileOps)
    }
}

impl<O: FileOps> ProjectFolder<O> {
    /// Open the project root with custom file operations.
    pub fn open_with(root: &Path, ops: O) -> Result<Self> {
        fs::create_dir_all(root)
            .map_err(|e| PersistenceError::io("create directory", root, e))?;
        let stage = tempfile::Builder::new()
            .prefix(STAGE_PREFIX)
            .tempdir_in(root)
            .map_err(|e| PersistenceError::io("create staging directory", root, e))?;
        tracing::debug!(root = %root.display(), stage = %stage.path().display(), "opened project folder");
        Ok(Self {
            root: root.to_path_buf(),
            stage,
            staged: BTreeSet::new(),
            ops,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Paths staged so far.
    pub fn staged(&self) -> impl Iterator<Item = &str> {
        self.staged.iter().map(String::as_str)
    }

    /// Write `bytes` to `relative` inside the staging area.
    pub fn stage(&mut self, relative: &str, bytes: &[u8]) -> Result<()> {
        validate_tree_path(relative)?;
        let target = join_relative(self.stage.path(), relative);
        if let Some(parent) = target.parent() {
            self.ops
                .create_dir_all(parent)
                .map_err(|e| PersistenceError::io("create directory", parent, e))?;
        }
        self.ops
            .write(&target, bytes)
            .map_err(|e| PersistenceError::io("write", &target, e))?;
        self.staged.insert(relative.to_string());
        Ok(())
    }

    /// Replace the managed tree with the staged files.
    pub fn commit(self) -> Result<CommitSummary> {
        let existing = list_managed_files(&self.root)?;
        let backup = tempfile::Builder::new()
            .prefix(BACKUP_PREFIX)
            .tempdir_in(&self.root)
            .map_err(|e| PersistenceError::io("create backup directory", &self.root, e))?;

        let mut journal = Journal::default();
        if let Err(source) = self.apply(&existing, backup.path(), &mut journal) {
            tracing::warn!(root = %self.root.display(), error = %source, "commit failed, rolling back");
            let backup = if journal.rollback(&self.ops) {
                None
            } else {
                let kept = backup.keep();
                tracing::error!(backup = %kept.display(), "rollback incomplete, keeping backup");
                Some(kept)
            };
            return Err(PersistenceError::CommitFailed {
                root: self.root.clone(),
                backup,
                source,
            });
        }

        self.prune_empty_dirs();
        drop(backup);

        let existing: BTreeSet<&String> = existing.iter().collect();
        let replaced = self.staged.iter().filter(|p| existing.contains(p)).count();
        let summary = CommitSummary {
            written: self.staged.len(),
            replaced,
            removed: existing.len() - replaced,
        };
        tracing::info!(
            root = %self.root.display(),
            written = summary.written,
            replaced = summary.replaced,
            removed = summary.removed,
            "committed project folder"
        );
        Ok(summary)
    }

    fn apply(&self, existing: &[String], backup: &Path, journal: &mut Journal) -> io::Result<()> {
        // Stage 1: move the current tree aside.
        for relative in existing {
            let from = join_relative(&self.root, relative);
            let to = join_relative(backup, relative);
            if let Some(parent) = to.parent() {
                self.ops.create_dir_all(parent)?;
            }
            self.ops.rename(&from, &to)?;
            journal.moves.push((from, to));
        }

        // Stage 2: move staged files into place.
        for relative in &self.staged {
            let from = join_relative(self.stage.path(), relative);
            let to = join_relative(&self.root, relative);
            if let Some(parent) = to.parent() {
                self.create_parents(parent, journal)?;
            }
            self.ops.rename(&from, &to)?;
            journal.moves.push((from, to));
        }
        Ok(())
    }

    /// Create `dir` and any missing ancestors, journaling each new one.
    fn create_parents(&self, dir: &Path, journal: &mut Journal) -> io::Result<()> {
        let mut missing = Vec::new();
        let mut current = Some(dir);
        while let Some(path) = current {
            if path == self.root || path.exists() {
                break;
            }
            missing.push(path.to_path_buf());
            current = path.parent();
        }
        for path in missing.into_iter().rev() {
            self.ops.create_dir_all(&path)?;
            journal.created_dirs.push(path);
        }
        Ok(())
    }

    // Stage 3
    fn prune_empty_dirs(&self) {
        let mut dirs: Vec<PathBuf> = managed_walk(&self.root)
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.depth() > 0 && entry.file_type().is_dir())
            .map(walkdir::DirEntry::into_path)
            .collect();
        // Children before parents.
        dirs.reverse();
        for dir in dirs {
            let is_empty = fs::read_dir(&dir)
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(false);
            if is_empty && let Err(e) = self.ops.remove_dir(&dir) {
                tracing::debug!(dir = %dir.display(), error = %e, "could not prune directory");
            }
        }
    }
}

#[derive(Default)]
struct Journal {
    moves: Vec<(PathBuf, PathBuf)>,
    created_dirs: Vec<PathBuf>,
}

impl Journal {
    /// Undo every journaled step. Returns `false` if any move could not be
    /// undone.
    fn rollback<O: FileOps>(self, ops: &O) -> bool {
        let mut complete = true;
        for (from, to) in self.moves.into_iter().rev() {
            if let Err(e) = ops.rename(&to, &from) {
                complete = false;
                tracing::error!(
                    from = %to.display(),
                    to = %from.display(),
                    error = %e,
                    "rollback move failed"
                );
            }
        }
        for dir in self.created_dirs.into_iter().rev() {
            if let Err(e) = ops.remove_dir(&dir) {
                tracing::warn!(dir = %dir.display(), error = %e, "rollback could not remove directory");
            }
        }
        complete
    }
}

/// Relative paths of every managed file under `root`, sorted, `/`-separated.
///
/// Top-level entries starting with `.` are skipped, except the record.
pub fn list_managed_files(root: &Path) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in managed_walk(root) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            PersistenceError::io("scan", path, io::Error::other(e.to_string()))
        })?;
        if entry.file_type().is_dir() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| PersistenceError::io("scan", entry.path(), io::Error::other(e.to_string())))?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        files.push(parts.join("/"));
    }
    files.sort();
    Ok(files)
}

fn managed_walk(root: &Path) -> impl Iterator<Item = walkdir::Result<walkdir::DirEntry>> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() != 1 || is_managed_top_level(entry.file_name()))
}

fn is_managed_top_level(name: &std::ffi::OsStr) -> bool {
    let name = name.to_string_lossy();
    !name.starts_with('.') || name == RECORD_FILE
}

/// Check that `relative` is a plain relative path that may be staged.
pub fn validate_tree_path(relative: &str) -> Result<()> {
    let invalid = |reason| PersistenceError::InvalidPath {
        path: relative.to_string(),
        reason,
    };
    if relative.is_empty() {
        return Err(invalid("empty path"));
    }
    // `Path::components` silently drops interior `.` segments.
    if relative
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(invalid("empty, '.' or '..' segment"));
    }
    let path = Path::new(relative);
    for component in path.components() {
        match component {
            Component::Normal(_) => {}
            Component::ParentDir => return Err(invalid("'..' is not allowed")),
            Component::CurDir => return Err(invalid("'.' is not allowed")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid("absolute paths are not allowed"));
            }
        }
    }
    let first = relative.split('/').next().unwrap_or(relative);
    if first.starts_with('.') && first != RECORD_FILE {
        return Err(invalid("hidden top-level entries are not managed"));
    }
    Ok(())
}

fn join_relative(base: &Path, relative: &str) -> PathBuf {
    let mut path = base.to_path_buf();
    path.extend(relative.split('/'));
    path
}

//! Simulated filesystem state
//!
//! An [`Overlay`] records the effect of operations that have been checked
//! but not applied, so later operations in the same batch see them. Paths
//! without an entry fall back to the real filesystem.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

/// What a path holds, as seen through the overlay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathState {
    /// Nothing at the path
    Absent,
    /// A directory
    Directory,
    /// A regular file with this content
    File(String),
}

impl PathState {
    /// Check if something exists at the path
    #[inline]
    #[must_use]
    pub fn exists(&self) -> bool {
        !matches!(self, Self::Absent)
    }

    /// File content, if the path is a file
    #[inline]
    #[must_use]
    pub fn file_content(&self) -> Option<&str> {
        match self {
            Self::File(content) => Some(content),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    File(String),
    Dir,
    Gone,
}

/// In-memory snapshot layered over the real filesystem
///
/// # Invariants
/// - an exact entry always wins over disk
/// - a `Gone` entry hides everything below it
/// - nothing can exist below a `File` entry; looking there is an error
/// - paths under a deleted directory read as absent unless re-created
#[derive(Debug, Clone, Default)]
pub struct Overlay {
    entries: HashMap<PathBuf, Entry>,
    removed_dirs: Vec<PathBuf>,
}

impl Overlay {
    /// Create empty overlay
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of `path`
    ///
    /// # Errors
    /// Returns an error when a simulated file sits above `path`, or when
    /// disk state cannot be read for a reason other than the path not
    /// existing.
    pub fn state(&self, path: &Path) -> io::Result<PathState> {
        if let Some(entry) = self.entries.get(path) {
            return Ok(match entry {
                Entry::File(content) => PathState::File(content.clone()),
                Entry::Dir => PathState::Directory,
                Entry::Gone => PathState::Absent,
            });
        }
        for ancestor in path.ancestors().skip(1) {
            match self.entries.get(ancestor) {
                Some(Entry::File(_)) => {
                    return Err(io::Error::other("a parent path is a file"));
                }
                Some(Entry::Gone) => return Ok(PathState::Absent),
                Some(Entry::Dir) | None => {}
            }
        }
        if self.removed_dirs.iter().any(|dir| path.starts_with(dir)) {
            return Ok(PathState::Absent);
        }
        disk_state(path)
    }

    /// Record a file write, creating parent directories
    pub fn write_file(&mut self, path: &Path, content: String) {
        self.mark_parents(path);
        self.entries.insert(path.to_path_buf(), Entry::File(content));
    }

    /// Record a file removal
    pub fn remove_file(&mut self, path: &Path) {
        self.entries.insert(path.to_path_buf(), Entry::Gone);
    }

    /// Record a directory creation, parents included
    pub fn create_dir(&mut self, path: &Path) {
        self.mark_parents(path);
        self.entries.insert(path.to_path_buf(), Entry::Dir);
    }

    /// Record a recursive directory removal
    pub fn remove_dir(&mut self, path: &Path) {
        self.entries.retain(|p, _| !p.starts_with(path));
        self.entries.insert(path.to_path_buf(), Entry::Gone);
        self.removed_dirs.push(path.to_path_buf());
    }

    /// Record a file move carrying `content`
    pub fn move_file(&mut self, source: &Path, destination: &Path, content: String) {
        self.remove_file(source);
        self.write_file(destination, content);
    }

    /// Number of recorded entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing has been recorded
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn mark_parents(&mut self, path: &Path) {
        for parent in path.ancestors().skip(1) {
            if parent.as_os_str().is_empty() {
                break;
            }
            match self.entries.get(parent) {
                Some(Entry::Dir | Entry::File(_)) => {}
                Some(Entry::Gone) | None => {
                    self.entries.insert(parent.to_path_buf(), Entry::Dir);
                }
            }
        }
    }
}

fn disk_state(path: &Path) -> io::Result<PathState> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(PathState::Directory),
        Ok(_) => {
            let bytes = std::fs::read(path)?;
            Ok(PathState::File(String::from_utf8_lossy(&bytes).into_owned()))
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(PathState::Absent),
        Err(err) => Err(err),
    }
}

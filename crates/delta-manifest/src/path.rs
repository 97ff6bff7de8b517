//! Root-relative path resolution
//!
//! Every path in a manifest is interpreted against one configured root
//! directory. A leading separator is relative to that root, never to the
//! host filesystem root.

use std::fmt::Debug;
use std::path::{Component, Path, PathBuf};

/// Display text for an operation without a usable path
pub const NO_PATH: &str = "N/A";

/// Maps manifest path values to real locations and back to display text
pub trait PathResolver: Send + Sync + Debug {
    /// Root every resolved path lies under
    fn root(&self) -> &Path;

    /// Resolve a raw manifest value to an absolute, normalized path
    fn resolve(&self, raw: &str) -> PathBuf;

    /// Root-relative display form with `/` separators
    fn display(&self, path: &Path) -> String {
        match path.strip_prefix(self.root()) {
            Ok(relative) if relative.as_os_str().is_empty() => ".".to_string(),
            Ok(relative) => relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/"),
            Err(_) => path.display().to_string(),
        }
    }

    /// Display form for an optional path
    fn display_opt(&self, path: Option<&Path>) -> String {
        path.map_or_else(|| NO_PATH.to_string(), |p| self.display(p))
    }
}

/// Resolver anchored at a single root directory
///
/// Normalization is lexical: `.` segments are dropped and `..` pops one
/// segment but never climbs above the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootDir {
    root: PathBuf,
}

impl RootDir {
    /// Create resolver for `root`
    ///
    /// A relative root is anchored at the current working directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = if root.is_absolute() {
            root
        } else {
            std::env::current_dir().map_or(root.clone(), |cwd| cwd.join(&root))
        };
        Self {
            root: clean(&root),
        }
    }
}

impl PathResolver for RootDir {
    fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, raw: &str) -> PathBuf {
        let relative = raw.trim().trim_start_matches('/');
        let mut resolved = self.root.clone();
        let mut depth = 0usize;
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(segment) => {
                    resolved.push(segment);
                    depth += 1;
                }
                Component::ParentDir if depth > 0 => {
                    resolved.pop();
                    depth -= 1;
                }
                Component::ParentDir
                | Component::CurDir
                | Component::RootDir
                | Component::Prefix(_) => {}
            }
        }
        resolved
    }
}

/// Lexically clean an absolute path
fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

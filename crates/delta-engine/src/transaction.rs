//! All-or-nothing application
//!
//! The batch first runs inside a staging directory holding copies of every
//! file it reads or overwrites. The real tree is written only when every
//! staged operation succeeded; otherwise staging is dropped and nothing
//! outside it has changed.

use crate::apply::{log_result, ApplyOutcome, Applier};
use crate::error::{ApplyError, TransactionError};
use delta_manifest::{Action, ContentProcessor, Operation, PathResolver};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Prefix of staging directory names
pub const STAGING_PREFIX: &str = "delta-transaction-";

/// Result of one transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionReport {
    /// Whether the staged results were written to the real tree
    pub committed: bool,
    /// Per-operation outcomes from the staged run
    pub outcomes: Vec<ApplyOutcome>,
}

impl TransactionReport {
    /// Check if the transaction was rolled back
    #[inline]
    #[must_use]
    pub fn rolled_back(&self) -> bool {
        !self.committed
    }

    /// Number of operations that failed in staging
    #[must_use]
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_success()).count()
    }
}

/// Staged, atomic batch applier
#[derive(Debug, Clone, Copy)]
pub struct Transaction<'a> {
    resolver: &'a dyn PathResolver,
    processor: &'a dyn ContentProcessor,
    staging_parent: Option<&'a Path>,
}

impl<'a> Transaction<'a> {
    /// Create transaction staging under the system temp directory
    #[inline]
    #[must_use]
    pub fn new(resolver: &'a dyn PathResolver, processor: &'a dyn ContentProcessor) -> Self {
        Self {
            resolver,
            processor,
            staging_parent: None,
        }
    }

    /// Stage under `parent` instead of the system temp directory
    #[inline]
    #[must_use]
    pub fn staging_parent(mut self, parent: Option<&'a Path>) -> Self {
        self.staging_parent = parent;
        self
    }

    /// Stage, run and, if everything succeeded, commit the batch
    ///
    /// # Errors
    /// Returns [`TransactionError`] if staging cannot be prepared or the
    /// commit onto the real tree fails part way.
    pub fn run(&self, ops: &[Operation]) -> Result<TransactionReport, TransactionError> {
        let root = self.resolver.root();
        let staging = self.create_staging()?;
        let staged_files = stage_files(root, staging.path(), ops)?;
        tracing::info!(
            staging = %staging.path().display(),
            files = staged_files,
            operations = ops.len(),
            "staged transaction"
        );

        let applier = Applier::new(self.resolver, self.processor);
        let outcomes: Vec<ApplyOutcome> = ops
            .iter()
            .map(|op| {
                let result = if op_within(op, root) {
                    applier.apply_one(&op.rebased(root, staging.path()))
                } else {
                    Err(ApplyError::OutsideRoot(
                        op.primary_path().map(Path::to_path_buf).unwrap_or_default(),
                    ))
                };
                log_result(op, &result);
                ApplyOutcome::new(op, self.resolver, result)
            })
            .collect();

        let report = if outcomes.iter().all(ApplyOutcome::is_success) {
            commit(root, staging.path(), ops)?;
            tracing::info!(operations = ops.len(), "transaction committed");
            TransactionReport {
                committed: true,
                outcomes,
            }
        } else {
            let report = TransactionReport {
                committed: false,
                outcomes,
            };
            tracing::warn!(
                failures = report.failures(),
                "transaction rolled back; real tree untouched"
            );
            report
        };
        Ok(report)
    }

    fn create_staging(&self) -> Result<TempDir, TransactionError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(STAGING_PREFIX);
        let staging = match self.staging_parent {
            Some(parent) => {
                fs::create_dir_all(parent).map_err(TransactionError::Staging)?;
                builder.tempdir_in(parent)
            }
            None => builder.tempdir(),
        };
        staging.map_err(TransactionError::Staging)
    }
}

fn op_within(op: &Operation, root: &Path) -> bool {
    [op.path(), op.source_path(), op.destination_path()]
        .into_iter()
        .flatten()
        .all(|path| path.starts_with(root))
}

/// Copy every existing file the batch touches into staging
fn stage_files(root: &Path, staging: &Path, ops: &[Operation]) -> Result<usize, TransactionError> {
    let mut staged = 0;
    for path in ops.iter().filter_map(Operation::touched_file) {
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        let target = staging.join(relative);
        if !path.is_file() || target.exists() {
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|err| TransactionError::stage(parent, err))?;
        }
        fs::copy(path, &target).map_err(|err| TransactionError::stage(path, err))?;
        staged += 1;
    }
    Ok(staged)
}

/// Write staged results onto the real tree
fn commit(root: &Path, staging: &Path, ops: &[Operation]) -> Result<(), TransactionError> {
    for op in ops {
        let removal = match op.action() {
            Some(Action::DeleteFile | Action::DeleteDirectory) => op.path(),
            Some(Action::MoveFile) => op.source_path(),
            _ => None,
        };
        let Some(path) = removal else {
            continue;
        };
        let result = if path.is_dir() {
            match op.action() {
                Some(Action::DeleteDirectory) => fs::remove_dir_all(path),
                _ => Ok(()),
            }
        } else if path.is_file() {
            fs::remove_file(path)
        } else {
            Ok(())
        };
        result.map_err(|err| TransactionError::commit(path, err))?;
        tracing::debug!(path = %path.display(), "removed from real tree");
    }
    merge_tree(staging, root)
}

/// Recursively copy `from` over `to`, keeping files only present in `to`
fn merge_tree(from: &Path, to: &Path) -> Result<(), TransactionError> {
    fs::create_dir_all(to).map_err(|err| TransactionError::commit(to, err))?;
    let entries = fs::read_dir(from).map_err(|err| TransactionError::commit(from, err))?;
    for entry in entries {
        let entry = entry.map_err(|err| TransactionError::commit(from, err))?;
        let source = entry.path();
        let target: PathBuf = to.join(entry.file_name());
        let file_type = entry
            .file_type()
            .map_err(|err| TransactionError::commit(&source, err))?;
        if file_type.is_dir() {
            merge_tree(&source, &target)?;
        } else {
            fs::copy(&source, &target).map_err(|err| TransactionError::commit(&target, err))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use delta_manifest::{MarkdownFences, RootDir};
    use pretty_assertions::assert_eq;

    fn setup() -> (tempfile::TempDir, RootDir) {
        let dir = tempfile::tempdir().unwrap();
        let root = RootDir::new(dir.path());
        (dir, root)
    }

    #[test]
    fn commits_when_everything_succeeds() {
        let (dir, root) = setup();
        fs::write(dir.path().join("keep.txt"), "untouched").unwrap();
        fs::write(dir.path().join("edit.txt"), "a\n").unwrap();
        fs::write(dir.path().join("old.txt"), "bye").unwrap();
        fs::create_dir_all(dir.path().join("trash/sub")).unwrap();
        fs::write(dir.path().join("trash/sub/x"), "x").unwrap();

        let ops = vec![
            Operation::builder(1)
                .action(Action::AppendToFile)
                .path(root.resolve("edit.txt"))
                .content("b\n")
                .build(),
            Operation::builder(2)
                .action(Action::CreateFile)
                .path(root.resolve("new/n.txt"))
                .content("n")
                .build(),
            Operation::builder(3)
                .action(Action::DeleteFile)
                .path(root.resolve("old.txt"))
                .build(),
            Operation::builder(4)
                .action(Action::DeleteDirectory)
                .path(root.resolve("trash"))
                .build(),
            Operation::builder(5)
                .action(Action::MoveFile)
                .source_path(root.resolve("edit.txt"))
                .destination_path(root.resolve("moved/edit.txt"))
                .build(),
        ];
        let report = Transaction::new(&root, &MarkdownFences).run(&ops).unwrap();

        assert!(report.committed);
        assert_eq!(report.failures(), 0);
        let p = dir.path();
        assert_eq!(fs::read_to_string(p.join("keep.txt")).unwrap(), "untouched");
        assert_eq!(fs::read_to_string(p.join("moved/edit.txt")).unwrap(), "a\nb\n");
        assert!(!p.join("edit.txt").exists());
        assert_eq!(fs::read_to_string(p.join("new/n.txt")).unwrap(), "n");
        assert!(!p.join("old.txt").exists());
        assert!(!p.join("trash").exists());
    }

    #[test]
    fn rolls_back_on_any_failure() {
        let (dir, root) = setup();
        fs::write(dir.path().join("a.txt"), "original\n").unwrap();
        let ops = vec![
            Operation::builder(1)
                .action(Action::ReplaceFile)
                .path(root.resolve("a.txt"))
                .content("changed\n")
                .build(),
            Operation::builder(2)
                .action(Action::ReplaceBlock)
                .path(root.resolve("a.txt"))
                .target_block("not there")
                .build(),
        ];
        let report = Transaction::new(&root, &MarkdownFences).run(&ops).unwrap();

        assert!(report.rolled_back());
        assert_eq!(report.failures(), 1);
        assert!(report.outcomes[0].is_success());
        assert_eq!(
            fs::read_to_string(dir.path().join("a.txt")).unwrap(),
            "original\n"
        );
    }

    #[test]
    fn staging_is_removed_afterwards() {
        let (dir, root) = setup();
        let parent = tempfile::tempdir().unwrap();
        let ops = vec![Operation::builder(1)
            .action(Action::CreateFile)
            .path(root.resolve("f"))
            .content("x")
            .build()];
        let report = Transaction::new(&root, &MarkdownFences)
            .staging_parent(Some(parent.path()))
            .run(&ops)
            .unwrap();

        assert!(report.committed);
        assert!(dir.path().join("f").is_file());
        assert_eq!(fs::read_dir(parent.path()).unwrap().count(), 0);
    }

    #[test]
    fn operations_outside_root_fail_the_transaction() {
        let (_dir, root) = setup();
        let elsewhere = tempfile::tempdir().unwrap();
        let ops = vec![Operation::builder(1)
            .action(Action::CreateFile)
            .path(elsewhere.path().join("escape.txt"))
            .content("x")
            .build()];
        let report = Transaction::new(&root, &MarkdownFences).run(&ops).unwrap();

        assert!(report.rolled_back());
        assert!(!elsewhere.path().join("escape.txt").exists());
    }
}

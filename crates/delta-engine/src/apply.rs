//! Direct application of operations
//!
//! Each operation runs against the filesystem in manifest order. A failure
//! is recorded on its own outcome and never stops later operations.

use crate::effect::file_after;
use crate::error::ApplyError;
use delta_manifest::{Action, ContentProcessor, Operation, PathResolver};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::Path;

/// Whether an operation took effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyStatus {
    /// Operation took effect
    Success,
    /// Operation failed; see the error detail
    Failure,
}

/// Result record for one applied operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyOutcome {
    /// 1-based operation index
    pub index: usize,
    /// Applied action
    pub action: Option<Action>,
    /// Root-relative display path
    pub path: String,
    /// Success or failure
    pub status: ApplyStatus,
    /// Error detail on failure
    pub error: Option<String>,
}

impl ApplyOutcome {
    /// Build the record for `op` from its apply result
    #[must_use]
    pub fn new(
        op: &Operation,
        resolver: &dyn PathResolver,
        result: Result<(), ApplyError>,
    ) -> Self {
        let (status, error) = match result {
            Ok(()) => (ApplyStatus::Success, None),
            Err(err) => (ApplyStatus::Failure, Some(err.to_string())),
        };
        Self {
            index: op.index(),
            action: op.action(),
            path: resolver.display_opt(op.primary_path()),
            status,
            error,
        }
    }

    /// Check if the operation took effect
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == ApplyStatus::Success
    }
}

/// Filesystem applier
#[derive(Debug, Clone, Copy)]
pub struct Applier<'a> {
    resolver: &'a dyn PathResolver,
    processor: &'a dyn ContentProcessor,
}

impl<'a> Applier<'a> {
    /// Create applier
    #[inline]
    #[must_use]
    pub fn new(resolver: &'a dyn PathResolver, processor: &'a dyn ContentProcessor) -> Self {
        Self {
            resolver,
            processor,
        }
    }

    /// Apply every operation in order, recording one outcome each
    #[must_use]
    pub fn apply_all(&self, ops: &[Operation]) -> Vec<ApplyOutcome> {
        ops.iter()
            .map(|op| {
                let result = self.apply_one(op);
                log_result(op, &result);
                ApplyOutcome::new(op, self.resolver, result)
            })
            .collect()
    }

    /// Apply one operation
    ///
    /// # Errors
    /// Returns [`ApplyError`] if a required field is missing, a block target
    /// is no longer present, or a filesystem call fails.
    pub fn apply_one(&self, op: &Operation) -> Result<(), ApplyError> {
        let action = op.action().ok_or(ApplyError::MissingAction)?;
        if action == Action::MoveFile {
            let source = op
                .source_path()
                .ok_or_else(|| ApplyError::missing_path(action, "SOURCE_PATH"))?;
            let destination = op
                .destination_path()
                .ok_or_else(|| ApplyError::missing_path(action, "DESTINATION_PATH"))?;
            create_parent(destination)?;
            return fs::rename(source, destination).map_err(|err| ApplyError::io(source, err));
        }

        let path = op
            .path()
            .ok_or_else(|| ApplyError::missing_path(action, "PATH"))?;
        match action {
            Action::CreateDirectory => {
                fs::create_dir_all(path).map_err(|err| ApplyError::io(path, err))
            }
            Action::DeleteDirectory => {
                if path.is_dir() {
                    fs::remove_dir_all(path).map_err(|err| ApplyError::io(path, err))?;
                }
                Ok(())
            }
            Action::DeleteFile => {
                if path.is_file() {
                    fs::remove_file(path).map_err(|err| ApplyError::io(path, err))?;
                }
                Ok(())
            }
            _ => {
                create_parent(path)?;
                let before = match action {
                    Action::CreateFile | Action::ReplaceFile => None,
                    _ => read_existing(path)?,
                };
                let after = file_after(op, before.as_deref(), self.processor)
                    .ok_or_else(|| ApplyError::TargetNotFound(path.to_path_buf()))?;
                fs::write(path, after).map_err(|err| ApplyError::io(path, err))
            }
        }
    }
}

pub(crate) fn log_result(op: &Operation, result: &Result<(), ApplyError>) {
    match result {
        Ok(()) => tracing::info!(index = op.index(), "applied {}", op),
        Err(err) => tracing::error!(index = op.index(), error = %err, "failed to apply {}", op),
    }
}

fn create_parent(path: &Path) -> Result<(), ApplyError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|err| ApplyError::io(parent, err))
        }
        _ => Ok(()),
    }
}

fn read_existing(path: &Path) -> Result<Option<String>, ApplyError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(ApplyError::io(path, err)),
    }
}

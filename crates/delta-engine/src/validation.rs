//! Batch validation
//!
//! Every operation is checked against disk state plus the simulated effect of
//! the operations before it. Checking never stops early: the result holds
//! every problem in the batch.

use crate::effect::{file_after, occurrences};
use crate::overlay::{Overlay, PathState};
use delta_manifest::{Action, ContentProcessor, Operation, PathResolver};
use serde::Serialize;
use std::fmt::{self, Display, Formatter};
use std::path::Path;

/// One rejected operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    /// 1-based operation index
    pub index: usize,
    /// Root-relative display path
    pub path: String,
    /// What is wrong
    pub message: String,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}: {}", self.index, self.path, self.message)
    }
}

/// Non-fatal finding on an accepted operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationWarning {
    /// 1-based operation index
    pub index: usize,
    /// Root-relative display path
    pub path: String,
    /// What looks off
    pub message: String,
}

/// Outcome of validating one batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Validation {
    /// Every rejected operation, in index order
    pub errors: Vec<ValidationError>,
    /// Ambiguity warnings on accepted operations
    pub warnings: Vec<ValidationWarning>,
}

impl Validation {
    /// Check if no operation was rejected
    #[inline]
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Errors reported for operation `index`
    pub fn errors_for(&self, index: usize) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter().filter(move |e| e.index == index)
    }

    /// Pretty JSON for external callers
    ///
    /// # Errors
    /// Returns the serializer error; this does not happen for these types.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// What checking one operation found
enum Check {
    Accepted,
    Ambiguous(String),
}

/// Batch validator
#[derive(Debug, Clone, Copy)]
pub struct Validator<'a> {
    resolver: &'a dyn PathResolver,
    processor: &'a dyn ContentProcessor,
    strict: bool,
}

impl<'a> Validator<'a> {
    /// Create lenient validator
    #[inline]
    #[must_use]
    pub fn new(resolver: &'a dyn PathResolver, processor: &'a dyn ContentProcessor) -> Self {
        Self {
            resolver,
            processor,
            strict: false,
        }
    }

    /// Treat ambiguous block targets as errors
    #[inline]
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Validate a batch in order
    #[must_use]
    pub fn validate(&self, ops: &[Operation]) -> Validation {
        let mut overlay = Overlay::new();
        let mut validation = Validation::default();
        for op in ops {
            let path = self.resolver.display_opt(op.primary_path());
            match self.check(op, &mut overlay) {
                Ok(Check::Accepted) => {}
                Ok(Check::Ambiguous(message)) => {
                    tracing::warn!(index = op.index(), %path, "{}", message);
                    validation.warnings.push(ValidationWarning {
                        index: op.index(),
                        path,
                        message,
                    });
                }
                Err(message) => {
                    tracing::warn!(index = op.index(), %path, "validation failed: {}", message);
                    validation.errors.push(ValidationError {
                        index: op.index(),
                        path,
                        message,
                    });
                }
            }
        }
        tracing::debug!(
            operations = ops.len(),
            errors = validation.errors.len(),
            warnings = validation.warnings.len(),
            "validated batch"
        );
        validation
    }

    /// Check one operation and, if accepted, record its effect
    fn check(&self, op: &Operation, overlay: &mut Overlay) -> Result<Check, String> {
        let Some(action) = op.action() else {
            return Err(match op.unrecognized_action() {
                Some(raw) => format!("Unrecognized ACTION '{raw}'."),
                None => "Missing PATH or ACTION.".to_string(),
            });
        };

        if action == Action::MoveFile {
            return self.check_move(op, overlay);
        }

        let Some(path) = op.path() else {
            return Err("Missing PATH or ACTION.".to_string());
        };
        let state = lookup(overlay, path)?;

        match action {
            Action::CreateFile => match state {
                PathState::Directory => {
                    Err("Cannot create file; a directory already exists at this path.".to_string())
                }
                PathState::File(_) => Err("File already exists.".to_string()),
                PathState::Absent => {
                    self.simulate_write(op, path, None, overlay);
                    Ok(Check::Accepted)
                }
            },
            Action::CreateDirectory => {
                if state.exists() {
                    return Err("Path already exists.".to_string());
                }
                overlay.create_dir(path);
                Ok(Check::Accepted)
            }
            Action::DeleteDirectory => {
                if state != PathState::Directory {
                    return Err("Directory not found.".to_string());
                }
                overlay.remove_dir(path);
                Ok(Check::Accepted)
            }
            Action::DeleteFile => {
                if state.file_content().is_none() {
                    return Err("File not found.".to_string());
                }
                overlay.remove_file(path);
                Ok(Check::Accepted)
            }
            Action::ReplaceFile | Action::AppendToFile | Action::PrependToFile => {
                let Some(before) = state.file_content() else {
                    return Err("File not found.".to_string());
                };
                self.simulate_write(op, path, Some(before), overlay);
                Ok(Check::Accepted)
            }
            Action::ReplaceBlock | Action::InsertAfterBlock | Action::InsertBeforeBlock => {
                self.check_block(op, path, &state, overlay)
            }
            Action::MoveFile => self.check_move(op, overlay),
        }
    }

    fn check_block(
        &self,
        op: &Operation,
        path: &Path,
        state: &PathState,
        overlay: &mut Overlay,
    ) -> Result<Check, String> {
        let Some(before) = state.file_content() else {
            return Err("File not found for block operation.".to_string());
        };
        if op.target_block().is_empty() {
            return Err("TARGET_BLOCK is empty.".to_string());
        }
        let found = occurrences(before, op.target_block());
        let check = match found {
            0 => return Err("TARGET_BLOCK not found.".to_string()),
            1 => Check::Accepted,
            n if self.strict => {
                return Err(format!("Ambiguous TARGET_BLOCK: found {n} occurrences."));
            }
            n => Check::Ambiguous(format!(
                "TARGET_BLOCK found {n} times; only the first occurrence will be changed."
            )),
        };
        self.simulate_write(op, path, Some(before), overlay);
        Ok(check)
    }

    fn check_move(&self, op: &Operation, overlay: &mut Overlay) -> Result<Check, String> {
        let (Some(source), Some(destination)) = (op.source_path(), op.destination_path()) else {
            return Err(
                "MOVE_FILE requires both SOURCE_PATH and DESTINATION_PATH headers.".to_string(),
            );
        };
        let PathState::File(content) = lookup(overlay, source)? else {
            return Err("Source file for move not found.".to_string());
        };
        if lookup(overlay, destination)? == PathState::Directory {
            return Err("Destination is a directory.".to_string());
        }
        overlay.move_file(source, destination, content);
        Ok(Check::Accepted)
    }

    fn simulate_write(
        &self,
        op: &Operation,
        path: &Path,
        before: Option<&str>,
        overlay: &mut Overlay,
    ) {
        if let Some(after) = file_after(op, before, self.processor) {
            overlay.write_file(path, after);
        }
    }
}

fn lookup(overlay: &Overlay, path: &Path) -> Result<PathState, String> {
    overlay
        .state(path)
        .map_err(|err| format!("Cannot read path: {err}."))
}

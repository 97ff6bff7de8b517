//! File content transitions
//!
//! [`file_after`] is the single definition of what an operation does to a
//! file's text. Validation simulates with it, previews diff against it and
//! the applier writes its result, so all three agree.

use crate::overlay::{Overlay, PathState};
use delta_manifest::{Action, ContentProcessor, Operation};
use std::io;

/// Content of the operation's file once the operation has run
///
/// `before` is the current file content, `None` when the file is absent.
/// Returns `None` when the action does not produce file content (directory
/// actions and moves) or when a block action cannot locate its target.
/// Block actions edit the first occurrence only; the target itself is
/// kept raw while payloads go through `processor`.
#[must_use]
pub fn file_after(
    op: &Operation,
    before: Option<&str>,
    processor: &dyn ContentProcessor,
) -> Option<String> {
    let current = before.unwrap_or_default();
    match op.action()? {
        Action::CreateFile | Action::ReplaceFile => Some(processor.process(op.content())),
        Action::AppendToFile => Some(format!("{current}{}", processor.process(op.content()))),
        Action::PrependToFile => Some(format!("{}{current}", processor.process(op.content()))),
        Action::DeleteFile => Some(String::new()),
        Action::ReplaceBlock | Action::InsertAfterBlock | Action::InsertBeforeBlock => {
            block_after(op, before?, processor)
        }
        Action::CreateDirectory | Action::DeleteDirectory | Action::MoveFile => None,
    }
}

fn block_after(op: &Operation, before: &str, processor: &dyn ContentProcessor) -> Option<String> {
    let target = op.target_block();
    if target.is_empty() || !before.contains(target) {
        return None;
    }
    let replacement = processor.process(op.replacement_content());
    let edited = match op.action()? {
        Action::ReplaceBlock => replacement,
        Action::InsertAfterBlock => format!("{target}{replacement}"),
        Action::InsertBeforeBlock => format!("{replacement}{target}"),
        _ => return None,
    };
    Some(before.replacen(target, &edited, 1))
}

/// Record the effect of `op` in `overlay`
///
/// Threads state through a batch preview. Operations whose preconditions do
/// not hold leave the overlay as it was.
///
/// # Errors
/// Returns the underlying error when disk state cannot be read.
pub fn simulate(
    op: &Operation,
    overlay: &mut Overlay,
    processor: &dyn ContentProcessor,
) -> io::Result<()> {
    let Some(action) = op.action() else {
        return Ok(());
    };
    if action == Action::MoveFile {
        if let (Some(source), Some(destination)) = (op.source_path(), op.destination_path()) {
            if let PathState::File(content) = overlay.state(source)? {
                overlay.move_file(source, destination, content);
            }
        }
        return Ok(());
    }
    let Some(path) = op.path() else {
        return Ok(());
    };
    match action {
        Action::CreateDirectory => overlay.create_dir(path),
        Action::DeleteDirectory => {
            if overlay.state(path)? == PathState::Directory {
                overlay.remove_dir(path);
            }
        }
        Action::DeleteFile => {
            if overlay.state(path)?.file_content().is_some() {
                overlay.remove_file(path);
            }
        }
        _ => {
            let state = overlay.state(path)?;
            let ready = match action {
                Action::CreateFile => !state.exists(),
                _ => state.file_content().is_some(),
            };
            if let Some(after) = ready
                .then(|| file_after(op, state.file_content(), processor))
                .flatten()
            {
                overlay.write_file(path, after);
            }
        }
    }
    Ok(())
}

/// Non-overlapping occurrences of `target` in `text`
#[inline]
#[must_use]
pub fn occurrences(text: &str, target: &str) -> usize {
    if target.is_empty() {
        return 0;
    }
    text.matches(target).count()
}

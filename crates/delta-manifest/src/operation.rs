//! Typed delta operations
//!
//! Provides [`Operation`] for one requested filesystem mutation and
//! [`OperationBuilder`] for accumulating its fields while a manifest is parsed.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// The closed set of mutations a manifest may request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// Write a new file; nothing may exist at the path
    CreateFile,
    /// Overwrite an existing file
    ReplaceFile,
    /// Remove an existing file
    DeleteFile,
    /// Add content at the end of an existing file
    AppendToFile,
    /// Add content at the start of an existing file
    PrependToFile,
    /// Create a directory (and any missing parents)
    CreateDirectory,
    /// Remove a directory recursively
    DeleteDirectory,
    /// Replace the first occurrence of the target block
    ReplaceBlock,
    /// Insert replacement content after the first occurrence of the target block
    InsertAfterBlock,
    /// Insert replacement content before the first occurrence of the target block
    InsertBeforeBlock,
    /// Rename a file from `SOURCE_PATH` to `DESTINATION_PATH`
    MoveFile,
}

impl Action {
    /// Every action, in manifest documentation order
    pub const ALL: [Action; 11] = [
        Action::CreateFile,
        Action::ReplaceFile,
        Action::DeleteFile,
        Action::AppendToFile,
        Action::PrependToFile,
        Action::CreateDirectory,
        Action::DeleteDirectory,
        Action::ReplaceBlock,
        Action::InsertAfterBlock,
        Action::InsertBeforeBlock,
        Action::MoveFile,
    ];

    /// Manifest keyword for this action
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateFile => "CREATE_FILE",
            Self::ReplaceFile => "REPLACE_FILE",
            Self::DeleteFile => "DELETE_FILE",
            Self::AppendToFile => "APPEND_TO_FILE",
            Self::PrependToFile => "PREPEND_TO_FILE",
            Self::CreateDirectory => "CREATE_DIRECTORY",
            Self::DeleteDirectory => "DELETE_DIRECTORY",
            Self::ReplaceBlock => "REPLACE_BLOCK",
            Self::InsertAfterBlock => "INSERT_AFTER_BLOCK",
            Self::InsertBeforeBlock => "INSERT_BEFORE_BLOCK",
            Self::MoveFile => "MOVE_FILE",
        }
    }

    /// Check if the action edits around a located target block
    #[inline]
    #[must_use]
    pub fn is_block(self) -> bool {
        matches!(
            self,
            Self::ReplaceBlock | Self::InsertAfterBlock | Self::InsertBeforeBlock
        )
    }

    /// Check if the action only concerns directories
    #[inline]
    #[must_use]
    pub fn is_directory(self) -> bool {
        matches!(self, Self::CreateDirectory | Self::DeleteDirectory)
    }

    /// Check if the action needs an existing regular file at `PATH`
    #[inline]
    #[must_use]
    pub fn requires_existing_file(self) -> bool {
        matches!(
            self,
            Self::ReplaceFile | Self::DeleteFile | Self::AppendToFile | Self::PrependToFile
        ) || self.is_block()
    }

    /// Check if the action writes file content (and so creates parent directories)
    #[inline]
    #[must_use]
    pub fn writes_content(self) -> bool {
        !matches!(
            self,
            Self::DeleteFile | Self::CreateDirectory | Self::DeleteDirectory | Self::MoveFile
        )
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}

/// An `ACTION:` value outside the closed set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized action '{0}'")]
pub struct UnknownAction(pub String);

/// Body sections that accumulate raw text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyField {
    /// `=== DELTA::TARGET_BLOCK ===`
    TargetBlock,
    /// `=== DELTA::REPLACEMENT_CONTENT ===`
    ReplacementContent,
    /// `=== DELTA::CONTENT ===`
    Content,
}

impl BodyField {
    /// Section name as written in the marker
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TargetBlock => "TARGET_BLOCK",
            Self::ReplacementContent => "REPLACEMENT_CONTENT",
            Self::Content => "CONTENT",
        }
    }
}

/// One requested filesystem mutation
///
/// Built once by the parser and never mutated afterwards. Rebasing for a
/// staged transaction produces a new value.
///
/// # Invariants
/// - `index` is 1-based and follows manifest order
/// - every path is absolute and lies under the configured root
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Operation {
    index: usize,
    action: Option<Action>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unrecognized_action: Option<String>,
    path: Option<PathBuf>,
    source_path: Option<PathBuf>,
    destination_path: Option<PathBuf>,
    target_block: String,
    replacement_content: String,
    content: String,
}

impl Operation {
    /// Start building the operation at `index`
    #[inline]
    #[must_use]
    pub fn builder(index: usize) -> OperationBuilder {
        OperationBuilder::new(index)
    }

    /// 1-based manifest position
    #[inline]
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Requested action, if one was recognized
    #[inline]
    #[must_use]
    pub fn action(&self) -> Option<Action> {
        self.action
    }

    /// Raw `ACTION:` value that did not name a known action
    #[inline]
    #[must_use]
    pub fn unrecognized_action(&self) -> Option<&str> {
        self.unrecognized_action.as_deref()
    }

    /// Resolved `PATH`
    #[inline]
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Resolved `SOURCE_PATH`
    #[inline]
    #[must_use]
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// Resolved `DESTINATION_PATH`
    #[inline]
    #[must_use]
    pub fn destination_path(&self) -> Option<&Path> {
        self.destination_path.as_deref()
    }

    /// Literal text a block action anchors on
    #[inline]
    #[must_use]
    pub fn target_block(&self) -> &str {
        &self.target_block
    }

    /// Raw replacement payload for block actions
    #[inline]
    #[must_use]
    pub fn replacement_content(&self) -> &str {
        &self.replacement_content
    }

    /// Raw payload for file actions
    #[inline]
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Path used when reporting this operation
    ///
    /// `MOVE_FILE` reports its source when no `PATH` header was given.
    #[must_use]
    pub fn primary_path(&self) -> Option<&Path> {
        match (self.action, self.path()) {
            (Some(Action::MoveFile), None) => self.source_path(),
            (_, path) => path,
        }
    }

    /// Existing file this operation reads or overwrites
    ///
    /// This is the set of files a staged transaction must copy in before
    /// running the batch.
    #[must_use]
    pub fn touched_file(&self) -> Option<&Path> {
        match self.action? {
            Action::MoveFile => self.source_path(),
            Action::CreateDirectory | Action::DeleteDirectory => None,
            _ => self.path(),
        }
    }

    /// Same operation with every path moved from under `from` to under `to`
    ///
    /// Paths that do not lie under `from` are kept as they are.
    #[must_use]
    pub fn rebased(&self, from: &Path, to: &Path) -> Self {
        let rebase = |path: &Option<PathBuf>| {
            path.as_ref().map(|p| match p.strip_prefix(from) {
                Ok(relative) => to.join(relative),
                Err(_) => p.clone(),
            })
        };
        Self {
            path: rebase(&self.path),
            source_path: rebase(&self.source_path),
            destination_path: rebase(&self.destination_path),
            ..self.clone()
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let action = match (self.action, &self.unrecognized_action) {
            (Some(action), _) => action.as_str(),
            (None, Some(raw)) => raw.as_str(),
            (None, None) => "<no action>",
        };
        match self.primary_path() {
            Some(path) => write!(f, "#{} {} {}", self.index, action, path.display()),
            None => write!(f, "#{} {}", self.index, action),
        }
    }
}

/// Builder that accumulates an operation while it is current in the parser
#[derive(Debug, Clone)]
pub struct OperationBuilder {
    op: Operation,
}

impl OperationBuilder {
    /// Create new builder
    #[inline]
    #[must_use]
    pub fn new(index: usize) -> Self {
        Self {
            op: Operation {
                index,
                action: None,
                unrecognized_action: None,
                path: None,
                source_path: None,
                destination_path: None,
                target_block: String::new(),
                replacement_content: String::new(),
                content: String::new(),
            },
        }
    }

    /// Index the built operation will carry
    #[inline]
    #[must_use]
    pub fn index(&self) -> usize {
        self.op.index
    }

    /// Set action
    #[inline]
    #[must_use]
    pub fn action(mut self, action: Action) -> Self {
        self.set_action(action);
        self
    }

    /// Set `PATH`
    #[inline]
    #[must_use]
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.op.path = Some(path.into());
        self
    }

    /// Set `SOURCE_PATH`
    #[inline]
    #[must_use]
    pub fn source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.op.source_path = Some(path.into());
        self
    }

    /// Set `DESTINATION_PATH`
    #[inline]
    #[must_use]
    pub fn destination_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.op.destination_path = Some(path.into());
        self
    }

    /// Set target block
    #[inline]
    #[must_use]
    pub fn target_block(mut self, text: impl Into<String>) -> Self {
        self.op.target_block = text.into();
        self
    }

    /// Set replacement content
    #[inline]
    #[must_use]
    pub fn replacement_content(mut self, text: impl Into<String>) -> Self {
        self.op.replacement_content = text.into();
        self
    }

    /// Set content
    #[inline]
    #[must_use]
    pub fn content(mut self, text: impl Into<String>) -> Self {
        self.op.content = text.into();
        self
    }

    /// Record a recognized action, clearing any earlier unrecognized value
    pub fn set_action(&mut self, action: Action) {
        self.op.action = Some(action);
        self.op.unrecognized_action = None;
    }

    /// Record an `ACTION:` value outside the closed set
    pub fn set_unrecognized_action(&mut self, raw: impl Into<String>) {
        self.op.action = None;
        self.op.unrecognized_action = Some(raw.into());
    }

    /// Set `PATH` in place
    pub fn set_path(&mut self, path: PathBuf) {
        self.op.path = Some(path);
    }

    /// Set `SOURCE_PATH` in place
    pub fn set_source_path(&mut self, path: PathBuf) {
        self.op.source_path = Some(path);
    }

    /// Set `DESTINATION_PATH` in place
    pub fn set_destination_path(&mut self, path: PathBuf) {
        self.op.destination_path = Some(path);
    }

    /// Empty a body field when its section marker opens
    pub fn clear_body(&mut self, field: BodyField) {
        self.body_mut(field).clear();
    }

    /// Append raw text to a body field
    pub fn push_body(&mut self, field: BodyField, text: &str) {
        self.body_mut(field).push_str(text);
    }

    fn body_mut(&mut self, field: BodyField) -> &mut String {
        match field {
            BodyField::TargetBlock => &mut self.op.target_block,
            BodyField::ReplacementContent => &mut self.op.replacement_content,
            BodyField::Content => &mut self.op.content,
        }
    }

    /// Finish the operation
    #[inline]
    #[must_use]
    pub fn build(self) -> Operation {
        self.op
    }
}

//! Error and warning types for manifest parsing
//!
//! Parsing is lenient by default: anything it cannot classify becomes a
//! [`ParseWarning`] and parsing continues. In strict mode the first warning
//! condition is raised as a [`ParseError`] and the whole manifest is rejected.

use serde::Serialize;
use std::fmt::{self, Display, Formatter};

/// What made a manifest line suspicious
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WarningKind {
    /// Non-blank text before the first start marker
    BeforeFirstOperation,
    /// Non-blank text between a header and the next marker
    UnexpectedAfterHeader {
        /// Header that was current
        header: String,
    },
    /// Non-blank text that fits no construct
    Unclassified,
    /// Example start marker outside a body section
    ExampleStartOutsideBody,
    /// Example end marker with no open example
    ExampleEndWithoutStart,
    /// Example block still open when input ended
    UnterminatedExample,
    /// `ACTION:` value outside the closed set
    UnrecognizedAction {
        /// Raw value
        value: String,
    },
}

/// Non-fatal finding reported while parsing continues
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseWarning {
    /// 1-based line number
    pub line: usize,
    /// Raw line text, trimmed
    pub text: String,
    /// Classification
    #[serde(flatten)]
    pub kind: WarningKind,
}

impl ParseWarning {
    /// Create warning for a line
    pub fn new(line: usize, text: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            line,
            text: text.into(),
            kind,
        }
    }
}

impl Display for ParseWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let line = self.line;
        let text = &self.text;
        match &self.kind {
            WarningKind::BeforeFirstOperation => {
                write!(f, "ignoring line {line} before first delta start: '{text}'")
            }
            WarningKind::UnexpectedAfterHeader { header } => write!(
                f,
                "ignoring unexpected content after {header} at line {line}: '{text}'"
            ),
            WarningKind::Unclassified => {
                write!(f, "ignoring unclassified line {line}: '{text}'")
            }
            WarningKind::ExampleStartOutsideBody => write!(
                f,
                "example start marker found outside a content section at line {line}: '{text}'"
            ),
            WarningKind::ExampleEndWithoutStart => write!(
                f,
                "example end marker without a preceding start at line {line}: '{text}'"
            ),
            WarningKind::UnterminatedExample => write!(
                f,
                "example block opened at line {line} is never closed: '{text}'"
            ),
            WarningKind::UnrecognizedAction { value } => write!(
                f,
                "unrecognized action '{value}' at line {line}: '{text}'"
            ),
        }
    }
}

/// Errors during manifest parsing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// A warning condition met in strict mode
    #[error("strict mode: {0}")]
    Strict(ParseWarning),
}

impl ParseError {
    /// Line the failure points at
    #[inline]
    #[must_use]
    pub fn line(&self) -> usize {
        match self {
            Self::Strict(warning) => warning.line,
        }
    }
}

/// Result type alias for parsing
pub type ParseResult<T> = Result<T, ParseError>;

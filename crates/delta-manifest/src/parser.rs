//! Line-oriented manifest parser
//!
//! Turns manifest text into an ordered list of [`Operation`]s. Lines are
//! classified on their trimmed form; body sections keep their lines verbatim,
//! newline included.

use crate::content::{EXAMPLE_END, EXAMPLE_START};
use crate::error::{ParseError, ParseResult, ParseWarning, WarningKind};
use crate::operation::{Action, BodyField, Operation, OperationBuilder};
use crate::path::PathResolver;
use once_cell::sync::Lazy;
use regex::Regex;

/// Marker opening a new operation
pub const START_MARKER: &str = "=== DELTA::START ===";

static HEADER_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(PATH|ACTION|SOURCE_PATH|DESTINATION_PATH):\s*(.*)$")
        .expect("header pattern is valid")
});

static BODY_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^=== DELTA::(TARGET_BLOCK|REPLACEMENT_CONTENT|CONTENT) ===$")
        .expect("body marker pattern is valid")
});

/// Header keys an operation may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Header {
    Path,
    Action,
    SourcePath,
    DestinationPath,
}

impl Header {
    fn from_key(key: &str) -> Option<Self> {
        match key {
            "PATH" => Some(Self::Path),
            "ACTION" => Some(Self::Action),
            "SOURCE_PATH" => Some(Self::SourcePath),
            "DESTINATION_PATH" => Some(Self::DestinationPath),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Path => "PATH",
            Self::Action => "ACTION",
            Self::SourcePath => "SOURCE_PATH",
            Self::DestinationPath => "DESTINATION_PATH",
        }
    }
}

fn body_field(name: &str) -> Option<BodyField> {
    match name {
        "TARGET_BLOCK" => Some(BodyField::TargetBlock),
        "REPLACEMENT_CONTENT" => Some(BodyField::ReplacementContent),
        "CONTENT" => Some(BodyField::Content),
        _ => None,
    }
}

/// Section the parser is currently inside
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Header(Header),
    Body(BodyField),
}

/// Output of a successful parse
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedManifest {
    /// Operations in manifest order
    pub operations: Vec<Operation>,
    /// Non-fatal findings, in line order
    pub warnings: Vec<ParseWarning>,
}

impl ParsedManifest {
    /// Check if the manifest held no operations
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Manifest parser
///
/// # Example
///
/// ```rust
/// use delta_manifest::{Action, ManifestParser, RootDir};
///
/// let root = RootDir::new("/srv/project");
/// let manifest = "=== DELTA::START ===\nPATH: a.txt\nACTION: CREATE_FILE\n=== DELTA::CONTENT ===\nhi\n";
/// let parsed = ManifestParser::new(&root).parse(manifest).unwrap();
/// assert_eq!(parsed.operations[0].action(), Some(Action::CreateFile));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ManifestParser<'r> {
    resolver: &'r dyn PathResolver,
    strict: bool,
}

impl<'r> ManifestParser<'r> {
    /// Create lenient parser resolving paths with `resolver`
    #[inline]
    #[must_use]
    pub fn new(resolver: &'r dyn PathResolver) -> Self {
        Self {
            resolver,
            strict: false,
        }
    }

    /// Turn every warning condition into a fatal error
    #[inline]
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Parse full manifest text
    ///
    /// # Errors
    /// In strict mode, returns [`ParseError::Strict`] for the first line that
    /// would otherwise have produced a warning.
    pub fn parse(&self, text: &str) -> ParseResult<ParsedManifest> {
        let mut state = ParseState::new(*self);
        for (i, line) in text.split_inclusive('\n').enumerate() {
            state.line(i + 1, line)?;
        }
        state.finish()
    }
}

/// Mutable parser state for one manifest
struct ParseState<'r> {
    config: ManifestParser<'r>,
    operations: Vec<Operation>,
    warnings: Vec<ParseWarning>,
    current: Option<OperationBuilder>,
    section: Option<Section>,
    /// Line number and text of the open example start marker
    example: Option<(usize, String)>,
}

impl<'r> ParseState<'r> {
    fn new(config: ManifestParser<'r>) -> Self {
        Self {
            config,
            operations: Vec::new(),
            warnings: Vec::new(),
            current: None,
            section: None,
            example: None,
        }
    }

    fn line(&mut self, number: usize, line: &str) -> ParseResult<()> {
        let trimmed = line.trim();

        if self.example.is_some() {
            self.push_body(line);
            if trimmed == EXAMPLE_END {
                self.example = None;
            }
            return Ok(());
        }

        if trimmed == EXAMPLE_START {
            if self.push_body(line) {
                self.example = Some((number, trimmed.to_string()));
                return Ok(());
            }
            return self.warn(number, trimmed, WarningKind::ExampleStartOutsideBody);
        }

        if trimmed == EXAMPLE_END {
            self.push_body(line);
            return self.warn(number, trimmed, WarningKind::ExampleEndWithoutStart);
        }

        if trimmed == START_MARKER {
            self.close_current();
            self.current = Some(OperationBuilder::new(self.operations.len() + 1));
            self.section = None;
            return Ok(());
        }

        if self.current.is_none() {
            if trimmed.is_empty() {
                return Ok(());
            }
            return self.warn(number, trimmed, WarningKind::BeforeFirstOperation);
        }

        if let Some(field) = BODY_MARKER
            .captures(trimmed)
            .and_then(|caps| body_field(&caps[1]))
        {
            self.section = Some(Section::Body(field));
            if let Some(builder) = self.current.as_mut() {
                builder.clear_body(field);
            }
            return Ok(());
        }

        if self.push_body(line) {
            return Ok(());
        }

        if let Some(caps) = HEADER_LINE.captures(trimmed) {
            if let Some(header) = Header::from_key(&caps[1]) {
                let value = caps[2].trim().to_string();
                self.section = Some(Section::Header(header));
                return self.set_header(number, trimmed, header, &value);
            }
        }

        if trimmed.is_empty() {
            return Ok(());
        }

        match self.section {
            Some(Section::Header(header)) => self.warn(
                number,
                trimmed,
                WarningKind::UnexpectedAfterHeader {
                    header: header.as_str().to_string(),
                },
            ),
            _ => self.warn(number, trimmed, WarningKind::Unclassified),
        }
    }

    /// Append `line` to the open body field; false when no body is open
    fn push_body(&mut self, line: &str) -> bool {
        match (self.current.as_mut(), self.section) {
            (Some(builder), Some(Section::Body(field))) => {
                builder.push_body(field, line);
                true
            }
            _ => false,
        }
    }

    fn set_header(
        &mut self,
        number: usize,
        trimmed: &str,
        header: Header,
        value: &str,
    ) -> ParseResult<()> {
        if value.is_empty() {
            return Ok(());
        }
        let resolver = self.config.resolver;
        let Some(builder) = self.current.as_mut() else {
            return Ok(());
        };
        match header {
            Header::Path => builder.set_path(resolver.resolve(value)),
            Header::SourcePath => builder.set_source_path(resolver.resolve(value)),
            Header::DestinationPath => builder.set_destination_path(resolver.resolve(value)),
            Header::Action => match value.parse::<Action>() {
                Ok(action) => builder.set_action(action),
                Err(_) => {
                    builder.set_unrecognized_action(value);
                    return self.warn(
                        number,
                        trimmed,
                        WarningKind::UnrecognizedAction {
                            value: value.to_string(),
                        },
                    );
                }
            },
        }
        Ok(())
    }

    fn warn(&mut self, number: usize, trimmed: &str, kind: WarningKind) -> ParseResult<()> {
        let warning = ParseWarning::new(number, trimmed, kind);
        if self.config.strict {
            return Err(ParseError::Strict(warning));
        }
        tracing::warn!(line = number, "{}", warning);
        self.warnings.push(warning);
        Ok(())
    }

    fn close_current(&mut self) {
        if let Some(builder) = self.current.take() {
            self.operations.push(builder.build());
        }
    }

    fn finish(mut self) -> ParseResult<ParsedManifest> {
        if let Some((number, text)) = self.example.take() {
            self.warn(number, &text, WarningKind::UnterminatedExample)?;
        }
        self.close_current();
        tracing::debug!(
            operations = self.operations.len(),
            warnings = self.warnings.len(),
            "parsed manifest"
        );
        Ok(ParsedManifest {
            operations: self.operations,
            warnings: self.warnings,
        })
    }
}

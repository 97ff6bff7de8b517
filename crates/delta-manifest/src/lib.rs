//! Delta Manifest
//!
//! Typed operation model and line-oriented parser for delta manifests.
//!
//! # Core Concepts
//!
//! - [`Operation`]: One requested filesystem mutation, immutable after parsing
//! - [`Action`]: The closed set of mutations a manifest may request
//! - [`ManifestParser`]: Lenient (or strict) parser producing operations and warnings
//! - [`PathResolver`]: Root-relative resolution of manifest paths
//! - [`ContentProcessor`]: Payload transform applied before preview and write
//!
//! # Example
//!
//! ```rust
//! use delta_manifest::{Action, ManifestParser, RootDir};
//!
//! let manifest = "\
//! === DELTA::START ===
//! PATH: src/lib.rs
//! ACTION: APPEND_TO_FILE
//! === DELTA::CONTENT ===
//! pub mod extra;
//! ";
//!
//! let root = RootDir::new("/srv/project");
//! let parsed = ManifestParser::new(&root).parse(manifest).unwrap();
//! assert_eq!(parsed.operations.len(), 1);
//! assert_eq!(parsed.operations[0].action(), Some(Action::AppendToFile));
//! ```

#![warn(unreachable_pub)]
#![warn(missing_docs)]

mod content;
mod error;
mod operation;
mod parser;
mod path;

pub use content::{ContentProcessor, MarkdownFences, Verbatim, EXAMPLE_END, EXAMPLE_START};
pub use error::{ParseError, ParseResult, ParseWarning, WarningKind};
pub use operation::{Action, BodyField, Operation, OperationBuilder, UnknownAction};
pub use parser::{ManifestParser, ParsedManifest, START_MARKER};
pub use path::{PathResolver, RootDir, NO_PATH};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

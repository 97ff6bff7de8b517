//! Content post-processing
//!
//! Payload text goes through the same transform before it is previewed and
//! before it is written, so a preview matches the eventual write byte for byte.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Debug;

/// Marker opening a literal example inside a body section
pub const EXAMPLE_START: &str = "#! DELTA_EXAMPLE::START";

/// Marker closing a literal example inside a body section
pub const EXAMPLE_END: &str = "#! DELTA_EXAMPLE::END";

/// `@@@` or `@@@lang` alone on a line
static FENCE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*@@@(\S*)\s*$").expect("fence pattern is valid"));

/// Pure text transform applied to payloads before diff and before write
pub trait ContentProcessor: Send + Sync + Debug {
    /// Transform raw payload text
    fn process(&self, raw: &str) -> String;
}

/// Default post-processing
///
/// - drops every example marker line, keeping the text between markers
/// - turns an `@@@lang` fence line into a markdown code fence
///
/// The output contains neither marker lines nor fence lines, so running it
/// again changes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownFences;

impl MarkdownFences {
    /// Create processor
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ContentProcessor for MarkdownFences {
    fn process(&self, raw: &str) -> String {
        let mut out = String::with_capacity(raw.len());
        for line in raw.split_inclusive('\n') {
            let (body, ending) = match line.strip_suffix('\n') {
                Some(body) => (body, "\n"),
                None => (line, ""),
            };
            let trimmed = body.trim();
            if trimmed == EXAMPLE_START || trimmed == EXAMPLE_END {
                continue;
            }
            match FENCE_LINE.captures(body) {
                Some(caps) => {
                    out.push_str("```");
                    out.push_str(caps.get(1).map_or("", |m| m.as_str()));
                    out.push_str(ending);
                }
                None => out.push_str(line),
            }
        }
        out
    }
}

/// Processor that passes payloads through untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct Verbatim;

impl ContentProcessor for Verbatim {
    fn process(&self, raw: &str) -> String {
        raw.to_string()
    }
}

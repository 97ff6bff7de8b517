//! Diff previews
//!
//! Computes the before/after effect of an operation as unified-diff lines
//! tagged with a semantic kind. Nothing here touches the filesystem beyond
//! reading current state; colors belong to a [`crate::Presenter`].

use crate::effect::{file_after, simulate};
use crate::error::{EngineError, EngineResult};
use crate::overlay::Overlay;
use delta_manifest::{Action, ContentProcessor, Operation, PathResolver};
use serde::Serialize;
use similar::TextDiff;
use std::io;
use std::path::Path;

/// Role of one diff line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffLineKind {
    /// `---` / `+++` file header
    Header,
    /// `@@` hunk range
    Hunk,
    /// Line present only after
    Added,
    /// Line present only before
    Removed,
    /// Unchanged line
    Context,
    /// Annotation such as a missing final newline or a directory change
    Note,
}

/// One line of a preview
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffLine {
    /// Line text without its newline
    pub text: String,
    /// Semantic kind
    pub kind: DiffLineKind,
}

impl DiffLine {
    /// Create line
    #[must_use]
    pub fn new(text: impl Into<String>, kind: DiffLineKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }
}

/// Preview of one operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Preview {
    /// 1-based operation index
    pub index: usize,
    /// Previewed action
    pub action: Option<Action>,
    /// Root-relative display path
    pub path: String,
    /// Diff lines, empty when there is nothing to show
    pub lines: Vec<DiffLine>,
}

impl Preview {
    /// Check if the preview shows no change
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines of one kind
    pub fn lines_of(&self, kind: DiffLineKind) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .filter(move |line| line.kind == kind)
            .map(|line| line.text.as_str())
    }
}

/// Diff generator
#[derive(Debug, Clone, Copy)]
pub struct DiffGenerator<'a> {
    resolver: &'a dyn PathResolver,
    processor: &'a dyn ContentProcessor,
    context_lines: usize,
}

impl<'a> DiffGenerator<'a> {
    /// Create generator with three context lines
    #[inline]
    #[must_use]
    pub fn new(resolver: &'a dyn PathResolver, processor: &'a dyn ContentProcessor) -> Self {
        Self {
            resolver,
            processor,
            context_lines: 3,
        }
    }

    /// Unchanged lines shown around each hunk
    #[inline]
    #[must_use]
    pub fn context_lines(mut self, lines: usize) -> Self {
        self.context_lines = lines;
        self
    }

    /// Preview one operation against current disk state
    ///
    /// # Errors
    /// Returns [`EngineError::Io`] if current state cannot be read.
    pub fn preview(&self, op: &Operation) -> EngineResult<Preview> {
        self.preview_in(op, &Overlay::new())
    }

    /// Preview a batch, each operation seeing the effect of earlier ones
    ///
    /// # Errors
    /// Returns [`EngineError::Io`] if current state cannot be read.
    pub fn preview_batch(&self, ops: &[Operation]) -> EngineResult<Vec<Preview>> {
        let mut overlay = Overlay::new();
        let mut previews = Vec::with_capacity(ops.len());
        for op in ops {
            previews.push(self.preview_in(op, &overlay)?);
            simulate(op, &mut overlay, self.processor).map_err(|err| io_error(op, err))?;
        }
        Ok(previews)
    }

    /// Preview one operation against `overlay`
    ///
    /// # Errors
    /// Returns [`EngineError::Io`] if current state cannot be read.
    pub fn preview_in(&self, op: &Operation, overlay: &Overlay) -> EngineResult<Preview> {
        let lines = self.diff(op, overlay).map_err(|err| io_error(op, err))?;
        Ok(Preview {
            index: op.index(),
            action: op.action(),
            path: self.resolver.display_opt(op.primary_path()),
            lines,
        })
    }

    /// Diff lines for one operation against `overlay`
    ///
    /// # Errors
    /// Returns the underlying error when disk state cannot be read.
    pub fn diff(&self, op: &Operation, overlay: &Overlay) -> io::Result<Vec<DiffLine>> {
        let Some(action) = op.action() else {
            return Ok(Vec::new());
        };
        match action {
            Action::CreateDirectory => {
                let rel = self.resolver.display_opt(op.path());
                Ok(vec![
                    DiffLine::new("--- /dev/null", DiffLineKind::Header),
                    DiffLine::new(format!("+++ b/{rel}"), DiffLineKind::Header),
                    DiffLine::new(format!("[Create Directory] {rel}"), DiffLineKind::Note),
                ])
            }
            Action::DeleteDirectory => {
                let rel = self.resolver.display_opt(op.path());
                Ok(vec![
                    DiffLine::new(format!("--- a/{rel}"), DiffLineKind::Header),
                    DiffLine::new("+++ /dev/null", DiffLineKind::Header),
                    DiffLine::new(format!("[Delete Directory] {rel}"), DiffLineKind::Note),
                ])
            }
            Action::MoveFile => Ok(vec![
                DiffLine::new(
                    format!("--- a/{}", self.resolver.display_opt(op.source_path())),
                    DiffLineKind::Header,
                ),
                DiffLine::new(
                    format!("+++ b/{}", self.resolver.display_opt(op.destination_path())),
                    DiffLineKind::Header,
                ),
            ]),
            _ => match op.path() {
                Some(path) => self.text_diff(op, action, path, overlay),
                None => Ok(Vec::new()),
            },
        }
    }

    fn text_diff(
        &self,
        op: &Operation,
        action: Action,
        path: &Path,
        overlay: &Overlay,
    ) -> io::Result<Vec<DiffLine>> {
        let state = overlay.state(path)?;
        let current = match action {
            Action::CreateFile => None,
            _ => state.file_content(),
        };
        let before = current.unwrap_or_default();
        let mut after =
            file_after(op, current, self.processor).unwrap_or_else(|| before.to_string());
        if !after.is_empty() && !after.ends_with('\n') {
            after.push('\n');
        }
        if before.is_empty() && after.is_empty() {
            return Ok(Vec::new());
        }

        let rel = self.resolver.display(path);
        let rendered = TextDiff::from_lines(before, after.as_str())
            .unified_diff()
            .context_radius(self.context_lines)
            .header(&format!("a/{rel}"), &format!("b/{rel}"))
            .to_string();
        Ok(classify(&rendered))
    }
}

fn io_error(op: &Operation, err: io::Error) -> EngineError {
    EngineError::io(
        op.primary_path().map(Path::to_path_buf).unwrap_or_default(),
        err,
    )
}

/// Tag rendered unified-diff text line by line
fn classify(rendered: &str) -> Vec<DiffLine> {
    rendered
        .lines()
        .enumerate()
        .map(|(i, line)| {
            let kind = if i < 2 && (line.starts_with("--- ") || line.starts_with("+++ ")) {
                DiffLineKind::Header
            } else if line.starts_with("@@") {
                DiffLineKind::Hunk
            } else if line.starts_with('+') {
                DiffLineKind::Added
            } else if line.starts_with('-') {
                DiffLineKind::Removed
            } else if line.starts_with('\\') {
                DiffLineKind::Note
            } else {
                DiffLineKind::Context
            };
            DiffLine::new(line, kind)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use delta_manifest::{MarkdownFences, RootDir};
    use pretty_assertions::assert_eq;
    use std::fs;

    fn setup() -> (tempfile::TempDir, RootDir) {
        let dir = tempfile::tempdir().unwrap();
        let root = RootDir::new(dir.path());
        (dir, root)
    }

    fn kinds(preview: &Preview) -> Vec<DiffLineKind> {
        preview.lines.iter().map(|l| l.kind).collect()
    }

    #[test]
    fn create_file_diff_is_all_additions() {
        let (_dir, root) = setup();
        let op = Operation::builder(1)
            .action(Action::CreateFile)
            .path(root.resolve("notes/a.md"))
            .content("@@@sh\nls\n@@@")
            .build();
        let preview = DiffGenerator::new(&root, &MarkdownFences).preview(&op).unwrap();

        assert_eq!(preview.path, "notes/a.md");
        assert_eq!(preview.lines[0].text, "--- a/notes/a.md");
        assert_eq!(preview.lines[1].text, "+++ b/notes/a.md");
        assert_eq!(
            preview.lines_of(DiffLineKind::Added).collect::<Vec<_>>(),
            vec!["+```sh", "+ls", "+```"]
        );
        assert_eq!(preview.lines_of(DiffLineKind::Removed).count(), 0);
    }

    #[test]
    fn replace_block_shows_removed_and_added() {
        let (dir, root) = setup();
        fs::write(dir.path().join("f.txt"), "one\ntwo\nthree\n").unwrap();
        let op = Operation::builder(1)
            .action(Action::ReplaceBlock)
            .path(root.resolve("f.txt"))
            .target_block("two\n")
            .replacement_content("TWO\n")
            .build();
        let preview = DiffGenerator::new(&root, &MarkdownFences).preview(&op).unwrap();

        assert_eq!(
            kinds(&preview),
            vec![
                DiffLineKind::Header,
                DiffLineKind::Header,
                DiffLineKind::Hunk,
                DiffLineKind::Context,
                DiffLineKind::Removed,
                DiffLineKind::Added,
                DiffLineKind::Context,
            ]
        );
    }

    #[test]
    fn context_radius_limits_unchanged_lines() {
        let (dir, root) = setup();
        let body: String = (1..=20).map(|i| format!("line {i}\n")).collect();
        fs::write(dir.path().join("f.txt"), &body).unwrap();
        let op = Operation::builder(1)
            .action(Action::AppendToFile)
            .path(root.resolve("f.txt"))
            .content("tail\n")
            .build();
        let preview = DiffGenerator::new(&root, &MarkdownFences)
            .context_lines(1)
            .preview(&op)
            .unwrap();
        assert_eq!(preview.lines_of(DiffLineKind::Context).collect::<Vec<_>>(), vec![" line 20"]);
    }

    #[test]
    fn missing_trailing_newline_is_added_to_after() {
        let (dir, root) = setup();
        fs::write(dir.path().join("f.txt"), "same\n").unwrap();
        let op = Operation::builder(1)
            .action(Action::ReplaceFile)
            .path(root.resolve("f.txt"))
            .content("same")
            .build();
        let preview = DiffGenerator::new(&root, &MarkdownFences).preview(&op).unwrap();
        assert!(preview.is_empty());
    }

    #[test]
    fn empty_both_sides_yields_nothing() {
        let (_dir, root) = setup();
        let op = Operation::builder(1)
            .action(Action::CreateFile)
            .path(root.resolve("empty.txt"))
            .build();
        let preview = DiffGenerator::new(&root, &MarkdownFences).preview(&op).unwrap();
        assert!(preview.is_empty());
    }

    #[test]
    fn delete_file_removes_every_line() {
        let (dir, root) = setup();
        fs::write(dir.path().join("f.txt"), "a\nb\n").unwrap();
        let op = Operation::builder(1)
            .action(Action::DeleteFile)
            .path(root.resolve("f.txt"))
            .build();
        let preview = DiffGenerator::new(&root, &MarkdownFences).preview(&op).unwrap();
        assert_eq!(
            preview.lines_of(DiffLineKind::Removed).collect::<Vec<_>>(),
            vec!["-a", "-b"]
        );
    }

    #[test]
    fn directory_and_move_diffs_are_synthetic() {
        let (_dir, root) = setup();
        let generator = DiffGenerator::new(&root, &MarkdownFences);

        let create = Operation::builder(1)
            .action(Action::CreateDirectory)
            .path(root.resolve("out"))
            .build();
        let texts: Vec<_> = generator
            .preview(&create)
            .unwrap()
            .lines
            .into_iter()
            .map(|l| l.text)
            .collect();
        assert_eq!(texts, vec!["--- /dev/null", "+++ b/out", "[Create Directory] out"]);

        let delete = Operation::builder(2)
            .action(Action::DeleteDirectory)
            .path(root.resolve("out"))
            .build();
        assert_eq!(generator.preview(&delete).unwrap().lines[2].text, "[Delete Directory] out");

        let mv = Operation::builder(3)
            .action(Action::MoveFile)
            .source_path(root.resolve("a.txt"))
            .destination_path(root.resolve("b/a.txt"))
            .build();
        let preview = generator.preview(&mv).unwrap();
        assert_eq!(preview.path, "a.txt");
        assert_eq!(kinds(&preview), vec![DiffLineKind::Header, DiffLineKind::Header]);
        assert_eq!(preview.lines[1].text, "+++ b/b/a.txt");
    }

    #[test]
    fn batch_preview_sees_earlier_operations() {
        let (_dir, root) = setup();
        let path = root.resolve("notes/a.md");
        let ops = vec![
            Operation::builder(1)
                .action(Action::CreateFile)
                .path(&path)
                .content("hello\n")
                .build(),
            Operation::builder(2)
                .action(Action::AppendToFile)
                .path(&path)
                .content("world\n")
                .build(),
        ];
        let previews = DiffGenerator::new(&root, &MarkdownFences)
            .preview_batch(&ops)
            .unwrap();

        let second = &previews[1];
        assert_eq!(second.lines_of(DiffLineKind::Context).collect::<Vec<_>>(), vec![" hello"]);
        assert_eq!(second.lines_of(DiffLineKind::Added).collect::<Vec<_>>(), vec!["+world"]);
    }

    #[test]
    fn previews_serialize() {
        let line = DiffLine::new("+x", DiffLineKind::Added);
        let json = serde_json::to_value(&line).unwrap();
        assert_eq!(json["kind"], "added");
    }
}

//! Functional tests for whole-batch guarantees.
//!
//! Core guarantees exercised here:
//! - Create-then-edit works inside one manifest because validation and
//!   preview thread simulated state through the batch.
//! - A batch with any validation error touches nothing.
//! - Ambiguous block targets edit the first occurrence, unless strict mode
//!   rejects them.
//! - Transactions are all-or-nothing.
//! - Previews show exactly the edit the applier performs.

use delta_engine::{
    ApplyReport, AutoApprove, DiffGenerator, DiffLineKind, EngineError, InteractiveReview,
    PlainPresenter, RunOutcome, Transaction, Validator,
};
use delta_manifest::{Action, MarkdownFences, Operation, PathResolver};
use delta_test_utils::{ManifestBuilder, TestRoot};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::io::Cursor;

/// Tenet: a file created earlier in the batch can be edited later in it.
#[test]
fn create_then_append_yields_joined_content() {
    let root = TestRoot::new();
    let path = root.join("notes/a.md");
    let ops = vec![
        Operation::builder(1)
            .action(Action::CreateFile)
            .path(&path)
            .content("hello")
            .build(),
        Operation::builder(2)
            .action(Action::AppendToFile)
            .path(&path)
            .content(" world")
            .build(),
    ];

    let engine = root.engine();
    assert!(engine.validate(&ops).is_ok());
    let report = engine.apply(&ops).unwrap();

    assert!(report.outcomes().iter().all(|o| o.is_success()));
    assert_eq!(root.read("notes/a.md"), "hello world");
}

/// Tenet: a missing block target is reported once and nothing is modified.
#[test]
fn missing_target_aborts_without_changes() {
    let root = TestRoot::new();
    root.write("src/lib.rs", "pub fn a() {}\n");
    let before = root.snapshot();
    let manifest = ManifestBuilder::new()
        .append("src/lib.rs", "pub fn b() {}")
        .block("REPLACE_BLOCK", "src/lib.rs", "pub fn zzz() {}", "pub fn c() {}")
        .build();

    let report = root.engine().run(&manifest, &mut AutoApprove).unwrap();

    let RunOutcome::Aborted { validation } = report.outcome else {
        panic!("expected abort, got {:?}", report.outcome);
    };
    assert_eq!(validation.errors.len(), 1);
    assert_eq!(validation.errors[0].index, 2);
    assert_eq!(validation.errors[0].path, "src/lib.rs");
    assert!(validation.errors[0].message.contains("not found"));
    assert_eq!(root.snapshot(), before);
}

/// Tenet: ambiguity is a warning by default and an error in strict mode.
#[test]
fn ambiguous_target_depends_on_strictness() {
    let root = TestRoot::new();
    root.write("f.txt", "x\nmid\nx\n");
    let manifest = ManifestBuilder::new()
        .block("REPLACE_BLOCK", "f.txt", "x", "y")
        .build();

    let strict = root.engine_with(root.config().with_strict(true).with_auto_approve(true));
    let report = strict.run(&manifest, &mut AutoApprove).unwrap();
    let RunOutcome::Aborted { validation } = report.outcome else {
        panic!("strict run should abort");
    };
    assert!(validation.errors[0].message.starts_with("Ambiguous TARGET_BLOCK"));
    assert_eq!(root.read("f.txt"), "x\nmid\nx\n");

    let report = root.engine().run(&manifest, &mut AutoApprove).unwrap();
    let RunOutcome::Reported { summary, warnings, .. } = report.outcome else {
        panic!("lenient run should apply");
    };
    assert_eq!(summary.applied, 1);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].index, 1);
    assert_eq!(warnings[0].path, "f.txt");
    assert!(warnings[0].message.contains("found 2 times"));
    assert_eq!(root.read("f.txt"), "y\nmid\nx\n");
}

/// Tenet: if one staged operation fails, no operation's effect is visible.
#[test]
fn transaction_is_all_or_nothing() {
    let root = TestRoot::new();
    root.write("keep.txt", "keep\n")
        .write("edit.txt", "alpha\n")
        .write("doomed.txt", "bye\n")
        .mkdir("old");
    let before = root.snapshot();

    let ops = vec![
        Operation::builder(1)
            .action(Action::AppendToFile)
            .path(root.join("edit.txt"))
            .content("beta\n")
            .build(),
        Operation::builder(2)
            .action(Action::CreateFile)
            .path(root.join("new/file.txt"))
            .content("new\n")
            .build(),
        Operation::builder(3)
            .action(Action::ReplaceBlock)
            .path(root.join("edit.txt"))
            .target_block("not present")
            .replacement_content("x")
            .build(),
        Operation::builder(4)
            .action(Action::DeleteFile)
            .path(root.join("doomed.txt"))
            .build(),
        Operation::builder(5)
            .action(Action::DeleteDirectory)
            .path(root.join("old"))
            .build(),
    ];

    let report = Transaction::new(root.resolver(), &MarkdownFences)
        .run(&ops)
        .unwrap();

    assert!(report.rolled_back());
    assert_eq!(report.failures(), 1);
    assert!(!report.outcomes[2].is_success());
    assert_eq!(root.snapshot(), before);
    assert!(root.exists("old"));
    assert!(!root.exists("new"));
}

/// Tenet: a committed transaction matches what direct apply would produce.
#[test]
fn transactional_run_commits_everything() {
    let root = TestRoot::new();
    root.write("a.txt", "one\n").write("gone/inner.txt", "x\n");
    let manifest = ManifestBuilder::new()
        .block("INSERT_AFTER_BLOCK", "a.txt", "one", "two")
        .bare("DELETE_DIRECTORY", "gone")
        .move_file("a.txt", "b/a.txt")
        .create("c.md", "@@@sh\nls\n@@@")
        .build();

    let engine = root.engine_with(
        root.config()
            .with_transactional(true)
            .with_auto_approve(true),
    );
    let report = engine.run(&manifest, &mut AutoApprove).unwrap();

    let RunOutcome::Reported { summary, apply, .. } = report.outcome else {
        panic!("expected report");
    };
    assert_eq!(summary.committed, Some(true));
    assert_eq!(summary.applied, 4);
    assert!(matches!(apply, Some(ApplyReport::Transaction(_))));
    assert_eq!(
        root.snapshot(),
        vec![
            ("b/a.txt".to_string(), "one\ntwo\n".to_string()),
            ("c.md".to_string(), "```sh\nls\n```\n".to_string()),
        ]
    );
}

/// Tenet: the preview of a single-occurrence replace removes exactly the
/// target and adds exactly the replacement, and the applier agrees.
#[test]
fn replace_block_preview_matches_write() {
    let root = TestRoot::new();
    let pre_image = "fn main() {\n    old_call();\n    keep();\n}\n";
    root.write("main.rs", pre_image);
    let op = Operation::builder(1)
        .action(Action::ReplaceBlock)
        .path(root.join("main.rs"))
        .target_block("    old_call();\n")
        .replacement_content("    new_call();\n    extra();\n")
        .build();

    let preview = DiffGenerator::new(root.resolver(), &MarkdownFences)
        .preview(&op)
        .unwrap();
    let removed: String = preview
        .lines_of(DiffLineKind::Removed)
        .map(|l| format!("{}\n", &l[1..]))
        .collect();
    let added: String = preview
        .lines_of(DiffLineKind::Added)
        .map(|l| format!("{}\n", &l[1..]))
        .collect();
    assert_eq!(removed, op.target_block());
    assert_eq!(added, op.replacement_content());

    root.engine().apply(&[op]).unwrap();
    assert_eq!(
        root.read("main.rs"),
        "fn main() {\n    new_call();\n    extra();\n    keep();\n}\n"
    );
}

/// Tenet: operator answers decide what is applied.
#[test]
fn interactive_review_drives_apply() {
    let root = TestRoot::new();
    let manifest = ManifestBuilder::new()
        .create("one.txt", "1")
        .create("two.txt", "2")
        .create("three.txt", "3")
        .build();
    let engine = root.engine_with(root.config());
    let mut review = InteractiveReview::new(
        Cursor::new(b"y\nn\n".to_vec()),
        PlainPresenter::new(Vec::new()),
    );

    let report = engine.run(&manifest, &mut review).unwrap();

    let RunOutcome::Reported { summary, review: decisions, .. } = report.outcome else {
        panic!("expected report");
    };
    assert!(decisions.cancelled());
    assert_eq!(summary.applied, 1);
    assert_eq!(summary.skipped, 2);
    assert!(root.exists("one.txt"));
    assert!(!root.exists("two.txt"));
    assert!(!root.exists("three.txt"));
}

/// Tenet: strict mode rejects the whole manifest on the first stray line.
#[test]
fn strict_parse_failure_is_an_error() {
    let root = TestRoot::new();
    let manifest = ManifestBuilder::new()
        .raw("Sure, here you go:\n")
        .create("a.txt", "a")
        .build();
    let engine = root.engine_with(root.config().with_strict(true));

    let err = engine.run(&manifest, &mut AutoApprove).unwrap_err();
    assert!(matches!(err, EngineError::Parse(_)));
    assert!(err.to_string().contains("line 1"));
    assert!(!root.exists("a.txt"));
}

/// Pool of sibling names used by the create-file property
const NAMES: [&str; 4] = ["a", "b", "c", "d"];

#[derive(Debug, Clone, Copy)]
enum Existing {
    Nothing,
    File,
    Dir,
}

fn existing() -> impl Strategy<Value = Existing> {
    prop_oneof![Just(Existing::Nothing), Just(Existing::File), Just(Existing::Dir)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Tenet: CREATE_FILE validates iff nothing exists at its path, counting
    /// files created earlier in the same batch.
    #[test]
    fn create_file_valid_iff_path_free(
        initial in proptest::collection::vec(existing(), NAMES.len()),
        creates in proptest::collection::vec(0..NAMES.len(), 1..8),
    ) {
        let root = TestRoot::new();
        let mut occupied = Vec::with_capacity(NAMES.len());
        for (name, state) in NAMES.iter().zip(&initial) {
            match state {
                Existing::Nothing => {}
                Existing::File => { root.write(name, "x"); }
                Existing::Dir => { root.mkdir(name); }
            }
            occupied.push(!matches!(state, Existing::Nothing));
        }

        let ops: Vec<Operation> = creates
            .iter()
            .enumerate()
            .map(|(i, &n)| {
                Operation::builder(i + 1)
                    .action(Action::CreateFile)
                    .path(root.resolver().resolve(NAMES[n]))
                    .content("new")
                    .build()
            })
            .collect();

        let mut expected = Vec::new();
        for (i, &n) in creates.iter().enumerate() {
            if occupied[n] {
                expected.push(i + 1);
            } else {
                occupied[n] = true;
            }
        }

        let validation = Validator::new(root.resolver(), &MarkdownFences).validate(&ops);
        let rejected: Vec<usize> = validation.errors.iter().map(|e| e.index).collect();
        prop_assert_eq!(rejected, expected);
    }
}

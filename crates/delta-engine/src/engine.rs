//! Delta engine - main entry point
//!
//! Drives one manifest through
//! `PARSE -> VALIDATE -> (ABORT | PREVIEW | APPROVE -> APPLY -> REPORT)`.

use crate::apply::{ApplyOutcome, Applier};
use crate::config::EngineConfig;
use crate::diff::{DiffGenerator, Preview};
use crate::error::{EngineError, EngineResult};
use crate::review::{Approval, AutoApprove, ReviewOutcome};
use crate::transaction::{Transaction, TransactionReport};
use crate::validation::{Validation, ValidationWarning, Validator};
use delta_manifest::{
    ContentProcessor, ManifestParser, MarkdownFences, Operation, ParseWarning, ParsedManifest,
    PathResolver, RootDir,
};
use serde::Serialize;
use std::fmt::{self, Display, Formatter};

/// Stage of a manifest run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Reading manifest text
    Parse,
    /// Checking the batch
    Validate,
    /// Stopped on validation errors
    Abort,
    /// Showed diffs without applying
    Preview,
    /// Asking which operations to apply
    Approve,
    /// Writing to the filesystem
    Apply,
    /// Summarized what happened
    Report,
}

impl Phase {
    /// Check if a run ends in this phase
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Abort | Self::Preview | Self::Report)
    }
}

/// How approved operations were applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ApplyReport {
    /// Operation by operation against the real tree
    Direct {
        /// Per-operation results
        outcomes: Vec<ApplyOutcome>,
    },
    /// As one staged transaction
    Transaction(TransactionReport),
}

impl ApplyReport {
    /// Per-operation results
    #[must_use]
    pub fn outcomes(&self) -> &[ApplyOutcome] {
        match self {
            Self::Direct { outcomes } | Self::Transaction(TransactionReport { outcomes, .. }) => {
                outcomes
            }
        }
    }

    /// Whether a transaction was committed; `None` for direct apply
    #[must_use]
    pub fn committed(&self) -> Option<bool> {
        match self {
            Self::Direct { .. } => None,
            Self::Transaction(report) => Some(report.committed),
        }
    }
}

/// Counts shown at the end of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Operations whose effect is on the real tree
    pub applied: usize,
    /// Operations that failed
    pub failed: usize,
    /// Operations the operator did not approve
    pub skipped: usize,
    /// Transaction result; `None` for direct apply
    pub committed: Option<bool>,
}

impl RunSummary {
    /// Summarize an apply report plus the skipped count
    #[must_use]
    pub fn new(report: Option<&ApplyReport>, skipped: usize) -> Self {
        let Some(report) = report else {
            return Self {
                skipped,
                ..Self::default()
            };
        };
        let failed = report.outcomes().iter().filter(|o| !o.is_success()).count();
        let succeeded = report.outcomes().len() - failed;
        let committed = report.committed();
        Self {
            applied: if committed == Some(false) { 0 } else { succeeded },
            failed,
            skipped,
            committed,
        }
    }
}

impl Display for RunSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Applied: {}, Failed: {}, Skipped: {}",
            self.applied, self.failed, self.skipped
        )?;
        match self.committed {
            Some(true) => f.write_str(" (transaction committed)"),
            Some(false) => f.write_str(" (transaction rolled back)"),
            None => Ok(()),
        }
    }
}

/// Terminal state of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Validation failed; nothing was applied
    Aborted {
        /// Every validation problem
        validation: Validation,
    },
    /// Preview-only run
    Previewed {
        /// One preview per operation
        previews: Vec<Preview>,
        /// Ambiguity warnings
        warnings: Vec<ValidationWarning>,
    },
    /// Approved operations were applied (possibly none)
    Reported {
        /// Counts
        summary: RunSummary,
        /// Review decisions
        review: ReviewOutcome,
        /// Ambiguity warnings from validation
        warnings: Vec<ValidationWarning>,
        /// Apply results; `None` when nothing was approved
        apply: Option<ApplyReport>,
    },
}

impl RunOutcome {
    /// Terminal phase this outcome belongs to
    #[must_use]
    pub fn phase(&self) -> Phase {
        match self {
            Self::Aborted { .. } => Phase::Abort,
            Self::Previewed { .. } => Phase::Preview,
            Self::Reported { .. } => Phase::Report,
        }
    }
}

/// Everything a run produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Non-fatal parse findings
    pub parse_warnings: Vec<ParseWarning>,
    /// Number of parsed operations
    pub operations: usize,
    /// Terminal state
    pub outcome: RunOutcome,
}

impl RunReport {
    /// Pretty JSON for external callers
    ///
    /// # Errors
    /// Returns the serializer error; this does not happen for these types.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Delta engine
///
/// Owns the configuration and the two collaborators every phase shares: the
/// path resolver and the content processor.
///
/// # Example
///
/// ```rust,no_run
/// use delta_engine::{AutoApprove, DeltaEngine, EngineConfig};
///
/// let engine = DeltaEngine::new(EngineConfig::new().with_root("/srv/project"));
/// let report = engine.run("=== DELTA::START ===\n...", &mut AutoApprove)?;
/// println!("{}", report.to_json_pretty()?);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct DeltaEngine {
    config: EngineConfig,
    resolver: Box<dyn PathResolver>,
    processor: Box<dyn ContentProcessor>,
}

impl DeltaEngine {
    /// Create engine rooted at `config.root` with markdown fence processing
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let resolver = Box::new(RootDir::new(&config.root));
        Self {
            config,
            resolver,
            processor: Box::new(MarkdownFences),
        }
    }

    /// Replace the path resolver
    #[must_use]
    pub fn with_resolver(mut self, resolver: Box<dyn PathResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Replace the content processor
    #[must_use]
    pub fn with_processor(mut self, processor: Box<dyn ContentProcessor>) -> Self {
        self.processor = processor;
        self
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Active path resolver
    #[inline]
    #[must_use]
    pub fn resolver(&self) -> &dyn PathResolver {
        self.resolver.as_ref()
    }

    /// Parse manifest text
    ///
    /// # Errors
    /// Returns [`EngineError::Parse`] in strict mode when any line would
    /// have produced a warning.
    pub fn parse(&self, text: &str) -> EngineResult<ParsedManifest> {
        Ok(ManifestParser::new(self.resolver())
            .strict(self.config.strict)
            .parse(text)?)
    }

    /// Validate a batch
    #[must_use]
    pub fn validate(&self, ops: &[Operation]) -> Validation {
        Validator::new(self.resolver(), self.processor.as_ref())
            .strict(self.config.strict)
            .validate(ops)
    }

    /// Validate, then preview every operation without touching the filesystem
    ///
    /// # Errors
    /// Returns [`EngineError::Rejected`] if validation fails, or
    /// [`EngineError::Io`] if current state cannot be read.
    pub fn preview(&self, ops: &[Operation]) -> EngineResult<Vec<Preview>> {
        self.checked(ops)?;
        self.preview_unchecked(ops)
    }

    /// Validate, then apply the batch directly or as one transaction
    ///
    /// # Errors
    /// Returns [`EngineError::Rejected`] if validation fails, or
    /// [`EngineError::Transaction`] if a transaction cannot be staged or
    /// committed.
    pub fn apply(&self, ops: &[Operation]) -> EngineResult<ApplyReport> {
        self.checked(ops)?;
        self.apply_unchecked(ops)
    }

    /// Run one manifest end to end
    ///
    /// `approval` decides which operations are applied unless the
    /// configuration auto-approves.
    ///
    /// # Errors
    /// Returns [`EngineError`] for a strict-mode parse failure, unreadable
    /// state, failed operator interaction, or a transaction that cannot be
    /// staged or committed. Validation failures are not errors: they end
    /// the run in [`RunOutcome::Aborted`].
    pub fn run(&self, text: &str, approval: &mut dyn Approval) -> EngineResult<RunReport> {
        tracing::info!(
            phase = ?Phase::Parse,
            root = %self.resolver.root().display(),
            "starting run"
        );
        let ParsedManifest {
            operations,
            warnings: parse_warnings,
        } = self.parse(text)?;
        let report = |outcome: RunOutcome| {
            tracing::info!(phase = ?outcome.phase(), "run finished");
            RunReport {
                parse_warnings: parse_warnings.clone(),
                operations: operations.len(),
                outcome,
            }
        };

        if operations.is_empty() {
            tracing::info!("manifest holds no operations");
            return Ok(report(RunOutcome::Reported {
                summary: RunSummary::default(),
                review: ReviewOutcome::default(),
                warnings: Vec::new(),
                apply: None,
            }));
        }

        tracing::info!(phase = ?Phase::Validate, operations = operations.len());
        let validation = self.validate(&operations);
        if !validation.is_ok() {
            tracing::error!(errors = validation.errors.len(), "validation failed; aborting");
            return Ok(report(RunOutcome::Aborted { validation }));
        }

        let previews = self.preview_unchecked(&operations)?;
        if self.config.preview_only {
            return Ok(report(RunOutcome::Previewed {
                previews,
                warnings: validation.warnings,
            }));
        }

        tracing::info!(phase = ?Phase::Approve);
        let review = if self.config.auto_approve {
            AutoApprove.review(&previews)?
        } else {
            approval.review(&previews)?
        };
        let approved = review.select(&operations);

        let apply = if approved.is_empty() {
            tracing::info!("no operations approved");
            None
        } else {
            tracing::info!(phase = ?Phase::Apply, approved = approved.len());
            Some(self.apply_unchecked(&approved)?)
        };
        let summary = RunSummary::new(apply.as_ref(), review.skipped);
        tracing::info!(phase = ?Phase::Report, %summary);
        Ok(report(RunOutcome::Reported {
            summary,
            review,
            warnings: validation.warnings,
            apply,
        }))
    }

    fn checked(&self, ops: &[Operation]) -> EngineResult<()> {
        let validation = self.validate(ops);
        if validation.is_ok() {
            Ok(())
        } else {
            Err(EngineError::Rejected(validation))
        }
    }

    fn preview_unchecked(&self, ops: &[Operation]) -> EngineResult<Vec<Preview>> {
        DiffGenerator::new(self.resolver(), self.processor.as_ref())
            .context_lines(self.config.context_lines)
            .preview_batch(ops)
    }

    fn apply_unchecked(&self, ops: &[Operation]) -> EngineResult<ApplyReport> {
        if self.config.transactional {
            let report = Transaction::new(self.resolver(), self.processor.as_ref())
                .staging_parent(self.config.staging_dir.as_deref())
                .run(ops)?;
            Ok(ApplyReport::Transaction(report))
        } else {
            let outcomes = Applier::new(self.resolver(), self.processor.as_ref()).apply_all(ops);
            Ok(ApplyReport::Direct { outcomes })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::ReviewStop;
    use pretty_assertions::assert_eq;
    use std::fs;

    struct Scripted(Vec<usize>);

    impl Approval for Scripted {
        fn review(&mut self, previews: &[Preview]) -> EngineResult<ReviewOutcome> {
            let approved: Vec<usize> = previews
                .iter()
                .map(|p| p.index)
                .filter(|i| self.0.contains(i))
                .collect();
            Ok(ReviewOutcome {
                skipped: previews.len() - approved.len(),
                approved,
                stopped: Some(ReviewStop::Quit),
            })
        }
    }

    fn engine(dir: &tempfile::TempDir) -> DeltaEngine {
        DeltaEngine::new(EngineConfig::new().with_root(dir.path()))
    }

    const TWO_FILES: &str = "\
=== DELTA::START ===
PATH: one.txt
ACTION: CREATE_FILE
=== DELTA::CONTENT ===
1
=== DELTA::START ===
PATH: two.txt
ACTION: CREATE_FILE
=== DELTA::CONTENT ===
2
";

    #[test]
    fn phases_know_when_a_run_ends() {
        let terminal: Vec<Phase> = [
            Phase::Parse,
            Phase::Validate,
            Phase::Abort,
            Phase::Preview,
            Phase::Approve,
            Phase::Apply,
            Phase::Report,
        ]
        .into_iter()
        .filter(|p| p.is_terminal())
        .collect();
        assert_eq!(terminal, vec![Phase::Abort, Phase::Preview, Phase::Report]);
    }

    #[test]
    fn empty_manifest_reports_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let report = engine(&dir).run("", &mut AutoApprove).unwrap();
        assert_eq!(report.operations, 0);
        assert_eq!(report.outcome.phase(), Phase::Report);
    }

    #[test]
    fn only_approved_operations_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        let report = engine(&dir).run(TWO_FILES, &mut Scripted(vec![2])).unwrap();

        let RunOutcome::Reported { summary, .. } = report.outcome else {
            panic!("expected report, got {:?}", report.outcome);
        };
        assert_eq!(summary.applied, 1);
        assert_eq!(summary.skipped, 1);
        assert!(!dir.path().join("one.txt").exists());
        assert_eq!(fs::read_to_string(dir.path().join("two.txt")).unwrap(), "2\n");
    }

    #[test]
    fn auto_approve_config_overrides_approval() {
        let dir = tempfile::tempdir().unwrap();
        let engine = DeltaEngine::new(
            EngineConfig::new()
                .with_root(dir.path())
                .with_auto_approve(true),
        );
        engine.run(TWO_FILES, &mut Scripted(vec![])).unwrap();
        assert!(dir.path().join("one.txt").exists());
        assert!(dir.path().join("two.txt").exists());
    }

    #[test]
    fn preview_only_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let engine = DeltaEngine::new(
            EngineConfig::new()
                .with_root(dir.path())
                .with_preview_only(true),
        );
        let report = engine.run(TWO_FILES, &mut AutoApprove).unwrap();
        let RunOutcome::Previewed { previews, .. } = &report.outcome else {
            panic!("expected preview, got {:?}", report.outcome);
        };
        assert_eq!(previews.len(), 2);
        assert!(!dir.path().join("one.txt").exists());
    }

    #[test]
    fn apply_refuses_invalid_batch() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);
        let ops = engine
            .parse("=== DELTA::START ===\nPATH: x\nACTION: DELETE_FILE\n")
            .unwrap()
            .operations;
        let err = engine.apply(&ops).unwrap_err();
        assert!(matches!(err, EngineError::Rejected(_)));
        assert_eq!(err.to_string(), "validation failed with 1 error(s)");
        assert!(matches!(engine.preview(&ops), Err(EngineError::Rejected(_))));
    }

    #[test]
    fn summary_display() {
        let summary = RunSummary {
            applied: 0,
            failed: 1,
            skipped: 2,
            committed: Some(false),
        };
        assert_eq!(
            summary.to_string(),
            "Applied: 0, Failed: 1, Skipped: 2 (transaction rolled back)"
        );
    }

    #[test]
    fn report_serializes_outcome_tag() {
        let dir = tempfile::tempdir().unwrap();
        let report = engine(&dir)
            .run("=== DELTA::START ===\nPATH: x\nACTION: DELETE_FILE\n", &mut AutoApprove)
            .unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&report.to_json_pretty().unwrap()).unwrap();
        assert_eq!(json["outcome"]["outcome"], "aborted");
        assert_eq!(json["outcome"]["validation"]["errors"][0]["message"], "File not found.");
    }
}

//! Operator review
//!
//! Decides which validated operations get applied. [`AutoApprove`] takes
//! everything; [`InteractiveReview`] shows each preview through a
//! [`Presenter`] and reads one answer per operation.

use crate::diff::{DiffLineKind, Preview};
use crate::error::{EngineError, EngineResult};
use delta_manifest::Operation;
use serde::Serialize;
use std::io::{self, BufRead, Write};

/// Answer to one review prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Apply this operation
    Approve,
    /// Leave this operation out
    Skip,
    /// Apply this and every remaining operation
    ApproveAll,
    /// Stop reviewing; nothing further is approved
    Quit,
}

impl Decision {
    /// Interpret one line of operator input
    ///
    /// Anything unrecognized skips.
    #[must_use]
    pub fn parse(answer: &str) -> Self {
        match answer.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => Self::Approve,
            "a" | "all" => Self::ApproveAll,
            "q" | "quit" => Self::Quit,
            _ => Self::Skip,
        }
    }
}

/// Why a review ended before the last operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStop {
    /// Operator answered quit
    Quit,
    /// Input ended mid-review
    Cancelled,
}

/// Result of reviewing a batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReviewOutcome {
    /// Indexes of approved operations, in manifest order
    pub approved: Vec<usize>,
    /// Operations not approved
    pub skipped: usize,
    /// Set when the review stopped early
    pub stopped: Option<ReviewStop>,
}

impl ReviewOutcome {
    /// Approved subset of `ops`, in manifest order
    #[must_use]
    pub fn select(&self, ops: &[Operation]) -> Vec<Operation> {
        ops.iter()
            .filter(|op| self.approved.contains(&op.index()))
            .cloned()
            .collect()
    }

    /// Check if input ended mid-review
    #[inline]
    #[must_use]
    pub fn cancelled(&self) -> bool {
        self.stopped == Some(ReviewStop::Cancelled)
    }
}

/// Approval policy for a previewed batch
pub trait Approval {
    /// Decide which previews to approve
    ///
    /// # Errors
    /// Returns [`EngineError::Review`] when operator interaction fails.
    fn review(&mut self, previews: &[Preview]) -> EngineResult<ReviewOutcome>;
}

/// Approves every operation without asking
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

impl Approval for AutoApprove {
    fn review(&mut self, previews: &[Preview]) -> EngineResult<ReviewOutcome> {
        tracing::debug!(operations = previews.len(), "auto-approving batch");
        Ok(ReviewOutcome {
            approved: previews.iter().map(|p| p.index).collect(),
            ..ReviewOutcome::default()
        })
    }
}

/// Formats review output
pub trait Presenter {
    /// Show one operation's header and diff
    ///
    /// # Errors
    /// Returns the underlying write error.
    fn present(&mut self, position: usize, total: usize, preview: &Preview) -> io::Result<()>;

    /// Ask for a decision
    ///
    /// # Errors
    /// Returns the underlying write error.
    fn prompt(&mut self) -> io::Result<()>;

    /// Show a one-line status message
    ///
    /// # Errors
    /// Returns the underlying write error.
    fn notice(&mut self, message: &str) -> io::Result<()>;
}

/// Uncolored presenter writing to any stream
#[derive(Debug)]
pub struct PlainPresenter<W> {
    out: W,
}

impl<W: Write> PlainPresenter<W> {
    /// Create presenter writing to `out`
    #[must_use]
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Recover the output stream
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Presenter for PlainPresenter<W> {
    fn present(&mut self, position: usize, total: usize, preview: &Preview) -> io::Result<()> {
        let action = preview.action.map_or("N/A", |a| a.as_str());
        writeln!(self.out, "Reviewing Delta {position} of {total}")?;
        writeln!(self.out, "Action: {action}")?;
        writeln!(self.out, "Path:   {}", preview.path)?;
        writeln!(self.out, "Diff:")?;
        if preview.is_empty() {
            writeln!(self.out, "| (no changes)")?;
        }
        for line in &preview.lines {
            let marker = match line.kind {
                DiffLineKind::Note => "~",
                _ => "|",
            };
            writeln!(self.out, "{marker} {}", line.text)?;
        }
        self.out.flush()
    }

    fn prompt(&mut self) -> io::Result<()> {
        write!(self.out, "Apply this change? [y/n/a/q] ")?;
        self.out.flush()
    }

    fn notice(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.out, "{message}")
    }
}

/// Asks the operator about each operation in turn
#[derive(Debug)]
pub struct InteractiveReview<R, P> {
    input: R,
    presenter: P,
}

impl<R: BufRead, P: Presenter> InteractiveReview<R, P> {
    /// Create review reading answers from `input`
    #[must_use]
    pub fn new(input: R, presenter: P) -> Self {
        Self { input, presenter }
    }

    /// Recover the presenter
    pub fn into_presenter(self) -> P {
        self.presenter
    }

    fn ask(&mut self) -> io::Result<Option<Decision>> {
        self.presenter.prompt()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(Decision::parse(&line)))
    }

    fn run(&mut self, previews: &[Preview]) -> io::Result<ReviewOutcome> {
        let total = previews.len();
        let mut outcome = ReviewOutcome::default();
        let mut approve_rest = false;

        for (i, preview) in previews.iter().enumerate() {
            self.presenter.present(i + 1, total, preview)?;
            if approve_rest {
                self.presenter.notice("Applying automatically...")?;
                outcome.approved.push(preview.index);
                continue;
            }
            let decision = match self.ask()? {
                Some(decision) => decision,
                None => {
                    self.presenter.notice("No input received; review cancelled.")?;
                    outcome.stopped = Some(ReviewStop::Cancelled);
                    break;
                }
            };
            tracing::debug!(index = preview.index, ?decision, "review decision");
            match decision {
                Decision::Approve => outcome.approved.push(preview.index),
                Decision::ApproveAll => {
                    outcome.approved.push(preview.index);
                    approve_rest = true;
                }
                Decision::Skip => {}
                Decision::Quit => {
                    outcome.stopped = Some(ReviewStop::Quit);
                    break;
                }
            }
        }
        outcome.skipped = total - outcome.approved.len();
        Ok(outcome)
    }
}

impl<R: BufRead, P: Presenter> Approval for InteractiveReview<R, P> {
    fn review(&mut self, previews: &[Preview]) -> EngineResult<ReviewOutcome> {
        let outcome = self.run(previews).map_err(EngineError::Review)?;
        if let Some(stop) = outcome.stopped {
            tracing::warn!(?stop, approved = outcome.approved.len(), "review ended early");
        }
        Ok(outcome)
    }
}

//! Delta Engine
//!
//! Validates, previews and applies the operations of a delta manifest.
//!
//! # Core Concepts
//!
//! - [`Validator`]: Checks a whole batch against disk plus simulated state
//! - [`DiffGenerator`]: Unified-diff previews tagged with semantic line kinds
//! - [`Applier`]: Direct, operation-by-operation application
//! - [`Transaction`]: Staged all-or-nothing application
//! - [`DeltaEngine`]: Runs one manifest through every phase
//!
//! # Example
//!
//! ```rust,no_run
//! use delta_engine::{DeltaEngine, EngineConfig, InteractiveReview, PlainPresenter};
//! use std::io;
//!
//! let config = EngineConfig::from_env()?.with_transactional(true);
//! let engine = DeltaEngine::new(config);
//! let manifest = std::fs::read_to_string("changes.delta")?;
//!
//! let mut review = InteractiveReview::new(io::stdin().lock(), PlainPresenter::new(io::stderr()));
//! let report = engine.run(&manifest, &mut review)?;
//! println!("{}", report.to_json_pretty()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(unreachable_pub)]
#![warn(missing_docs)]

mod apply;
mod config;
mod diff;
mod effect;
mod engine;
mod error;
mod overlay;
mod review;
mod transaction;
mod validation;

pub use apply::{Applier, ApplyOutcome, ApplyStatus};
pub use config::{EngineConfig, ENV_ROOT, ENV_STRICT, ENV_TRANSACTION, ENV_YES};
pub use diff::{DiffGenerator, DiffLine, DiffLineKind, Preview};
pub use effect::{file_after, occurrences, simulate};
pub use engine::{ApplyReport, DeltaEngine, Phase, RunOutcome, RunReport, RunSummary};
pub use error::{ApplyError, ConfigError, EngineError, EngineResult, TransactionError};
pub use overlay::{Overlay, PathState};
pub use review::{
    Approval, AutoApprove, Decision, InteractiveReview, PlainPresenter, Presenter, ReviewOutcome,
    ReviewStop,
};
pub use transaction::{Transaction, TransactionReport, STAGING_PREFIX};
pub use validation::{Validation, ValidationError, ValidationWarning, Validator};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

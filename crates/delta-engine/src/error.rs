//! Error types for the delta engine
//!
//! Provides error handling for:
//! - Apply operations (one operation against the filesystem)
//! - Transactions (staging, copying, committing)
//! - Configuration loading
//!
//! Validation problems are not errors in this sense: they are collected as
//! [`crate::ValidationError`] values and reported as a complete set.

use crate::validation::Validation;
use delta_manifest::{Action, ParseError};
use std::path::PathBuf;

/// Errors while applying one operation
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    /// Filesystem call failed
    #[error("io error at {path}: {source}")]
    Io {
        /// Path the call targeted
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Operation has no recognized action
    #[error("operation has no recognized action")]
    MissingAction,

    /// Action needs a path the operation lacks
    #[error("{action} requires {header}")]
    MissingPath {
        /// Action being applied
        action: Action,
        /// Missing header name
        header: &'static str,
    },

    /// Path lies outside the configured root
    #[error("path outside root: {0}")]
    OutsideRoot(PathBuf),

    /// Target block vanished between validation and apply
    #[error("target block not found in file: {0}")]
    TargetNotFound(PathBuf),
}

impl ApplyError {
    /// Create IO error for path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create missing path error
    #[must_use]
    pub fn missing_path(action: Action, header: &'static str) -> Self {
        Self::MissingPath { action, header }
    }
}

/// Errors while staging or committing a transaction
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    /// Staging directory could not be created
    #[error("failed to create staging directory: {0}")]
    Staging(#[source] std::io::Error),

    /// Copying a file into staging failed
    #[error("failed to stage {path}: {source}")]
    Stage {
        /// File being staged
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Writing staged results onto the real tree failed
    #[error("failed to commit {path}: {source}")]
    Commit {
        /// Path being committed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl TransactionError {
    /// Create staging copy error for path
    pub fn stage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Stage {
            path: path.into(),
            source,
        }
    }

    /// Create commit error for path
    pub fn commit(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Commit {
            path: path.into(),
            source,
        }
    }
}

/// Errors while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        /// Config file path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    /// Environment override holds an unusable value
    #[error("invalid value for {name}: '{value}'")]
    InvalidEnv {
        /// Variable name
        name: &'static str,
        /// Raw value
        value: String,
    },
}

/// Umbrella error for engine entry points
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Manifest rejected in strict mode
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Batch failed validation; nothing was previewed or applied
    #[error("validation failed with {} error(s)", .0.errors.len())]
    Rejected(Validation),

    /// Transaction could not be staged or committed
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Reading state for a preview failed
    #[error("io error at {path}: {source}")]
    Io {
        /// Path being read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Operator interaction failed
    #[error("review stream error: {0}")]
    Review(#[source] std::io::Error),
}

impl EngineError {
    /// Create IO error for path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for engine entry points
pub type EngineResult<T> = Result<T, EngineError>;

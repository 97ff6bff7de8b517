//! Engine configuration
//!
//! Built in code with `with_*` methods, loaded from TOML, or overridden from
//! the environment. All three start from the same defaults.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the root directory
pub const ENV_ROOT: &str = "DELTA_ROOT";
/// Environment variable enabling strict mode
pub const ENV_STRICT: &str = "DELTA_STRICT";
/// Environment variable enabling transactional apply
pub const ENV_TRANSACTION: &str = "DELTA_TRANSACTION";
/// Environment variable enabling auto-approval
pub const ENV_YES: &str = "DELTA_YES";

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Directory every manifest path resolves under
    pub root: PathBuf,
    /// Treat parse warnings and ambiguous block targets as fatal
    pub strict: bool,
    /// Apply the approved batch as one staged transaction
    pub transactional: bool,
    /// Approve every operation without asking
    pub auto_approve: bool,
    /// Stop after previewing
    pub preview_only: bool,
    /// Parent directory for transaction staging (system temp dir when unset)
    pub staging_dir: Option<PathBuf>,
    /// Unchanged lines shown around each diff hunk
    pub context_lines: usize,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With root directory
    #[inline]
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// With strict mode
    #[inline]
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// With transactional apply
    #[inline]
    #[must_use]
    pub fn with_transactional(mut self, transactional: bool) -> Self {
        self.transactional = transactional;
        self
    }

    /// With auto-approval
    #[inline]
    #[must_use]
    pub fn with_auto_approve(mut self, auto_approve: bool) -> Self {
        self.auto_approve = auto_approve;
        self
    }

    /// With preview-only mode
    #[inline]
    #[must_use]
    pub fn with_preview_only(mut self, preview_only: bool) -> Self {
        self.preview_only = preview_only;
        self
    }

    /// With staging parent directory
    #[inline]
    #[must_use]
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    /// With diff context lines
    #[inline]
    #[must_use]
    pub fn with_context_lines(mut self, lines: usize) -> Self {
        self.context_lines = lines;
        self
    }

    /// Parse configuration from TOML text
    ///
    /// Missing keys keep their defaults.
    ///
    /// # Errors
    /// Returns [`ConfigError::Toml`] for malformed text or unknown keys.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load configuration from a TOML file
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Toml`] if it does not parse.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded engine config");
        Ok(config)
    }

    /// Defaults with environment overrides applied
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidEnv`] for a flag that is not a boolean.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// Apply `DELTA_ROOT`, `DELTA_STRICT`, `DELTA_TRANSACTION` and `DELTA_YES`
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidEnv`] for a flag that is not a boolean.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(
        mut self,
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(root) = lookup(ENV_ROOT).filter(|v| !v.trim().is_empty()) {
            self.root = PathBuf::from(root.trim());
        }
        for (name, flag) in [
            (ENV_STRICT, &mut self.strict),
            (ENV_TRANSACTION, &mut self.transactional),
            (ENV_YES, &mut self.auto_approve),
        ] {
            if let Some(value) = lookup(name) {
                *flag = parse_flag(name, &value)?;
            }
        }
        Ok(self)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            strict: false,
            transactional: false,
            auto_approve: false,
            preview_only: false,
            staging_dir: None,
            context_lines: 3,
        }
    }
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            name,
            value: value.to_string(),
        }),
    }
}

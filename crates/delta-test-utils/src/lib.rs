//! Testing utilities for the delta workspace
//!
//! Shared fixtures: temporary roots, manifest builders and test tracing.

#![allow(missing_docs)]

use delta_engine::{DeltaEngine, EngineConfig};
use delta_manifest::{PathResolver, RootDir};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Once;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Route engine logs to the test harness; honours `RUST_LOG`
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Temporary project root that is removed on drop
pub struct TestRoot {
    dir: TempDir,
    resolver: RootDir,
}

impl TestRoot {
    pub fn new() -> Self {
        init_test_tracing();
        let dir = tempfile::tempdir().expect("create temp root");
        let resolver = RootDir::new(dir.path());
        Self { dir, resolver }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn resolver(&self) -> &RootDir {
        &self.resolver
    }

    /// Absolute path of a root-relative location
    pub fn join(&self, rel: &str) -> PathBuf {
        self.resolver.resolve(rel)
    }

    /// Write a file, creating parents
    pub fn write(&self, rel: &str, content: &str) -> &Self {
        let path = self.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(path, content).expect("write fixture file");
        self
    }

    pub fn mkdir(&self, rel: &str) -> &Self {
        fs::create_dir_all(self.join(rel)).expect("create fixture dir");
        self
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.join(rel)).expect("read fixture file")
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.join(rel).exists()
    }

    /// Every file under the root as sorted `(relative path, content)` pairs
    pub fn snapshot(&self) -> Vec<(String, String)> {
        let mut files = Vec::new();
        collect(self.path(), self.path(), &mut files);
        files.sort();
        files
    }

    pub fn config(&self) -> EngineConfig {
        EngineConfig::new().with_root(self.path())
    }

    /// Engine rooted here with auto-approval
    pub fn engine(&self) -> DeltaEngine {
        DeltaEngine::new(self.config().with_auto_approve(true))
    }

    pub fn engine_with(&self, config: EngineConfig) -> DeltaEngine {
        DeltaEngine::new(config.with_root(self.path()))
    }
}

impl Default for TestRoot {
    fn default() -> Self {
        Self::new()
    }
}

fn collect(root: &Path, dir: &Path, out: &mut Vec<(String, String)>) {
    for entry in fs::read_dir(dir).expect("read fixture dir") {
        let path = entry.expect("dir entry").path();
        if path.is_dir() {
            collect(root, &path, out);
        } else {
            let rel = path
                .strip_prefix(root)
                .expect("entry under root")
                .to_string_lossy()
                .replace('\\', "/");
            out.push((rel, fs::read_to_string(&path).unwrap_or_default()));
        }
    }
}

/// Builds manifest text one operation at a time
#[derive(Debug, Default, Clone)]
pub struct ManifestBuilder {
    text: String,
}

impl ManifestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn start(mut self, action: &str, path: &str) -> Self {
        let _ = write!(
            self.text,
            "=== DELTA::START ===\nPATH: {path}\nACTION: {action}\n"
        );
        self
    }

    fn section(mut self, name: &str, body: &str) -> Self {
        let _ = writeln!(self.text, "=== DELTA::{name} ===");
        self.text.push_str(body);
        if !body.is_empty() && !body.ends_with('\n') {
            self.text.push('\n');
        }
        self
    }

    /// Any whole-file action with a content body
    pub fn with_content(self, action: &str, path: &str, content: &str) -> Self {
        self.start(action, path).section("CONTENT", content)
    }

    pub fn create(self, path: &str, content: &str) -> Self {
        self.with_content("CREATE_FILE", path, content)
    }

    pub fn replace(self, path: &str, content: &str) -> Self {
        self.with_content("REPLACE_FILE", path, content)
    }

    pub fn append(self, path: &str, content: &str) -> Self {
        self.with_content("APPEND_TO_FILE", path, content)
    }

    pub fn prepend(self, path: &str, content: &str) -> Self {
        self.with_content("PREPEND_TO_FILE", path, content)
    }

    /// Action with headers only
    pub fn bare(self, action: &str, path: &str) -> Self {
        self.start(action, path)
    }

    /// Block action with target and replacement bodies
    pub fn block(self, action: &str, path: &str, target: &str, replacement: &str) -> Self {
        self.start(action, path)
            .section("TARGET_BLOCK", target)
            .section("REPLACEMENT_CONTENT", replacement)
    }

    pub fn move_file(mut self, source: &str, destination: &str) -> Self {
        let _ = write!(
            self.text,
            "=== DELTA::START ===\nACTION: MOVE_FILE\nSOURCE_PATH: {source}\nDESTINATION_PATH: {destination}\n"
        );
        self
    }

    /// Raw text, for malformed manifests
    pub fn raw(mut self, text: &str) -> Self {
        self.text.push_str(text);
        self
    }

    pub fn build(self) -> String {
        self.text
    }
}

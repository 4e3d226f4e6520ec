//! Optional static-lint extension point.
//!
//! A linter may add issues for a patch but must never fail verification:
//! an unavailable tool means "no findings".

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Lints a unified diff and returns issue strings.
pub trait PatchLinter: Send + Sync + fmt::Debug {
    fn lint(&self, patch: &str) -> Vec<String>;
}

/// Linter that never reports anything. Used by default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLint;

impl PatchLinter for NoLint {
    fn lint(&self, _patch: &str) -> Vec<String> {
        Vec::new()
    }
}

/// External linter named by executable.
///
/// Only checks that the program is reachable on `PATH`; it writes no files and
/// spawns nothing, so it reports no issues either way.
#[derive(Debug, Clone)]
pub struct CommandLinter {
    program: String,
}

impl CommandLinter {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Resolved executable path, if any.
    pub fn locate(&self) -> Option<PathBuf> {
        let program = Path::new(&self.program);
        if program.components().count() > 1 {
            return program.is_file().then(|| program.to_path_buf());
        }
        let paths = env::var_os("PATH")?;
        env::split_paths(&paths)
            .map(|dir| dir.join(program))
            .find(|candidate| candidate.is_file())
    }

    pub fn is_available(&self) -> bool {
        self.locate().is_some()
    }
}

impl PatchLinter for CommandLinter {
    fn lint(&self, patch: &str) -> Vec<String> {
        match self.locate() {
            Some(path) => debug!(
                linter = %self.program,
                path = %path.display(),
                patch_bytes = patch.len(),
                "linter available; no sandboxed run configured"
            ),
            None => debug!(linter = %self.program, "linter not on PATH, skipping"),
        }
        Vec::new()
    }
}

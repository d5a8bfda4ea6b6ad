//! Run configuration.
//!
//! A `Config` is immutable once built. `Config::validated` is the only
//! legal way to obtain one outside of tests, so an out-of-range `Config`
//! cannot exist past construction: the `CAPS_INVALID` check always runs
//! before any `GitDriver` call.

use crate::error::{PipelineError, Result};

/// Default total diff-body byte budget.
pub const DEFAULT_CAP_TOTAL: u64 = 800_000;
/// Default per-file diff-body byte budget.
pub const DEFAULT_CAP_FILE: u64 = 64_000;
/// Default unified-diff context window.
pub const DEFAULT_CONTEXT_LINES: u32 = 3;
/// Default rename-detection similarity threshold, in percent.
pub const DEFAULT_FIND_RENAMES_THRESHOLD: u8 = 90;

/// Immutable run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub repo_url: String,
    pub commit_good: String,
    pub commit_candidate: String,
    pub branch_name: Option<String>,
    pub cap_total: u64,
    pub cap_file: u64,
    pub context_lines: u32,
    pub find_renames_threshold: u8,
    pub keep_workdir: bool,
    pub keep_on_error: bool,
}

impl Config {
    /// Construct an unvalidated builder-style config with the default
    /// value for every field that has one.
    pub fn new(repo_url: impl Into<String>, commit_good: impl Into<String>, commit_candidate: impl Into<String>) -> Self {
        Config {
            repo_url: repo_url.into(),
            commit_good: commit_good.into(),
            commit_candidate: commit_candidate.into(),
            branch_name: None,
            cap_total: DEFAULT_CAP_TOTAL,
            cap_file: DEFAULT_CAP_FILE,
            context_lines: DEFAULT_CONTEXT_LINES,
            find_renames_threshold: DEFAULT_FIND_RENAMES_THRESHOLD,
            keep_workdir: false,
            keep_on_error: false,
        }
    }

    /// Validate the invariants on caps and thresholds, returning
    /// `CAPS_INVALID` on violation. This must run before any Git work is
    /// attempted.
    pub fn validated(self) -> Result<Self> {
        if self.cap_total < self.cap_file {
            return Err(PipelineError::CapsInvalid {
                message: format!(
                    "cap_total ({}) must be >= cap_file ({})",
                    self.cap_total, self.cap_file
                ),
            });
        }
        if self.find_renames_threshold > 100 {
            return Err(PipelineError::CapsInvalid {
                message: format!(
                    "find_renames_threshold ({}) must be in [0,100]",
                    self.find_renames_threshold
                ),
            });
        }
        Ok(self)
    }
}

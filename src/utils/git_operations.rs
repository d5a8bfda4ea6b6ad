//! Git Driver contract and subprocess implementation (spec.md §4.A).
//!
//! `GitDriver` is the seam spec.md §9 asks for in place of `Command` calls
//! scattered through the pipeline. `SubprocessGitDriver` is the only
//! production implementation, built the way the teacher's `GitOperations`
//! shells out to the system `git` binary, generalized to clone into an
//! ephemeral workspace and to drive two arbitrary commits instead of the
//! current checkout.

use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};

use regex::Regex;
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};

/// Minimum supported `git` version (spec.md §1, §4.A).
pub const MIN_GIT_MAJOR: u32 = 2;
pub const MIN_GIT_MINOR: u32 = 30;

/// A raw `git diff --name-status` record, before §4.B normalization.
#[derive(Debug, Clone)]
pub struct RawNameStatusRecord {
    pub status_letter: char,
    /// Similarity percent, present only for rename/copy letters.
    pub score: Option<u8>,
    pub path_a: String,
    pub path_b: Option<String>,
}

/// Metadata for one file at one commit (spec.md §4.A `file_metadata`).
#[derive(Debug, Clone, Default)]
pub struct FileMetadata {
    pub mode: Option<String>,
    pub size: Option<u64>,
    pub is_binary: bool,
    pub is_submodule: bool,
}

/// An ephemeral (or, with `keep_workdir`, retained) clone of a repository.
pub struct Workspace {
    path: PathBuf,
    guard: Option<TempDir>,
}

impl Workspace {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Build a `Workspace` over an already-existing directory, with no
    /// automatic cleanup. Used by tests that need a `Workspace` value but
    /// never touch the filesystem through it.
    pub fn for_test(path: PathBuf) -> Workspace {
        Workspace { path, guard: None }
    }

    /// Disarm automatic cleanup, leaving the directory on disk. Used when
    /// `--keep-workdir` or `--keep-on-error` is in effect (spec.md §5).
    pub fn into_kept(mut self) -> PathBuf {
        self.guard = None;
        self.path
    }
}

/// The capabilities the pipeline requires of a Git backend (spec.md §4.A).
/// Every method is expected to be deterministic for a fixed repository
/// state when invoked under the locked environment this trait's
/// implementations apply internally. `Send + Sync` so the pipeline can
/// share one driver across the hunk-extraction fan-out threads spec.md
/// §5 permits.
pub trait GitDriver: Send + Sync {
    fn detect_version(&self) -> Result<String>;

    fn ensure_workspace(
        &self,
        repo_url: &str,
        commits: &[&str],
        branch_hint: Option<&str>,
    ) -> Result<Workspace>;

    fn name_status(
        &self,
        workspace: &Workspace,
        good: &str,
        cand: &str,
        rename_threshold: u8,
    ) -> Result<Vec<RawNameStatusRecord>>;

    fn file_metadata(&self, workspace: &Workspace, commit: &str, path: &str) -> Result<FileMetadata>;

    fn unified_patch(
        &self,
        workspace: &Workspace,
        good: &str,
        cand: &str,
        path_old: Option<&str>,
        path_new: Option<&str>,
        context: u32,
    ) -> Result<String>;

    fn submodule_shas(&self, workspace: &Workspace, good: &str, cand: &str, path: &str) -> Result<(String, String)>;
}

/// `GitDriver` backed by the system `git` binary via `std::process::Command`.
pub struct SubprocessGitDriver {
    fetch_timeout: Duration,
}

impl SubprocessGitDriver {
    pub fn new() -> Self {
        SubprocessGitDriver {
            fetch_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_fetch_timeout(fetch_timeout: Duration) -> Self {
        SubprocessGitDriver { fetch_timeout }
    }

    /// Build a `git` command with the locked environment spec.md §4.A
    /// requires (`LC_ALL=C`, color disabled, CRLF conversion disabled,
    /// Myers diff algorithm), scoped to this child process only. The
    /// caller's environment is never mutated (spec.md §5, §9).
    fn git(&self, workdir: Option<&Path>) -> Command {
        let mut cmd = Command::new("git");
        cmd.env("LC_ALL", "C")
            .env("GIT_TERMINAL_PROMPT", "0")
            .args(["-c", "color.ui=false"])
            .args(["-c", "core.autocrlf=false"])
            .args(["-c", "core.safecrlf=false"])
            .args(["-c", "diff.algorithm=myers"]);
        if let Some(dir) = workdir {
            cmd.current_dir(dir);
        }
        cmd
    }

    fn run(&self, mut cmd: Command) -> Result<Output> {
        cmd.output().map_err(|e| PipelineError::Internal {
            message: format!("failed to spawn git: {e}"),
        })
    }

    /// Run a network-bound git command, retrying exactly once on timeout
    /// (spec.md §4.A `NETWORK_TIMEOUT`).
    fn run_networked(&self, build: impl Fn() -> Command) -> Result<Output> {
        match self.run_with_deadline(build()) {
            Ok(output) => Ok(output),
            Err(PipelineError::NetworkTimeout) => {
                warn!("git network operation timed out, retrying once");
                self.run_with_deadline(build())
            }
            Err(other) => Err(other),
        }
    }

    fn run_with_deadline(&self, mut cmd: Command) -> Result<Output> {
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|e| PipelineError::Internal {
            message: format!("failed to spawn git: {e}"),
        })?;

        loop {
            if let Some(_status) = child.try_wait().map_err(|e| PipelineError::Internal {
                message: format!("failed to poll git: {e}"),
            })? {
                return child.wait_with_output().map_err(|e| PipelineError::Internal {
                    message: format!("failed to collect git output: {e}"),
                });
            }
            if start.elapsed() > self.fetch_timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(PipelineError::NetworkTimeout);
            }
            std::thread::sleep(Duration::from_millis(25));
        }
    }

    /// Rewrite an HTTPS clone URL to embed `GIT_USERNAME`/`GIT_AUTH_TOKEN`
    /// when present, without ever logging the result (spec.md §6).
    fn authenticated_url(&self, repo_url: &str) -> String {
        let username = std::env::var("GIT_USERNAME").ok();
        let token = std::env::var("GIT_AUTH_TOKEN").ok();
        match (username, token) {
            (Some(user), Some(token)) if repo_url.starts_with("https://") => {
                format!("https://{user}:{token}@{}", &repo_url["https://".len()..])
            }
            (None, Some(token)) if repo_url.starts_with("https://") => {
                format!("https://{token}@{}", &repo_url["https://".len()..])
            }
            _ => repo_url.to_string(),
        }
    }

    fn ensure_commit(&self, dir: &Path, sha: &str) -> Result<()> {
        let present = self
            .git(Some(dir))
            .args(["cat-file", "-e", &format!("{sha}^{{commit}}")])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false);
        if present {
            return Ok(());
        }

        let sha_owned = sha.to_string();
        let dir_owned = dir.to_path_buf();
        let output = self.run_networked(|| {
            let mut cmd = self.git(Some(&dir_owned));
            cmd.args(["fetch", "--quiet", "origin", &sha_owned]);
            cmd
        })?;
        if !output.status.success() {
            return Err(PipelineError::CommitNotFound {
                missing: vec![sha.to_string()],
            });
        }

        let present_after = self
            .git(Some(dir))
            .args(["cat-file", "-e", &format!("{sha}^{{commit}}")])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false);
        if present_after {
            Ok(())
        } else {
            Err(PipelineError::CommitNotFound {
                missing: vec![sha.to_string()],
            })
        }
    }
}

impl Default for SubprocessGitDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl GitDriver for SubprocessGitDriver {
    fn detect_version(&self) -> Result<String> {
        let output = self.run(self.git(None).arg("--version"))?;
        if !output.status.success() {
            return Err(PipelineError::Internal {
                message: "git --version failed".to_string(),
            });
        }
        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let re = Regex::new(r"(\d+)\.(\d+)(?:\.(\d+))?").map_err(|e| PipelineError::Internal {
            message: format!("bad version regex: {e}"),
        })?;
        let caps = re
            .captures(&text)
            .ok_or_else(|| PipelineError::GitVersionUnsupported { detected: text.clone() })?;
        let major: u32 = caps[1].parse().unwrap_or(0);
        let minor: u32 = caps[2].parse().unwrap_or(0);
        if major < MIN_GIT_MAJOR || (major == MIN_GIT_MAJOR && minor < MIN_GIT_MINOR) {
            return Err(PipelineError::GitVersionUnsupported { detected: text });
        }
        debug!(version = %text, "detected supported git version");
        Ok(text)
    }

    fn ensure_workspace(
        &self,
        repo_url: &str,
        commits: &[&str],
        branch_hint: Option<&str>,
    ) -> Result<Workspace> {
        let guard = TempDir::new().map_err(|e| PipelineError::Internal {
            message: format!("failed to create workspace: {e}"),
        })?;
        let path = guard.path().to_path_buf();
        let auth_url = self.authenticated_url(repo_url);

        let auth_url_owned = auth_url.clone();
        let path_owned = path.clone();
        let output = self.run_networked(|| {
            let mut cmd = self.git(None);
            cmd.args(["clone", "--quiet", "--no-checkout", &auth_url_owned]);
            cmd.arg(&path_owned);
            cmd
        })?;
        if !output.status.success() {
            return Err(PipelineError::CloneFailed {
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        if let Some(branch) = branch_hint {
            let branch_owned = branch.to_string();
            let path_owned = path.clone();
            let _ = self.run_networked(|| {
                let mut cmd = self.git(Some(&path_owned));
                cmd.args(["fetch", "--quiet", "origin", &branch_owned]);
                cmd
            });
        }

        let mut missing = Vec::new();
        for sha in commits {
            if self.ensure_commit(&path, sha).is_err() {
                missing.push((*sha).to_string());
            }
        }
        if !missing.is_empty() {
            return Err(PipelineError::CommitNotFound { missing });
        }

        Ok(Workspace {
            path,
            guard: Some(guard),
        })
    }

    fn name_status(
        &self,
        workspace: &Workspace,
        good: &str,
        cand: &str,
        rename_threshold: u8,
    ) -> Result<Vec<RawNameStatusRecord>> {
        let output = self.run(
            self.git(Some(workspace.path()))
                .args(["diff", "--name-status"])
                .arg(format!("--find-renames={rename_threshold}%"))
                .arg("--find-copies")
                .arg(good)
                .arg(cand),
        )?;
        if !output.status.success() {
            return Err(PipelineError::Internal {
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).to_string();
        let mut records = Vec::new();
        for line in text.lines() {
            if line.is_empty() {
                continue;
            }
            let mut fields = line.split('\t');
            let status_field = fields.next().unwrap_or("");
            let mut chars = status_field.chars();
            let status_letter = match chars.next() {
                Some(c) => c,
                None => continue,
            };
            let score: Option<u8> = chars.as_str().parse().ok();

            match status_letter {
                'R' | 'C' => {
                    let path_a = fields.next().unwrap_or("").to_string();
                    let path_b = fields.next().map(|s| s.to_string());
                    records.push(RawNameStatusRecord {
                        status_letter,
                        score,
                        path_a,
                        path_b,
                    });
                }
                _ => {
                    let path_a = fields.next().unwrap_or("").to_string();
                    records.push(RawNameStatusRecord {
                        status_letter,
                        score: None,
                        path_a,
                        path_b: None,
                    });
                }
            }
        }
        Ok(records)
    }

    fn file_metadata(&self, workspace: &Workspace, commit: &str, path: &str) -> Result<FileMetadata> {
        let output = self.run(
            self.git(Some(workspace.path()))
                .args(["ls-tree", "-l", commit, "--"])
                .arg(path),
        )?;
        if !output.status.success() {
            return Ok(FileMetadata::default());
        }
        let text = String::from_utf8_lossy(&output.stdout);
        let line = match text.lines().next() {
            Some(l) => l,
            None => return Ok(FileMetadata::default()),
        };

        // `<mode> <type> <sha>\t<size>\t<path>` flattened with whitespace.
        let mut parts = line.split_whitespace();
        let mode = parts.next().map(|s| s.to_string());
        let object_type = parts.next().unwrap_or("");
        let _sha = parts.next();
        let size: Option<u64> = parts.next().and_then(|s| s.parse().ok());
        let is_submodule = mode.as_deref() == Some("160000") || object_type == "commit";

        let is_binary = if is_submodule {
            false
        } else {
            self.run(
                self.git(Some(workspace.path()))
                    .args(["diff", "--numstat", &format!("{commit}~1"), commit, "--"])
                    .arg(path),
            )
            .map(|o| String::from_utf8_lossy(&o.stdout).trim_start().starts_with('-'))
            .unwrap_or(false)
        };

        Ok(FileMetadata {
            mode,
            size: if is_submodule { None } else { size },
            is_binary,
            is_submodule,
        })
    }

    fn unified_patch(
        &self,
        workspace: &Workspace,
        good: &str,
        cand: &str,
        path_old: Option<&str>,
        path_new: Option<&str>,
        context: u32,
    ) -> Result<String> {
        let mut cmd = self.git(Some(workspace.path()));
        cmd.arg("diff").arg(format!("--unified={context}")).arg(good).arg(cand);
        cmd.arg("--");
        if let Some(old) = path_old {
            cmd.arg(old);
        }
        if let Some(new) = path_new {
            if Some(new) != path_old {
                cmd.arg(new);
            }
        }
        let output = self.run(cmd)?;
        if !output.status.success() {
            return Err(PipelineError::Internal {
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn submodule_shas(&self, workspace: &Workspace, good: &str, cand: &str, path: &str) -> Result<(String, String)> {
        let old_sha = self
            .run(
                self.git(Some(workspace.path()))
                    .arg("rev-parse")
                    .arg(format!("{good}:{path}")),
            )
            .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
            .unwrap_or_default();
        let new_sha = self
            .run(
                self.git(Some(workspace.path()))
                    .arg("rev-parse")
                    .arg(format!("{cand}:{path}")),
            )
            .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
            .unwrap_or_default();
        Ok((old_sha, new_sha))
    }
}

//! Value types for the diff ingestion pipeline.
//!
//! Every type here is plain and owned: constructed once per run by the
//! pipeline stages in `core::discovery`, `utils::hunk_parser`, and
//! `core::caps`, then handed unmodified to `utils::serializer`. Nothing in
//! this module performs I/O or owns a mutable cache.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The six canonical change statuses, in the fixed total order `A < C < D
/// < M < R < T` used for the primary sort. Declaration order doubles as
/// derive-`Ord` order, so this enum must not be reordered without
/// re-checking that property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "A")]
    Added,
    #[serde(rename = "C")]
    Copied,
    #[serde(rename = "D")]
    Deleted,
    #[serde(rename = "M")]
    Modified,
    #[serde(rename = "R")]
    Renamed,
    #[serde(rename = "T")]
    TypeChanged,
}

impl Status {
    /// The raw letter Git's name-status output uses for this status.
    pub fn letter(self) -> char {
        match self {
            Status::Added => 'A',
            Status::Copied => 'C',
            Status::Deleted => 'D',
            Status::Modified => 'M',
            Status::Renamed => 'R',
            Status::TypeChanged => 'T',
        }
    }

    /// Parse a raw Git status letter, rejecting anything outside the
    /// closed set. An unknown letter raises a driver-level error rather
    /// than silently passing through.
    pub fn from_letter(letter: char) -> Option<Status> {
        match letter {
            'A' => Some(Status::Added),
            'C' => Some(Status::Copied),
            'D' => Some(Status::Deleted),
            'M' => Some(Status::Modified),
            'R' => Some(Status::Renamed),
            'T' => Some(Status::TypeChanged),
            _ => None,
        }
    }
}

/// Which tie-break rule resolved a near-tie among rename
/// candidates. Absent when no near-tie existed for the target path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenameTiebreaker {
    Path,
    Size,
    Lex,
}

/// `{old_sha, new_sha}` for a gitlink change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmoduleShas {
    pub old_sha: String,
    pub new_sha: String,
}

/// One contiguous `@@ ... @@` block of a unified diff.
///
/// `patch` is the hunk's full textual body, including its header line,
/// bounded in bytes by the Cap Engine before a hunk is admitted into a
/// `FileChangeRecord`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hunk {
    pub header: String,
    pub old_start: u64,
    pub old_lines: u64,
    pub new_start: u64,
    pub new_lines: u64,
    pub added: u64,
    pub deleted: u64,
    pub patch: String,
}

impl Hunk {
    /// Byte cost of this hunk against the per-file and global caps: the
    /// length of its `patch` text in UTF-8.
    pub fn byte_cost(&self) -> u64 {
        self.patch.len() as u64
    }
}

/// One entry in the change set between `commit_good` and `commit_candidate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChangeRecord {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_old: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_new: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rename_score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rename_tiebreaker: Option<RenameTiebreaker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode_old: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode_new: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_old: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_new: Option<u64>,
    pub is_binary: bool,
    pub is_submodule: bool,
    pub eol_only_change: bool,
    pub whitespace_only_change: bool,
    pub summarized: bool,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub omitted_hunks_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submodule: Option<SubmoduleShas>,
    pub hunks: Vec<Hunk>,
}

impl FileChangeRecord {
    /// `path_new` if present, else `path_old`: the key files are sorted
    /// by.
    pub fn effective_path(&self) -> &str {
        self.path_new
            .as_deref()
            .or(self.path_old.as_deref())
            .unwrap_or("")
    }

    /// Sum of `len(hunk.patch)` for the hunks currently attached to this
    /// record.
    pub fn diff_body_cost(&self) -> u64 {
        self.hunks.iter().map(Hunk::byte_cost).sum()
    }
}

/// Byte budgets recorded in `provenance.caps`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapsInfo {
    pub cap_total: u64,
    pub cap_file: u64,
    pub context_lines: u32,
}

/// Rename-detection configuration recorded in `provenance.rename_detection`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameDetectionInfo {
    pub threshold: u8,
}

/// The fixed `LC_ALL=C`, `color=off`, `core.autocrlf=false` environment
/// lock every Git Driver invocation runs under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvLocks {
    #[serde(rename = "LC_ALL")]
    pub lc_all: String,
    pub color: String,
    #[serde(rename = "core.autocrlf")]
    pub core_autocrlf: String,
}

impl Default for EnvLocks {
    fn default() -> Self {
        EnvLocks {
            lc_all: "C".to_string(),
            color: "off".to_string(),
            core_autocrlf: "false".to_string(),
        }
    }
}

/// Run provenance attached to every payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    pub repo_url: String,
    pub commit_good: String,
    pub commit_candidate: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_name: Option<String>,
    pub caps: CapsInfo,
    pub rename_detection: RenameDetectionInfo,
    pub git_version: String,
    pub diff_algorithm: String,
    pub env_locks: EnvLocks,
    /// Blank during the first serialization pass, then set to the hex
    /// SHA-256 digest of that pass's bytes.
    pub checksum: String,
}

/// The machine-readable description of the changes between two commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payload {
    pub provenance: Provenance,
    pub files: Vec<FileChangeRecord>,
    pub omitted_files_count: u64,
    pub notes: Vec<String>,
}

/// Structured detail accompanying a failed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub details: BTreeMap<String, serde_json::Value>,
}

/// `{ok:true, data:<Payload>}` or `{ok:false, error:{code,message,details}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Envelope {
    Ok { ok: bool, data: Payload },
    Err { ok: bool, error: ErrorDetail },
}

impl Envelope {
    pub fn ok(data: Payload) -> Envelope {
        Envelope::Ok { ok: true, data }
    }

    pub fn err(code: &str, message: impl Into<String>, details: BTreeMap<String, serde_json::Value>) -> Envelope {
        Envelope::Err {
            ok: false,
            error: ErrorDetail {
                code: code.to_string(),
                message: message.into(),
                details,
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Envelope::Ok { .. })
    }
}

//! Error taxonomy for the diff ingestion pipeline.
//!
//! Every variant maps to exactly one stable machine-readable code.
//! `Internal` is reserved for genuinely unanticipated failures and must
//! never be used to paper over one of the named categories.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::model::Envelope;

/// Errors that can terminate a run before a payload is produced.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Detected `git` version is below the supported 2.30 floor.
    #[error("unsupported git version: {detected}")]
    GitVersionUnsupported { detected: String },

    /// Clone refused by the remote or the local `git` invocation failed.
    #[error("clone failed: {message}")]
    CloneFailed { message: String },

    /// One or both commits could not be resolved after fetch.
    #[error("commit(s) not found: {}", missing.join(", "))]
    CommitNotFound { missing: Vec<String> },

    /// `Config` violates the invariants on caps or thresholds.
    #[error("invalid caps configuration: {message}")]
    CapsInvalid { message: String },

    /// Transport deadline exceeded after exactly one retry.
    #[error("network timeout (retried once)")]
    NetworkTimeout,

    /// Catch-all for conditions outside the named taxonomy.
    #[error("internal error: {message}")]
    Internal { message: String },
}

/// Result type used throughout the pipeline.
pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    /// The stable machine-readable code assigned to this error.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::GitVersionUnsupported { .. } => "GIT_VERSION_UNSUPPORTED",
            PipelineError::CloneFailed { .. } => "CLONE_FAILED",
            PipelineError::CommitNotFound { .. } => "COMMIT_NOT_FOUND",
            PipelineError::CapsInvalid { .. } => "CAPS_INVALID",
            PipelineError::NetworkTimeout => "NETWORK_TIMEOUT",
            PipelineError::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Structured details for the envelope's `error.details` mapping.
    fn details(&self) -> BTreeMap<String, serde_json::Value> {
        let mut details = BTreeMap::new();
        match self {
            PipelineError::GitVersionUnsupported { detected } => {
                details.insert("detected_version".to_string(), serde_json::Value::String(detected.clone()));
            }
            PipelineError::CommitNotFound { missing } => {
                details.insert(
                    "missing".to_string(),
                    serde_json::Value::Array(missing.iter().cloned().map(serde_json::Value::String).collect()),
                );
            }
            PipelineError::CloneFailed { message }
            | PipelineError::CapsInvalid { message }
            | PipelineError::Internal { message } => {
                details.insert("reason".to_string(), serde_json::Value::String(message.clone()));
            }
            PipelineError::NetworkTimeout => {
                details.insert("retried".to_string(), serde_json::Value::Bool(true));
            }
        }
        details
    }

    /// Build the `{ok:false, error:{...}}` envelope for this error.
    pub fn into_envelope(self) -> Envelope {
        let code = self.code();
        let details = self.details();
        Envelope::err(code, self.to_string(), details)
    }
}

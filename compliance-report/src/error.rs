//! Error types for the compliance report pipeline
//!
//! Three families, each with its own propagation rule:
//! - `ReportError::MalformedResult`: corrupted local state, always propagated
//! - `SubmissionError`: classified transport failures, always logged,
//!   propagated only when the policy asks for it
//! - `ReportError::PolicyViolation`: the terminal signal for pipelines

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a report execution.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("malformed result file {}: {reason}", .path.display())]
    MalformedResult { path: PathBuf, reason: String },

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error("{failed} audits have failed. Aborting run.")]
    PolicyViolation { failed: i64 },
}

/// Classified failure of the report submission.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("{message} Possible clock skew or credential mismatch on the client.")]
    Authentication { message: String },

    #[error("{message} Possible unreachable compliance server or gateway auth misconfiguration.")]
    Authorization { message: String },

    #[error("transport failure{}: {message}", status_suffix(.status))]
    Transport { status: Option<u16>, message: String },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl SubmissionError {
    /// HTTP status behind the failure, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            SubmissionError::Authentication { .. } => Some(401),
            SubmissionError::Authorization { .. } => Some(403),
            SubmissionError::Transport { status, .. } => *status,
        }
    }
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid server url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("could not find config directory")]
    NoConfigDir,

    #[error("keyring access failed: {0}")]
    Keyring(#[from] keyring::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_violation_message_carries_count() {
        let err = ReportError::PolicyViolation { failed: 3 };
        assert_eq!(err.to_string(), "3 audits have failed. Aborting run.");
    }

    #[test]
    fn test_transport_error_display() {
        let with_status = SubmissionError::Transport {
            status: Some(502),
            message: "bad gateway".into(),
        };
        assert_eq!(with_status.to_string(), "transport failure (HTTP 502): bad gateway");

        let without = SubmissionError::Transport {
            status: None,
            message: "connection refused".into(),
        };
        assert_eq!(without.to_string(), "transport failure: connection refused");
        assert_eq!(without.status(), None);
    }

    #[test]
    fn test_submission_error_wraps_into_report_error() {
        let err: ReportError = SubmissionError::Authentication {
            message: "401 Unauthorized".into(),
        }
        .into();
        assert!(matches!(err, ReportError::Submission(_)));
        assert!(err.to_string().starts_with("401 Unauthorized"));
    }
}

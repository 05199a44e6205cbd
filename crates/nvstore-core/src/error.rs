//! Error types for nvstore operations
//!
//! All store errors are represented by the NvError enum. Tool failures keep
//! the operation that failed so callers can tell a failed `set` apart from a
//! failed `commit` that followed an applied mutation.

use thiserror::Error;

use crate::tool::ToolOp;

/// nvstore error types with detailed context
#[derive(Debug, Error)]
pub enum NvError {
    /// The nvram tool could not be started
    #[error("nvram {op}: failed to run {program}: {message} ({kind})")]
    Spawn {
        /// Operation being performed
        op: ToolOp,
        /// Program that failed to start
        program: String,
        /// The underlying I/O error kind
        kind: std::io::ErrorKind,
        /// Human-readable description
        message: String,
    },

    /// The nvram tool ran but exited non-zero
    #[error("nvram {op}: exited with {}{}", status_text(.status), stderr_text(.stderr))]
    Exit {
        /// Operation being performed
        op: ToolOp,
        /// Exit code, if the process was not killed by a signal
        status: Option<i32>,
        /// Captured standard error, trimmed
        stderr: String,
    },

    /// No value stored under the key (absent or empty)
    #[error("no entry for key {key}")]
    NotFound {
        /// Logical key that was looked up
        key: String,
    },

    /// Stored value of a binary-typed key is not valid hex
    #[error("invalid hex value for key {key}: {source}")]
    Decode {
        /// Logical key being read
        key: String,
        /// Underlying hex error
        #[source]
        source: hex::FromHexError,
    },

    /// Physical name exceeds the NVRAM name ceiling
    #[error("nvram name {name} is {len} characters, limit is {max}")]
    NameTooLong {
        /// Physical name that was rejected
        name: String,
        /// Its length in characters
        len: usize,
        /// Configured ceiling
        max: usize,
    },

    /// Text-typed value the tool cannot carry intact
    #[error("value for key {key} {reason}")]
    InvalidValue {
        /// Logical key being written
        key: String,
        /// What is wrong with the value
        reason: &'static str,
    },

    /// Configuration rejected by `Config::validate`
    #[error("invalid configuration: {0}")]
    Config(String),
}

fn status_text(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {}", code),
        None => "signal".to_string(),
    }
}

fn stderr_text(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {}", stderr)
    }
}

impl NvError {
    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, NvError::NotFound { .. })
    }

    /// Check if the external tool failed (could not start or exited non-zero).
    pub fn is_tool_failure(&self) -> bool {
        matches!(self, NvError::Spawn { .. } | NvError::Exit { .. })
    }

    /// The tool operation that failed, for tool failures.
    pub fn op(&self) -> Option<ToolOp> {
        match self {
            NvError::Spawn { op, .. } | NvError::Exit { op, .. } => Some(*op),
            _ => None,
        }
    }

    /// Check if a commit failed.
    ///
    /// When returned from `set` or `delete` the mutation is live in the
    /// working copy but its durability is unconfirmed.
    pub fn is_commit_failure(&self) -> bool {
        self.op() == Some(ToolOp::Commit)
    }
}

/// Result type alias for nvstore operations
pub type NvResult<T> = Result<T, NvError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NvError::Exit {
            op: ToolOp::Set,
            status: Some(1),
            stderr: "nvram: out of space".into(),
        };

        let display = format!("{}", err);
        assert_eq!(display, "nvram set: exited with status 1: nvram: out of space");
    }

    #[test]
    fn test_exit_without_stderr_or_code() {
        let err = NvError::Exit { op: ToolOp::Commit, status: None, stderr: String::new() };
        assert_eq!(err.to_string(), "nvram commit: exited with signal");
    }

    #[test]
    fn test_classification() {
        let commit = NvError::Spawn {
            op: ToolOp::Commit,
            program: "nvram".into(),
            kind: std::io::ErrorKind::NotFound,
            message: "No such file or directory".into(),
        };
        assert!(commit.is_tool_failure());
        assert!(commit.is_commit_failure());
        assert!(!commit.is_not_found());

        let missing = NvError::NotFound { key: "uuid".into() };
        assert!(missing.is_not_found());
        assert!(!missing.is_tool_failure());
        assert_eq!(missing.op(), None);
    }

    #[test]
    fn test_invalid_value_display() {
        let err = NvError::InvalidValue { key: "keypair".into(), reason: "contains a newline" };
        assert_eq!(err.to_string(), "value for key keypair contains a newline");
        assert!(!err.is_tool_failure());
    }
}

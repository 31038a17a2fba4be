//! Run-level error taxonomy.

use crate::browser::DriverError;
use std::path::PathBuf;

/// Errors from persisting a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to serialize snapshot")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why a run ended without producing a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("login form fields could not be located")]
    AuthFieldsNotFound,
    #[error("login did not complete; still on {url}")]
    LoginIncomplete { url: String },
    #[error("run time limit exceeded")]
    RunTimedOut,
    #[error(transparent)]
    SnapshotWrite(#[from] SnapshotError),
    #[error("browser failure: {0}")]
    Browser(#[from] DriverError),
}

impl RunError {
    /// Short machine-friendly name, used in logs and diagnostic file names.
    pub fn kind(&self) -> &'static str {
        match self {
            RunError::AuthFieldsNotFound => "auth-fields-not-found",
            RunError::LoginIncomplete { .. } => "login-incomplete",
            RunError::RunTimedOut => "run-timed-out",
            RunError::SnapshotWrite(_) => "snapshot-write",
            RunError::Browser(_) => "browser",
        }
    }

    /// Every fatal run error maps to a non-zero exit status.
    pub fn exit_code(&self) -> u8 {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_distinct() {
        let errors = [
            RunError::AuthFieldsNotFound,
            RunError::LoginIncomplete {
                url: "https://example.com/login".into(),
            },
            RunError::RunTimedOut,
            RunError::Browser(DriverError::ConnectionClosed),
        ];
        let mut kinds: Vec<_> = errors.iter().map(RunError::kind).collect();
        kinds.sort_unstable();
        kinds.dedup();
        assert_eq!(kinds.len(), errors.len());
        assert!(errors.iter().all(|e| e.exit_code() == 1));
    }

    #[test]
    fn login_incomplete_names_url() {
        let err = RunError::LoginIncomplete {
            url: "https://example.com/#/login".into(),
        };
        assert!(err.to_string().contains("https://example.com/#/login"));
    }
}

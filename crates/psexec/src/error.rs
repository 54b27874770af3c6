//! Error types for psexec

use thiserror::Error;

/// Errors that can occur while building, launching or tearing down a
/// PsExec process
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PsExecError {
    /// Lifecycle operation called before `build`
    #[error("process has not been built")]
    NotBuilt,

    /// Wait called on a built process that was never started
    #[error("process has not been started")]
    NotStarted,

    /// Start or build called on a process that is already running
    #[error("process has already been started")]
    AlreadyStarted,

    /// Operation attempted after disposal
    #[error("process has been disposed")]
    Disposed,

    /// Targets or program rejected while assembling the launch descriptor
    #[error("invalid launch: {0}")]
    InvalidLaunch(String),

    /// Process spawn error
    #[error("failed to spawn process: {0}")]
    SpawnError(String),

    /// I/O error while waiting on or reaping the child
    #[error("I/O error: {0}")]
    IoError(String),

    /// Killing the child during disposal failed
    #[error("failed to kill process: {0}")]
    KillFailed(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    ConfigError(String),
}

impl PsExecError {
    /// Check if the error comes from calling a lifecycle operation in the
    /// wrong state
    #[must_use]
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            PsExecError::NotBuilt
                | PsExecError::NotStarted
                | PsExecError::AlreadyStarted
                | PsExecError::Disposed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_classification() {
        assert!(PsExecError::NotBuilt.is_precondition());
        assert!(PsExecError::Disposed.is_precondition());
        assert!(!PsExecError::SpawnError("missing".into()).is_precondition());
        assert!(!PsExecError::KillFailed("denied".into()).is_precondition());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            PsExecError::NotBuilt.to_string(),
            "process has not been built"
        );
        assert_eq!(
            PsExecError::InvalidLaunch("no targets".into()).to_string(),
            "invalid launch: no targets"
        );
    }
}

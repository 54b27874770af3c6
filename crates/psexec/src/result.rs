//! Result types for a finished PsExec process

use std::process::ExitStatus;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the PsExec child process ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitReport {
    /// Exit code, `None` when the process was terminated by a signal
    pub status: Option<i32>,
    /// Time between start and exit
    pub duration: Duration,
}

impl ExitReport {
    pub(crate) fn from_status(status: ExitStatus, duration: Duration) -> Self {
        Self {
            status: status.code(),
            duration,
        }
    }

    /// Check if the process exited with code 0
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Exit code, or `fallback` when none is available
    #[must_use]
    pub fn code_or(&self, fallback: i32) -> i32 {
        self.status.unwrap_or(fallback)
    }
}

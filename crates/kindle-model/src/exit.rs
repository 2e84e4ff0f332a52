/// Status reported for a worker whose executable could not be found.
pub const EXIT_START_NOT_FOUND: i32 = 127;

/// Status reported for a worker that could not be started for any other reason.
pub const EXIT_START_FAILED: i32 = 126;

/// How a worker process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOutcome {
    /// The process exited on its own with `code`.
    Exited { code: i32 },
    /// The process was terminated by `signal`.
    Signaled { signal: i32 },
    /// The process never ran.
    StartFailed { code: i32, reason: String },
}

impl ExitOutcome {
    /// Shell-style exit status: the exit code, or 128 + signal number.
    pub fn status(&self) -> i32 {
        match self {
            ExitOutcome::Exited { code } => *code,
            ExitOutcome::Signaled { signal } => 128 + signal,
            ExitOutcome::StartFailed { code, .. } => *code,
        }
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, ExitOutcome::Exited { code: 0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_status_is_offset_by_128() {
        assert_eq!(ExitOutcome::Signaled { signal: 9 }.status(), 137);
        assert_eq!(ExitOutcome::Signaled { signal: 15 }.status(), 143);
    }

    #[test]
    fn exit_code_passes_through() {
        assert_eq!(ExitOutcome::Exited { code: 0 }.status(), 0);
        assert_eq!(ExitOutcome::Exited { code: 42 }.status(), 42);
        assert!(ExitOutcome::Exited { code: 0 }.is_success());
        assert!(!ExitOutcome::Exited { code: 1 }.is_success());
    }

    #[test]
    fn start_failure_keeps_its_code() {
        let failed = ExitOutcome::StartFailed {
            code: EXIT_START_NOT_FOUND,
            reason: "No such file or directory".into(),
        };
        assert_eq!(failed.status(), 127);
        assert!(!failed.is_success());
    }
}

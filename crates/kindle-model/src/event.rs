use crate::{Pid, Rank};

/// Lifecycle notifications published by a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // session
    SessionStarted,
    SessionFinished,

    // client lifecycle
    ClientSpawned,
    ClientExited,
    ClientFailed,
    ClientCompleted,
    BootstrapFinished,

    // kill timer
    KillTimerArmed,
    KillTimerDisarmed,
    KillTimerFired,

    // control service
    ControlDisconnect,
}

/// A single session event. Unused fields stay `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    pub kind: EventKind,
    pub rank: Option<Rank>,
    pub pid: Option<Pid>,
    /// Shell-style exit status, or the aggregate one for `SessionFinished`.
    pub status: Option<i32>,
    /// Live clients left (or targeted, for `KillTimerFired`).
    pub remaining: Option<usize>,
    pub reason: Option<String>,
}

impl SessionEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            rank: None,
            pid: None,
            status: None,
            remaining: None,
            reason: None,
        }
    }

    pub fn with_rank(mut self, rank: Rank) -> Self {
        self.rank = Some(rank);
        self
    }

    pub fn with_pid(mut self, pid: Option<Pid>) -> Self {
        self.pid = pid;
        self
    }

    pub fn with_status(mut self, status: i32) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_remaining(mut self, remaining: usize) -> Self {
        self.remaining = Some(remaining);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Receiver of session events.
///
/// Called synchronously from the session loop, so implementations must not block.
pub trait Subscribe: Send + Sync {
    fn on_event(&self, event: &SessionEvent);

    fn name(&self) -> &'static str {
        "anonymous"
    }
}

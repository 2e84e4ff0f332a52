use std::borrow::Borrow;

use kindle_model::{EventKind, SessionEvent};
use tracing::{debug, error, info, trace, warn};

pub trait View {
    fn kind(&self) -> EventKind;
    fn rank(&self) -> i64;
    fn pid(&self) -> u32;
    fn status(&self) -> i32;
    fn remaining(&self) -> usize;
    fn as_reason(&self) -> &str;
}

impl<T> View for T
where
    T: Borrow<SessionEvent>,
{
    #[inline]
    fn kind(&self) -> EventKind {
        self.borrow().kind
    }
    #[inline]
    fn rank(&self) -> i64 {
        self.borrow().rank.map_or(-1, i64::from)
    }
    #[inline]
    fn pid(&self) -> u32 {
        self.borrow().pid.unwrap_or(0)
    }
    #[inline]
    fn status(&self) -> i32 {
        self.borrow().status.unwrap_or(0)
    }
    #[inline]
    fn remaining(&self) -> usize {
        self.borrow().remaining.unwrap_or(0)
    }
    #[inline]
    fn as_reason(&self) -> &str {
        self.borrow().reason.as_deref().unwrap_or("unknown")
    }
}

#[inline]
pub fn message_for(kind: EventKind) -> &'static str {
    match kind {
        // session
        EventKind::SessionStarted => "session started",
        EventKind::SessionFinished => "session finished (all brokers reaped)",

        // client lifecycle
        EventKind::ClientSpawned => "broker spawned",
        EventKind::ClientExited => "broker exited",
        EventKind::ClientFailed => "broker failed to start",
        EventKind::ClientCompleted => "broker reaped and removed",
        EventKind::BootstrapFinished => "bootstrap exchange finished; channel closed",

        // kill timer
        EventKind::KillTimerArmed => "kill timer armed after broker departure",
        EventKind::KillTimerDisarmed => "kill timer disarmed",
        EventKind::KillTimerFired => "kill timer expired; killing remaining brokers",

        // control service
        EventKind::ControlDisconnect => "control client disconnected",
    }
}

#[inline]
pub fn log_event<E: View>(e: E) {
    let msg = message_for(e.kind());

    match e.kind() {
        // session
        EventKind::SessionStarted => debug!(size = e.remaining(), "{msg}"),
        EventKind::SessionFinished => debug!(status = e.status(), "{msg}"),

        // client lifecycle
        EventKind::ClientSpawned => debug!(rank = e.rank(), pid = e.pid(), "{msg}"),
        EventKind::ClientExited => {
            if e.status() == 0 {
                debug!(rank = e.rank(), pid = e.pid(), "{msg}")
            } else {
                warn!("{} (pid {}) {}", e.rank(), e.pid(), e.as_reason())
            }
        }
        EventKind::ClientFailed => {
            error!("{} FAILED: {}", e.rank(), e.as_reason())
        }
        EventKind::ClientCompleted => {
            trace!(rank = e.rank(), status = e.status(), remaining = e.remaining(), "{msg}")
        }
        EventKind::BootstrapFinished => debug!(rank = e.rank(), "{msg}"),

        // kill timer
        EventKind::KillTimerArmed => debug!(remaining = e.remaining(), "{msg}"),
        EventKind::KillTimerDisarmed => trace!("{msg}"),
        EventKind::KillTimerFired => warn!(remaining = e.remaining(), "{msg}"),

        // control service
        EventKind::ControlDisconnect => info!("disconnect from {}", e.as_reason()),
    }
}

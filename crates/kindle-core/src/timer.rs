use std::time::Duration;

use tokio::time::Instant;

/// One-shot cascade timer.
///
/// Armed when a broker departs while others remain, disarmed when the live
/// set empties or after it fires. Re-arming never moves the deadline.
#[derive(Debug)]
pub struct KillTimer {
    timeout: Duration,
    deadline: Option<Instant>,
}

impl KillTimer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[inline]
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Start the countdown unless it is already running. Returns `true` if it was started.
    pub fn arm(&mut self) -> bool {
        if self.deadline.is_some() {
            return false;
        }
        self.deadline = Some(Instant::now() + self.timeout);
        true
    }

    /// Returns `true` if the timer was armed.
    pub fn disarm(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    /// Resolves at the deadline; never resolves while disarmed.
    pub async fn expired(&self) {
        match self.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }
}

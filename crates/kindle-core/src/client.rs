use kindle_exec::{ChannelWriter, CommandSpec};
use kindle_model::{ExitOutcome, Pid, Rank};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::SessionError;

/// Lifecycle of one broker process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Registered; the spawn is in flight.
    Spawned,
    Running,
    Exited,
    /// Never ran: spawn or exec failed.
    Failed,
}

impl ClientState {
    pub fn can_transition(self, next: ClientState) -> bool {
        use ClientState::*;
        matches!(
            (self, next),
            (Spawned, Running) | (Spawned, Failed) | (Running, Exited) | (Running, Failed)
        )
    }

    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, ClientState::Exited | ClientState::Failed)
    }
}

/// One rank of the session.
pub struct Client {
    pub rank: Rank,
    pub spec: CommandSpec,
    state: ClientState,
    pid: Option<Pid>,
    kill: CancellationToken,
    writer: Option<ChannelWriter>,
    reader: Option<JoinHandle<()>>,
    channel_open: bool,
    exit: Option<ExitOutcome>,
}

impl Client {
    pub fn new(rank: Rank, spec: CommandSpec) -> Self {
        Self {
            rank,
            spec,
            state: ClientState::Spawned,
            pid: None,
            kill: CancellationToken::new(),
            writer: None,
            reader: None,
            channel_open: false,
            exit: None,
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn pid(&self) -> Option<Pid> {
        self.pid
    }

    pub fn exit(&self) -> Option<&ExitOutcome> {
        self.exit.as_ref()
    }

    pub fn kill_token(&self) -> CancellationToken {
        self.kill.clone()
    }

    /// Ask the waiter to SIGKILL the process. A no-op once it has exited.
    pub fn kill(&self) {
        self.kill.cancel();
    }

    pub fn transition(&mut self, next: ClientState) -> Result<(), SessionError> {
        if !self.state.can_transition(next) {
            return Err(SessionError::IllegalTransition {
                rank: self.rank,
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Record a successful spawn.
    pub fn started(
        &mut self,
        pid: Pid,
        writer: Option<ChannelWriter>,
        reader: Option<JoinHandle<()>>,
    ) -> Result<(), SessionError> {
        self.transition(ClientState::Running)?;
        self.pid = Some(pid);
        self.channel_open = writer.is_some();
        self.writer = writer;
        self.reader = reader;
        Ok(())
    }

    pub fn exited(&mut self, outcome: ExitOutcome) -> Result<(), SessionError> {
        self.transition(ClientState::Exited)?;
        self.exit = Some(outcome);
        Ok(())
    }

    pub fn failed(&mut self, outcome: ExitOutcome) -> Result<(), SessionError> {
        self.transition(ClientState::Failed)?;
        self.exit = Some(outcome);
        Ok(())
    }

    /// Queue a response line on the bootstrap channel.
    pub fn send(&self, line: String) -> bool {
        self.writer.as_ref().is_some_and(|w| w.send(line))
    }

    pub fn channel_open(&self) -> bool {
        self.channel_open
    }

    /// Stop reading and close our side once queued lines are flushed.
    pub fn close_channel(&mut self) {
        self.writer = None;
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.channel_open = false;
    }

    /// Exited, and nothing more can arrive on the channel.
    pub fn is_complete(&self) -> bool {
        self.state == ClientState::Exited && !self.channel_open
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> Client {
        Client::new(0, CommandSpec::new(["kindle-broker"]))
    }

    #[test]
    fn legal_lifecycle() {
        let mut c = client();
        assert_eq!(c.state(), ClientState::Spawned);
        c.started(100, None, None).unwrap();
        assert_eq!(c.pid(), Some(100));
        c.exited(ExitOutcome::Exited { code: 0 }).unwrap();
        assert!(c.state().is_terminal());
        assert!(c.is_complete());
    }

    #[test]
    fn spawn_failure_skips_running() {
        let mut c = client();
        c.failed(ExitOutcome::StartFailed {
            code: 127,
            reason: "not found".into(),
        })
        .unwrap();
        assert_eq!(c.state(), ClientState::Failed);
        assert_eq!(c.exit().map(ExitOutcome::status), Some(127));
    }

    #[test]
    fn illegal_transitions_are_rejected_and_not_applied() {
        let mut c = client();
        assert!(matches!(
            c.exited(ExitOutcome::Exited { code: 0 }),
            Err(SessionError::IllegalTransition {
                from: ClientState::Spawned,
                to: ClientState::Exited,
                ..
            })
        ));
        assert_eq!(c.state(), ClientState::Spawned);

        c.started(1, None, None).unwrap();
        c.exited(ExitOutcome::Exited { code: 0 }).unwrap();
        assert!(c.exited(ExitOutcome::Exited { code: 0 }).is_err());
        assert!(c.failed(ExitOutcome::Exited { code: 1 }).is_err());
        assert_eq!(c.state(), ClientState::Exited);
    }

    #[test]
    fn kill_cancels_the_token() {
        let c = client();
        let token = c.kill_token();
        assert!(!token.is_cancelled());
        c.kill();
        assert!(token.is_cancelled());
    }
}

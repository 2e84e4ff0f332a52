use std::{path::Path, sync::Arc};

use kindle_exec::{
    ChannelLines, Spawned, outcome_from_spawn_error, outcome_from_status, summary, wait_or_kill,
};
use kindle_model::{
    EXIT_START_FAILED, EventKind, ExitOutcome, Pid, Rank, SessionEvent, StartConfig, Subscribe,
};
use kindle_pmi::{
    BootstrapKvs, MapBlock, Outcome, PROCESS_MAPPING_KEY, ServerConfig, SimpleServer,
    encode_process_mapping,
};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    bus::Bus,
    client::Client,
    control::ControlService,
    error::SessionError,
    scratch::ScratchArea,
    supervisor::{Supervisor, command_for},
    timer::KillTimer,
};

/// Things the per-client helper tasks report to the loop.
#[derive(Debug)]
enum Event {
    Line { rank: Rank, line: String },
    ChannelEof { rank: Rank },
    Exited { rank: Rank, outcome: ExitOutcome },
    SpawnFailed { rank: Rank, outcome: ExitOutcome },
}

/// One test instance: N brokers, their bootstrap server and the control socket.
///
/// All state is owned here and mutated only by [`run`](Self::run), one
/// event at a time. Helper tasks just forward [`Event`]s.
pub struct Session {
    cfg: StartConfig,
    size: u32,
    // Declared before `scratch`: the socket goes away before its directory.
    control: ControlService,
    scratch: ScratchArea,
    server: SimpleServer<Rank>,
    supervisor: Supervisor,
    timer: KillTimer,
    bus: Bus,
    status: watch::Sender<Vec<Pid>>,
    tx: mpsc::UnboundedSender<Event>,
    rx: mpsc::UnboundedReceiver<Event>,
    aborted: Option<kindle_pmi::ProtocolError>,
}

impl Session {
    /// Validate `cfg` and acquire the scratch area, control socket and bootstrap server.
    ///
    /// Must be called inside a tokio runtime. Nothing is spawned yet.
    pub fn new(cfg: StartConfig) -> Result<Self, SessionError> {
        cfg.validate()?;
        let size = cfg.size.ok_or(SessionError::NoRanks)?;

        let scratch = match &cfg.scratch_dir {
            Some(dir) => ScratchArea::borrowed(dir)?,
            None => ScratchArea::create()?,
        };

        let bus = Bus::new();
        let (status, status_rx) = watch::channel(Vec::new());
        let control =
            ControlService::bind(scratch.control_path(), status_rx, bus.clone(), cfg.verbose)?;

        let mut server = SimpleServer::new(
            ServerConfig::new(size).with_trace(cfg.trace_pmi),
            BootstrapKvs::new(),
        );
        if !cfg.noclique {
            let mapping = encode_process_mapping(&[MapBlock::single_node(size)]);
            debug!(target: "kindle.core.session", %mapping, "clique descriptor");
            server.put(PROCESS_MAPPING_KEY, &mapping);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        Ok(Self {
            timer: KillTimer::new(cfg.kill_timeout),
            cfg,
            size,
            control,
            scratch,
            server,
            supervisor: Supervisor::new(),
            bus,
            status,
            tx,
            rx,
            aborted: None,
        })
    }

    pub fn with_subscriber(self, sub: Arc<dyn Subscribe>) -> Self {
        self.bus.add(sub);
        self
    }

    pub fn scratch_path(&self) -> &Path {
        self.scratch.path()
    }

    pub fn control_path(&self) -> &Path {
        self.control.path()
    }

    /// Launch every rank and drive the session until all of them are gone.
    ///
    /// Returns the largest shell-style status of any client. A bootstrap
    /// protocol violation kills the remaining clients and is returned as an
    /// error once they are reaped.
    #[instrument(level = "debug", name = "session", skip(self), fields(size = self.size))]
    pub async fn run(&mut self) -> Result<i32, SessionError> {
        self.publish(SessionEvent::new(EventKind::SessionStarted).with_remaining(self.size as usize));

        for rank in 0..self.size {
            let spec = command_for(rank, &self.cfg, &self.scratch);
            if self.cfg.verbose {
                info!(target: "kindle.core.session", "{rank}: {}", spec.display());
            }
            if self.cfg.noexec {
                continue;
            }
            self.launch(Client::new(rank, spec));
        }

        self.event_loop().await;
        self.status.send_replace(Vec::new());

        if let Some(err) = self.aborted.take() {
            return Err(err.into());
        }
        let code = self.supervisor.exit_code();
        self.publish(SessionEvent::new(EventKind::SessionFinished).with_status(code));
        Ok(code)
    }

    /// Release the control socket, then the scratch area.
    pub fn shutdown(self) -> Result<(), SessionError> {
        let Session {
            control, scratch, ..
        } = self;
        control.shutdown();
        scratch.close().map_err(SessionError::Scratch)
    }

    async fn event_loop(&mut self) {
        while self.supervisor.live() > 0 {
            tokio::select! {
                event = self.rx.recv() => match event {
                    Some(event) => self.handle(event),
                    None => break,
                },
                _ = self.timer.expired() => self.fire_timer(),
            }
        }
    }

    fn launch(&mut self, client: Client) {
        let rank = client.rank;
        let spawned = kindle_exec::spawn(&client.spec);
        self.supervisor.register(client);

        let Spawned {
            mut child,
            pid,
            channel,
        } = match spawned {
            Ok(spawned) => spawned,
            Err(err) => {
                let outcome = match err.spawn_source() {
                    Some(source) => outcome_from_spawn_error(source),
                    None => ExitOutcome::StartFailed {
                        code: EXIT_START_FAILED,
                        reason: err.to_string(),
                    },
                };
                // Handled by the loop, like any other state change.
                let _ = self.tx.send(Event::SpawnFailed { rank, outcome });
                return;
            }
        };

        let (writer, reader) = match channel {
            Some(ch) => {
                let reader = tokio::spawn(read_channel(rank, ch.lines, self.tx.clone()));
                (Some(ch.writer), Some(reader))
            }
            None => (None, None),
        };

        let Some(client) = self.supervisor.get_mut(rank) else {
            return;
        };
        let kill = client.kill_token();
        if let Err(e) = client.started(pid, writer, reader) {
            warn!(target: "kindle.core.session", error = %e, "ignored state change");
        }

        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = match wait_or_kill(&mut child, &kill).await {
                Ok(status) => outcome_from_status(status),
                Err(e) => {
                    warn!(target: "kindle.core.session", rank, error = %e, "lost track of broker");
                    ExitOutcome::Exited { code: 1 }
                }
            };
            let _ = tx.send(Event::Exited { rank, outcome });
        });

        self.publish(
            SessionEvent::new(EventKind::ClientSpawned)
                .with_rank(rank)
                .with_pid(Some(pid)),
        );
        self.publish_status();
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::Line { rank, line } => self.on_line(rank, &line),
            Event::ChannelEof { rank } => {
                if let Some(client) = self.supervisor.get_mut(rank) {
                    client.close_channel();
                }
                self.try_complete(rank);
            }
            Event::Exited { rank, outcome } => self.on_exited(rank, outcome),
            Event::SpawnFailed { rank, outcome } => self.on_failed(rank, outcome),
        }
    }

    fn on_line(&mut self, rank: Rank, line: &str) {
        if line.trim().is_empty() || self.aborted.is_some() {
            return;
        }
        if !self
            .supervisor
            .get(rank)
            .is_some_and(Client::channel_open)
        {
            return;
        }

        let reply = match self.server.request(line, rank, rank) {
            Ok(reply) => reply,
            Err(err) => {
                error!(target: "kindle.core.session", error = %err, "bootstrap protocol error; killing all brokers");
                self.abort(err);
                return;
            }
        };

        for msg in reply.messages {
            if let Some(client) = self.supervisor.get(msg.client)
                && !client.send(msg.line)
            {
                debug!(target: "kindle.core.session", rank = msg.rank, "response dropped: channel gone");
            }
        }

        if reply.outcome == Outcome::Finished {
            if let Some(client) = self.supervisor.get_mut(rank) {
                client.close_channel();
            }
            self.publish(SessionEvent::new(EventKind::BootstrapFinished).with_rank(rank));
            self.try_complete(rank);
        }
    }

    fn on_exited(&mut self, rank: Rank, outcome: ExitOutcome) {
        let Some(client) = self.supervisor.get_mut(rank) else {
            return;
        };
        let pid = client.pid();
        if let Err(e) = client.exited(outcome.clone()) {
            warn!(target: "kindle.core.session", error = %e, "ignored state change");
            return;
        }
        self.publish(
            SessionEvent::new(EventKind::ClientExited)
                .with_rank(rank)
                .with_pid(pid)
                .with_status(outcome.status())
                .with_reason(summary(&outcome)),
        );
        self.try_complete(rank);
    }

    fn on_failed(&mut self, rank: Rank, outcome: ExitOutcome) {
        let Some(client) = self.supervisor.get_mut(rank) else {
            return;
        };
        if let Err(e) = client.failed(outcome.clone()) {
            warn!(target: "kindle.core.session", error = %e, "ignored state change");
            return;
        }
        self.publish(
            SessionEvent::new(EventKind::ClientFailed)
                .with_rank(rank)
                .with_status(outcome.status())
                .with_reason(summary(&outcome)),
        );
        self.retire(rank, outcome.status());
    }

    fn try_complete(&mut self, rank: Rank) {
        let Some(client) = self.supervisor.get(rank) else {
            return;
        };
        if !client.is_complete() {
            return;
        }
        let status = client.exit().map_or(0, ExitOutcome::status);
        self.retire(rank, status);
    }

    /// Terminal bookkeeping, shared by completion and spawn failure.
    fn retire(&mut self, rank: Rank, status: i32) {
        let Some((client, remaining)) = self.supervisor.retire(rank, status) else {
            return;
        };
        drop(client);

        self.publish(
            SessionEvent::new(EventKind::ClientCompleted)
                .with_rank(rank)
                .with_status(status)
                .with_remaining(remaining),
        );
        if remaining > 0 {
            if self.timer.arm() {
                self.publish(SessionEvent::new(EventKind::KillTimerArmed).with_remaining(remaining));
            }
        } else if self.timer.disarm() {
            self.publish(SessionEvent::new(EventKind::KillTimerDisarmed));
        }
        self.publish_status();
    }

    fn fire_timer(&mut self) {
        self.timer.disarm();
        let targeted = self.supervisor.kill_all();
        self.publish(SessionEvent::new(EventKind::KillTimerFired).with_remaining(targeted));
    }

    fn abort(&mut self, err: kindle_pmi::ProtocolError) {
        self.aborted = Some(err);
        self.timer.disarm();
        let ranks: Vec<Rank> = self.supervisor.iter().map(|c| c.rank).collect();
        for rank in ranks {
            if let Some(client) = self.supervisor.get_mut(rank) {
                client.close_channel();
                client.kill();
            }
            self.try_complete(rank);
        }
    }

    fn publish(&self, event: SessionEvent) {
        self.bus.publish(&event);
    }

    fn publish_status(&self) {
        self.status.send_replace(self.supervisor.pids());
    }
}

async fn read_channel(rank: Rank, mut lines: ChannelLines, tx: mpsc::UnboundedSender<Event>) {
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if tx.send(Event::Line { rank, line }).is_err() {
                    return;
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!(target: "kindle.core.session", rank, error = %e, "bootstrap channel read failed");
                break;
            }
        }
    }
    let _ = tx.send(Event::ChannelEof { rank });
}

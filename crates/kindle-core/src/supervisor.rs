use std::collections::BTreeMap;

use kindle_exec::CommandSpec;
use kindle_model::{Pid, Rank, StartConfig};
use tracing::trace;

use crate::{client::Client, scratch::ScratchArea};

pub const ENV_PMI_RANK: &str = "PMI_RANK";
pub const ENV_PMI_SIZE: &str = "PMI_SIZE";
pub const ENV_START_URI: &str = "KINDLE_START_URI";
pub const ENV_FAKE_HOSTNAME: &str = "KINDLE_FAKE_HOSTNAME";

/// Build the command line and environment for `rank`.
///
/// Order: wrapper prefix, broker, rundir attribute, broker options, and for
/// rank 0 the user command, which always comes last.
pub fn command_for(rank: Rank, cfg: &StartConfig, scratch: &ScratchArea) -> CommandSpec {
    let mut spec = CommandSpec::new(cfg.wrap.iter().cloned())
        .arg(cfg.broker_path.to_string_lossy())
        .arg(format!("--setattr=rundir={}", scratch.path().display()))
        .args(cfg.broker_opts.iter().cloned());
    if rank == 0 {
        spec = spec.args(cfg.command.iter().cloned());
    }

    spec = spec
        .env(ENV_PMI_RANK, rank.to_string())
        .env(ENV_PMI_SIZE, cfg.rank_count().to_string())
        .env(ENV_START_URI, scratch.uri())
        .with_channel();
    if let Some(host) = cfg.hostlist.as_ref().and_then(|h| h.nth(rank)) {
        spec = spec.env(ENV_FAKE_HOSTNAME, host);
    }
    spec
}

/// Arena of live clients keyed by rank, plus the aggregate exit code.
///
/// A client is live from [`register`](Self::register) until exactly one call
/// to [`retire`](Self::retire) removes it.
#[derive(Default)]
pub struct Supervisor {
    clients: BTreeMap<Rank, Client>,
    exit_code: i32,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a client to the live set. Returns the live count.
    pub fn register(&mut self, client: Client) -> usize {
        self.clients.insert(client.rank, client);
        self.clients.len()
    }

    pub fn get(&self, rank: Rank) -> Option<&Client> {
        self.clients.get(&rank)
    }

    pub fn get_mut(&mut self, rank: Rank) -> Option<&mut Client> {
        self.clients.get_mut(&rank)
    }

    #[inline]
    pub fn live(&self) -> usize {
        self.clients.len()
    }

    /// Maximum status folded so far.
    #[inline]
    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// Remove a terminated client and fold its status into the exit code.
    ///
    /// Returns the remaining live count, or `None` if `rank` is not live.
    pub fn retire(&mut self, rank: Rank, status: i32) -> Option<(Client, usize)> {
        let client = self.clients.remove(&rank)?;
        self.exit_code = self.exit_code.max(status);
        trace!(target: "kindle.core.supervisor", rank, status, exit_code = self.exit_code, "retired");
        Some((client, self.clients.len()))
    }

    /// Pids of running clients in rank order.
    pub fn pids(&self) -> Vec<Pid> {
        self.clients.values().filter_map(Client::pid).collect()
    }

    /// Request SIGKILL for every live client. Returns how many were targeted.
    pub fn kill_all(&self) -> usize {
        for client in self.clients.values() {
            client.kill();
        }
        self.clients.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Client> {
        self.clients.values()
    }
}

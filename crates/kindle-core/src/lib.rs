//! Session orchestration: spawn N brokers, serve their bootstrap exchange,
//! reap them, and cascade kills once the first one departs.

mod error;
pub use error::SessionError;

mod scratch;
pub use scratch::ScratchArea;

mod client;
pub use client::{Client, ClientState};

mod supervisor;
pub use supervisor::{ENV_FAKE_HOSTNAME, ENV_PMI_RANK, ENV_PMI_SIZE, ENV_START_URI, Supervisor, command_for};

mod timer;
pub use timer::KillTimer;

mod bus;
pub use bus::Bus;

pub mod control;
pub use control::{ControlClient, ControlService};

mod session;
pub use session::Session;

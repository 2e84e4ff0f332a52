//! Spawning, watching and killing a single broker process.

mod error;
pub use error::ExecError;

mod command;
pub use command::{CHANNEL_FD, CommandSpec, ENV_PMI_FD};

mod channel;
pub use channel::{BootstrapChannel, ChannelLines, ChannelWriter};

mod proc;
pub use proc::{
    Spawned, outcome_from_spawn_error, outcome_from_status, signal_name, spawn, summary,
    wait_or_kill,
};

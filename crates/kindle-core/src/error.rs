use std::{io, path::PathBuf};

use kindle_model::{ConfigError, Rank};
use kindle_pmi::ProtocolError;
use thiserror::Error;

use crate::client::ClientState;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("a session needs a rank count")]
    NoRanks,
    #[error("scratch directory: {0}")]
    Scratch(#[source] io::Error),
    #[error("control socket {path}: {source}")]
    Control {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("bootstrap protocol: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("rank {rank}: illegal transition {from:?} -> {to:?}")]
    IllegalTransition {
        rank: Rank,
        from: ClientState,
        to: ClientState,
    },
}

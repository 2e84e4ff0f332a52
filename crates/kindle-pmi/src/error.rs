use kindle_model::Rank;
use thiserror::Error;

/// Bootstrap requests that break the protocol. Always fatal to the session.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("rank {rank}: malformed request: {line:?}")]
    Malformed { rank: Rank, line: String },
    #[error("rank {rank}: unknown command '{cmd}'")]
    UnknownCommand { rank: Rank, cmd: String },
    #[error("rank {rank}: missing '{key}' in '{cmd}' request")]
    MissingField {
        rank: Rank,
        cmd: String,
        key: &'static str,
    },
    #[error("rank {rank}: entered the barrier twice")]
    DuplicateBarrier { rank: Rank },
    #[error("rank {rank}: aborted: {message}")]
    Aborted { rank: Rank, message: String },
}

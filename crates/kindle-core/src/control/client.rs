use std::{io, path::Path};

use kindle_model::{ControlRequest, ControlResponse, ErrorResponse, Pid};
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines},
    net::{
        UnixStream,
        unix::{OwnedReadHalf, OwnedWriteHalf},
    },
};

#[derive(Error, Debug)]
pub enum ControlClientError {
    #[error("control socket: {0}")]
    Io(#[from] io::Error),
    #[error("undecodable response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("connection closed before a response arrived")]
    Closed,
    #[error("{error} (errnum {errnum})")]
    Remote { errnum: i32, error: String },
}

/// Caller side of the control socket.
pub struct ControlClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    write: OwnedWriteHalf,
}

impl ControlClient {
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self, ControlClientError> {
        let stream = UnixStream::connect(path).await?;
        let (read, write) = stream.into_split();
        Ok(Self {
            lines: BufReader::new(read).lines(),
            write,
        })
    }

    /// Pids of live brokers in rank order.
    pub async fn status(&mut self) -> Result<Vec<Pid>, ControlClientError> {
        let line = serde_json::to_string(&ControlRequest::Status)?;
        match self.call(&line).await? {
            ControlResponse::Status(status) => Ok(status.procs.into_iter().map(|p| p.pid).collect()),
            ControlResponse::Error(ErrorResponse { errnum, error }) => {
                Err(ControlClientError::Remote { errnum, error })
            }
        }
    }

    /// Send one raw request line and read one response.
    pub async fn call(&mut self, line: &str) -> Result<ControlResponse, ControlClientError> {
        let mut out = line.trim_end().to_string();
        out.push('\n');
        self.write.write_all(out.as_bytes()).await?;

        let reply = self
            .lines
            .next_line()
            .await?
            .ok_or(ControlClientError::Closed)?;
        Ok(serde_json::from_str(&reply)?)
    }

    /// Announce departure and close the connection. No response is expected.
    pub async fn disconnect(mut self) -> Result<(), ControlClientError> {
        let mut line = serde_json::to_string(&ControlRequest::Disconnect)?;
        line.push('\n');
        self.write.write_all(line.as_bytes()).await?;
        self.write.shutdown().await?;
        Ok(())
    }
}

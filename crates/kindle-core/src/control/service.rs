use std::{
    io,
    path::{Path, PathBuf},
};

use kindle_model::{
    ControlRequest, ControlResponse, ErrorResponse, EventKind, Pid, ProcRecord, SessionEvent,
    StatusResponse,
};
use serde_json::Value;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{UnixListener, UnixStream},
    sync::watch,
    task::{JoinHandle, JoinSet},
};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::{
    bus::Bus,
    control::{ERRNUM_MALFORMED, ERRNUM_UNKNOWN_TOPIC},
    error::SessionError,
};

/// Background listener answering status queries about the session.
///
/// It does not keep the session loop alive and keeps answering after the
/// loop returns, until [`shutdown`](Self::shutdown).
pub struct ControlService {
    path: PathBuf,
    task: JoinHandle<()>,
}

impl ControlService {
    /// Bind `path` and start serving. Must be called inside a tokio runtime.
    ///
    /// `status` carries live broker pids in rank order.
    pub fn bind(
        path: impl Into<PathBuf>,
        status: watch::Receiver<Vec<Pid>>,
        bus: Bus,
        verbose: bool,
    ) -> Result<Self, SessionError> {
        let path = path.into();
        let control_err = |source: io::Error| SessionError::Control {
            path: path.clone(),
            source,
        };

        remove_stale_socket(&path).map_err(control_err)?;
        let listener = UnixListener::bind(&path).map_err(control_err)?;
        debug!(target: "kindle.core.control", path = %path.display(), "control socket bound");

        let task = tokio::spawn(accept_loop(listener, status, bus, verbose));
        Ok(Self { path, task })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stop serving (open connections included) and remove the socket file.
    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for ControlService {
    fn drop(&mut self) {
        self.task.abort();
        if let Err(e) = std::fs::remove_file(&self.path)
            && e.kind() != io::ErrorKind::NotFound
        {
            warn!(target: "kindle.core.control", path = %self.path.display(), error = %e, "failed to remove control socket");
        }
    }
}

fn remove_stale_socket(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::FileTypeExt;

    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => {
            std::fs::remove_file(path)?;
            debug!(target: "kindle.core.control", path = %path.display(), "removed stale socket");
            Ok(())
        }
        Ok(_) => Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} exists and is not a socket", path.display()),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

async fn accept_loop(
    listener: UnixListener,
    status: watch::Receiver<Vec<Pid>>,
    bus: Bus,
    verbose: bool,
) {
    // Dropped with this task, which aborts every open connection.
    let mut conns = JoinSet::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    conns.spawn(serve(stream, status.clone(), bus.clone(), verbose));
                }
                Err(e) => warn!(target: "kindle.core.control", error = %e, "accept failed"),
            },
            Some(_) = conns.join_next(), if !conns.is_empty() => {}
        }
    }
}

async fn serve(stream: UnixStream, status: watch::Receiver<Vec<Pid>>, bus: Bus, verbose: bool) {
    let id = Uuid::new_v4().to_string();
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();

    trace!(target: "kindle.core.control", conn = %id, "connected");
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                debug!(target: "kindle.core.control", conn = %id, error = %e, "read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match decode(&line) {
            Ok(ControlRequest::Disconnect) => break,
            Ok(ControlRequest::Status) => ControlResponse::Status(snapshot(&status)),
            Err(err) => ControlResponse::Error(err),
        };

        let mut out = match serde_json::to_string(&resp) {
            Ok(out) => out,
            Err(e) => {
                warn!(target: "kindle.core.control", error = %e, "failed to encode response");
                break;
            }
        };
        out.push('\n');
        if let Err(e) = write.write_all(out.as_bytes()).await {
            debug!(target: "kindle.core.control", conn = %id, error = %e, "write failed");
            break;
        }
    }

    if verbose {
        let short: String = id.chars().take(5).collect();
        bus.publish(&SessionEvent::new(EventKind::ControlDisconnect).with_reason(short));
    }
}

fn snapshot(status: &watch::Receiver<Vec<Pid>>) -> StatusResponse {
    StatusResponse {
        procs: status.borrow().iter().map(|&pid| ProcRecord { pid }).collect(),
    }
}

fn decode(line: &str) -> Result<ControlRequest, ErrorResponse> {
    let malformed = |what: &str| ErrorResponse {
        errnum: ERRNUM_MALFORMED,
        error: what.to_string(),
    };

    let value: Value = serde_json::from_str(line).map_err(|e| malformed(&e.to_string()))?;
    let topic = value
        .get("topic")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("missing topic"))?;
    ControlRequest::from_topic(topic).ok_or_else(|| ErrorResponse {
        errnum: ERRNUM_UNKNOWN_TOPIC,
        error: format!("unknown topic '{topic}'"),
    })
}

use std::{
    ffi::CStr,
    io,
    os::unix::process::ExitStatusExt,
    process::{ExitStatus, Stdio},
};

use kindle_model::{EXIT_START_FAILED, EXIT_START_NOT_FOUND, ExitOutcome, Pid};
use tokio::{process::Child, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::{
    channel::{self, BootstrapChannel},
    command::CommandSpec,
    error::ExecError,
};

/// A started process plus the launcher side of its bootstrap channel.
pub struct Spawned {
    pub child: Child,
    pub pid: Pid,
    pub channel: Option<BootstrapChannel>,
}

/// Start `spec` with inherited stdio.
///
/// Exec failures (missing or non-executable program) surface here as
/// [`ExecError::Spawn`]; see [`outcome_from_spawn_error`].
pub fn spawn(spec: &CommandSpec) -> Result<Spawned, ExecError> {
    let mut cmd = spec.to_command()?;
    cmd.stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    let pair = if spec.channel {
        let (parent, child_end) = channel::socketpair()?;
        channel::attach(&mut cmd, &child_end);
        Some((parent, child_end))
    } else {
        None
    };

    trace!(target: "kindle.exec", argv = ?spec.argv, "spawn");
    let child = cmd.spawn().map_err(|source| ExecError::Spawn {
        program: spec.program().unwrap_or_default().to_string(),
        source,
    })?;
    let pid = child.id().unwrap_or_default();

    // The child holds its own copy now; keeping ours would hide its EOF.
    let channel = match pair {
        Some((parent, child_end)) => {
            drop(child_end);
            match BootstrapChannel::from_std(parent) {
                Ok(ch) => Some(ch),
                Err(e) => {
                    drop(reap_orphan(child));
                    return Err(e);
                }
            }
        }
        None => None,
    };

    debug!(target: "kindle.exec", pid, program = spec.program().unwrap_or_default(), "spawned");
    Ok(Spawned {
        child,
        pid,
        channel,
    })
}

// A child whose channel could not be set up is never handed out; kill and reap it.
fn reap_orphan(mut child: Child) -> JoinHandle<Option<ExitStatus>> {
    if let Err(e) = child.start_kill() {
        debug!(target: "kindle.exec", error = %e, "kill of half-started child failed");
    }
    tokio::spawn(async move { child.wait().await.ok() })
}

/// Wait for `child` to exit, sending SIGKILL if `kill` is cancelled first.
pub async fn wait_or_kill(
    child: &mut Child,
    kill: &CancellationToken,
) -> Result<ExitStatus, ExecError> {
    tokio::select! {
        status = child.wait() => status.map_err(ExecError::Wait),
        _ = kill.cancelled() => {
            debug!(target: "kindle.exec", pid = child.id(), "kill requested; sending SIGKILL");
            if let Err(e) = child.start_kill() {
                debug!(target: "kindle.exec", error = %e, "kill failed (already exited?)");
            }
            child.wait().await.map_err(ExecError::Wait)
        }
    }
}

pub fn outcome_from_status(status: ExitStatus) -> ExitOutcome {
    if let Some(code) = status.code() {
        ExitOutcome::Exited { code }
    } else if let Some(signal) = status.signal() {
        ExitOutcome::Signaled { signal }
    } else {
        ExitOutcome::Exited { code: 1 }
    }
}

/// Map a failed start to the shell convention: 127 not found, 126 otherwise.
pub fn outcome_from_spawn_error(err: &io::Error) -> ExitOutcome {
    let code = match err.kind() {
        io::ErrorKind::NotFound => EXIT_START_NOT_FOUND,
        _ => EXIT_START_FAILED,
    };
    ExitOutcome::StartFailed {
        code,
        reason: err.to_string(),
    }
}

/// Human readable signal description, e.g. "Killed" for 9.
pub fn signal_name(signal: i32) -> String {
    let ptr = unsafe { libc::strsignal(signal) };
    if ptr.is_null() {
        return format!("signal {signal}");
    }
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

/// One-line description of how a process ended.
pub fn summary(outcome: &ExitOutcome) -> String {
    match outcome {
        ExitOutcome::Exited { code } => format!("exited with rc={code}"),
        ExitOutcome::Signaled { signal } => signal_name(*signal),
        ExitOutcome::StartFailed { reason, .. } => reason.clone(),
    }
}

//! Private socketpair between the launcher and one child.
//!
//! The child end is mapped onto [`CHANNEL_FD`] inside a `pre_exec` hook, after
//! `fork()` and right before `execve()`. The parent end is split into a line
//! reader and a queued writer.
use std::{
    io,
    os::{
        fd::{AsRawFd, OwnedFd, RawFd},
        unix::net::UnixStream as StdUnixStream,
    },
};

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines},
    net::{
        UnixStream,
        unix::{OwnedReadHalf, OwnedWriteHalf},
    },
    process::Command,
    sync::mpsc,
};
use tracing::debug;

use crate::{command::CHANNEL_FD, error::ExecError};

/// Request lines coming from the child.
pub type ChannelLines = Lines<BufReader<OwnedReadHalf>>;

/// Launcher side of a bootstrap channel.
pub struct BootstrapChannel {
    pub lines: ChannelLines,
    pub writer: ChannelWriter,
}

impl BootstrapChannel {
    /// Wrap the parent end. Must be called inside a tokio runtime.
    pub(crate) fn from_std(stream: StdUnixStream) -> Result<Self, ExecError> {
        stream.set_nonblocking(true).map_err(ExecError::Channel)?;
        let stream = UnixStream::from_std(stream).map_err(ExecError::Channel)?;
        let (read, write) = stream.into_split();
        Ok(Self {
            lines: BufReader::new(read).lines(),
            writer: ChannelWriter::new(write),
        })
    }
}

/// Queued writer for response lines.
///
/// Lines are written in order by a background task. Dropping the writer
/// flushes what is queued and then shuts the write side down, which the
/// child observes as EOF.
pub struct ChannelWriter {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelWriter {
    fn new(mut half: OwnedWriteHalf) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                if let Err(e) = half.write_all(line.as_bytes()).await {
                    debug!(target: "kindle.exec.channel", error = %e, "write failed; dropping queued lines");
                    return;
                }
            }
            let _ = half.shutdown().await;
        });
        Self { tx }
    }

    /// Queue one line. Returns `false` once the writer task is gone.
    pub fn send(&self, line: impl Into<String>) -> bool {
        self.tx.send(line.into()).is_ok()
    }
}

/// Create the pair. Both ends are close-on-exec.
pub(crate) fn socketpair() -> Result<(StdUnixStream, OwnedFd), ExecError> {
    let (parent, child) = StdUnixStream::pair().map_err(ExecError::Channel)?;
    Ok((parent, OwnedFd::from(child)))
}

/// Arrange for `child_end` to appear as [`CHANNEL_FD`] in the spawned process.
pub(crate) fn attach(cmd: &mut Command, child_end: &OwnedFd) {
    let fd = child_end.as_raw_fd();
    unsafe {
        cmd.pre_exec(move || map_channel_fd(fd));
    }
}

// Runs between fork and exec: async-signal-safe calls only.
fn map_channel_fd(fd: RawFd) -> io::Result<()> {
    if fd == CHANNEL_FD {
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        if unsafe { libc::fcntl(fd, libc::F_SETFD, flags & !libc::FD_CLOEXEC) } < 0 {
            return Err(io::Error::last_os_error());
        }
        return Ok(());
    }
    // dup2 leaves the new descriptor without FD_CLOEXEC.
    if unsafe { libc::dup2(fd, CHANNEL_FD) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

use std::{
    io,
    path::{Path, PathBuf},
};

use tempfile::TempDir;
use tracing::debug;

use crate::error::SessionError;

/// Name of the control socket inside the scratch area.
pub const CONTROL_SOCKET: &str = "start";

/// Per-session working directory, passed to brokers as their rundir.
#[derive(Debug)]
pub enum ScratchArea {
    /// Created by the session as `$TMPDIR/kindle-XXXXXX`, removed recursively on close.
    Owned(TempDir),
    /// Supplied by the user; left in place.
    Borrowed(PathBuf),
}

impl ScratchArea {
    pub fn create() -> Result<Self, SessionError> {
        let dir = tempfile::Builder::new()
            .prefix("kindle-")
            .tempdir()
            .map_err(SessionError::Scratch)?;
        debug!(target: "kindle.core.scratch", path = %dir.path().display(), "created scratch directory");
        Ok(Self::Owned(dir))
    }

    pub fn borrowed(path: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let path = path.into();
        if !path.is_dir() {
            return Err(SessionError::Scratch(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not a directory", path.display()),
            )));
        }
        Ok(Self::Borrowed(path))
    }

    pub fn path(&self) -> &Path {
        match self {
            ScratchArea::Owned(dir) => dir.path(),
            ScratchArea::Borrowed(path) => path,
        }
    }

    pub fn control_path(&self) -> PathBuf {
        self.path().join(CONTROL_SOCKET)
    }

    /// Address brokers use to reach the control service.
    pub fn uri(&self) -> String {
        format!("local://{}", self.control_path().display())
    }

    /// Remove an owned directory and everything below it.
    pub fn close(self) -> io::Result<()> {
        match self {
            ScratchArea::Owned(dir) => {
                let path = dir.path().to_path_buf();
                dir.close()?;
                debug!(target: "kindle.core.scratch", path = %path.display(), "removed scratch directory");
                Ok(())
            }
            ScratchArea::Borrowed(_) => Ok(()),
        }
    }
}

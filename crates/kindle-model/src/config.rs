use std::{path::PathBuf, time::Duration};

use crate::{Hostlist, error::ConfigError};

/// Time the surviving brokers are given after the first one departs.
pub const DEFAULT_KILL_TIMEOUT: Duration = Duration::from_secs(20);

/// Launch parameters handed over by the command line layer.
#[derive(Debug, Clone)]
pub struct StartConfig {
    /// Path of the worker (broker) executable.
    pub broker_path: PathBuf,
    /// Number of brokers to launch locally. `None` means direct exec of one broker.
    pub size: Option<u32>,
    /// After a broker departs, kill the remaining ones after this long.
    pub kill_timeout: Duration,
    /// Use this directory instead of creating a fresh scratch area.
    pub scratch_dir: Option<PathBuf>,
    /// Fake hostname per rank.
    pub hostlist: Option<Hostlist>,
    /// Extra options appended to every broker command line.
    pub broker_opts: Vec<String>,
    /// Prefix wrapping the broker executable (e.g. a debugger).
    pub wrap: Vec<String>,
    /// Workload handed to rank 0 as its trailing arguments.
    pub command: Vec<String>,
    pub verbose: bool,
    /// Build and print command lines, but spawn nothing.
    pub noexec: bool,
    /// Do not pre-populate the process mapping descriptor.
    pub noclique: bool,
    /// Echo the bootstrap protocol exchange.
    pub trace_pmi: bool,
}

impl Default for StartConfig {
    fn default() -> Self {
        Self {
            broker_path: PathBuf::new(),
            size: None,
            kill_timeout: DEFAULT_KILL_TIMEOUT,
            scratch_dir: None,
            hostlist: None,
            broker_opts: Vec::new(),
            wrap: Vec::new(),
            command: Vec::new(),
            verbose: false,
            noexec: false,
            noclique: false,
            trace_pmi: false,
        }
    }
}

impl StartConfig {
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_broker(mut self, path: impl Into<PathBuf>) -> Self {
        self.broker_path = path.into();
        self
    }

    pub fn with_kill_timeout(mut self, timeout: Duration) -> Self {
        self.kill_timeout = timeout;
        self
    }

    pub fn with_wrap<I, S>(mut self, wrap: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.wrap = wrap.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    /// Check option combinations before anything is created or spawned.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broker_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingBroker);
        }
        let Some(size) = self.size else {
            if self.scratch_dir.is_some() {
                return Err(ConfigError::RequiresSize("scratchdir"));
            }
            if self.noclique {
                return Err(ConfigError::RequiresSize("noclique"));
            }
            if self.hostlist.is_some() {
                return Err(ConfigError::RequiresSize("test-hosts"));
            }
            return Ok(());
        };
        if size == 0 {
            return Err(ConfigError::InvalidSize);
        }
        if let Some(hosts) = &self.hostlist
            && hosts.len() != size as usize
        {
            return Err(ConfigError::HostlistSize {
                expected: size as usize,
                actual: hosts.len(),
            });
        }
        Ok(())
    }

    /// Rank count of a test session; zero for direct exec.
    #[inline]
    pub fn rank_count(&self) -> u32 {
        self.size.unwrap_or(0)
    }
}

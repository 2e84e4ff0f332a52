use std::{path::PathBuf, time::Duration};

use clap::Parser;
use kindle_model::{ConfigError, DEFAULT_KILL_TIMEOUT, Hostlist, StartConfig, parse_fsd};

/// Start a local test instance by launching N brokers, or exec a single broker.
#[derive(Parser, Debug)]
#[command(name = "kindle-start", version, override_usage = "kindle-start [OPTIONS] [COMMAND]...")]
pub struct Args {
    /// Be annoyingly informative
    #[arg(short, long)]
    pub verbose: bool,

    /// Don't execute (useful with --verbose)
    #[arg(short = 'X', long)]
    pub noexec: bool,

    /// Start a test instance by launching N brokers locally
    #[arg(short = 's', long = "test-size", value_name = "N")]
    pub test_size: Option<u32>,

    /// Set KINDLE_FAKE_HOSTNAME in the environment of each broker
    #[arg(long = "test-hosts", value_name = "HOSTLIST")]
    pub test_hosts: Option<String>,

    /// Add comma-separated broker options, e.g. "-o,-v"
    #[arg(
        short = 'o',
        long = "broker-opts",
        value_name = "OPTS",
        value_delimiter = ',',
        allow_hyphen_values = true
    )]
    pub broker_opts: Vec<String>,

    /// After a broker exits, kill the other brokers after DURATION
    #[arg(short = 'k', long = "killer-timeout", value_name = "DURATION", value_parser = parse_fsd)]
    pub killer_timeout: Option<Duration>,

    /// Trace the bootstrap protocol exchange
    #[arg(long = "trace-pmi-server")]
    pub trace_pmi_server: bool,

    /// Use DIR as scratch directory
    #[arg(short = 'D', long = "scratchdir", value_name = "DIR")]
    pub scratchdir: Option<PathBuf>,

    /// Don't set PMI_process_mapping in the bootstrap KVS
    #[arg(short = 'c', long)]
    pub noclique: bool,

    /// Wrap broker execution in comma-separated arguments
    #[arg(long, value_name = "ARGS,...", value_delimiter = ',', allow_hyphen_values = true)]
    pub wrap: Vec<String>,

    /// Command handed to rank 0
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl Args {
    pub fn into_config(self, broker_path: PathBuf) -> Result<StartConfig, ConfigError> {
        let hostlist = self.test_hosts.as_deref().map(str::parse::<Hostlist>).transpose()?;
        Ok(StartConfig {
            broker_path,
            size: self.test_size,
            kill_timeout: self.killer_timeout.unwrap_or(DEFAULT_KILL_TIMEOUT),
            scratch_dir: self.scratchdir,
            hostlist,
            broker_opts: non_empty(self.broker_opts),
            wrap: non_empty(self.wrap),
            command: self.command,
            verbose: self.verbose,
            noexec: self.noexec,
            noclique: self.noclique,
            trace_pmi: self.trace_pmi_server,
        })
    }
}

// "-o,-v" splits into ["", "-v"].
fn non_empty(list: Vec<String>) -> Vec<String> {
    list.into_iter().filter(|s| !s.is_empty()).collect()
}

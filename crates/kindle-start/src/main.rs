mod broker;
mod cli;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use kindle_core::Session;
use kindle_model::StartConfig;
use kindle_observe::{Journal, LoggerConfig, logger_init};
use tracing::error;

use crate::{
    broker::{BROKER_NAME, ENV_EXEC_PATH, exec_direct, find_broker},
    cli::Args,
};

fn main() {
    let args = Args::parse();

    // Before the runtime exists: the local UTC offset can only be read single-threaded.
    if let Err(e) = LoggerConfig::for_verbosity(args.verbose)
        .with_env()
        .and_then(|cfg| logger_init(&cfg))
    {
        eprintln!("kindle-start: {e}");
    }

    let code = match run(args) {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            1
        }
    };
    std::process::exit(code);
}

fn run(args: Args) -> anyhow::Result<i32> {
    // Module loading and process execution misbehave without a cwd; fail early.
    std::env::current_dir().context("unable to get current working directory")?;

    let searchpath =
        std::env::var(ENV_EXEC_PATH).with_context(|| format!("{ENV_EXEC_PATH} is not set"))?;
    let broker = find_broker(&searchpath)
        .with_context(|| format!("could not locate {BROKER_NAME} in {searchpath}"))?;

    let cfg = args.into_config(broker)?;
    cfg.validate()?;

    if cfg.size.is_none() {
        exec_direct(&cfg).context("exec broker")?;
        return Ok(0);
    }
    start_session(cfg)
}

fn start_session(cfg: StartConfig) -> anyhow::Result<i32> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("tokio runtime")?;

    rt.block_on(drive(cfg))
}

async fn drive(cfg: StartConfig) -> anyhow::Result<i32> {
    let mut session = Session::new(cfg)?.with_subscriber(Arc::new(Journal::new()));
    let res = session.run().await;
    session.shutdown()?;
    Ok(res?)
}

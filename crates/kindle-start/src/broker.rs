use std::{
    io,
    os::unix::{fs::PermissionsExt, process::CommandExt},
    path::{Path, PathBuf},
    process::Command,
};

use kindle_model::StartConfig;
use tracing::info;

/// Colon-separated search path for the broker executable.
pub const ENV_EXEC_PATH: &str = "KINDLE_EXEC_PATH";
pub const BROKER_NAME: &str = "kindle-broker";

/// First `<dir>/kindle-broker` on `searchpath` that is an executable file.
pub fn find_broker(searchpath: &str) -> Option<PathBuf> {
    searchpath
        .split(':')
        .filter(|dir| !dir.is_empty())
        .map(|dir| Path::new(dir).join(BROKER_NAME))
        .find(|path| is_executable(path))
}

fn is_executable(path: &Path) -> bool {
    path.metadata()
        .is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

/// Command line for running a single broker in place of this process.
///
/// Same order as a session broker, minus the rundir attribute: the broker
/// bootstraps from an external service.
pub fn direct_argv(cfg: &StartConfig) -> Vec<String> {
    let mut argv = cfg.wrap.clone();
    argv.push(cfg.broker_path.to_string_lossy().into_owned());
    argv.extend(cfg.broker_opts.iter().cloned());
    argv.extend(cfg.command.iter().cloned());
    argv
}

/// Replace this process with the broker. Only returns on failure, or with `noexec`.
pub fn exec_direct(cfg: &StartConfig) -> io::Result<()> {
    let argv = direct_argv(cfg);
    if cfg.verbose {
        info!("{}", argv.join(" "));
    }
    if cfg.noexec {
        return Ok(());
    }
    let Some((program, args)) = argv.split_first() else {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty command line"));
    };
    Err(Command::new(program).args(args).exec())
}

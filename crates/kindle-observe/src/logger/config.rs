use std::io::IsTerminal;

use crate::logger::{error::LoggerError, format::LoggerFormat};

/// Environment variable overriding the log filter (e.g. `kindle=debug`).
pub const ENV_LOG_LEVEL: &str = "KINDLE_LOG";
/// Environment variable selecting the output format.
pub const ENV_LOG_FORMAT: &str = "KINDLE_LOG_FORMAT";

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    /// `EnvFilter` directive string.
    pub level: String,
    pub with_targets: bool,
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        let use_color = cfg!(test) || std::io::stderr().is_terminal();
        Self {
            format: LoggerFormat::Text,
            level: "info".to_string(),
            with_targets: false,
            use_color,
        }
    }
}

impl LoggerConfig {
    /// Default config for the launcher: `info`, or `debug` when verbose.
    pub fn for_verbosity(verbose: bool) -> Self {
        Self {
            level: if verbose { "debug" } else { "info" }.to_string(),
            ..Default::default()
        }
    }

    /// Apply `KINDLE_LOG` / `KINDLE_LOG_FORMAT` on top of `self`.
    pub fn with_env(mut self) -> Result<Self, LoggerError> {
        if let Ok(level) = std::env::var(ENV_LOG_LEVEL)
            && !level.trim().is_empty()
        {
            self.level = level;
        }
        if let Ok(format) = std::env::var(ENV_LOG_FORMAT) {
            self.format = format.parse()?;
        }
        Ok(self)
    }
}

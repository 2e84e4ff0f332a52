use tokio::process::Command;

use crate::error::ExecError;

/// Descriptor number the bootstrap channel occupies in the child.
pub const CHANNEL_FD: i32 = 3;

/// Environment variable announcing [`CHANNEL_FD`] to the child.
pub const ENV_PMI_FD: &str = "PMI_FD";

/// Everything needed to start one process.
///
/// The environment is inherited from the launcher; `env` only lists additions.
#[derive(Clone, Debug, Default)]
pub struct CommandSpec {
    pub argv: Vec<String>,
    pub env: Vec<(String, String)>,
    /// Hand the child a bootstrap channel on fd 3.
    pub channel: bool,
}

impl CommandSpec {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.argv.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.argv.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add or replace an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.env.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.env.push((key, value)),
        }
        self
    }

    pub fn with_channel(mut self) -> Self {
        self.channel = true;
        self
    }

    pub fn program(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }

    /// Value of an added environment variable.
    pub fn get_env(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Space-joined command line, for diagnostics.
    pub fn display(&self) -> String {
        self.argv.join(" ")
    }

    pub(crate) fn to_command(&self) -> Result<Command, ExecError> {
        let (program, args) = self.argv.split_first().ok_or(ExecError::MissingProgram)?;

        let mut cmd = Command::new(program);
        cmd.args(args);
        for (k, v) in &self.env {
            cmd.env(k, v);
        }
        if self.channel {
            cmd.env(ENV_PMI_FD, CHANNEL_FD.to_string());
        }
        Ok(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_appends_in_order() {
        let spec = CommandSpec::new(["gdb", "--args"])
            .arg("kindle-broker")
            .args(["--setattr=rundir=/tmp/k", "-v"]);
        assert_eq!(
            spec.argv,
            vec!["gdb", "--args", "kindle-broker", "--setattr=rundir=/tmp/k", "-v"]
        );
        assert_eq!(spec.program(), Some("gdb"));
        assert_eq!(spec.display(), "gdb --args kindle-broker --setattr=rundir=/tmp/k -v");
    }

    #[test]
    fn env_replaces_existing_key() {
        let spec = CommandSpec::new(["true"])
            .env("PMI_RANK", "0")
            .env("PMI_SIZE", "2")
            .env("PMI_RANK", "1");
        assert_eq!(spec.env.len(), 2);
        assert_eq!(spec.get_env("PMI_RANK"), Some("1"));
    }

    #[test]
    fn empty_argv_cannot_become_a_command() {
        assert!(matches!(
            CommandSpec::default().to_command(),
            Err(ExecError::MissingProgram)
        ));
    }
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("empty command line")]
    MissingProgram,
    #[error("bootstrap channel: {0}")]
    Channel(#[source] std::io::Error),
    #[error("spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("wait: {0}")]
    Wait(#[source] std::io::Error),
}

impl ExecError {
    /// The underlying spawn error, when the process never started.
    pub fn spawn_source(&self) -> Option<&std::io::Error> {
        match self {
            ExecError::Spawn { source, .. } => Some(source),
            _ => None,
        }
    }
}

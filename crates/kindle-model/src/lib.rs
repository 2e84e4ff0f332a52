mod config;
pub use config::{DEFAULT_KILL_TIMEOUT, StartConfig};

mod duration;
pub use duration::parse_fsd;

mod error;
pub use error::{ConfigError, DurationError, HostlistError};

mod hostlist;
pub use hostlist::Hostlist;

mod exit;
pub use exit::{EXIT_START_FAILED, EXIT_START_NOT_FOUND, ExitOutcome};

mod control;
pub use control::{ControlRequest, ControlResponse, ErrorResponse, ProcRecord, StatusResponse};

mod event;
pub use event::{EventKind, SessionEvent, Subscribe};

/// Zero-based identity of a launched worker, stable for its lifetime.
pub type Rank = u32;

/// Operating system process id.
pub type Pid = u32;

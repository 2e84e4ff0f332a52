//! Control socket at `<scratch>/start`, newline-delimited JSON.

mod client;
pub use client::{ControlClient, ControlClientError};

mod service;
pub use service::ControlService;

/// `ENOSYS`: topic not served here.
pub const ERRNUM_UNKNOWN_TOPIC: i32 = libc::ENOSYS;
/// `EPROTO`: request could not be decoded.
pub const ERRNUM_MALFORMED: i32 = libc::EPROTO;

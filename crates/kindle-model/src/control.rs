use serde::{Deserialize, Serialize};

use crate::Pid;

/// Request accepted by the session control socket.
///
/// Encoded as one JSON object per line, discriminated by `topic`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "topic")]
pub enum ControlRequest {
    /// List the process ids of live brokers.
    #[serde(rename = "start.status")]
    Status,
    /// Caller is going away. No response is sent.
    #[serde(rename = "disconnect")]
    Disconnect,
}

impl ControlRequest {
    pub fn topic(&self) -> &'static str {
        match self {
            ControlRequest::Status => "start.status",
            ControlRequest::Disconnect => "disconnect",
        }
    }

    pub fn from_topic(topic: &str) -> Option<Self> {
        match topic {
            "start.status" => Some(ControlRequest::Status),
            "disconnect" => Some(ControlRequest::Disconnect),
            _ => None,
        }
    }
}

/// One live broker process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcRecord {
    pub pid: Pid,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusResponse {
    pub procs: Vec<ProcRecord>,
}

/// Error answer; `errnum` follows errno numbering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub errnum: i32,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControlResponse {
    Status(StatusResponse),
    Error(ErrorResponse),
}

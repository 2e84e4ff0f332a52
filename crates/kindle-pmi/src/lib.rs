//! Embedded bootstrap server speaking the PMI-1 "simple" wire protocol.
//!
//! Brokers spawned by the launcher cannot reach each other before their own
//! transport is up. Each one gets a private byte channel to this server and
//! uses it to publish and read a few keys and to synchronise on a barrier.
//! The server itself does no I/O: it turns request lines into addressed
//! response lines and leaves delivery to the caller.

mod error;
pub use error::ProtocolError;

mod kvs;
pub use kvs::{BootstrapKvs, KvsBackend};

mod mapping;
pub use mapping::{MapBlock, PROCESS_MAPPING_KEY, encode_process_mapping};

mod server;
pub use server::{Outbound, Outcome, Reply, ServerConfig, SimpleServer};

pub mod wire;

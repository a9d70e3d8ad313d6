//! Error kinds surfaced by the simulator core.
//!
//! Application-logic errors (`EmptyQueue`, `ServerBusy`, `InvalidJobSize`,
//! `OrderingIncompatible`) indicate bugs and are never recovered; config,
//! calibration, and I/O errors abort the run with a diagnostic.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    /// Missing or malformed configuration setting.
    #[error("config error: {0}")]
    Config(String),

    /// `peek`/`pop` on an empty queue.
    #[error("cannot peek/pop an empty queue")]
    EmptyQueue,

    /// Scheduling contract violation on the server's busy/idle state.
    #[error("server scheduling contract violated")]
    ServerBusy,

    /// A packet reached the server with an invalid or unset job size.
    #[error("packet job size is invalid")]
    InvalidJobSize,

    /// The application requires per-flow ordering the policy does not provide.
    #[error("policy {policy} does not guarantee per-flow ordering (required by application {application})")]
    OrderingIncompatible {
        application: &'static str,
        policy: &'static str,
    },

    /// An HFFS bucket index exceeded the queue's capacity.
    #[error("weight maps to bucket {bucket}, queue only has {capacity}")]
    WeightOutOfRange { bucket: u32, capacity: u32 },

    /// A traffic generator's rate was queried before calibration, or a
    /// generator was calibrated twice.
    #[error("calibration error: {0}")]
    Calibration(String),

    /// Malformed trace line.
    #[error("trace parse error at line {line}: {reason}")]
    TraceParse { line: u64, reason: String },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;

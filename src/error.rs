//! Error types for the choreography runtime.

use std::io;
use thiserror::Error;

/// Errors surfaced by participant construction, transport, and execution.
///
/// Every failure is local to the operation that produced it; there is no
/// central error channel. An unsatisfied guard is not an error; evaluation
/// simply keeps waiting.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The listener daemon could not bind its port. The participant cannot
    /// be constructed.
    #[error("failed to bind listener on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },

    /// An outbound handshake failed (unreachable peer, refused connection,
    /// I/O error mid-rendezvous).
    #[error("transport error with peer {peer}: {source}")]
    Transport {
        peer: String,
        #[source]
        source: io::Error,
    },

    /// The inbound channel is gone; the listener daemon has stopped.
    #[error("inbound channel closed")]
    ChannelClosed,

    /// The publisher rejected a committed payload.
    #[error("publish failed: {0}")]
    Publish(String),

    /// Work was submitted after shutdown began.
    #[error("participant is shutting down")]
    ShuttingDown,

    /// Invalid or missing configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

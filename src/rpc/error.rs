//! Error types for the daemon RPC client.

use thiserror::Error;

/// Errors from talking to the daemon's RPC interface.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The runtime driving HTTP requests could not be created.
    #[error("Failed to create RPC runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// The configured RPC endpoint is not a valid URL.
    #[error("Invalid RPC URL '{url}': {message}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Parser error message.
        message: String,
    },

    /// The request could not be sent or the response could not be read.
    #[error("RPC request to {url} failed: {message}")]
    Transport {
        /// Endpoint URL.
        url: String,
        /// Error message.
        message: String,
    },

    /// The daemon did not answer in time.
    #[error("RPC request to {url} timed out after {seconds}s")]
    Timeout {
        /// Endpoint URL.
        url: String,
        /// Timeout that elapsed.
        seconds: u64,
    },

    /// The daemon rejected the session id twice in a row.
    #[error("RPC session negotiation failed")]
    SessionConflict,

    /// The daemon answered with an unexpected HTTP status.
    #[error("RPC returned HTTP {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// The response body was not the expected JSON.
    #[error("Failed to decode RPC response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The daemon reported a failure for the method.
    #[error("RPC method {method} failed: {result}")]
    Failed {
        /// Method name.
        method: String,
        /// The `result` string returned by the daemon.
        result: String,
    },
}

/// Result type for RPC operations.
pub type RpcResult<T> = Result<T, RpcError>;

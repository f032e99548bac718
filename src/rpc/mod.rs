//! Daemon RPC client.
//!
//! The supervisor needs three things from the torrent daemon: the list of
//! transfers, a graceful session close before a rebind, and a way to force
//! transfers to start. [`TransferClient`] is that seam; [`TransmissionClient`]
//! implements it over Transmission's JSON-over-HTTP protocol.

mod error;
mod transmission;
mod types;

pub use error::{RpcError, RpcResult};
pub use transmission::{TransmissionClient, SESSION_ID_HEADER};
pub use types::{Tracker, Transfer, TransferStatus};

/// Operations the supervisor performs against the daemon.
pub trait TransferClient {
    /// All transfers known to the daemon.
    fn list_transfers(&self) -> RpcResult<Vec<Transfer>>;

    /// Ask the daemon to shut down.
    fn close_session(&self) -> RpcResult<()>;

    /// Start the given transfers immediately, bypassing the queue.
    fn start_now(&self, ids: &[i64]) -> RpcResult<()>;
}

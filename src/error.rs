//! Error types shared by the peer pool, the remote getters and the cache groups.

use thiserror::Error;

/// Faults raised while constructing a [`PeerPool`](crate::pool::service::PeerPool).
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("self address must not be empty")]
    EmptySelf,

    #[error("invalid pool options: {0}")]
    InvalidOptions(String),
}

/// A peer could not be dialed while applying a membership snapshot.
#[derive(Debug, Error)]
pub enum DialError {
    #[error("invalid peer address '{addr}': {reason}")]
    InvalidAddress { addr: String, reason: String },

    #[error("timed out dialing peer '{addr}' after {timeout_ms} ms")]
    Timeout { addr: String, timeout_ms: u64 },

    #[error("failed dialing peer '{addr}': {reason}")]
    Connect { addr: String, reason: String },
}

/// Failure while closing a pooled connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("connection to '{0}' already closed")]
    AlreadyClosed(String),
}

/// Request-level failure of a call to a remote peer.
#[derive(Debug, Error)]
pub enum PeerError {
    #[error("peer '{peer}' unreachable: {status}")]
    Transport { peer: String, status: tonic::Status },

    #[error("request to peer '{peer}' exceeded its deadline")]
    Timeout { peer: String },

    #[error("peer '{peer}' returned an error: {status}")]
    Rpc { peer: String, status: tonic::Status },

    #[error("peer '{peer}' returned an empty response")]
    EmptyResponse { peer: String },

    #[error("connection to peer '{peer}' is closed")]
    Closed { peer: String },
}

impl PeerError {
    /// Classifies a gRPC status returned by `peer`.
    ///
    /// Statuses produced by the channel itself (unavailable, cancelled,
    /// deadline exceeded) are transport faults; anything else came from the
    /// remote handler.
    pub fn from_status(peer: &str, status: tonic::Status) -> Self {
        match status.code() {
            tonic::Code::Unavailable | tonic::Code::Cancelled | tonic::Code::DeadlineExceeded => {
                PeerError::Transport {
                    peer: peer.to_string(),
                    status,
                }
            }
            _ => PeerError::Rpc {
                peer: peer.to_string(),
                status,
            },
        }
    }

    /// Address of the peer the failed call was sent to.
    pub fn peer(&self) -> &str {
        match self {
            PeerError::Transport { peer, .. }
            | PeerError::Timeout { peer }
            | PeerError::Rpc { peer, .. }
            | PeerError::EmptyResponse { peer }
            | PeerError::Closed { peer } => peer,
        }
    }
}

/// Errors surfaced by cache groups and the group registry.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("a peer picker is already registered")]
    PickerAlreadyRegistered,

    #[error("group '{0}' already exists")]
    DuplicateGroup(String),

    #[error("loading key '{key}' failed: {source}")]
    Load {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("remove reached {succeeded} peer(s) but failed on: {}", describe_failures(.failed))]
    PartialRemove {
        succeeded: usize,
        failed: Vec<PeerError>,
    },
}

fn describe_failures(failed: &[PeerError]) -> String {
    failed
        .iter()
        .map(|e| e.peer())
        .collect::<Vec<_>>()
        .join(", ")
}

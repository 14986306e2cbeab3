//! Front-line HTTP API
//!
//! Endpoints and response bodies served to clients of the cache. Peer-to-peer
//! traffic does not use these; it goes over the gRPC service in `rpc`.

use super::types::{GroupStatsSnapshot, TierStats};
use serde::{Deserialize, Serialize};

// --- API Endpoints ---

/// Fetch or remove a key: `GET|DELETE /cache/:group/:key`.
pub const ENDPOINT_CACHE: &str = "/cache/:group/:key";
/// Counters of every group.
pub const ENDPOINT_STATS: &str = "/stats";
/// Counters of one group.
pub const ENDPOINT_GROUP_STATS: &str = "/stats/:group";
/// Current peer membership of this node.
pub const ENDPOINT_PEERS: &str = "/peers";

// --- Data Transfer Objects ---

/// Counters and tier sizes of one group.
#[derive(Debug, Serialize, Deserialize)]
pub struct GroupStatsResponse {
    pub group: String,
    pub stats: GroupStatsSnapshot,
    pub tiers: TierStats,
}

/// Outcome of a cluster-wide remove.
#[derive(Debug, Serialize, Deserialize)]
pub struct RemoveResponse {
    /// True when every peer acknowledged the eviction.
    pub success: bool,
    /// Addresses of peers that could not be reached.
    pub failed_peers: Vec<String>,
}

/// View of the peer pool.
#[derive(Debug, Serialize, Deserialize)]
pub struct PeersResponse {
    pub self_addr: String,
    /// Ring membership, including this node when it was listed.
    pub members: Vec<String>,
    /// Open connections, including those awaiting cleanup.
    pub connections: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

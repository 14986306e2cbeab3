use crate::cache::types::BoxFuture;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Receives complete membership snapshots.
pub type PeerSetter = Arc<dyn Fn(Vec<String>) -> BoxFuture<'static, ()> + Send + Sync>;

/// A peer as advertised by a registry.
///
/// Either address may be empty; the HTTP address wins when both are set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerInfo {
    pub http_address: String,
    pub grpc_address: String,
}

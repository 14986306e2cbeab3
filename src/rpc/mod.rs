//! Peer RPC Module
//!
//! gRPC service every node exposes to its peers (`proto/groupcache.proto`).
//!
//! - `Get(group, key)`: serve a key this node owns, loading it from source on a miss.
//! - `Remove(group, key)`: evict a key from this node's local tiers.
//!
//! The outbound side of the same protocol lives in `pool::connection`.

// Generated protobuf / tonic code (compiled by build.rs)
#[allow(clippy::all)]
#[allow(clippy::pedantic)]
pub mod pb {
    tonic::include_proto!("groupcache");
}

pub mod handlers;

#[cfg(test)]
mod tests;

pub use handlers::GroupCacheService;

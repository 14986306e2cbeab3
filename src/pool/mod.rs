//! Peer Pool Module
//!
//! The coordinator between the local cache groups and every other node in the cluster.
//!
//! ## Core Concepts
//! - **Membership**: discovery hands the pool complete snapshots of peer addresses
//!   (`PeerPool::set_peers`). Each snapshot rebuilds the hash ring and the getter map.
//! - **Routing**: `PeerPool::pick_peer` maps a key to the owning peer's `RemoteGetter`,
//!   or to nothing when the local node owns it.
//! - **Connections**: one gRPC channel per peer, kept in the `ConnectionRegistry`.
//!   Dropping a peer from membership does not close its channel immediately; the
//!   `Janitor` closes unreferenced channels on its next sweep, so a peer that flaps
//!   back in keeps its existing connection.

pub mod connection;
pub mod getter;
pub mod janitor;
pub mod registry;
pub mod service;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;


pub use connection::{Dialer, GrpcDialOptions, GrpcDialer, PeerConnection};
pub use getter::RemoteGetter;
pub use janitor::Janitor;
pub use service::PeerPool;
pub use types::PoolOptions;

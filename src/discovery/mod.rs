//! Peer Discovery Module
//!
//! Sources of membership snapshots for the peer pool.
//!
//! ## Core Concepts
//! - **Snapshots**: a discovery source always hands over the complete peer list, never deltas.
//! - **Setter**: the callback receiving snapshots; `pool_setter` wires it to `PeerPool::set_peers`.
//! - **Static peers**: a fixed list pushed once at startup.
//! - **Registry peers**: records from registries that advertise HTTP and gRPC addresses
//!   are normalized into peer addresses by `peers_from_infos`; `RegistryPeers` follows
//!   such a feed and applies each published list.

pub mod service;
pub mod types;

#[cfg(test)]
mod tests;

pub use service::{PeerDiscovery, RegistryPeers, StaticPeers, peers_from_infos, pool_setter};
pub use types::{PeerInfo, PeerSetter};

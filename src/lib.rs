//! Distributed Cache Peer Pool Library
//!
//! This library crate defines the modules of a cache node that shares one
//! logical keyspace with its peers. It serves as the foundation for the binary
//! executable (`main.rs`).
//!
//! ## Architecture Modules
//! - **`ring`**: consistent hashing. Maps every key to exactly one owning peer.
//! - **`pool`**: the peer pool. Applies membership snapshots, routes keys to owners,
//!   pools one gRPC connection per peer and closes stale ones in the background.
//! - **`cache`**: the local caching engine (groups, tiers, loaders, stats) and its HTTP API.
//! - **`rpc`**: the gRPC service peers call to fetch or evict keys owned here.
//! - **`discovery`**: sources of membership snapshots.
//! - **`config`**: process configuration.
//! - **`error`**: error types shared across modules.

pub mod cache;
pub mod config;
pub mod discovery;
pub mod error;
pub mod pool;
pub mod ring;
pub mod rpc;

//! Cache Group Module
//!
//! The local caching engine the peer pool plugs into.
//!
//! ## Core Concepts
//! - **Groups**: named cache namespaces, each with its own loader (`Getter`) and counters.
//! - **Tiers**: the *main* tier holds values this node owns and loaded itself; the *hot*
//!   tier holds copies of values fetched from their owners.
//! - **Expiry**: a loader may give its values a TTL; owners report the remaining lifetime
//!   with each value, and expired entries are treated as misses.
//! - **Routing**: on a miss a group asks its `PeerPicker` for the owner. Remote owners are
//!   asked over the network; otherwise the value is loaded from source.
//! - **Invalidation**: `Group::remove` evicts locally and fans out to every peer.

pub mod group;
pub mod handlers;
pub mod protocol;
pub mod registry;
pub mod types;


pub use group::Group;
pub use registry::GroupRegistry;
pub use types::{
    ByteSink, CacheValue, Getter, GetterFn, PeerPicker, ProtoGetter, RequestContext, Sink,
};

//! Consistent Hashing Module
//!
//! Maps cache keys to the peer responsible for them.
//!
//! ## Core Concepts
//! - **Virtual nodes**: every physical peer is placed on the ring `replicas` times,
//!   which evens out the share of keyspace each peer owns.
//! - **Ownership**: a key belongs to the first virtual node clockwise from the key's hash.
//! - **Rebuild, don't mutate**: the ring is rebuilt from the full peer set on each
//!   membership change. Because virtual node positions depend only on the peer address,
//!   a rebuilt ring moves only the keys owned by peers that joined or left.

pub mod hash;
pub mod ring;

pub use hash::{HashFn, crc32_hash, default_hash_fn};
pub use ring::HashRing;

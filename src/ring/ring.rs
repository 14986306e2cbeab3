use super::hash::{HashFn, default_hash_fn};

use std::collections::BTreeSet;
use std::fmt;

/// Immutable consistent-hash ring over a set of peer addresses.
#[derive(Clone)]
pub struct HashRing {
    /// Virtual node hashes, sorted ascending, paired with the index of the owning peer.
    vnodes: Vec<(u32, usize)>,
    /// Distinct peer addresses, sorted so that hash collisions resolve the same way everywhere.
    peers: Vec<String>,
    replicas: usize,
    hash_fn: HashFn,
}

impl HashRing {
    /// Builds a ring with `replicas` virtual nodes per peer.
    ///
    /// Duplicate addresses are collapsed and the input order is irrelevant:
    /// the same `(peers, replicas, hash_fn)` always yields the same ring.
    pub fn build<I, S>(peers: I, replicas: usize, hash_fn: HashFn) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let peers: Vec<String> = peers
            .into_iter()
            .map(|p| p.as_ref().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut vnodes = Vec::with_capacity(peers.len() * replicas);
        for (idx, peer) in peers.iter().enumerate() {
            for i in 0..replicas {
                let hash = hash_fn(format!("{}{}", i, peer).as_bytes());
                vnodes.push((hash, idx));
            }
        }
        // Ties on the hash fall back to peer order, which is sorted.
        vnodes.sort_unstable();

        Self {
            vnodes,
            peers,
            replicas,
            hash_fn,
        }
    }

    /// An empty ring using the default hash.
    pub fn empty(replicas: usize) -> Self {
        Self::build(Vec::<String>::new(), replicas, default_hash_fn())
    }

    pub fn is_empty(&self) -> bool {
        self.vnodes.is_empty()
    }

    /// Number of physical peers on the ring.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn peers(&self) -> &[String] {
        &self.peers
    }

    pub fn contains(&self, peer: &str) -> bool {
        self.peers.binary_search_by(|p| p.as_str().cmp(peer)).is_ok()
    }

    /// Returns the peer owning `key`, or `None` if the ring is empty.
    pub fn owner(&self, key: &str) -> Option<&str> {
        if self.vnodes.is_empty() {
            return None;
        }

        let hash = (self.hash_fn)(key.as_bytes());
        let idx = self.vnodes.partition_point(|(h, _)| *h < hash);
        let (_, peer_idx) = self.vnodes[idx % self.vnodes.len()];

        Some(self.peers[peer_idx].as_str())
    }
}

impl fmt::Debug for HashRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashRing")
            .field("peers", &self.peers)
            .field("replicas", &self.replicas)
            .field("vnodes", &self.vnodes.len())
            .finish()
    }
}

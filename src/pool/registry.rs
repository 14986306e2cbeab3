//! Connection Registry
//!
//! Holds every open connection, keyed by peer address. Entries outlive the
//! membership snapshot that created them and are only removed by [`ConnectionRegistry::sweep`].

use super::connection::PeerConnection;

use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct ConnectionRegistry {
    conns: HashMap<String, Arc<dyn PeerConnection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, addr: &str) -> Option<Arc<dyn PeerConnection>> {
        self.conns.get(addr).cloned()
    }

    pub fn contains(&self, addr: &str) -> bool {
        self.conns.contains_key(addr)
    }

    /// Registers `conn` for `addr` unless a connection is already held.
    ///
    /// Returns the connection that ends up registered.
    pub fn insert(&mut self, addr: &str, conn: Arc<dyn PeerConnection>) -> Arc<dyn PeerConnection> {
        self.conns.entry(addr.to_string()).or_insert(conn).clone()
    }

    pub fn len(&self) -> usize {
        self.conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }

    pub fn addrs(&self) -> Vec<String> {
        self.conns.keys().cloned().collect()
    }

    /// Closes and removes every connection for which `referenced` is false.
    ///
    /// Close errors are logged; the entry is removed regardless. Returns the
    /// addresses that were evicted.
    pub fn sweep<F>(&mut self, referenced: F) -> Vec<String>
    where
        F: Fn(&str) -> bool,
    {
        let mut evicted = Vec::new();

        self.conns.retain(|addr, conn| {
            if referenced(addr) {
                tracing::debug!(peer = %addr, "peer connection in use");
                return true;
            }

            tracing::info!(peer = %addr, "evicting former peer connection");
            if let Err(e) = conn.close() {
                tracing::warn!(peer = %addr, error = %e, "error closing peer connection");
            }
            evicted.push(addr.clone());
            false
        });

        evicted
    }
}

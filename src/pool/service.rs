use super::connection::{Dialer, PeerConnection};
use super::getter::RemoteGetter;
use super::janitor::Janitor;
use super::registry::ConnectionRegistry;
use super::types::PoolOptions;
use crate::cache::types::{PeerPicker, ProtoGetter};
use crate::error::{DialError, PoolError};
use crate::ring::HashRing;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Routing state, replaced or mutated only under `PeerPool::state`.
struct PoolState {
    ring: HashRing,
    /// Remote peers in the current membership. Never contains the local node.
    getters: HashMap<String, Arc<RemoteGetter>>,
    connections: ConnectionRegistry,
}

/// Keeps the live peer set, maps keys to owners and owns the outbound connections.
///
/// Build one per process and share it as `Arc<PeerPool>`.
pub struct PeerPool {
    self_addr: String,
    replicas: usize,
    hash_fn: crate::ring::HashFn,
    dial_timeout: Duration,
    janitor_interval: Duration,
    dialer: Arc<dyn Dialer>,
    /// Serializes membership updates and janitor sweeps. Held across dials.
    update: tokio::sync::Mutex<()>,
    /// Held only for map and ring access, never across network calls.
    state: Mutex<PoolState>,
}

impl PeerPool {
    /// Creates a pool for the node reachable at `self_addr`.
    pub fn new(self_addr: impl Into<String>, options: PoolOptions) -> Result<Arc<Self>, PoolError> {
        let self_addr = self_addr.into();
        if self_addr.trim().is_empty() {
            return Err(PoolError::EmptySelf);
        }
        if options.replicas == 0 {
            return Err(PoolError::InvalidOptions(
                "replicas must be greater than zero".to_string(),
            ));
        }
        if options.dial_timeout.is_zero() {
            return Err(PoolError::InvalidOptions(
                "dial timeout must be greater than zero".to_string(),
            ));
        }
        if options.janitor_interval.is_zero() {
            return Err(PoolError::InvalidOptions(
                "janitor interval must be greater than zero".to_string(),
            ));
        }

        tracing::info!(
            self_addr = %self_addr,
            replicas = options.replicas,
            dial_timeout_ms = options.dial_timeout.as_millis() as u64,
            "created peer pool"
        );

        Ok(Arc::new(Self {
            state: Mutex::new(PoolState {
                ring: HashRing::build(Vec::<String>::new(), options.replicas, options.hash_fn.clone()),
                getters: HashMap::new(),
                connections: ConnectionRegistry::new(),
            }),
            self_addr,
            replicas: options.replicas,
            hash_fn: options.hash_fn,
            dial_timeout: options.dial_timeout,
            janitor_interval: options.janitor_interval,
            dialer: options.dialer,
            update: tokio::sync::Mutex::new(()),
        }))
    }

    pub fn self_addr(&self) -> &str {
        &self.self_addr
    }

    fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the membership with `peers`.
    ///
    /// Connections to known peers are reused; new peers are dialed concurrently,
    /// each bounded by the dial timeout, without holding the state lock. A peer
    /// that cannot be dialed is left out of this membership and will be dialed
    /// again the next time a snapshot lists it. The local node joins the ring
    /// when listed but is never dialed and never gets a getter.
    pub async fn set_peers<I, S>(&self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let _update = self.update.lock().await;

        let mut seen = HashSet::new();
        let wanted: Vec<String> = peers
            .into_iter()
            .map(Into::into)
            .filter(|p: &String| !p.is_empty() && seen.insert(p.clone()))
            .collect();

        let mut live: HashMap<String, Arc<dyn PeerConnection>> = HashMap::new();
        let mut to_dial = Vec::new();
        {
            let state = self.lock_state();
            for addr in wanted.iter().filter(|a| **a != self.self_addr) {
                match state.connections.get(addr) {
                    Some(conn) => {
                        live.insert(addr.clone(), conn);
                    }
                    None => to_dial.push(addr.clone()),
                }
            }
        }

        let dialed = futures::future::join_all(to_dial.iter().map(|addr| self.dial(addr))).await;

        let mut fresh = Vec::new();
        for (addr, result) in to_dial.into_iter().zip(dialed) {
            match result {
                Ok(conn) => {
                    tracing::info!(peer = %addr, "connected to peer");
                    fresh.push((addr, conn));
                }
                Err(e) => {
                    tracing::warn!(peer = %addr, error = %e, "failed dialing peer, skipping");
                }
            }
        }

        let members: Vec<&String> = wanted
            .iter()
            .filter(|a| {
                **a == self.self_addr
                    || live.contains_key(a.as_str())
                    || fresh.iter().any(|(f, _)| f == *a)
            })
            .collect();
        let ring = HashRing::build(members, self.replicas, self.hash_fn.clone());

        let mut state = self.lock_state();
        for (addr, conn) in fresh {
            let conn = state.connections.insert(&addr, conn);
            live.insert(addr, conn);
        }

        state.getters = live
            .into_iter()
            .map(|(addr, conn)| {
                let getter = Arc::new(RemoteGetter::new(addr.clone(), conn));
                (addr, getter)
            })
            .collect();
        state.ring = ring;

        tracing::info!(
            self_addr = %self.self_addr,
            peers = ?state.ring.peers(),
            connections = state.connections.len(),
            "applied peer membership"
        );
    }

    async fn dial(&self, addr: &str) -> Result<Arc<dyn PeerConnection>, DialError> {
        tracing::info!(peer = %addr, "dialing peer");

        match tokio::time::timeout(self.dial_timeout, self.dialer.dial(addr)).await {
            Ok(result) => result,
            Err(_) => Err(DialError::Timeout {
                addr: addr.to_string(),
                timeout_ms: self.dial_timeout.as_millis() as u64,
            }),
        }
    }

    /// Returns the getter of the remote peer owning `key`.
    ///
    /// `None` means the key is served locally: the ring is empty, the local node
    /// owns the key, or the owner has no getter.
    pub fn pick_peer(&self, key: &str) -> Option<Arc<RemoteGetter>> {
        let state = self.lock_state();
        let owner = state.ring.owner(key)?;
        if owner == self.self_addr {
            return None;
        }

        match state.getters.get(owner) {
            Some(getter) => Some(getter.clone()),
            None => {
                tracing::warn!(peer = %owner, key, "ring owner has no getter, serving locally");
                None
            }
        }
    }

    /// Every remote peer in the current membership, never the local node.
    pub fn all_peers(&self) -> Vec<Arc<RemoteGetter>> {
        let state = self.lock_state();
        state.getters.values().cloned().collect()
    }

    /// Addresses on the ring, including the local node when it was listed.
    pub fn peers(&self) -> Vec<String> {
        self.lock_state().ring.peers().to_vec()
    }

    /// Number of open connections, including those awaiting the janitor.
    pub fn connection_count(&self) -> usize {
        self.lock_state().connections.len()
    }

    /// Closes connections to peers that are no longer members.
    ///
    /// Returns the evicted addresses. Runs under the update lock so a sweep never
    /// closes a connection that an in-progress `set_peers` is about to reuse.
    pub async fn sweep_connections(&self) -> Vec<String> {
        let _update = self.update.lock().await;
        let mut state = self.lock_state();
        let PoolState {
            getters,
            connections,
            ..
        } = &mut *state;

        connections.sweep(|addr| getters.contains_key(addr))
    }

    /// Starts the background task that periodically calls [`PeerPool::sweep_connections`].
    pub fn start_janitor(self: &Arc<Self>) -> Janitor {
        Janitor::spawn(self, self.janitor_interval)
    }
}

impl PeerPicker for PeerPool {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn ProtoGetter>> {
        PeerPool::pick_peer(self, key).map(|g| g as Arc<dyn ProtoGetter>)
    }

    fn all_peers(&self) -> Vec<Arc<dyn ProtoGetter>> {
        PeerPool::all_peers(self)
            .into_iter()
            .map(|g| g as Arc<dyn ProtoGetter>)
            .collect()
    }
}

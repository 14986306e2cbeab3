use crate::error::PeerError;

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

pub use futures::future::BoxFuture;

/// Per-request context supplied by the caller of a cache lookup.
///
/// Carries an optional deadline that outbound peer calls honor. Cancellation is
/// dropping the future of the lookup.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestContext {
    deadline: Option<Instant>,
}

impl RequestContext {
    /// A context without a deadline.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; zero once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Runs `fut` within the deadline, mapping expiry to [`PeerError::Timeout`].
    pub async fn run<T, F>(&self, peer: &str, fut: F) -> Result<T, PeerError>
    where
        F: Future<Output = Result<T, PeerError>>,
    {
        match self.remaining() {
            Some(remaining) => tokio::time::timeout(remaining, fut)
                .await
                .map_err(|_| PeerError::Timeout {
                    peer: peer.to_string(),
                })?,
            None => fut.await,
        }
    }
}

/// A cached value and the instant it stops being served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheValue {
    pub bytes: Vec<u8>,
    /// `None` never expires.
    pub expire: Option<Instant>,
}

impl CacheValue {
    pub fn new(bytes: Vec<u8>, expire: Option<Instant>) -> Self {
        Self { bytes, expire }
    }

    pub fn is_expired(&self) -> bool {
        self.expire.is_some_and(|at| at <= Instant::now())
    }

    /// Time left to live, zero once expired. `None` never expires.
    pub fn ttl(&self) -> Option<Duration> {
        self.expire
            .map(|at| at.saturating_duration_since(Instant::now()))
    }
}

/// Fetch/invalidate capability of one remote peer.
pub trait ProtoGetter: Send + Sync {
    /// Address of the peer this getter talks to.
    fn addr(&self) -> &str;

    /// Fetches the value of `key` in `group` from the peer.
    fn get<'a>(
        &'a self,
        ctx: &'a RequestContext,
        group: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<CacheValue, PeerError>>;

    /// Asks the peer to evict `key` from its local tiers.
    fn remove<'a>(
        &'a self,
        ctx: &'a RequestContext,
        group: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<(), PeerError>>;
}

/// Routes keys to the peer that owns them.
pub trait PeerPicker: Send + Sync {
    /// The remote owner of `key`, or `None` when the key must be served locally.
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn ProtoGetter>>;

    /// Every known remote peer, excluding the local node.
    fn all_peers(&self) -> Vec<Arc<dyn ProtoGetter>>;
}

/// Destination of a cache lookup.
pub trait Sink: Send {
    /// Receives the value and the instant it expires (`None` never expires).
    fn set_bytes(&mut self, value: &[u8], expire: Option<Instant>);
}

/// Sink that copies the value into an owned buffer.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ByteSink {
    value: Option<Vec<u8>>,
    expire: Option<Instant>,
}

impl ByteSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        self.value.as_deref()
    }

    pub fn expire(&self) -> Option<Instant> {
        self.expire
    }

    pub fn into_bytes(self) -> Option<Vec<u8>> {
        self.value
    }
}

impl Sink for ByteSink {
    fn set_bytes(&mut self, value: &[u8], expire: Option<Instant>) {
        self.value = Some(value.to_vec());
        self.expire = expire;
    }
}

/// Loads a value from the source of truth. Only invoked on the node that owns the key.
pub trait Getter: Send + Sync {
    fn load<'a>(&'a self, key: &'a str) -> BoxFuture<'a, anyhow::Result<Vec<u8>>>;

    /// How long loaded values stay cached. `None` keeps them until evicted.
    fn ttl(&self) -> Option<Duration> {
        None
    }
}

/// Adapter turning an async closure into a [`Getter`].
pub struct GetterFn<F> {
    load: F,
    ttl: Option<Duration>,
}

impl<F> GetterFn<F> {
    pub fn new(load: F) -> Self {
        Self { load, ttl: None }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

impl<F, Fut> Getter for GetterFn<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Vec<u8>>> + Send + 'static,
{
    fn load<'a>(&'a self, key: &'a str) -> BoxFuture<'a, anyhow::Result<Vec<u8>>> {
        Box::pin((self.load)(key.to_string()))
    }

    fn ttl(&self) -> Option<Duration> {
        self.ttl
    }
}

/// Per-group counters.
#[derive(Debug, Default)]
pub struct GroupStats {
    /// Every `get`, including those served from cache.
    pub gets: AtomicU64,
    pub cache_hits: AtomicU64,
    /// Values successfully fetched from the owning peer.
    pub peer_loads: AtomicU64,
    pub peer_errors: AtomicU64,
    /// Cache misses, whether resolved remotely or locally.
    pub loads: AtomicU64,
    pub local_loads: AtomicU64,
    pub local_load_errs: AtomicU64,
    /// Gets that arrived over the network from other peers.
    pub server_requests: AtomicU64,
    pub removes: AtomicU64,
}

impl GroupStats {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> GroupStatsSnapshot {
        GroupStatsSnapshot {
            gets: self.gets.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            peer_loads: self.peer_loads.load(Ordering::Relaxed),
            peer_errors: self.peer_errors.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            local_loads: self.local_loads.load(Ordering::Relaxed),
            local_load_errs: self.local_load_errs.load(Ordering::Relaxed),
            server_requests: self.server_requests.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`GroupStats`], serialized by the stats endpoint.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupStatsSnapshot {
    pub gets: u64,
    pub cache_hits: u64,
    pub peer_loads: u64,
    pub peer_errors: u64,
    pub loads: u64,
    pub local_loads: u64,
    pub local_load_errs: u64,
    pub server_requests: u64,
    pub removes: u64,
}

/// Entry counts of a group's local tiers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TierStats {
    pub main_entries: usize,
    pub hot_entries: usize,
}

use super::connection::{Dialer, GrpcDialer};
use crate::ring::{HashFn, default_hash_fn};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Virtual nodes per peer on the hash ring.
pub const DEFAULT_REPLICAS: usize = 50;
/// Upper bound on establishing a connection to a newly seen peer.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_millis(500);
/// How often the janitor closes connections to peers that left the membership.
pub const DEFAULT_JANITOR_INTERVAL: Duration = Duration::from_secs(15);

/// Construction-time settings of a [`PeerPool`](super::PeerPool).
#[derive(Clone)]
pub struct PoolOptions {
    pub replicas: usize,
    pub hash_fn: HashFn,
    pub dial_timeout: Duration,
    pub janitor_interval: Duration,
    /// Opens connections to peers. Carries the transport-level dial options.
    pub dialer: Arc<dyn Dialer>,
}

impl PoolOptions {
    pub fn with_replicas(mut self, replicas: usize) -> Self {
        self.replicas = replicas;
        self
    }

    pub fn with_hash_fn(mut self, hash_fn: HashFn) -> Self {
        self.hash_fn = hash_fn;
        self
    }

    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    pub fn with_janitor_interval(mut self, interval: Duration) -> Self {
        self.janitor_interval = interval;
        self
    }

    pub fn with_dialer(mut self, dialer: Arc<dyn Dialer>) -> Self {
        self.dialer = dialer;
        self
    }
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            replicas: DEFAULT_REPLICAS,
            hash_fn: default_hash_fn(),
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            janitor_interval: DEFAULT_JANITOR_INTERVAL,
            dialer: Arc::new(GrpcDialer::default()),
        }
    }
}

impl fmt::Debug for PoolOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolOptions")
            .field("replicas", &self.replicas)
            .field("dial_timeout", &self.dial_timeout)
            .field("janitor_interval", &self.janitor_interval)
            .finish_non_exhaustive()
    }
}

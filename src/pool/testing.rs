//! In-memory test doubles for the pool's transport seam.

use super::connection::{Dialer, PeerConnection};
use crate::cache::types::BoxFuture;
use crate::error::{ConnectionError, DialError, PeerError};
use crate::rpc::pb::{GetRequest, GetResponse, RemoveRequest};

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How a [`MockConnection`] answers calls.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// `get` answers with `value:{key}`.
    Echo,
    /// `get` answers without a value.
    Empty,
    /// Every call fails as if the peer were unreachable.
    Unavailable,
    /// Every call fails with an internal error from the remote handler.
    Internal,
    /// Calls never complete.
    Hang,
}

pub struct MockConnection {
    addr: String,
    behavior: Mutex<MockBehavior>,
    closed: AtomicBool,
    pub closes: AtomicUsize,
    pub gets: AtomicUsize,
    pub removes: Mutex<Vec<(String, String)>>,
}

impl MockConnection {
    pub fn new(addr: &str, behavior: MockBehavior) -> Arc<Self> {
        Arc::new(Self {
            addr: addr.to_string(),
            behavior: Mutex::new(behavior),
            closed: AtomicBool::new(false),
            closes: AtomicUsize::new(0),
            gets: AtomicUsize::new(0),
            removes: Mutex::new(Vec::new()),
        })
    }

    pub fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<MockBehavior, PeerError> {
        if self.is_closed() {
            return Err(PeerError::Closed {
                peer: self.addr.clone(),
            });
        }
        let behavior = self.behavior.lock().unwrap().clone();
        match behavior {
            MockBehavior::Unavailable => Err(PeerError::from_status(
                &self.addr,
                tonic::Status::unavailable("connection refused"),
            )),
            MockBehavior::Internal => Err(PeerError::from_status(
                &self.addr,
                tonic::Status::internal("loader exploded"),
            )),
            other => Ok(other),
        }
    }
}

impl PeerConnection for MockConnection {
    fn addr(&self) -> &str {
        &self.addr
    }

    fn get(&self, req: GetRequest) -> BoxFuture<'_, Result<GetResponse, PeerError>> {
        Box::pin(async move {
            self.gets.fetch_add(1, Ordering::SeqCst);
            match self.check()? {
                MockBehavior::Hang => std::future::pending().await,
                MockBehavior::Empty => Ok(GetResponse {
                    value: None,
                    ttl_ms: None,
                }),
                _ => Ok(GetResponse {
                    value: Some(format!("value:{}", req.key).into_bytes()),
                    ttl_ms: None,
                }),
            }
        })
    }

    fn remove(&self, req: RemoveRequest) -> BoxFuture<'_, Result<(), PeerError>> {
        Box::pin(async move {
            if let MockBehavior::Hang = self.check()? {
                return std::future::pending().await;
            }
            self.removes.lock().unwrap().push((req.group, req.key));
            Ok(())
        })
    }

    fn close(&self) -> Result<(), ConnectionError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(ConnectionError::AlreadyClosed(self.addr.clone()));
        }
        Ok(())
    }
}

/// Dialer that hands out [`MockConnection`]s and records every dial.
#[derive(Default)]
pub struct MockDialer {
    failing: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    behaviors: Mutex<HashMap<String, MockBehavior>>,
    dials: Mutex<Vec<String>>,
    conns: Mutex<HashMap<String, Vec<Arc<MockConnection>>>>,
}

impl MockDialer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Dials to `addr` fail until [`MockDialer::heal`] is called.
    pub fn fail(&self, addr: &str) {
        self.failing.lock().unwrap().insert(addr.to_string());
    }

    pub fn heal(&self, addr: &str) {
        self.failing.lock().unwrap().remove(addr);
    }

    /// Dials to `addr` take `delay` before succeeding.
    pub fn delay(&self, addr: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(addr.to_string(), delay);
    }

    /// Connections to `addr` created from now on start with `behavior`.
    pub fn behave(&self, addr: &str, behavior: MockBehavior) {
        self.behaviors
            .lock()
            .unwrap()
            .insert(addr.to_string(), behavior);
    }

    pub fn dial_count(&self, addr: &str) -> usize {
        self.dials
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.as_str() == addr)
            .count()
    }

    pub fn total_dials(&self) -> usize {
        self.dials.lock().unwrap().len()
    }

    /// Every connection created for `addr`, oldest first.
    pub fn connections(&self, addr: &str) -> Vec<Arc<MockConnection>> {
        self.conns
            .lock()
            .unwrap()
            .get(addr)
            .cloned()
            .unwrap_or_default()
    }

    /// The most recent connection created for `addr`.
    pub fn connection(&self, addr: &str) -> Arc<MockConnection> {
        self.connections(addr)
            .pop()
            .unwrap_or_else(|| panic!("no connection was dialed to {}", addr))
    }
}

impl Dialer for MockDialer {
    fn dial<'a>(
        &'a self,
        addr: &'a str,
    ) -> BoxFuture<'a, Result<Arc<dyn PeerConnection>, DialError>> {
        Box::pin(async move {
            self.dials.lock().unwrap().push(addr.to_string());

            let delay = self.delays.lock().unwrap().get(addr).copied();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            if self.failing.lock().unwrap().contains(addr) {
                return Err(DialError::Connect {
                    addr: addr.to_string(),
                    reason: "connection refused".to_string(),
                });
            }

            let behavior = self
                .behaviors
                .lock()
                .unwrap()
                .get(addr)
                .cloned()
                .unwrap_or(MockBehavior::Echo);
            let conn = MockConnection::new(addr, behavior);
            self.conns
                .lock()
                .unwrap()
                .entry(addr.to_string())
                .or_default()
                .push(conn.clone());

            let conn: Arc<dyn PeerConnection> = conn;
            Ok(conn)
        })
    }
}

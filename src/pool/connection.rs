//! Transport seam of the pool.
//!
//! [`Dialer`] opens a [`PeerConnection`] to an address; the pool owns the
//! result until the janitor closes it. The gRPC implementation is the default;
//! tests substitute in-memory doubles.

use crate::cache::types::BoxFuture;
use crate::error::{ConnectionError, DialError, PeerError};
use crate::rpc::pb::group_cache_client::GroupCacheClient;
use crate::rpc::pb::{GetRequest, GetResponse, RemoveRequest};

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tonic::transport::{Channel, Endpoint};

/// One open channel to a peer.
pub trait PeerConnection: Send + Sync {
    fn addr(&self) -> &str;

    fn get(&self, req: GetRequest) -> BoxFuture<'_, Result<GetResponse, PeerError>>;

    fn remove(&self, req: RemoveRequest) -> BoxFuture<'_, Result<(), PeerError>>;

    /// Releases the channel. Calls issued afterwards fail with [`PeerError::Closed`].
    fn close(&self) -> Result<(), ConnectionError>;
}

/// Establishes connections to peers.
pub trait Dialer: Send + Sync {
    fn dial<'a>(
        &'a self,
        addr: &'a str,
    ) -> BoxFuture<'a, Result<Arc<dyn PeerConnection>, DialError>>;
}

/// Transport-level options applied to every gRPC channel.
#[derive(Debug, Clone)]
pub struct GrpcDialOptions {
    pub tcp_nodelay: bool,
    /// Deadline applied by the channel to every request.
    pub request_timeout: Option<Duration>,
    pub http2_keep_alive_interval: Option<Duration>,
    pub keep_alive_timeout: Option<Duration>,
    /// Maximum in-flight requests per channel.
    pub concurrency_limit: Option<usize>,
}

impl Default for GrpcDialOptions {
    fn default() -> Self {
        Self {
            tcp_nodelay: true,
            request_timeout: None,
            http2_keep_alive_interval: Some(Duration::from_secs(30)),
            keep_alive_timeout: Some(Duration::from_secs(10)),
            concurrency_limit: None,
        }
    }
}

/// Dials peers over gRPC using tonic channels.
#[derive(Debug, Clone, Default)]
pub struct GrpcDialer {
    options: GrpcDialOptions,
}

impl GrpcDialer {
    pub fn new(options: GrpcDialOptions) -> Self {
        Self { options }
    }

    fn endpoint(&self, addr: &str) -> Result<Endpoint, DialError> {
        let mut endpoint =
            Endpoint::from_shared(peer_uri(addr)).map_err(|e| DialError::InvalidAddress {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?;

        endpoint = endpoint.tcp_nodelay(self.options.tcp_nodelay);
        if let Some(timeout) = self.options.request_timeout {
            endpoint = endpoint.timeout(timeout);
        }
        if let Some(interval) = self.options.http2_keep_alive_interval {
            endpoint = endpoint.http2_keep_alive_interval(interval);
        }
        if let Some(timeout) = self.options.keep_alive_timeout {
            endpoint = endpoint.keep_alive_timeout(timeout);
        }
        if let Some(limit) = self.options.concurrency_limit {
            endpoint = endpoint.concurrency_limit(limit);
        }

        Ok(endpoint)
    }
}

impl Dialer for GrpcDialer {
    fn dial<'a>(
        &'a self,
        addr: &'a str,
    ) -> BoxFuture<'a, Result<Arc<dyn PeerConnection>, DialError>> {
        Box::pin(async move {
            let endpoint = self.endpoint(addr)?;
            let channel = endpoint
                .connect()
                .await
                .map_err(|e| DialError::Connect {
                    addr: addr.to_string(),
                    reason: e.to_string(),
                })?;

            let conn: Arc<dyn PeerConnection> = Arc::new(GrpcConnection::new(addr, channel));
            Ok(conn)
        })
    }
}

/// Peer addresses may be bare `host:port`; tonic needs a URI.
pub fn peer_uri(addr: &str) -> String {
    if addr.contains("://") {
        addr.to_string()
    } else {
        format!("http://{}", addr)
    }
}

/// gRPC channel to one peer.
pub struct GrpcConnection {
    addr: String,
    client: RwLock<Option<GroupCacheClient<Channel>>>,
}

impl GrpcConnection {
    pub fn new(addr: &str, channel: Channel) -> Self {
        Self {
            addr: addr.to_string(),
            client: RwLock::new(Some(GroupCacheClient::new(channel))),
        }
    }

    /// Clones the client handle; tonic clients are cheap handles onto one channel.
    fn client(&self) -> Result<GroupCacheClient<Channel>, PeerError> {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| PeerError::Closed {
                peer: self.addr.clone(),
            })
    }
}

impl PeerConnection for GrpcConnection {
    fn addr(&self) -> &str {
        &self.addr
    }

    fn get(&self, req: GetRequest) -> BoxFuture<'_, Result<GetResponse, PeerError>> {
        Box::pin(async move {
            let mut client = self.client()?;
            let response = client
                .get(req)
                .await
                .map_err(|status| PeerError::from_status(&self.addr, status))?;
            Ok(response.into_inner())
        })
    }

    fn remove(&self, req: RemoveRequest) -> BoxFuture<'_, Result<(), PeerError>> {
        Box::pin(async move {
            let mut client = self.client()?;
            client
                .remove(req)
                .await
                .map_err(|status| PeerError::from_status(&self.addr, status))?;
            Ok(())
        })
    }

    fn close(&self) -> Result<(), ConnectionError> {
        let mut client = self
            .client
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        // The channel shuts down once the last clone held by in-flight calls is dropped.
        match client.take() {
            Some(_) => Ok(()),
            None => Err(ConnectionError::AlreadyClosed(self.addr.clone())),
        }
    }
}

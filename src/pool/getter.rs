use super::connection::PeerConnection;
use crate::cache::types::{BoxFuture, CacheValue, ProtoGetter, RequestContext};
use crate::error::PeerError;
use crate::rpc::pb::{GetRequest, RemoveRequest};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Issues fetch and invalidate calls to one peer over its pooled connection.
///
/// Holds no state beyond the address and the connection handle, so a single
/// getter can serve any number of concurrent requests.
#[derive(Clone)]
pub struct RemoteGetter {
    addr: String,
    conn: Arc<dyn PeerConnection>,
}

impl RemoteGetter {
    pub fn new(addr: impl Into<String>, conn: Arc<dyn PeerConnection>) -> Self {
        Self {
            addr: addr.into(),
            conn,
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Fetches the value cached under `key` in `group` on the peer.
    ///
    /// The remaining lifetime reported by the peer is turned into a local expiry.
    pub async fn get(
        &self,
        ctx: &RequestContext,
        group: &str,
        key: &str,
    ) -> Result<CacheValue, PeerError> {
        tracing::debug!(peer = %self.addr, group, key, "getting from peer");

        let req = GetRequest {
            group: group.to_string(),
            key: key.to_string(),
        };

        let resp = ctx
            .run(&self.addr, self.conn.get(req))
            .await
            .inspect_err(|e| {
                tracing::warn!(peer = %self.addr, group, key, error = %e, "error calling peer")
            })?;

        match resp.value {
            Some(value) => {
                tracing::debug!(peer = %self.addr, group, key, bytes = value.len(), "got response");
                let expire = resp
                    .ttl_ms
                    .map(|ms| Instant::now() + Duration::from_millis(ms));
                Ok(CacheValue::new(value, expire))
            }
            None => Err(PeerError::EmptyResponse {
                peer: self.addr.clone(),
            }),
        }
    }

    /// Asks the peer to evict `key` from its local tiers.
    pub async fn remove(
        &self,
        ctx: &RequestContext,
        group: &str,
        key: &str,
    ) -> Result<(), PeerError> {
        tracing::debug!(peer = %self.addr, group, key, "removing from peer");

        let req = RemoveRequest {
            group: group.to_string(),
            key: key.to_string(),
        };

        ctx.run(&self.addr, self.conn.remove(req))
            .await
            .inspect_err(|e| {
                tracing::warn!(peer = %self.addr, group, key, error = %e, "error removing from peer")
            })
    }
}

impl ProtoGetter for RemoteGetter {
    fn addr(&self) -> &str {
        &self.addr
    }

    fn get<'a>(
        &'a self,
        ctx: &'a RequestContext,
        group: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<CacheValue, PeerError>> {
        Box::pin(RemoteGetter::get(self, ctx, group, key))
    }

    fn remove<'a>(
        &'a self,
        ctx: &'a RequestContext,
        group: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<(), PeerError>> {
        Box::pin(RemoteGetter::remove(self, ctx, group, key))
    }
}

impl fmt::Debug for RemoteGetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteGetter")
            .field("addr", &self.addr)
            .finish()
    }
}

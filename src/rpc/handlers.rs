use crate::cache::registry::GroupRegistry;
use crate::cache::types::{ByteSink, GroupStats};
use crate::cache::Group;

use super::pb::group_cache_server::{GroupCache, GroupCacheServer};
use super::pb::{GetRequest, GetResponse, RemoveRequest, RemoveResponse};

use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::time::Instant;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{Request, Response, Status};

/// Inbound side of the peer protocol. Delegates every call to the local groups.
#[derive(Clone)]
pub struct GroupCacheService {
    groups: Arc<GroupRegistry>,
}

impl GroupCacheService {
    pub fn new(groups: Arc<GroupRegistry>) -> Self {
        Self { groups }
    }

    /// Wrap this service in a tonic [`GroupCacheServer`].
    pub fn into_service(self) -> GroupCacheServer<Self> {
        GroupCacheServer::new(self)
    }

    /// Serves peers on `listener` until `shutdown` resolves.
    pub async fn serve_with_shutdown<F>(
        self,
        listener: TcpListener,
        shutdown: F,
    ) -> Result<(), tonic::transport::Error>
    where
        F: Future<Output = ()>,
    {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(%addr, "peer gRPC server listening");
        }

        tonic::transport::Server::builder()
            .add_service(self.into_service())
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
            .await
    }

    fn lookup(&self, group: &str, key: &str) -> Result<Arc<Group>, Status> {
        if key.is_empty() {
            return Err(Status::invalid_argument("key must not be empty"));
        }
        self.groups
            .get_group(group)
            .ok_or_else(|| Status::invalid_argument(format!("unknown group '{}'", group)))
    }
}

#[tonic::async_trait]
impl GroupCache for GroupCacheService {
    async fn get(&self, req: Request<GetRequest>) -> Result<Response<GetResponse>, Status> {
        let r = req.into_inner();
        let group = self.lookup(&r.group, &r.key)?;
        GroupStats::incr(&group.stats().server_requests);

        tracing::debug!(group = %r.group, key = %r.key, "serving peer get");

        let mut sink = ByteSink::new();
        group.get_owned(&r.key, &mut sink).await.map_err(|e| {
            Status::internal(format!(
                "error getting key '{}' from group '{}': {}",
                r.key, r.group, e
            ))
        })?;

        let ttl_ms = sink
            .expire()
            .map(|at| at.saturating_duration_since(Instant::now()).as_millis() as u64);

        Ok(Response::new(GetResponse {
            value: Some(sink.into_bytes().unwrap_or_default()),
            ttl_ms,
        }))
    }

    async fn remove(
        &self,
        req: Request<RemoveRequest>,
    ) -> Result<Response<RemoveResponse>, Status> {
        let r = req.into_inner();
        let group = self.lookup(&r.group, &r.key)?;

        let removed = group.remove_local(&r.key);
        tracing::debug!(group = %r.group, key = %r.key, removed, "served peer remove");

        Ok(Response::new(RemoveResponse {}))
    }
}

use super::types::{PeerInfo, PeerSetter};
use crate::cache::types::BoxFuture;
use crate::pool::PeerPool;

use std::sync::Arc;
use tokio::sync::watch;

/// A source of membership snapshots.
pub trait PeerDiscovery: Send + Sync {
    /// Feeds snapshots to `setter` until `shutdown` turns true or its sender is dropped.
    fn maintain(
        &self,
        setter: PeerSetter,
        shutdown: watch::Receiver<bool>,
    ) -> BoxFuture<'_, anyhow::Result<()>>;
}

/// Setter applying every snapshot to `pool`.
pub fn pool_setter(pool: Arc<PeerPool>) -> PeerSetter {
    Arc::new(move |peers: Vec<String>| {
        let pool = pool.clone();
        Box::pin(async move { pool.set_peers(peers).await }) as BoxFuture<'static, ()>
    })
}

/// A fixed peer list, applied once.
#[derive(Debug, Clone, Default)]
pub struct StaticPeers {
    peers: Vec<String>,
}

impl StaticPeers {
    pub fn new<I, S>(peers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            peers: peers.into_iter().map(Into::into).collect(),
        }
    }

    pub fn peers(&self) -> &[String] {
        &self.peers
    }
}

impl PeerDiscovery for StaticPeers {
    fn maintain(
        &self,
        setter: PeerSetter,
        mut shutdown: watch::Receiver<bool>,
    ) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move {
            tracing::info!(peers = ?self.peers, "setting static peers");
            setter(self.peers.clone()).await;

            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }

            tracing::debug!("static peer discovery stopped");
            Ok(())
        })
    }
}

/// Follows a registry feed of [`PeerInfo`] records.
///
/// Every published record list is normalized with [`peers_from_infos`] and
/// applied as a full snapshot, starting with the list current at startup.
#[derive(Debug, Clone)]
pub struct RegistryPeers {
    infos: watch::Receiver<Vec<PeerInfo>>,
}

impl RegistryPeers {
    pub fn new(infos: watch::Receiver<Vec<PeerInfo>>) -> Self {
        Self { infos }
    }
}

impl PeerDiscovery for RegistryPeers {
    fn maintain(
        &self,
        setter: PeerSetter,
        mut shutdown: watch::Receiver<bool>,
    ) -> BoxFuture<'_, anyhow::Result<()>> {
        let mut infos = self.infos.clone();

        Box::pin(async move {
            loop {
                let peers = peers_from_infos(&infos.borrow_and_update());
                tracing::info!(peers = ?peers, "setting peers from registry");
                setter(peers).await;

                if *shutdown.borrow() {
                    break;
                }

                tokio::select! {
                    changed = infos.changed() => {
                        if changed.is_err() {
                            tracing::warn!("peer registry feed closed");
                            break;
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::debug!("registry peer discovery stopped");
            Ok(())
        })
    }
}

/// Turns registry records into peer addresses.
///
/// The HTTP address is taken as is; otherwise the gRPC address, stripped of
/// surrounding slashes and given an `http://` prefix when it has no scheme.
/// The scheme of every result is forced to `http`. Records without a usable
/// address are skipped.
pub fn peers_from_infos(infos: &[PeerInfo]) -> Vec<String> {
    let mut peers = Vec::with_capacity(infos.len());

    for info in infos {
        let addr = if !info.http_address.is_empty() {
            info.http_address.clone()
        } else {
            let grpc = info.grpc_address.trim_matches('/');
            if grpc.starts_with("http") {
                grpc.to_string()
            } else {
                format!("http://{}", grpc)
            }
        };

        match force_http(&addr) {
            Some(peer) => {
                tracing::debug!(?info, peer = %peer, "found peer");
                peers.push(peer);
            }
            None => {
                tracing::warn!(?info, "missing address for peer info");
            }
        }
    }

    tracing::debug!(peers = ?peers, count = peers.len(), "found peers");
    peers
}

fn force_http(addr: &str) -> Option<String> {
    let rest = match addr.split_once("://") {
        Some((_, rest)) => rest,
        None => addr,
    };
    let rest = rest.trim_end_matches('/');
    if rest.is_empty() {
        return None;
    }
    Some(format!("http://{}", rest))
}

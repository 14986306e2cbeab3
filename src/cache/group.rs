use super::types::{
    CacheValue, Getter, GroupStats, PeerPicker, RequestContext, Sink, TierStats,
};
use crate::error::CacheError;

use dashmap::DashMap;
use std::sync::{Arc, OnceLock};
use tokio::time::Instant;

/// A named cache namespace.
pub struct Group {
    name: String,
    getter: Arc<dyn Getter>,
    /// Shared with the registry so groups created before the picker still see it.
    picker: Arc<OnceLock<Arc<dyn PeerPicker>>>,
    main: DashMap<String, CacheValue>,
    hot: DashMap<String, CacheValue>,
    /// Entry bound per tier; a full tier is cleared before the next insert.
    max_entries: usize,
    stats: GroupStats,
}

impl Group {
    pub(crate) fn new(
        name: &str,
        max_entries: usize,
        getter: Arc<dyn Getter>,
        picker: Arc<OnceLock<Arc<dyn PeerPicker>>>,
    ) -> Self {
        Self {
            name: name.to_string(),
            getter,
            picker,
            main: DashMap::new(),
            hot: DashMap::new(),
            max_entries: max_entries.max(1),
            stats: GroupStats::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stats(&self) -> &GroupStats {
        &self.stats
    }

    pub fn tier_stats(&self) -> TierStats {
        TierStats {
            main_entries: self.main.len(),
            hot_entries: self.hot.len(),
        }
    }

    /// Looks up `key`, fetching it from its owner or loading it on a miss.
    pub async fn get(
        &self,
        ctx: &RequestContext,
        key: &str,
        dest: &mut dyn Sink,
    ) -> Result<(), CacheError> {
        GroupStats::incr(&self.stats.gets);

        if let Some(value) = self.lookup_cache(key) {
            GroupStats::incr(&self.stats.cache_hits);
            dest.set_bytes(&value.bytes, value.expire);
            return Ok(());
        }

        let value = self.load(ctx, key).await?;
        dest.set_bytes(&value.bytes, value.expire);
        Ok(())
    }

    /// Looks up `key` without consulting other peers.
    ///
    /// Used when serving requests from peers: the caller already decided this
    /// node owns the key, and forwarding again could bounce the request between
    /// nodes that disagree on membership.
    pub async fn get_owned(&self, key: &str, dest: &mut dyn Sink) -> Result<(), CacheError> {
        GroupStats::incr(&self.stats.gets);

        if let Some(value) = self.lookup_cache(key) {
            GroupStats::incr(&self.stats.cache_hits);
            dest.set_bytes(&value.bytes, value.expire);
            return Ok(());
        }

        GroupStats::incr(&self.stats.loads);
        let value = self.load_locally(key).await?;
        dest.set_bytes(&value.bytes, value.expire);
        Ok(())
    }

    /// Expired entries count as misses and are dropped on sight.
    fn lookup_cache(&self, key: &str) -> Option<CacheValue> {
        Self::lookup_tier(&self.main, key).or_else(|| Self::lookup_tier(&self.hot, key))
    }

    fn lookup_tier(tier: &DashMap<String, CacheValue>, key: &str) -> Option<CacheValue> {
        let value = tier.get(key).map(|entry| entry.value().clone())?;
        if value.is_expired() {
            tier.remove_if(key, |_, entry| entry.is_expired());
            return None;
        }
        Some(value)
    }

    async fn load(&self, ctx: &RequestContext, key: &str) -> Result<CacheValue, CacheError> {
        GroupStats::incr(&self.stats.loads);

        if let Some(peer) = self.picker.get().and_then(|picker| picker.pick_peer(key)) {
            match peer.get(ctx, &self.name, key).await {
                Ok(value) => {
                    GroupStats::incr(&self.stats.peer_loads);
                    self.populate(&self.hot, key, &value);
                    return Ok(value);
                }
                Err(e) => {
                    GroupStats::incr(&self.stats.peer_errors);
                    tracing::warn!(
                        group = %self.name,
                        key,
                        peer = %peer.addr(),
                        error = %e,
                        "peer fetch failed, loading locally"
                    );
                }
            }
        }

        self.load_locally(key).await
    }

    async fn load_locally(&self, key: &str) -> Result<CacheValue, CacheError> {
        tracing::debug!(group = %self.name, key, "loading key from source");

        match self.getter.load(key).await {
            Ok(bytes) => {
                GroupStats::incr(&self.stats.local_loads);
                let expire = self.getter.ttl().map(|ttl| Instant::now() + ttl);
                let value = CacheValue::new(bytes, expire);
                self.populate(&self.main, key, &value);
                Ok(value)
            }
            Err(source) => {
                GroupStats::incr(&self.stats.local_load_errs);
                Err(CacheError::Load {
                    key: key.to_string(),
                    source,
                })
            }
        }
    }

    fn populate(&self, tier: &DashMap<String, CacheValue>, key: &str, value: &CacheValue) {
        if value.is_expired() {
            return;
        }
        if tier.len() >= self.max_entries && !tier.contains_key(key) {
            tracing::debug!(group = %self.name, entries = tier.len(), "cache tier full, clearing");
            tier.clear();
        }
        tier.insert(key.to_string(), value.clone());
    }

    /// Evicts `key` from this node's tiers only. Returns whether anything was removed.
    pub fn remove_local(&self, key: &str) -> bool {
        let main = self.main.remove(key).is_some();
        let hot = self.hot.remove(key).is_some();
        main || hot
    }

    /// Evicts `key` here and on every peer.
    ///
    /// Peers are contacted concurrently; failures are collected and returned
    /// together, naming only the peers that failed. Nothing is retried.
    pub async fn remove(&self, ctx: &RequestContext, key: &str) -> Result<(), CacheError> {
        GroupStats::incr(&self.stats.removes);
        self.remove_local(key);

        let peers = self
            .picker
            .get()
            .map(|picker| picker.all_peers())
            .unwrap_or_default();

        let results = futures::future::join_all(
            peers.iter().map(|peer| peer.remove(ctx, &self.name, key)),
        )
        .await;

        let mut succeeded = 0;
        let mut failed = Vec::new();
        for result in results {
            match result {
                Ok(()) => succeeded += 1,
                Err(e) => failed.push(e),
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            tracing::warn!(
                group = %self.name,
                key,
                succeeded,
                failed = failed.len(),
                "remove did not reach every peer"
            );
            Err(CacheError::PartialRemove { succeeded, failed })
        }
    }
}

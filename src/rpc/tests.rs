//! Peer RPC Tests
//!
//! ## Test Scopes
//! - **Server**: inbound `Get`/`Remove` against real groups over a loopback socket.
//! - **Expiry**: the remaining lifetime of a value is carried to the caller.
//! - **Client**: the gRPC dialer and pool talking to that server end to end.
//! - **Failures**: unknown groups, loader errors, unreachable peers.

#[cfg(test)]
mod tests {
    use crate::cache::{ByteSink, GetterFn, GroupRegistry, RequestContext};
    use crate::error::PeerError;
    use crate::pool::{GrpcDialer, PeerPool, PoolOptions};
    use crate::rpc::GroupCacheService;

    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    const CLIENT_SELF: &str = "127.0.0.1:1";

    struct TestServer {
        addr: SocketAddr,
        groups: Arc<GroupRegistry>,
        stop: Option<oneshot::Sender<()>>,
    }

    impl Drop for TestServer {
        fn drop(&mut self) {
            if let Some(stop) = self.stop.take() {
                let _ = stop.send(());
            }
        }
    }

    async fn start_server() -> TestServer {
        let groups = GroupRegistry::new();
        groups
            .new_group(
                "users",
                100,
                GetterFn::new(|key: String| async move {
                    if key.starts_with("missing") {
                        anyhow::bail!("no such user {}", key);
                    }
                    Ok(format!("server:{}", key).into_bytes())
                }),
            )
            .unwrap();

        groups
            .new_group(
                "sessions",
                100,
                GetterFn::new(|key: String| async move { Ok::<_, anyhow::Error>(key.into_bytes()) })
                    .with_ttl(Duration::from_secs(60)),
            )
            .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop, rx) = oneshot::channel::<()>();

        let service = GroupCacheService::new(groups.clone());
        tokio::spawn(async move {
            service
                .serve_with_shutdown(listener, async {
                    let _ = rx.await;
                })
                .await
                .unwrap();
        });

        TestServer {
            addr,
            groups,
            stop: Some(stop),
        }
    }

    async fn client_pool(server: &TestServer) -> Arc<PeerPool> {
        let pool = PeerPool::new(
            CLIENT_SELF,
            PoolOptions::default()
                .with_dial_timeout(Duration::from_secs(2))
                .with_dialer(Arc::new(GrpcDialer::default())),
        )
        .expect("valid options");
        pool.set_peers([server.addr.to_string()]).await;
        pool
    }

    // ============================================================
    // END TO END
    // ============================================================

    #[tokio::test]
    async fn test_get_from_remote_owner() {
        let server = start_server().await;
        let pool = client_pool(&server).await;
        assert_eq!(pool.peers(), vec![server.addr.to_string()]);

        let getter = pool.pick_peer("alice").expect("server owns every key");
        let value = getter
            .get(&RequestContext::background(), "users", "alice")
            .await
            .unwrap();

        assert_eq!(value.bytes, b"server:alice".to_vec());
        let group = server.groups.get_group("users").unwrap();
        let stats = group.stats().snapshot();
        assert_eq!(stats.server_requests, 1);
        assert_eq!(stats.local_loads, 1);
        assert_eq!(group.tier_stats().main_entries, 1);
    }

    #[tokio::test]
    async fn test_remaining_ttl_travels_with_value() {
        let server = start_server().await;
        let pool = client_pool(&server).await;

        let value = pool
            .pick_peer("s-1")
            .unwrap()
            .get(&RequestContext::background(), "sessions", "s-1")
            .await
            .unwrap();

        assert_eq!(value.bytes, b"s-1".to_vec());
        let ttl = value.ttl().expect("sessions expire");
        assert!(ttl > Duration::from_secs(50), "ttl {:?}", ttl);
        assert!(ttl <= Duration::from_secs(60), "ttl {:?}", ttl);

        let plain = pool
            .pick_peer("u-1")
            .unwrap()
            .get(&RequestContext::background(), "users", "u-1")
            .await
            .unwrap();
        assert!(plain.expire.is_none());
    }

    #[tokio::test]
    async fn test_remove_evicts_on_remote() {
        let server = start_server().await;
        let pool = client_pool(&server).await;
        let group = server.groups.get_group("users").unwrap();

        let mut sink = ByteSink::new();
        group.get_owned("bob", &mut sink).await.unwrap();
        assert_eq!(group.tier_stats().main_entries, 1);

        let getter = pool.pick_peer("bob").unwrap();
        getter
            .remove(&RequestContext::background(), "users", "bob")
            .await
            .unwrap();

        assert_eq!(group.tier_stats().main_entries, 0);
    }

    #[tokio::test]
    async fn test_client_group_routes_through_server() {
        let server = start_server().await;
        let pool = client_pool(&server).await;

        let client_groups = GroupRegistry::new();
        client_groups.register_peer_picker(pool.clone()).unwrap();
        let group = client_groups
            .new_group(
                "users",
                100,
                GetterFn::new(|_key: String| async move {
                    Err::<Vec<u8>, _>(anyhow::anyhow!("client must not load keys it does not own"))
                }),
            )
            .unwrap();

        let mut sink = ByteSink::new();
        group
            .get(&RequestContext::with_timeout(Duration::from_secs(2)), "carol", &mut sink)
            .await
            .unwrap();

        assert_eq!(sink.bytes(), Some(b"server:carol".as_slice()));
        assert_eq!(group.tier_stats().hot_entries, 1);
    }

    // ============================================================
    // FAILURES
    // ============================================================

    #[tokio::test]
    async fn test_unknown_group_is_rpc_error() {
        let server = start_server().await;
        let pool = client_pool(&server).await;

        let err = pool
            .pick_peer("k")
            .unwrap()
            .get(&RequestContext::background(), "orders", "k")
            .await
            .unwrap_err();

        match err {
            PeerError::Rpc { status, .. } => assert_eq!(status.code(), tonic::Code::InvalidArgument),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_loader_failure_is_rpc_error() {
        let server = start_server().await;
        let pool = client_pool(&server).await;

        let err = pool
            .pick_peer("missing-1")
            .unwrap()
            .get(&RequestContext::background(), "users", "missing-1")
            .await
            .unwrap_err();

        match err {
            PeerError::Rpc { status, .. } => assert_eq!(status.code(), tonic::Code::Internal),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_peer_is_not_a_member() {
        // Bind then drop to get a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead = listener.local_addr().unwrap().to_string();
        drop(listener);

        let pool = PeerPool::new(
            CLIENT_SELF,
            PoolOptions::default().with_dial_timeout(Duration::from_millis(500)),
        )
        .expect("valid options");
        pool.set_peers([CLIENT_SELF.to_string(), dead]).await;

        assert_eq!(pool.peers(), vec![CLIENT_SELF.to_string()]);
        assert!(pool.pick_peer("k").is_none());
        assert_eq!(pool.connection_count(), 0);
    }
}

//! Peer Discovery Tests
//!
//! ## Test Scopes
//! - **Peer infos**: address selection and normalization, invalid records.
//! - **Static peers**: one snapshot, then idle until shutdown.
//! - **Registry peers**: one normalized snapshot per published record list.

#[cfg(test)]
mod tests {
    use crate::cache::types::BoxFuture;
    use crate::discovery::{
        PeerDiscovery, PeerInfo, PeerSetter, RegistryPeers, StaticPeers, peers_from_infos,
    };

    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::watch;

    fn info(http: &str, grpc: &str) -> PeerInfo {
        PeerInfo {
            http_address: http.to_string(),
            grpc_address: grpc.to_string(),
        }
    }

    fn recording_setter() -> (PeerSetter, Arc<Mutex<Vec<Vec<String>>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let setter: PeerSetter = Arc::new(move |peers: Vec<String>| {
            sink.lock().unwrap().push(peers);
            Box::pin(async {}) as BoxFuture<'static, ()>
        });
        (setter, seen)
    }

    // ============================================================
    // PEER INFOS
    // ============================================================

    #[test]
    fn test_grpc_addresses_get_http_scheme() {
        let peers = peers_from_infos(&[info("", "10.0.0.1:3000"), info("", "10.0.0.2:3000")]);
        assert_eq!(peers, vec!["http://10.0.0.1:3000", "http://10.0.0.2:3000"]);
    }

    #[test]
    fn test_http_addresses_pass_through() {
        let peers = peers_from_infos(&[
            info("http://10.0.0.1:3000", ""),
            info("http://10.0.0.2:3000", "10.0.0.9:3000"),
        ]);
        assert_eq!(peers, vec!["http://10.0.0.1:3000", "http://10.0.0.2:3000"]);
    }

    #[test]
    fn test_invalid_info_is_skipped() {
        let peers = peers_from_infos(&[info("", ""), info("http://10.0.0.2:3000", "")]);
        assert_eq!(peers, vec!["http://10.0.0.2:3000"]);
    }

    #[test]
    fn test_scheme_is_forced_to_http() {
        let peers = peers_from_infos(&[info("https://10.0.0.1:3000", ""), info("", "/10.0.0.2:3000/")]);
        assert_eq!(peers, vec!["http://10.0.0.1:3000", "http://10.0.0.2:3000"]);
    }

    // ============================================================
    // STATIC PEERS
    // ============================================================

    #[tokio::test]
    async fn test_static_peers_set_once_and_wait_for_shutdown() {
        let discovery = Arc::new(StaticPeers::new(["a:1", "b:1"]));
        let (setter, seen) = recording_setter();
        let (tx, rx) = watch::channel(false);

        let task = {
            let discovery = discovery.clone();
            tokio::spawn(async move { discovery.maintain(setter, rx).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!task.is_finished());
        assert_eq!(*seen.lock().unwrap(), vec![vec!["a:1".to_string(), "b:1".to_string()]]);

        tx.send(true).unwrap();
        task.await.unwrap().unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_static_peers_stop_when_sender_dropped() {
        let discovery = StaticPeers::new(Vec::<String>::new());
        let (setter, seen) = recording_setter();
        let (tx, rx) = watch::channel(false);
        drop(tx);

        discovery.maintain(setter, rx).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![Vec::<String>::new()]);
    }

    // ============================================================
    // REGISTRY PEERS
    // ============================================================

    #[tokio::test]
    async fn test_registry_peers_follow_feed() {
        let (feed, infos) = watch::channel(vec![info("", "10.0.0.1:3000")]);
        let discovery = Arc::new(RegistryPeers::new(infos));
        let (setter, seen) = recording_setter();
        let (tx, rx) = watch::channel(false);

        let task = {
            let discovery = discovery.clone();
            tokio::spawn(async move { discovery.maintain(setter, rx).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        feed.send(vec![info("", "10.0.0.1:3000"), info("", ""), info("http://10.0.0.2:3000", "")])
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                vec!["http://10.0.0.1:3000".to_string()],
                vec!["http://10.0.0.1:3000".to_string(), "http://10.0.0.2:3000".to_string()],
            ]
        );

        tx.send(true).unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_registry_peers_stop_when_feed_closes() {
        let (feed, infos) = watch::channel(Vec::<PeerInfo>::new());
        let discovery = RegistryPeers::new(infos);
        let (setter, seen) = recording_setter();
        let (_tx, rx) = watch::channel(false);
        drop(feed);

        discovery.maintain(setter, rx).await.unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}

use axum::Json;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Router, extract::Extension, routing::get};
use distributed_cache::cache::handlers::{
    handle_get, handle_group_stats, handle_peers, handle_remove, handle_stats,
};
use distributed_cache::cache::protocol::{
    ENDPOINT_CACHE, ENDPOINT_GROUP_STATS, ENDPOINT_PEERS, ENDPOINT_STATS, ErrorResponse,
};
use distributed_cache::cache::{ByteSink, GetterFn, GroupRegistry, RequestContext};
use distributed_cache::config::Config;
use distributed_cache::discovery::{PeerDiscovery, StaticPeers, pool_setter};
use distributed_cache::pool::{PeerPool, PoolOptions};
use distributed_cache::rpc::GroupCacheService;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};

const DATA_GROUP: &str = "data";
const BACKEND_TIMEOUT: Duration = Duration::from_millis(250);
const DATA_TTL: Duration = Duration::from_secs(60);
const STATS_INTERVAL: Duration = Duration::from_secs(15);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .init();

    tracing::info!(
        http = %config.http_addr,
        rpc = %config.rpc_addr,
        self_addr = %config.self_addr,
        "starting cache node"
    );
    if config.peers.is_empty() {
        tracing::info!("no peers configured, serving every key locally");
    } else {
        tracing::info!("Peers: {:?}", config.peers);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // 1. Peer pool:
    let pool = PeerPool::new(
        config.self_addr.clone(),
        PoolOptions::default()
            .with_replicas(config.replicas)
            .with_dial_timeout(config.dial_timeout),
    )?;
    let janitor = pool.start_janitor();

    // 2. Cache groups:
    let groups = GroupRegistry::new();
    groups.register_peer_picker(pool.clone())?;
    groups.new_group(
        DATA_GROUP,
        config.cache_entries,
        GetterFn::new(load_data).with_ttl(DATA_TTL),
    )?;

    // 3. Peer gRPC server:
    let rpc_listener = tokio::net::TcpListener::bind(config.rpc_addr).await?;
    let rpc_server = {
        let service = GroupCacheService::new(groups.clone());
        let mut shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            let signal = async move {
                let _ = shutdown.wait_for(|stop| *stop).await;
            };
            if let Err(e) = service.serve_with_shutdown(rpc_listener, signal).await {
                tracing::error!(error = %e, "peer gRPC server failed");
            }
        })
    };

    // 4. Discovery:
    let discovery = StaticPeers::new(config.peers.clone());
    let setter = pool_setter(pool.clone());
    let discovery_rx = shutdown_rx.clone();
    let discovery_task = tokio::spawn(async move {
        if let Err(e) = discovery.maintain(setter, discovery_rx).await {
            tracing::error!(error = %e, "failed maintaining peers");
        }
    });

    // 5. Stats reporter:
    let stats_groups = groups.clone();
    let mut stats_rx = shutdown_rx.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(STATS_INTERVAL);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = stats_rx.changed() => break,
            }
            for name in stats_groups.group_names() {
                if let Some(group) = stats_groups.get_group(&name) {
                    tracing::debug!(
                        group = %name,
                        stats = ?group.stats().snapshot(),
                        tiers = ?group.tier_stats(),
                        "group stats"
                    );
                }
            }
        }
    });

    // 6. HTTP Router:
    let app = Router::new()
        .route("/data/:guid", get(handle_get_data))
        .route(ENDPOINT_CACHE, get(handle_get).delete(handle_remove))
        .route(ENDPOINT_STATS, get(handle_stats))
        .route(ENDPOINT_GROUP_STATS, get(handle_group_stats))
        .route(ENDPOINT_PEERS, get(handle_peers))
        .layer(Extension(groups))
        .layer(Extension(pool));

    let app = if config.log_requests {
        tracing::info!("request logger enabled");
        app.layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(tracing::Level::INFO))
                .on_response(DefaultOnResponse::new().level(tracing::Level::INFO)),
        )
    } else {
        app
    };

    // 7. Start HTTP server:
    tracing::info!("HTTP server listening on {}", config.http_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(config.http_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed listening for ctrl-c");
            }
            tracing::info!("shutting down");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    janitor.shutdown().await;
    if let Err(e) = rpc_server.await {
        tracing::warn!(error = %e, "peer gRPC server task ended abnormally");
    }
    if let Err(e) = discovery_task.await {
        tracing::warn!(error = %e, "discovery task ended abnormally");
    }

    tracing::info!("node exited cleanly");
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Data {
    guid: String,
    created_at_ms: u64,
}

/// Source of truth behind the `data` group. Only called on the owner of `guid`.
async fn load_data(guid: String) -> anyhow::Result<Vec<u8>> {
    tracing::info!(key = %guid, "fetching key from backend");

    let data = tokio::time::timeout(BACKEND_TIMEOUT, async {
        let created_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Data {
            guid: guid.clone(),
            created_at_ms,
        }
    })
    .await
    .map_err(|_| anyhow::anyhow!("backend timed out fetching '{}'", guid))?;

    Ok(serde_json::to_vec(&data)?)
}

async fn handle_get_data(
    Extension(groups): Extension<Arc<GroupRegistry>>,
    Path(guid): Path<String>,
) -> Response {
    let Some(group) = groups.get_group(DATA_GROUP) else {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "data group missing".into());
    };

    let ctx = RequestContext::with_timeout(CLIENT_TIMEOUT);
    let mut sink = ByteSink::new();
    if let Err(e) = group.get(&ctx, &guid, &mut sink).await {
        tracing::error!(key = %guid, error = %e, "failed getting data");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }

    match serde_json::from_slice::<Data>(sink.bytes().unwrap_or_default()) {
        Ok(data) => Json(data).into_response(),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed decoding cached data: {}", e),
        ),
    }
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

use axum::{
    Json,
    extract::{Extension, Path},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Duration;

use super::protocol::{ErrorResponse, GroupStatsResponse, PeersResponse, RemoveResponse};
use super::registry::GroupRegistry;
use super::types::{ByteSink, RequestContext};
use crate::error::CacheError;
use crate::pool::PeerPool;

/// Budget for one client lookup, including any call to the owning peer.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

fn unknown_group(group: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("unknown group '{}'", group),
        }),
    )
        .into_response()
}

pub async fn handle_get(
    Extension(groups): Extension<Arc<GroupRegistry>>,
    Path((group_name, key)): Path<(String, String)>,
) -> Response {
    let Some(group) = groups.get_group(&group_name) else {
        return unknown_group(&group_name);
    };

    let ctx = RequestContext::with_timeout(REQUEST_TIMEOUT);
    let mut sink = ByteSink::new();

    match group.get(&ctx, &key, &mut sink).await {
        Ok(()) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/octet-stream")],
            sink.into_bytes().unwrap_or_default(),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(group = %group_name, key = %key, error = %e, "failed to get key");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

pub async fn handle_remove(
    Extension(groups): Extension<Arc<GroupRegistry>>,
    Path((group_name, key)): Path<(String, String)>,
) -> Response {
    let Some(group) = groups.get_group(&group_name) else {
        return unknown_group(&group_name);
    };

    let ctx = RequestContext::with_timeout(REQUEST_TIMEOUT);

    match group.remove(&ctx, &key).await {
        Ok(()) => (
            StatusCode::OK,
            Json(RemoveResponse {
                success: true,
                failed_peers: vec![],
            }),
        )
            .into_response(),
        Err(CacheError::PartialRemove { failed, .. }) => (
            StatusCode::BAD_GATEWAY,
            Json(RemoveResponse {
                success: false,
                failed_peers: failed.iter().map(|e| e.peer().to_string()).collect(),
            }),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

pub async fn handle_stats(
    Extension(groups): Extension<Arc<GroupRegistry>>,
) -> Json<Vec<GroupStatsResponse>> {
    let stats = groups
        .group_names()
        .into_iter()
        .filter_map(|name| groups.get_group(&name))
        .map(|group| GroupStatsResponse {
            group: group.name().to_string(),
            stats: group.stats().snapshot(),
            tiers: group.tier_stats(),
        })
        .collect();

    Json(stats)
}

pub async fn handle_group_stats(
    Extension(groups): Extension<Arc<GroupRegistry>>,
    Path(group_name): Path<String>,
) -> Response {
    match groups.get_group(&group_name) {
        Some(group) => Json(GroupStatsResponse {
            group: group.name().to_string(),
            stats: group.stats().snapshot(),
            tiers: group.tier_stats(),
        })
        .into_response(),
        None => unknown_group(&group_name),
    }
}

pub async fn handle_peers(Extension(pool): Extension<Arc<PeerPool>>) -> Json<PeersResponse> {
    Json(PeersResponse {
        self_addr: pool.self_addr().to_string(),
        members: pool.peers(),
        connections: pool.connection_count(),
    })
}

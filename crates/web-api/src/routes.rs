use axum::{
    body::Bytes,
    extract::{
        rejection::QueryRejection,
        ws::{rejection::WebSocketUpgradeRejection, WebSocketUpgrade},
        Query, State,
    },
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tower_http::trace::TraceLayer;

use domain::Identity;

use crate::{error::ApiError, state::AppState, ws_connection::WebSocketConnection};

/// 查询参数按原始键值对读取，重复的 `userId` 取第一个
type QueryPairs = Vec<(String, String)>;

fn identity_from_query(query: Result<Query<QueryPairs>, QueryRejection>) -> Option<Identity> {
    let Ok(Query(pairs)) = query else {
        return None;
    };
    pairs
        .into_iter()
        .find(|(key, _)| key == "userId")
        .and_then(|(_, value)| Identity::from_param(Some(&value)))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/message", any(ingest_message))
        // 任意路径都接受 WebSocket 升级，普通请求一律 404
        .fallback(websocket_or_not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn websocket_or_not_found(
    State(state): State<AppState>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    query: Result<Query<QueryPairs>, QueryRejection>,
) -> Response {
    let Ok(ws) = upgrade else {
        return ApiError::not_found().into_response();
    };

    let identity = identity_from_query(query);
    ws.on_upgrade(move |socket| WebSocketConnection::new(socket, state, identity).run())
}

async fn ingest_message(
    State(state): State<AppState>,
    method: Method,
    body: Bytes,
) -> Result<(StatusCode, &'static str), ApiError> {
    if method != Method::POST {
        return Err(ApiError::not_found());
    }

    state.relay.bridge().accept(&body).await?;
    Ok((StatusCode::OK, "Message received"))
}

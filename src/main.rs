//! 룸 기반 WebRTC 시그널링 릴레이 서버

mod config;
mod error;
mod handlers;
mod protocol;
mod state;

use anyhow::Context;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::{Html, IntoResponse, Json},
    routing::get,
    Router,
};
use config::Config;
use futures::{SinkExt, StreamExt};
use protocol::{ClientMessage, ServerMessage};
use state::AppState;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();

    // 로깅 초기화
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let state = Arc::new(AppState::new(config.clone()));
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("Signaling relay started");
    tracing::info!("Address: {}", addr);
    tracing::info!("WebSocket: ws://{}/ws", addr);
    tracing::info!(
        stun = config.turn.stun_servers.len(),
        turn = config.turn.servers.len(),
        "ICE servers configured"
    );

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    // CORS 설정
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler));

    // 정적 파일 디렉토리가 있으면 나머지 경로는 그쪽으로
    let app = match &state.config.document_root {
        Some(root) => app.fallback_service(ServeDir::new(root)),
        None => app.route("/", get(index_handler)),
    };

    app.layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index_handler() -> Html<&'static str> {
    Html("<h1>Signaling Relay</h1><p>WebSocket endpoint: /ws</p>")
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let (connections, rooms) = {
        let signaling = state.signaling.read().await;
        (signaling.registry.len(), signaling.rooms.len())
    };

    Json(serde_json::json!({
        "status": "ok",
        "server": env!("CARGO_PKG_NAME"),
        "connections": connections,
        "rooms": rooms,
        "pending_offers": state.pending.len(),
        "timestamp": handlers::turn::unix_now(),
    }))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    // 연결 처리
    let connection_id = match handlers::handle_connection(&state, tx.clone()).await {
        Ok(id) => id,
        Err(e) => {
            tracing::error!(error = %e, "Failed to register connection");
            return;
        }
    };

    // 송신 태스크
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(e) => tracing::error!(error = %e, "Failed to serialize server message"),
            }
        }
    });

    // 수신 처리 (커넥션당 하나의 워커, 이벤트는 순서대로 처리)
    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => {
                    handlers::handle_client_message(&state, &connection_id, &tx, msg).await;
                }
                Err(e) => handlers::handle_invalid_message(&connection_id, &tx, &e.to_string()),
            },
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::debug!(connection_id = %connection_id, error = %e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }

    // 연결 해제
    handlers::handle_disconnect(&state, &connection_id).await;
    send_task.abort();
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap_or_default())
    }

    #[tokio::test]
    async fn health_reports_live_counts() {
        let state = Arc::new(AppState::new(Config::default()));
        let (a, _a_tx, _a_rx) = handlers::testing::connect(&state).await;
        let (_b, _b_tx, _b_rx) = handlers::testing::connect(&state).await;
        handlers::testing::join(&state, &a, "r").await;

        let (status, body) = get_json(router(state), "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["connections"], 2);
        assert_eq!(body["rooms"], 1);
    }

    #[tokio::test]
    async fn index_is_served_without_document_root() {
        let state = Arc::new(AppState::new(Config::default()));
        let response = router(state)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn ws_route_requires_upgrade() {
        let state = Arc::new(AppState::new(Config::default()));
        let response = router(state)
            .oneshot(Request::builder().uri("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }
}

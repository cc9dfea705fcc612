//! 연결 핸들러

use crate::error::SignalingError;
use crate::protocol::ServerMessage;
use crate::state::{AppState, ConnectionId};
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// 새 연결 처리
pub async fn handle_connection(
    state: &AppState,
    sender: UnboundedSender<ServerMessage>,
) -> Result<ConnectionId, SignalingError> {
    let connection_id = Uuid::new_v4().to_string();

    state
        .signaling
        .write()
        .await
        .registry
        .register(connection_id.clone(), sender.clone())?;

    let _ = sender.send(ServerMessage::Connected {
        connection_id: connection_id.clone(),
    });

    tracing::info!(connection_id = %connection_id, "New connection established");
    Ok(connection_id)
}

/// 연결 해제 처리
///
/// 참여 중이면 나가기와 레지스트리 제거를 같은 락 안에서 수행한다.
/// 이미 제거된 커넥션에 대해 다시 호출해도 아무 일도 일어나지 않는다.
pub async fn handle_disconnect(state: &AppState, connection_id: &str) {
    let departure = state.signaling.write().await.disconnect(connection_id);

    // 레지스트리에서 빠진 뒤에 정리해야 새 offer가 끼어들지 못한다
    let abandoned = state.pending.abandon(connection_id);

    match departure {
        Ok(departure) => tracing::info!(
            connection_id = %connection_id,
            left_room = ?departure.left_room,
            abandoned_offers = abandoned,
            connected_secs = departure.connection.connected_at.elapsed().as_secs(),
            "Connection closed"
        ),
        Err(SignalingError::UnknownConnection(_)) => {
            tracing::debug!(connection_id = %connection_id, "Connection already closed")
        }
        Err(e) => tracing::warn!(connection_id = %connection_id, error = %e, "Disconnect cleanup failed"),
    }
}

/// Heartbeat 처리
pub fn handle_heartbeat(sender: &UnboundedSender<ServerMessage>) {
    let _ = sender.send(ServerMessage::HeartbeatAck);
}

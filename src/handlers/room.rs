//! 방 관리 핸들러

use super::turn;
use crate::error::SignalingError;
use crate::protocol::ServerMessage;
use crate::state::AppState;

/// 방 참여 처리
pub async fn handle_join_room(
    state: &AppState,
    connection_id: &str,
    room_id: &str,
) -> Result<(), SignalingError> {
    let room_id = match room_id.trim() {
        "" => state.config.room.default_room.clone(),
        name => name.to_string(),
    };

    // 자격증명 발급은 락 밖에서
    let ice_servers = turn::ice_servers_for(&state.config.turn, connection_id);

    let mut signaling = state.signaling.write().await;
    let members = signaling.join(connection_id, &room_id, state.config.room.max_size)?;
    let member_count = members.len() + 1;

    // 참여 응답도 락 안에서 보내야 이후 들어오는 ClientJoinedRoom보다 앞선다
    if let Err(e) = signaling.registry.send(
        connection_id,
        ServerMessage::JoinedRoom {
            room_id: room_id.clone(),
            ice_servers,
            members,
        },
    ) {
        tracing::debug!(connection_id = %connection_id, error = %e, "Joiner went away before reply");
    }

    tracing::info!(
        connection_id = %connection_id,
        room_id = %room_id,
        user_count = member_count,
        "User joined room"
    );
    Ok(())
}

/// 방 나가기 처리
pub async fn handle_leave_room(
    state: &AppState,
    connection_id: &str,
) -> Result<(), SignalingError> {
    let mut signaling = state.signaling.write().await;
    let room_id = signaling.leave(connection_id)?;
    let remaining = signaling.rooms.member_count(&room_id);

    // 방을 나간 커넥션은 더 이상 answer를 보낼 수 없다
    let abandoned = state.pending.abandon(connection_id);

    let _ = signaling.registry.send(
        connection_id,
        ServerMessage::LeftRoom {
            room_id: room_id.clone(),
        },
    );

    tracing::info!(
        connection_id = %connection_id,
        room_id = %room_id,
        remaining = remaining,
        abandoned_offers = abandoned,
        "User left room"
    );
    Ok(())
}

//! 세션 상태 머신
//!
//! 상태마다 고정된 핸들러 테이블로 분기한다. `Unjoined`에서는 참여만,
//! `Joined`에서는 나가기와 중계만 받는다. Heartbeat는 어느 상태에서나 받는다.
//!
//! 한 커넥션의 이벤트는 그 커넥션의 수신 루프에서 순서대로 처리되고, 상태
//! 전이는 레지스트리 쓰기 락 안에서 일어나므로 이전 상태의 핸들러로
//! 이벤트가 분기되는 일은 없다.

use super::{connection, room, signaling};
use crate::error::SignalingError;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::{AppState, SessionState};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;

/// 클라이언트 메시지 처리. 실패는 해당 클라이언트에게만 알린다.
pub async fn handle_client_message(
    state: &Arc<AppState>,
    connection_id: &str,
    sender: &UnboundedSender<ServerMessage>,
    msg: ClientMessage,
) {
    let kind = msg.kind();
    // offer 실패는 클라이언트의 request_id와 묶어서 돌려준다
    let request_id = match &msg {
        ClientMessage::Offer { request_id, .. } => Some(request_id.clone()),
        _ => None,
    };
    if let Err(e) = dispatch(state, connection_id, sender, msg).await {
        report_error(connection_id, sender, kind, &e, request_id);
    }
}

/// 파싱할 수 없는 프레임 처리
pub fn handle_invalid_message(
    connection_id: &str,
    sender: &UnboundedSender<ServerMessage>,
    reason: &str,
) {
    let e = SignalingError::InvalidMessage(reason.to_string());
    report_error(connection_id, sender, "unknown", &e, None);
}

fn report_error(
    connection_id: &str,
    sender: &UnboundedSender<ServerMessage>,
    kind: &str,
    e: &SignalingError,
    request_id: Option<String>,
) {
    if e.is_internal() {
        tracing::warn!(connection_id = %connection_id, kind, error = %e, "Registry inconsistency");
    } else {
        tracing::debug!(connection_id = %connection_id, kind, error = %e, "Request rejected");
    }
    let _ = sender.send(ServerMessage::error(e, request_id));
}

/// 현재 상태의 핸들러 테이블로 분기
pub async fn dispatch(
    state: &Arc<AppState>,
    connection_id: &str,
    sender: &UnboundedSender<ServerMessage>,
    msg: ClientMessage,
) -> Result<(), SignalingError> {
    let session = state
        .signaling
        .read()
        .await
        .registry
        .get(connection_id)?
        .state
        .clone();

    match session {
        SessionState::Unjoined => on_unjoined(state, connection_id, sender, msg).await,
        SessionState::Joined { room } => on_joined(state, connection_id, &room, sender, msg).await,
    }
}

async fn on_unjoined(
    state: &Arc<AppState>,
    connection_id: &str,
    sender: &UnboundedSender<ServerMessage>,
    msg: ClientMessage,
) -> Result<(), SignalingError> {
    match msg {
        ClientMessage::Heartbeat => {
            connection::handle_heartbeat(sender);
            Ok(())
        }
        ClientMessage::JoinRoom { room_id } => {
            room::handle_join_room(state, connection_id, &room_id).await
        }
        ClientMessage::LeaveRoom
        | ClientMessage::Offer { .. }
        | ClientMessage::Answer { .. }
        | ClientMessage::IceCandidate { .. } => Err(SignalingError::NotJoined),
    }
}

async fn on_joined(
    state: &Arc<AppState>,
    connection_id: &str,
    room_id: &str,
    sender: &UnboundedSender<ServerMessage>,
    msg: ClientMessage,
) -> Result<(), SignalingError> {
    match msg {
        ClientMessage::Heartbeat => {
            connection::handle_heartbeat(sender);
            Ok(())
        }
        ClientMessage::JoinRoom { .. } => Err(SignalingError::AlreadyJoined(room_id.to_string())),
        ClientMessage::LeaveRoom => room::handle_leave_room(state, connection_id).await,
        ClientMessage::Offer {
            target,
            sdp,
            request_id,
        } => {
            let (reply, answer) = oneshot::channel();
            signaling::relay_offer(state, connection_id, &target, sdp, reply).await?;
            tokio::spawn(signaling::await_answer(
                answer,
                target,
                request_id,
                sender.clone(),
            ));
            Ok(())
        }
        ClientMessage::Answer { request_id, sdp } => {
            signaling::relay_answer(state, connection_id, &request_id, sdp).await
        }
        ClientMessage::IceCandidate { target, candidate } => {
            signaling::relay_candidate(state, connection_id, &target, candidate).await
        }
    }
}

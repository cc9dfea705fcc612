//! 핸들러 테스트 공용 헬퍼

use super::{connection, room};
use crate::protocol::ServerMessage;
use crate::state::{AppState, ConnectionId};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// 커넥션을 열고 `Connected` 메시지는 소비한다
pub(crate) async fn connect(
    state: &AppState,
) -> (
    ConnectionId,
    UnboundedSender<ServerMessage>,
    UnboundedReceiver<ServerMessage>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let id = connection::handle_connection(state, tx.clone())
        .await
        .expect("fresh connection id");
    assert!(matches!(
        rx.try_recv(),
        Ok(ServerMessage::Connected { connection_id }) if connection_id == id
    ));
    (id, tx, rx)
}

pub(crate) async fn join(state: &AppState, id: &str, room_id: &str) {
    room::handle_join_room(state, id, room_id)
        .await
        .expect("join succeeds");
}

/// 이미 도착한 메시지 전부
pub(crate) fn drain(rx: &mut UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

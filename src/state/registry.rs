//! 커넥션 레지스트리

use super::ConnectionId;
use crate::error::SignalingError;
use crate::protocol::ServerMessage;
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;

/// 커넥션별 세션 상태
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Unjoined,
    Joined { room: String },
}

impl SessionState {
    pub fn room(&self) -> Option<&str> {
        match self {
            Self::Unjoined => None,
            Self::Joined { room } => Some(room),
        }
    }
}

/// 살아있는 커넥션 하나
pub struct Connection {
    pub id: ConnectionId,
    pub state: SessionState,
    pub sender: UnboundedSender<ServerMessage>,
    pub connected_at: Instant,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Connection>,
}

impl ConnectionRegistry {
    /// 방 없이 새 커넥션 등록
    pub fn register(
        &mut self,
        id: ConnectionId,
        sender: UnboundedSender<ServerMessage>,
    ) -> Result<(), SignalingError> {
        if self.connections.contains_key(&id) {
            return Err(SignalingError::DuplicateId(id));
        }
        self.connections.insert(
            id.clone(),
            Connection {
                id,
                state: SessionState::Unjoined,
                sender,
                connected_at: Instant::now(),
            },
        );
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<&Connection, SignalingError> {
        self.connections
            .get(id)
            .ok_or_else(|| SignalingError::UnknownConnection(id.to_string()))
    }

    pub fn get_mut(&mut self, id: &str) -> Result<&mut Connection, SignalingError> {
        self.connections
            .get_mut(id)
            .ok_or_else(|| SignalingError::UnknownConnection(id.to_string()))
    }

    /// 송신 핸들 조회
    pub fn lookup(&self, id: &str) -> Result<&UnboundedSender<ServerMessage>, SignalingError> {
        self.get(id).map(|conn| &conn.sender)
    }

    /// 커넥션 제거. 방 정리는 호출하는 쪽에서 먼저 끝내야 한다.
    pub fn remove(&mut self, id: &str) -> Result<Connection, SignalingError> {
        self.connections
            .remove(id)
            .ok_or_else(|| SignalingError::UnknownConnection(id.to_string()))
    }

    /// 커넥션에 메시지 전송. 닫힌 채널은 조회 실패와 구분하지 않는다.
    pub fn send(&self, id: &str, message: ServerMessage) -> Result<(), SignalingError> {
        self.lookup(id)?
            .send(message)
            .map_err(|_| SignalingError::UnknownConnection(id.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ConnectionId, &Connection)> {
        self.connections.iter()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }
}

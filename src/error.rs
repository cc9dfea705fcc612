//! 시그널링 에러 정의

use crate::state::ConnectionId;
use thiserror::Error;

/// 커넥션 또는 요청 단위로 한정되는 에러
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalingError {
    #[error("connection {0} is already registered")]
    DuplicateId(ConnectionId),

    #[error("connection {0} is not registered")]
    UnknownConnection(ConnectionId),

    #[error("already joined room {0}")]
    AlreadyJoined(String),

    #[error("not joined to a room")]
    NotJoined,

    #[error("room {0} is full")]
    RoomFull(String),

    #[error("target {0} is not reachable")]
    UnknownTarget(ConnectionId),

    #[error("no pending offer for request {0}")]
    UnknownRequest(String),

    #[error("{0} disconnected before answering")]
    NoResponse(ConnectionId),

    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

impl SignalingError {
    /// 클라이언트에 전달되는 에러 코드
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateId(_) => "duplicate_id",
            Self::UnknownConnection(_) => "unknown_connection",
            Self::AlreadyJoined(_) => "already_joined",
            Self::NotJoined => "not_joined",
            Self::RoomFull(_) => "room_full",
            Self::UnknownTarget(_) => "unknown_target",
            Self::UnknownRequest(_) => "unknown_request",
            Self::NoResponse(_) => "no_response",
            Self::InvalidMessage(_) => "invalid_message",
        }
    }

    /// 레지스트리 일관성 위반 여부
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::DuplicateId(_) | Self::UnknownConnection(_))
    }
}

//! 클라이언트-서버 메시지 프로토콜 정의

use crate::error::SignalingError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 클라이언트 → 서버 메시지
///
/// `sdp`/`candidate`는 해석하지 않고 그대로 전달한다. 클라이언트가 보낸
/// 발신자 필드는 역직렬화 단계에서 버려진다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    // Connection
    Heartbeat,

    // Room Management
    JoinRoom {
        #[serde(default)]
        room_id: String,
    },
    LeaveRoom,

    // WebRTC Signaling
    Offer {
        target: String,
        sdp: Value,
        request_id: String,
    },
    Answer {
        request_id: String,
        sdp: Value,
    },
    IceCandidate {
        target: String,
        candidate: Value,
    },
}

impl ClientMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Heartbeat => "heartbeat",
            Self::JoinRoom { .. } => "join",
            Self::LeaveRoom => "leave",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::IceCandidate { .. } => "candidate",
        }
    }
}

/// 서버 → 클라이언트 메시지
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    // Connection
    Connected {
        connection_id: String,
    },
    HeartbeatAck,
    Error {
        code: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },

    // Room Events
    JoinedRoom {
        room_id: String,
        ice_servers: Vec<IceServer>,
        members: Vec<String>,
    },
    LeftRoom {
        room_id: String,
    },
    ClientJoinedRoom {
        connection_id: String,
    },
    ClientLeftRoom {
        connection_id: String,
    },

    // WebRTC Signaling
    Offer {
        from: String,
        request_id: String,
        sdp: Value,
    },
    Answer {
        from: String,
        request_id: String,
        sdp: Value,
    },
    IceCandidate {
        from: String,
        candidate: Value,
    },
}

impl ServerMessage {
    pub fn error(err: &SignalingError, request_id: Option<String>) -> Self {
        Self::Error {
            code: err.code().to_string(),
            message: err.to_string(),
            request_id,
        }
    }
}

/// ICE 서버 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_type: Option<String>,
}

//! 애플리케이션 상태 관리
//!
//! 커넥션 레지스트리와 방 디렉토리는 하나의 락 아래에 둔다. 방 멤버십을
//! 읽고 쓰는 연산(참여, 나가기, 연결 해제)은 모두 쓰기 락 안에서 끝나므로
//! "방 R의 멤버 집합 == {c : c.room == R}" 이 락 밖에서 항상 성립한다.

mod directory;
mod registry;

pub use directory::RoomDirectory;
pub use registry::{Connection, ConnectionRegistry, SessionState};

use crate::config::Config;
use crate::error::SignalingError;
use crate::handlers::signaling::PendingOffers;
use crate::protocol::ServerMessage;
use std::sync::Arc;
use tokio::sync::RwLock;

pub type ConnectionId = String;

/// 서버 인스턴스 상태
pub struct AppState {
    /// 레지스트리 + 방 디렉토리
    pub signaling: RwLock<Signaling>,
    /// 응답 대기 중인 offer (request_id -> PendingOffer)
    pub pending: PendingOffers,
    /// 설정
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            signaling: RwLock::new(Signaling::default()),
            pending: PendingOffers::default(),
            config: Arc::new(config),
        }
    }
}

/// 연결 해제 결과
pub struct Departure {
    pub connection: Connection,
    pub left_room: Option<String>,
}

#[derive(Default)]
pub struct Signaling {
    pub registry: ConnectionRegistry,
    pub rooms: RoomDirectory,
}

impl Signaling {
    /// Unjoined -> Joined 전이
    ///
    /// 참여 전 멤버 목록을 반환한다. 기존 멤버에게는 `ClientJoinedRoom`을 보낸다.
    pub fn join(
        &mut self,
        id: &str,
        room: &str,
        max_size: usize,
    ) -> Result<Vec<ConnectionId>, SignalingError> {
        if let SessionState::Joined { room: current } = &self.registry.get(id)?.state {
            return Err(SignalingError::AlreadyJoined(current.clone()));
        }

        let members = self.rooms.list_members(room);
        if max_size > 0 && members.len() >= max_size {
            return Err(SignalingError::RoomFull(room.to_string()));
        }

        self.rooms.add_member(room, id);
        self.registry.get_mut(id)?.state = SessionState::Joined {
            room: room.to_string(),
        };

        let notified = self.rooms.broadcast(
            &self.registry,
            room,
            &ServerMessage::ClientJoinedRoom {
                connection_id: id.to_string(),
            },
            id,
        );
        tracing::debug!(connection_id = %id, room_id = %room, notified, "Announced join");

        debug_assert!(self.is_consistent());
        Ok(members)
    }

    /// Joined -> Unjoined 전이. 남은 멤버에게 `ClientLeftRoom`을 보낸다.
    pub fn leave(&mut self, id: &str) -> Result<String, SignalingError> {
        let conn = self.registry.get_mut(id)?;
        let room = match std::mem::take(&mut conn.state) {
            SessionState::Joined { room } => room,
            SessionState::Unjoined => return Err(SignalingError::NotJoined),
        };

        self.rooms.remove_member(&room, id);
        let notified = self.rooms.broadcast(
            &self.registry,
            &room,
            &ServerMessage::ClientLeftRoom {
                connection_id: id.to_string(),
            },
            id,
        );
        tracing::debug!(connection_id = %id, room_id = %room, notified, "Announced leave");

        debug_assert!(self.is_consistent());
        Ok(room)
    }

    /// 참여 중이면 나가기를 먼저 수행한 뒤 레지스트리에서 제거
    pub fn disconnect(&mut self, id: &str) -> Result<Departure, SignalingError> {
        let left_room = match self.leave(id) {
            Ok(room) => Some(room),
            Err(SignalingError::NotJoined) => None,
            Err(e) => return Err(e),
        };
        let connection = self.registry.remove(id)?;

        debug_assert!(self.is_consistent());
        Ok(Departure {
            connection,
            left_room,
        })
    }

    /// 레지스트리와 방 디렉토리가 서로 일치하는지 검사
    pub fn is_consistent(&self) -> bool {
        let registry_side = self.registry.iter().all(|(id, conn)| {
            conn.id == *id
                && match conn.state.room() {
                    Some(room) => {
                        self.rooms.contains(room, id)
                            && self.rooms.iter().filter(|(_, m)| m.contains(id)).count() == 1
                    }
                    None => self.rooms.iter().all(|(_, members)| !members.contains(id)),
                }
        });
        let directory_side = self.rooms.iter().all(|(room, members)| {
            !members.is_empty()
                && members.iter().all(|id| {
                    self.registry
                        .get(id)
                        .is_ok_and(|conn| conn.state.room() == Some(room.as_str()))
                })
        });
        registry_side && directory_side
    }
}

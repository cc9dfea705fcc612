//! 방 디렉토리 (방 이름 -> 멤버 집합)

use super::{ConnectionId, ConnectionRegistry};
use crate::protocol::ServerMessage;
use std::collections::{HashMap, HashSet};

#[derive(Default)]
pub struct RoomDirectory {
    rooms: HashMap<String, HashSet<ConnectionId>>,
}

impl RoomDirectory {
    /// 현재 멤버 목록 (순서 없음)
    pub fn list_members(&self, room: &str) -> Vec<ConnectionId> {
        self.rooms
            .get(room)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// 멤버 추가. 방이 없으면 만든다. 이미 멤버면 false.
    pub fn add_member(&mut self, room: &str, id: &str) -> bool {
        self.rooms
            .entry(room.to_string())
            .or_insert_with(|| {
                tracing::info!(room_id = %room, "Room created");
                HashSet::new()
            })
            .insert(id.to_string())
    }

    /// 멤버 제거. 비게 된 방은 삭제한다.
    pub fn remove_member(&mut self, room: &str, id: &str) -> bool {
        let Some(members) = self.rooms.get_mut(room) else {
            return false;
        };
        let removed = members.remove(id);
        if members.is_empty() {
            self.rooms.remove(room);
            tracing::info!(room_id = %room, "Room deleted");
        }
        removed
    }

    pub fn contains(&self, room: &str, id: &str) -> bool {
        self.rooms
            .get(room)
            .is_some_and(|members| members.contains(id))
    }

    pub fn member_count(&self, room: &str) -> usize {
        self.rooms.get(room).map_or(0, HashSet::len)
    }

    /// 제외 대상을 뺀 모든 멤버에게 전송하고, 전달된 수를 반환한다.
    pub fn broadcast(
        &self,
        registry: &ConnectionRegistry,
        room: &str,
        message: &ServerMessage,
        excluding: &str,
    ) -> usize {
        let Some(members) = self.rooms.get(room) else {
            return 0;
        };
        let mut delivered = 0;
        for id in members.iter().filter(|id| id.as_str() != excluding) {
            match registry.send(id, message.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => tracing::debug!(room_id = %room, error = %e, "Broadcast target unreachable"),
            }
        }
        delivered
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &HashSet<ConnectionId>)> {
        self.rooms.iter()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }
}

//! WebRTC 시그널링 중계
//!
//! offer/answer/candidate 내용은 해석하지 않고 대상 커넥션에 그대로 전달한다.
//! `from`은 항상 서버가 알고 있는 발신 커넥션 id로 채운다.

use crate::error::SignalingError;
use crate::protocol::ServerMessage;
use crate::state::{AppState, ConnectionId, SessionState, Signaling};
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;
use uuid::Uuid;

/// offer에 대한 응답
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub from: ConnectionId,
    pub sdp: Value,
}

/// offer 하나에 묶인 응답 continuation
pub type AnswerReply = oneshot::Sender<Result<Answer, SignalingError>>;

struct PendingOffer {
    origin: ConnectionId,
    target: ConnectionId,
    reply: AnswerReply,
}

/// 응답 대기 중인 offer 테이블 (서버 request_id -> PendingOffer)
#[derive(Default)]
pub struct PendingOffers {
    inner: DashMap<String, PendingOffer>,
}

impl PendingOffers {
    /// 대상이 보낸 answer에 해당하는 항목을 꺼낸다
    fn take(&self, request_id: &str, answerer: &str) -> Result<PendingOffer, SignalingError> {
        self.inner
            .remove_if(request_id, |_, pending| pending.target == answerer)
            .map(|(_, pending)| pending)
            .ok_or_else(|| SignalingError::UnknownRequest(request_id.to_string()))
    }

    /// 방을 나갔거나 연결이 끊긴 커넥션과 관련된 항목 정리
    ///
    /// 그 커넥션이 대상인 offer는 `NoResponse`로 완료하고, 발신자인 offer는 버린다.
    pub fn abandon(&self, id: &str) -> usize {
        let keys: Vec<String> = self
            .inner
            .iter()
            .filter(|entry| entry.origin == id || entry.target == id)
            .map(|entry| entry.key().clone())
            .collect();

        let mut abandoned = 0;
        for key in keys {
            if let Some((_, pending)) = self.inner.remove(&key) {
                if pending.target == id {
                    let _ = pending
                        .reply
                        .send(Err(SignalingError::NoResponse(id.to_string())));
                }
                abandoned += 1;
            }
        }
        abandoned
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

/// 대상 커넥션의 송신 핸들 조회
///
/// 방에 들어가 있지 않은 대상은 answer를 보낼 수 없으므로 없는 대상으로 본다.
/// 같은 방 여부는 `require_shared_room`이 켜진 경우에만 확인한다. 방이 다른
/// 대상도 존재하지 않는 대상과 구분하지 않는다.
fn route<'a>(
    signaling: &'a Signaling,
    require_shared_room: bool,
    from: &str,
    target: &str,
) -> Result<&'a UnboundedSender<ServerMessage>, SignalingError> {
    let unknown = || SignalingError::UnknownTarget(target.to_string());
    let target_conn = signaling.registry.get(target).map_err(|_| unknown())?;
    if target_conn.state == SessionState::Unjoined {
        return Err(unknown());
    }

    if require_shared_room {
        let sender_room = signaling.registry.get(from)?.state.room();
        if sender_room.is_none() || sender_room != target_conn.state.room() {
            return Err(unknown());
        }
    }
    Ok(&target_conn.sender)
}

/// Offer 중계. 대상의 answer는 `reply`로 돌아온다.
pub async fn relay_offer(
    state: &AppState,
    from: &str,
    target: &str,
    sdp: Value,
    reply: AnswerReply,
) -> Result<(), SignalingError> {
    // 레지스트리 읽기 락을 쥔 채로 등록해야 대상의 연결 해제 정리와 엇갈리지 않는다
    let signaling = state.signaling.read().await;
    let handle = route(&signaling, state.config.room.require_shared_room, from, target)?;

    let request_id = Uuid::new_v4().to_string();
    state.pending.inner.insert(
        request_id.clone(),
        PendingOffer {
            origin: from.to_string(),
            target: target.to_string(),
            reply,
        },
    );

    let message = ServerMessage::Offer {
        from: from.to_string(),
        request_id: request_id.clone(),
        sdp,
    };
    if handle.send(message).is_err() {
        state.pending.inner.remove(&request_id);
        return Err(SignalingError::UnknownTarget(target.to_string()));
    }

    tracing::debug!(from = %from, target = %target, request_id = %request_id, "Relayed offer");
    Ok(())
}

/// Answer 처리. 해당 offer의 continuation을 완료한다.
pub async fn relay_answer(
    state: &AppState,
    from: &str,
    request_id: &str,
    sdp: Value,
) -> Result<(), SignalingError> {
    let pending = state.pending.take(request_id, from)?;

    // 발신자가 이미 사라졌으면 받을 쪽이 없다
    let _ = pending.reply.send(Ok(Answer {
        from: from.to_string(),
        sdp,
    }));

    tracing::debug!(from = %from, to = %pending.origin, request_id = %request_id, "Relayed answer");
    Ok(())
}

/// ICE Candidate 중계 (응답 없음)
pub async fn relay_candidate(
    state: &AppState,
    from: &str,
    target: &str,
    candidate: Value,
) -> Result<(), SignalingError> {
    let signaling = state.signaling.read().await;
    let handle = route(&signaling, state.config.room.require_shared_room, from, target)?;

    handle
        .send(ServerMessage::IceCandidate {
            from: from.to_string(),
            candidate,
        })
        .map_err(|_| SignalingError::UnknownTarget(target.to_string()))?;

    tracing::debug!(from = %from, target = %target, "Relayed ICE candidate");
    Ok(())
}

/// offer 발신자 쪽에서 answer를 기다렸다가 클라이언트의 request_id로 전달
pub async fn await_answer(
    reply: oneshot::Receiver<Result<Answer, SignalingError>>,
    target: ConnectionId,
    request_id: String,
    sender: UnboundedSender<ServerMessage>,
) {
    let message = match reply.await {
        Ok(Ok(answer)) => ServerMessage::Answer {
            from: answer.from,
            request_id,
            sdp: answer.sdp,
        },
        Ok(Err(e)) => ServerMessage::error(&e, Some(request_id)),
        Err(_) => ServerMessage::error(&SignalingError::NoResponse(target), Some(request_id)),
    };
    let _ = sender.send(message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::handlers::testing::{connect, drain, join};
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::mpsc::UnboundedReceiver;

    /// 방에 들어간 커넥션. 참여 응답은 소비한다.
    async fn joined(
        state: &AppState,
        room_id: &str,
    ) -> (
        ConnectionId,
        UnboundedSender<ServerMessage>,
        UnboundedReceiver<ServerMessage>,
    ) {
        let (id, tx, mut rx) = connect(state).await;
        join(state, &id, room_id).await;
        drain(&mut rx);
        (id, tx, rx)
    }

    fn offered_request_id(rx: &mut UnboundedReceiver<ServerMessage>) -> String {
        match rx.try_recv().unwrap() {
            ServerMessage::Offer { request_id, .. } => request_id,
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn offer_is_forwarded_with_server_side_sender() {
        let state = Arc::new(AppState::new(Config::default()));
        let (a, _a_tx, _a_rx) = joined(&state, "r").await;
        let (b, _b_tx, mut b_rx) = joined(&state, "r").await;
        let (reply, _reply_rx) = oneshot::channel();

        relay_offer(&state, &a, &b, json!({"sdp": "v=0"}), reply)
            .await
            .unwrap();

        match b_rx.try_recv().unwrap() {
            ServerMessage::Offer { from, sdp, .. } => {
                assert_eq!(from, a);
                assert_eq!(sdp, json!({"sdp": "v=0"}));
            }
            other => panic!("unexpected message: {other:?}"),
        }
        assert_eq!(state.pending.len(), 1);
    }

    #[tokio::test]
    async fn offer_to_unknown_target_has_no_side_effects() {
        let state = Arc::new(AppState::new(Config::default()));
        let (a, _a_tx, _a_rx) = joined(&state, "r").await;
        let (_c, _c_tx, mut c_rx) = joined(&state, "r").await;
        let (reply, _reply_rx) = oneshot::channel();

        let result = relay_offer(&state, &a, "ghost", json!({}), reply).await;

        assert_eq!(result, Err(SignalingError::UnknownTarget("ghost".into())));
        assert_eq!(state.pending.len(), 0);
        assert!(drain(&mut c_rx).is_empty());
    }

    #[tokio::test]
    async fn unjoined_target_cannot_be_offered() {
        let state = Arc::new(AppState::new(Config::default()));
        let (a, _a_tx, _a_rx) = joined(&state, "r").await;
        let (b, _b_tx, mut b_rx) = connect(&state).await;
        let (reply, _reply_rx) = oneshot::channel();

        assert_eq!(
            relay_offer(&state, &a, &b, json!("offer"), reply).await,
            Err(SignalingError::UnknownTarget(b.clone()))
        );
        assert_eq!(
            relay_candidate(&state, &a, &b, json!("c")).await,
            Err(SignalingError::UnknownTarget(b.clone()))
        );
        assert_eq!(state.pending.len(), 0);
        assert!(drain(&mut b_rx).is_empty());
    }

    #[tokio::test]
    async fn answer_completes_the_offer_continuation() {
        let state = Arc::new(AppState::new(Config::default()));
        let (a, _a_tx, _a_rx) = joined(&state, "r").await;
        let (b, _b_tx, mut b_rx) = joined(&state, "r").await;
        let (reply, reply_rx) = oneshot::channel();

        relay_offer(&state, &a, &b, json!("offer"), reply).await.unwrap();
        let request_id = offered_request_id(&mut b_rx);

        relay_answer(&state, &b, &request_id, json!("answer"))
            .await
            .unwrap();

        assert_eq!(
            reply_rx.await.unwrap(),
            Ok(Answer {
                from: b,
                sdp: json!("answer"),
            })
        );
        assert_eq!(state.pending.len(), 0);
    }

    #[tokio::test]
    async fn answer_from_someone_else_is_rejected() {
        let state = Arc::new(AppState::new(Config::default()));
        let (a, _a_tx, _a_rx) = joined(&state, "r").await;
        let (b, _b_tx, mut b_rx) = joined(&state, "r").await;
        let (c, _c_tx, _c_rx) = joined(&state, "r2").await;
        let (reply, _reply_rx) = oneshot::channel();

        relay_offer(&state, &a, &b, json!("offer"), reply).await.unwrap();
        let request_id = offered_request_id(&mut b_rx);

        assert_eq!(
            relay_answer(&state, &c, &request_id, json!("forged")).await,
            Err(SignalingError::UnknownRequest(request_id.clone()))
        );
        assert_eq!(
            relay_answer(&state, &b, "nope", json!("answer")).await,
            Err(SignalingError::UnknownRequest("nope".into()))
        );
        assert_eq!(state.pending.len(), 1);
    }

    #[tokio::test]
    async fn abandon_completes_offers_to_target_and_drops_its_own() {
        let state = Arc::new(AppState::new(Config::default()));
        let (a, _a_tx, _a_rx) = joined(&state, "r").await;
        let (b, _b_tx, _b_rx) = joined(&state, "r").await;
        let (to_b, to_b_rx) = oneshot::channel();
        let (from_b, from_b_rx) = oneshot::channel();

        relay_offer(&state, &a, &b, json!("offer"), to_b).await.unwrap();
        relay_offer(&state, &b, &a, json!("offer"), from_b).await.unwrap();
        assert_eq!(state.pending.abandon(&b), 2);

        assert_eq!(to_b_rx.await.unwrap(), Err(SignalingError::NoResponse(b)));
        assert!(from_b_rx.await.is_err());
        assert_eq!(state.pending.len(), 0);
    }

    #[tokio::test]
    async fn candidate_is_fire_and_forget() {
        let state = Arc::new(AppState::new(Config::default()));
        let (a, _a_tx, _a_rx) = joined(&state, "r").await;
        let (b, _b_tx, mut b_rx) = joined(&state, "r").await;

        relay_candidate(&state, &a, &b, json!({"candidate": "c1"}))
            .await
            .unwrap();

        assert_eq!(
            b_rx.try_recv().unwrap(),
            ServerMessage::IceCandidate {
                from: a.clone(),
                candidate: json!({"candidate": "c1"}),
            }
        );
        assert_eq!(state.pending.len(), 0);
        assert_eq!(
            relay_candidate(&state, &a, "ghost", json!({})).await,
            Err(SignalingError::UnknownTarget("ghost".into()))
        );
    }

    #[tokio::test]
    async fn shared_room_requirement_hides_outside_targets() {
        let mut config = Config::default();
        config.room.require_shared_room = true;
        let state = Arc::new(AppState::new(config));
        let (a, _a_tx, _a_rx) = joined(&state, "r1").await;
        let (b, _b_tx, mut b_rx) = joined(&state, "r1").await;
        let (c, _c_tx, mut c_rx) = joined(&state, "r2").await;

        assert_eq!(
            relay_candidate(&state, &a, &c, json!("x")).await,
            Err(SignalingError::UnknownTarget(c.clone()))
        );
        assert!(drain(&mut c_rx).is_empty());

        relay_candidate(&state, &a, &b, json!("x")).await.unwrap();
        assert_eq!(drain(&mut b_rx).len(), 1);
    }

    #[tokio::test]
    async fn default_config_relays_across_rooms() {
        let state = Arc::new(AppState::new(Config::default()));
        let (a, _a_tx, _a_rx) = joined(&state, "r1").await;
        let (b, _b_tx, mut b_rx) = joined(&state, "r2").await;

        relay_candidate(&state, &a, &b, json!("x")).await.unwrap();
        assert_eq!(drain(&mut b_rx).len(), 1);
    }

    #[tokio::test]
    async fn await_answer_maps_dropped_reply_to_no_response() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let (reply, reply_rx) = oneshot::channel::<Result<Answer, SignalingError>>();
        drop(reply);

        await_answer(reply_rx, "b".into(), "req-1".into(), tx).await;

        assert_eq!(
            rx.try_recv().unwrap(),
            ServerMessage::error(&SignalingError::NoResponse("b".into()), Some("req-1".into()))
        );
    }
}

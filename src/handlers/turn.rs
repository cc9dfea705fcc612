//! TURN 자격증명 발급 (REST API 방식의 시간 제한 자격증명)

use crate::config::{TurnConfig, TurnServer};
use crate::protocol::IceServer;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::time::{SystemTime, UNIX_EPOCH};

type HmacSha1 = Hmac<Sha1>;

/// TTL 미지정 시 기본 유효 기간 (초)
pub const DEFAULT_CREDENTIAL_TTL: u64 = 86400;

/// 발급된 자격증명
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub secret: String,
    pub valid_until: u64,
}

/// 현재 시각 기준 자격증명 발급
pub fn mint(subject_id: &str, shared_secret: &str, ttl_seconds: Option<u64>) -> Credential {
    mint_at(subject_id, shared_secret, ttl_seconds, unix_now())
}

/// `username = "<valid_until>:<subject>"`, `secret = base64(HMAC-SHA1(shared_secret, username))`
pub fn mint_at(
    subject_id: &str,
    shared_secret: &str,
    ttl_seconds: Option<u64>,
    now: u64,
) -> Credential {
    let ttl = ttl_seconds
        .filter(|ttl| *ttl > 0)
        .unwrap_or(DEFAULT_CREDENTIAL_TTL);
    let valid_until = now.saturating_add(ttl);
    let username = format!("{}:{}", valid_until, subject_id);
    let secret = generate_hmac_hash(&username, shared_secret);

    Credential {
        username,
        secret,
        valid_until,
    }
}

fn generate_hmac_hash(username: &str, secret: &str) -> String {
    let mut mac =
        HmacSha1::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(username.as_bytes());
    let result = mac.finalize();
    BASE64.encode(result.into_bytes())
}

/// 참여하는 커넥션에 줄 ICE 서버 목록
pub fn ice_servers_for(config: &TurnConfig, subject_id: &str) -> Vec<IceServer> {
    ice_servers_with(config, |server| {
        let credential = mint(subject_id, &server.secret, Some(server.ttl));
        tracing::debug!(
            subject = %subject_id,
            url = %server.url,
            valid_until = credential.valid_until,
            "Minted TURN credential"
        );
        credential
    })
}

fn ice_servers_with(
    config: &TurnConfig,
    mut mint_for: impl FnMut(&TurnServer) -> Credential,
) -> Vec<IceServer> {
    // STUN 서버 (인증 불필요)
    let stun = config.stun_servers.iter().map(|url| IceServer {
        urls: vec![url.clone()],
        username: None,
        credential: None,
        credential_type: None,
    });

    // TURN 서버 (서버마다 자체 비밀키와 TTL)
    let turn = config.servers.iter().map(|server| {
        let credential = mint_for(server);
        IceServer {
            urls: vec![server.url.clone()],
            username: Some(credential.username),
            credential: Some(credential.secret),
            credential_type: Some("password".to_string()),
        }
    });

    stun.chain(turn).collect()
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

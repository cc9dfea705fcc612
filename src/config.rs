//! 환경 변수 기반 설정 관리

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// 서버 설정
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    /// 정적 클라이언트 파일 디렉토리 (없으면 인덱스 페이지만 제공)
    pub document_root: Option<PathBuf>,
    pub room: RoomConfig,
    pub turn: TurnConfig,
    pub log_level: String,
}

/// 방 설정
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// 방 이름 없이 참여할 때 사용하는 방
    pub default_room: String,
    /// 방 최대 인원 (0 = 제한 없음)
    pub max_size: usize,
    /// 릴레이 대상이 같은 방에 있어야 하는지 여부
    pub require_shared_room: bool,
}

/// TURN/STUN 서버 설정
#[derive(Debug, Clone, Default)]
pub struct TurnConfig {
    pub stun_servers: Vec<String>,
    pub servers: Vec<TurnServer>,
}

/// TURN 서버 하나의 접속 정보
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnServer {
    pub url: String,
    pub secret: String,
    pub ttl: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5502,
            host: "0.0.0.0".to_string(),
            document_root: None,
            room: RoomConfig::default(),
            turn: TurnConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            default_room: "lobby".to_string(),
            max_size: 0,
            require_shared_room: false,
        }
    }
}

impl Config {
    /// 환경 변수에서 설정 로드
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let turn_secret = env::var("TURN_SECRET").unwrap_or_default();
        let turn_ttl = env_or("TURN_CREDENTIAL_TTL", crate::handlers::turn::DEFAULT_CREDENTIAL_TTL);

        Self {
            port: env_or("PORT", defaults.port),
            host: env::var("HOST").unwrap_or(defaults.host),
            document_root: env::var("DOCUMENT_ROOT")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            room: RoomConfig {
                default_room: env::var("DEFAULT_ROOM")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or(defaults.room.default_room),
                max_size: env_or("MAX_ROOM_SIZE", defaults.room.max_size),
                require_shared_room: env::var("REQUIRE_SHARED_ROOM")
                    .map(|v| v == "true")
                    .unwrap_or(false),
            },
            turn: TurnConfig {
                stun_servers: split_list(&env::var("STUN_SERVERS").unwrap_or_default()),
                servers: parse_turn_servers(
                    &env::var("TURN_SERVERS").unwrap_or_default(),
                    &turn_secret,
                    turn_ttl,
                ),
            },
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `url[|secret[|ttl]]` 항목 목록 파싱
///
/// 비밀키가 없는 항목은 자격증명을 만들 수 없으므로 건너뛴다.
pub fn parse_turn_servers(raw: &str, default_secret: &str, default_ttl: u64) -> Vec<TurnServer> {
    split_list(raw)
        .into_iter()
        .filter_map(|entry| {
            let mut parts = entry.split('|').map(str::trim);
            let url = parts.next().unwrap_or_default().to_string();
            let secret = parts
                .next()
                .filter(|s| !s.is_empty())
                .unwrap_or(default_secret)
                .to_string();
            let ttl = parts
                .next()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default_ttl);

            if url.is_empty() || secret.is_empty() {
                tracing::warn!(entry = %entry, "Skipping TURN server without url or secret");
                return None;
            }
            Some(TurnServer { url, secret, ttl })
        })
        .collect()
}

//! 핸들러 모듈

pub mod connection;
pub mod room;
pub mod session;
pub mod signaling;
pub mod turn;

#[cfg(test)]
pub(crate) mod testing;

pub use connection::*;
pub use session::{handle_client_message, handle_invalid_message};

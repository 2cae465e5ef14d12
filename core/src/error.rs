//! Error types for Glorp Core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Not connected to the messaging network")]
    NotConnected,

    #[error("Peer is not reachable on the messaging network: {0}")]
    PeerUnreachable(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Game not found: {0}")]
    GameNotFound(String),

    #[error("Invitation not found: {0}")]
    InvitationNotFound(String),

    #[error("No game is open")]
    NoOpenGame,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the error should be shown to the user rather than only logged.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::NotConnected
                | Error::PeerUnreachable(_)
                | Error::SendFailed(_)
                | Error::Wallet(_)
        )
    }
}

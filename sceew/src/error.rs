//! Error taxonomy for the alert engine.
//!
//! None of these errors is fatal. Each variant maps to one recovery policy:
//! connection errors reconnect, parse errors drop the message, estimation
//! errors degrade to an epsilon distance, and an unavailable observer
//! configuration skips the current report.

use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// The error type shared by every component boundary in the engine.
#[derive(Debug, Error)]
pub enum SceewError {
    /// Network or protocol failure on the feed. Recovered by reconnecting.
    #[error("feed connection failed: {0}")]
    Connection(#[from] ConnectionError),

    /// An inbound message was not valid or lacked a required field.
    #[error("malformed feed message: {0}")]
    Parse(String),

    /// Degenerate geometry passed to the intensity estimator.
    #[error("degenerate estimator input: {0}")]
    Estimation(String),

    /// The observer configuration could not be read.
    #[error("observer configuration unavailable: {0}")]
    ConfigUnavailable(String),
}

/// The ways a feed connection can fail.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("handshake did not complete within {0:?}")]
    HandshakeTimeout(Duration),

    #[error("no frame received for {0:?}")]
    Stalled(Duration),

    #[error("server closed the connection")]
    Closed,
}

impl SceewError {
    pub fn parse<S: Into<String>>(msg: S) -> Self {
        SceewError::Parse(msg.into())
    }

    pub fn config_unavailable<S: Into<String>>(msg: S) -> Self {
        SceewError::ConfigUnavailable(msg.into())
    }
}

impl From<serde_json::Error> for SceewError {
    fn from(err: serde_json::Error) -> Self {
        SceewError::Parse(err.to_string())
    }
}

impl From<tungstenite::Error> for SceewError {
    fn from(err: tungstenite::Error) -> Self {
        SceewError::Connection(ConnectionError::WebSocket(err))
    }
}

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, SceewError>;

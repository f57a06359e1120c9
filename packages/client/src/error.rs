//! Error types for the Castline client.

use thiserror::Error;

/// Errors returned by the HTTP layer (backend, pipeline and API service)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The request never produced an HTTP response
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server answered with a non-2xx status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),
}

impl ApiError {
    /// `true` for 401 Unauthorized and 403 Forbidden responses
    pub fn is_authorization(&self) -> bool {
        matches!(self, ApiError::Status { status: 401 | 403, .. })
    }
}

/// Errors of the persisted session storage
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage format error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Reasons an inbound chat frame is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Not enclosed in `{` and `}`
    #[error("Malformed frame")]
    MalformedFrame,

    /// The leading key is not a known command
    #[error("Unknown command '{0}'")]
    UnknownCommand(String),

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Missing field '{0}'")]
    MissingField(&'static str),

    #[error("Invalid value for field '{field}': {value}")]
    InvalidField { field: &'static str, value: String },
}

/// Errors of the chat connection transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("Connection error: {0}")]
    Connect(String),

    #[error("Send error: {0}")]
    Send(String),

    #[error("Receive error: {0}")]
    Receive(String),
}

/// Client-specific errors surfaced by the terminal client
#[derive(Debug, Error)]
pub enum ClientError {
    /// No usable session: the user must log in again
    #[error("Not logged in: {0}")]
    NotAuthenticated(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    /// Connection error
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Input error: {0}")]
    Input(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_authorization_for_401_and_403() {
        // テスト項目: 401 と 403 のみが認可エラーと判定される
        // given (前提条件):
        let unauthorized = ApiError::Status {
            status: 401,
            body: String::new(),
        };
        let forbidden = ApiError::Status {
            status: 403,
            body: String::new(),
        };
        let not_found = ApiError::Status {
            status: 404,
            body: String::new(),
        };

        // when (操作) / then (期待する結果):
        assert!(unauthorized.is_authorization());
        assert!(forbidden.is_authorization());
        assert!(!not_found.is_authorization());
        assert!(!ApiError::Transport("reset".to_string()).is_authorization());
    }
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request timed out")]
    Timeout,
    /// The server could not be reached at all (connection refused, DNS).
    #[error("backend unreachable: {0}")]
    BackendUnreachable(String),
    #[error("network error: {0}")]
    Network(String),
    /// A 401 on an authenticated call. The session is already cleared.
    #[error("session expired, please log in again")]
    Unauthorized,
    #[error("{message} (HTTP {status})")]
    Api { status: u16, message: String },
    #[error("invalid response: {0}")]
    Decode(String),
    #[error(transparent)]
    Url(#[from] url::ParseError),
}

impl ClientError {
    /// Transport-level failure as opposed to a server verdict.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            ClientError::Timeout | ClientError::BackendUnreachable(_) | ClientError::Network(_)
        )
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else if err.is_connect() {
            ClientError::BackendUnreachable(err.to_string())
        } else if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

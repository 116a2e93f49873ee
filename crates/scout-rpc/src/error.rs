//! Error types for the RPC client.

use thiserror::Error;

/// Errors reported by [`RpcChannel::call`](crate::RpcChannel::call).
///
/// Ordinary network and protocol conditions never surface here; they are
/// retried inside the channel and reported as a failed response.
#[derive(Error, Debug)]
pub enum RpcError {
    /// The call carried no subrequests
    #[error("subrequest chain is empty")]
    EmptySubrequestChain,

    /// The call position lacks a coordinate
    #[error("no complete player position set")]
    MissingPosition,

    /// The account could not log in
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// The request envelope could not be serialized
    #[error("failed to encode request envelope: {0}")]
    Encode(String),
}

/// Login failures for one account.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The identity provider refused the credentials
    #[error("login rejected for {username} (HTTP {status}): {message}")]
    Rejected {
        /// Account login name
        username: String,
        /// HTTP status returned by the provider
        status: u16,
        /// Provider message
        message: String,
    },

    /// The identity provider could not be reached
    #[error("identity provider unreachable: {0}")]
    Network(#[from] reqwest::Error),

    /// The identity provider answered with something that is not a token
    #[error("invalid identity provider response: {0}")]
    InvalidResponse(String),

    /// Every login attempt in a row failed
    #[error("login for {username} failed {attempts} times in a row: {last_error}")]
    LoginFailed {
        /// Account login name
        username: String,
        /// Consecutive failed attempts
        attempts: u32,
        /// Error of the final attempt
        last_error: String,
    },

    /// A call was attempted without a token
    #[error("session for {username} holds no token")]
    MissingToken {
        /// Account login name
        username: String,
    },
}

/// Failures of a single HTTP exchange.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The request timed out
    #[error("request to {url} timed out")]
    Timeout {
        /// Target URL
        url: String,
    },

    /// The connection could not be established or was reset
    #[error("connection to {url} failed: {message}")]
    Connect {
        /// Target URL
        url: String,
        /// Underlying error
        message: String,
    },

    /// Any other HTTP client failure
    #[error("HTTP error: {0}")]
    Http(String),
}

impl TransportError {
    /// Classify a `reqwest` failure for `url`.
    #[must_use]
    pub fn from_reqwest(url: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else if err.is_connect() || err.is_request() {
            Self::Connect {
                url: url.to_string(),
                message: err.to_string(),
            }
        } else {
            Self::Http(err.to_string())
        }
    }
}

/// Malformed responses, detected before typed sub-response parsing.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The server answered with a non-success HTTP status
    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),

    /// The server answered with an empty body
    #[error("empty response body")]
    EmptyBody,

    /// The body is not a response envelope
    #[error("malformed response envelope: {0}")]
    Malformed(String),
}

/// Result type alias using `RpcError`.
pub type Result<T> = std::result::Result<T, RpcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthError::LoginFailed {
            username: "ash".to_string(),
            attempts: 5,
            last_error: "bad password".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "login for ash failed 5 times in a row: bad password"
        );

        let err: RpcError = err.into();
        assert!(matches!(err, RpcError::Auth(_)));

        assert_eq!(
            DecodeError::HttpStatus(502).to_string(),
            "unexpected HTTP status 502"
        );
    }
}

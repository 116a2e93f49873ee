//! HTTP transport for request envelopes.

use crate::error::TransportError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Status and body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    /// HTTP status code
    pub status: u16,
    /// Raw response body
    pub body: Vec<u8>,
}

/// Posts envelope bytes to an endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `body` to `url`.
    ///
    /// # Errors
    /// Returns error on timeouts, connection failures and other client errors.
    /// Non-success HTTP statuses are not errors at this layer.
    async fn post(&self, url: &str, body: Vec<u8>) -> Result<HttpReply, TransportError>;
}

/// [`Transport`] over a shared `reqwest` client.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport with the given timeout and user agent.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| TransportError::Http(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, url: &str, body: Vec<u8>) -> Result<HttpReply, TransportError> {
        let response = self
            .client
            .post(url)
            .body(body)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(url, &e))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::from_reqwest(url, &e))?;

        Ok(HttpReply {
            status,
            body: body.to_vec(),
        })
    }
}

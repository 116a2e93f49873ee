//! Identity provider contract and HTTP implementation.

use crate::error::AuthError;
use async_trait::async_trait;
use reqwest::Client;
use scout_core::{AccountConfig, AuthProvider};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A bearer token and the time it stops being accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    /// Bearer token
    pub token: String,
    /// Expiry in epoch milliseconds
    pub expires_at_ms: i64,
}

/// Exchanges account credentials for a bearer token.
///
/// Implementations should be thread-safe (Send + Sync); one provider is
/// shared by every worker.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Log `account` in.
    ///
    /// # Errors
    /// Returns error if the credentials are rejected or the provider is unreachable.
    async fn login(&self, account: &AccountConfig) -> Result<AuthToken, AuthError>;
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    provider: AuthProvider,
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
    expires_at_ms: i64,
}

/// Identity provider reached over HTTP.
///
/// Posts `{provider, username, password}` as JSON and expects
/// `{token, expires_at_ms}` back.
pub struct HttpIdentityProvider {
    client: Client,
    url: String,
}

impl HttpIdentityProvider {
    /// Create a provider posting to `url`.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, AuthError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn login(&self, account: &AccountConfig) -> Result<AuthToken, AuthError> {
        let request = LoginRequest {
            provider: account.provider,
            username: &account.username,
            password: &account.password,
        };

        let response = self.client.post(&self.url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected {
                username: account.username.clone(),
                status: status.as_u16(),
                message,
            });
        }

        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
        if body.token.is_empty() {
            return Err(AuthError::InvalidResponse("empty token".to_string()));
        }

        Ok(AuthToken {
            token: body.token,
            expires_at_ms: body.expires_at_ms,
        })
    }
}

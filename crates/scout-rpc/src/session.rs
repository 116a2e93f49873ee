//! Per-account login state.

use crate::auth::{AuthToken, IdentityProvider};
use crate::codec::AuthInfo;
use crate::error::AuthError;
use scout_core::AccountConfig;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Tokens expiring within this window are refreshed before use.
pub const TOKEN_SAFETY_MARGIN_MS: i64 = 120_000;

/// Consecutive login failures before the account is given up for the cycle.
pub const MAX_LOGIN_ATTEMPTS: u32 = 5;

/// Upper bound of the login backoff.
pub const MAX_LOGIN_BACKOFF: Duration = Duration::from_secs(300);

/// Delay before the next login attempt after `consecutive_failures` failures.
///
/// `min(e^(failures / 1.7), 300)` seconds.
#[must_use]
pub fn login_backoff(consecutive_failures: u32) -> Duration {
    let secs = (f64::from(consecutive_failures) / 1.7).exp();
    Duration::from_secs_f64(secs.min(MAX_LOGIN_BACKOFF.as_secs_f64()))
}

/// One account's credentials, token and endpoint.
///
/// Owned by the scheduler at rest and borrowed by exactly one worker per call.
#[derive(Debug)]
pub struct AccountSession {
    account: AccountConfig,
    token: Option<AuthToken>,
    endpoint: String,
    rate_limit_hits: u32,
    login_failures: u32,
}

impl AccountSession {
    /// Create a logged-out session talking to `endpoint`.
    #[must_use]
    pub fn new(account: AccountConfig, endpoint: impl Into<String>) -> Self {
        Self {
            account,
            token: None,
            endpoint: endpoint.into(),
            rate_limit_hits: 0,
            login_failures: 0,
        }
    }

    /// Account login name.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.account.username
    }

    /// Account credentials.
    #[must_use]
    pub fn account(&self) -> &AccountConfig {
        &self.account
    }

    /// Current bearer token, if logged in.
    #[must_use]
    pub fn token(&self) -> Option<&AuthToken> {
        self.token.as_ref()
    }

    /// Credentials to attach to a request envelope.
    #[must_use]
    pub fn auth_info(&self) -> Option<AuthInfo> {
        self.token.as_ref().map(|token| AuthInfo {
            provider: self.account.provider.to_string(),
            token: token.token.clone(),
        })
    }

    /// Whether a login is required before the next call.
    #[must_use]
    pub fn needs_login(&self, now_ms: i64) -> bool {
        match &self.token {
            None => true,
            Some(token) => token.expires_at_ms - now_ms < TOKEN_SAFETY_MARGIN_MS,
        }
    }

    /// Log in if there is no token or it expires within the safety margin.
    ///
    /// Failed logins are retried with [`login_backoff`] up to
    /// [`MAX_LOGIN_ATTEMPTS`] times in a row.
    ///
    /// # Errors
    /// Returns `AuthError::LoginFailed` once every attempt has failed.
    pub async fn ensure_logged_in(
        &mut self,
        provider: &dyn IdentityProvider,
        now_ms: i64,
    ) -> Result<(), AuthError> {
        if !self.needs_login(now_ms) {
            return Ok(());
        }

        info!(username = %self.account.username, "Logging in");
        loop {
            match provider.login(&self.account).await {
                Ok(token) => {
                    debug!(
                        username = %self.account.username,
                        expires_at_ms = token.expires_at_ms,
                        "Login successful"
                    );
                    self.token = Some(token);
                    self.login_failures = 0;
                    return Ok(());
                }
                Err(e) => {
                    let delay = login_backoff(self.login_failures);
                    self.login_failures += 1;

                    if self.login_failures >= MAX_LOGIN_ATTEMPTS {
                        let attempts = self.login_failures;
                        self.login_failures = 0;
                        return Err(AuthError::LoginFailed {
                            username: self.account.username.clone(),
                            attempts,
                            last_error: e.to_string(),
                        });
                    }

                    warn!(
                        username = %self.account.username,
                        error = %e,
                        "Login failed, retrying in {:.2} seconds",
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Drop the token so the next call logs in again.
    pub fn force_expire(&mut self) {
        self.token = None;
    }

    /// Endpoint the next request is posted to.
    #[must_use]
    pub fn current_endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Replace the endpoint after a redirect.
    pub fn set_endpoint(&mut self, endpoint: impl Into<String>) {
        let endpoint = endpoint.into();
        if endpoint != self.endpoint {
            debug!(username = %self.account.username, %endpoint, "Switching API endpoint");
        }
        self.endpoint = endpoint;
    }

    /// Count a needs-context response.
    pub fn record_rate_limit_hit(&mut self) {
        self.rate_limit_hits += 1;
        if self.rate_limit_hits >= 2 {
            warn!(
                username = %self.account.username,
                hits = self.rate_limit_hits,
                "Repeated status 3 responses, account may be suspended"
            );
        }
    }

    /// Reset the needs-context counter after a successful call.
    pub fn clear_rate_limit_counter(&mut self) {
        self.rate_limit_hits = 0;
    }

    /// Consecutive needs-context responses.
    #[must_use]
    pub fn rate_limit_hits(&self) -> u32 {
        self.rate_limit_hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use scout_core::AuthProvider;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingProvider {
        calls: AtomicU32,
        fail_first: u32,
    }

    impl CountingProvider {
        fn new(fail_first: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail_first,
            }
        }
    }

    #[async_trait]
    impl IdentityProvider for CountingProvider {
        async fn login(&self, _account: &AccountConfig) -> Result<AuthToken, AuthError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                return Err(AuthError::InvalidResponse("nope".to_string()));
            }
            Ok(AuthToken {
                token: format!("token-{call}"),
                expires_at_ms: 10_000_000,
            })
        }
    }

    fn session() -> AccountSession {
        AccountSession::new(
            AccountConfig::new("ash", "pikachu", AuthProvider::Ptc),
            "https://example.invalid/rpc",
        )
    }

    #[test]
    fn test_login_backoff() {
        assert_eq!(login_backoff(0), Duration::from_secs(1));
        assert!(login_backoff(1) > Duration::from_secs(1));
        assert_eq!(login_backoff(20), MAX_LOGIN_BACKOFF);
    }

    #[tokio::test]
    async fn test_token_near_expiry_triggers_login() {
        let provider = CountingProvider::new(0);
        let now = 1_000_000;
        let mut session = session();
        session.token = Some(AuthToken {
            token: "old".to_string(),
            expires_at_ms: now + 30_000,
        });

        session
            .ensure_logged_in(&provider, now)
            .await
            .expect("login succeeds");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.token().map(|t| t.token.as_str()), Some("token-0"));
    }

    #[tokio::test]
    async fn test_token_far_from_expiry_is_kept() {
        let provider = CountingProvider::new(0);
        let now = 1_000_000;
        let mut session = session();
        session.token = Some(AuthToken {
            token: "old".to_string(),
            expires_at_ms: now + 600_000,
        });

        session
            .ensure_logged_in(&provider, now)
            .await
            .expect("no login needed");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(session.token().map(|t| t.token.as_str()), Some("old"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_retries_then_succeeds() {
        let provider = CountingProvider::new(3);
        let mut session = session();

        session
            .ensure_logged_in(&provider, 0)
            .await
            .expect("fourth attempt succeeds");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 4);
        assert!(session.auth_info().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_gives_up_after_five_failures() {
        let provider = CountingProvider::new(u32::MAX);
        let mut session = session();

        let err = session
            .ensure_logged_in(&provider, 0)
            .await
            .expect_err("all attempts fail");
        assert!(matches!(err, AuthError::LoginFailed { attempts: 5, .. }));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 5);
        assert!(session.token().is_none());
    }

    #[test]
    fn test_endpoint_and_rate_limit_counter() {
        let mut session = session();
        session.set_endpoint("https://other.invalid/rpc");
        assert_eq!(session.current_endpoint(), "https://other.invalid/rpc");

        session.record_rate_limit_hit();
        session.record_rate_limit_hit();
        assert_eq!(session.rate_limit_hits(), 2);
        session.clear_rate_limit_counter();
        assert_eq!(session.rate_limit_hits(), 0);
    }
}

//! One logical API call with protocol-level retries.
//!
//! [`RpcChannel::call`] runs an explicit state loop:
//!
//! - `Send`: log in if needed, encode, POST and decode.
//! - `Redirect`: switch the session to the named host and resend.
//! - `NeedsContext`: prepend `GET_PLAYER` once and resend.
//! - `EmptyPayload`: drop the token and resend.
//! - `Retry`: count a generic failure and resend.
//! - `Done`: hand the parsed response back.
//!
//! Transport and decode failures, empty payloads and redirects without a host
//! consume the retry budget. Redirects and context refreshes do not.

use crate::auth::IdentityProvider;
use crate::codec::{self, ParsedEnvelope, STATUS_NEEDS_CONTEXT, STATUS_REDIRECT};
use crate::error::{AuthError, Result, RpcError};
use crate::request::{RequestType, SubRequest};
use crate::session::AccountSession;
use crate::stats::RequestStats;
use crate::transport::Transport;
use scout_core::{now_millis, Point};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Generic failures tolerated per call.
pub const DEFAULT_RETRY_BUDGET: u32 = 5;

/// Outcome of a call that did not violate its contract.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcResponse {
    /// The server answered with usable data
    Success(ParsedEnvelope),
    /// The retry budget ran out
    Failed {
        /// Attempts that consumed budget
        attempts: u32,
        /// Error of the final attempt
        last_error: String,
    },
}

impl RpcResponse {
    /// Whether the call produced a response.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The parsed envelope of a successful call.
    #[must_use]
    pub fn envelope(&self) -> Option<&ParsedEnvelope> {
        match self {
            Self::Success(envelope) => Some(envelope),
            Self::Failed { .. } => None,
        }
    }
}

enum CallState {
    Send,
    Redirect(String),
    NeedsContext,
    EmptyPayload,
    Retry(String),
    Done(ParsedEnvelope),
}

/// Sends subrequest chains on behalf of account sessions.
pub struct RpcChannel {
    transport: Arc<dyn Transport>,
    identity: Arc<dyn IdentityProvider>,
    stats: Arc<RequestStats>,
    retry_budget: u32,
}

impl RpcChannel {
    /// Create a channel with the default retry budget.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            transport,
            identity,
            stats: Arc::new(RequestStats::new()),
            retry_budget: DEFAULT_RETRY_BUDGET,
        }
    }

    /// Set the number of generic failures tolerated per call.
    #[must_use]
    pub fn with_retry_budget(mut self, retry_budget: u32) -> Self {
        self.retry_budget = retry_budget.max(1);
        self
    }

    /// Share an existing statistics window.
    #[must_use]
    pub fn with_stats(mut self, stats: Arc<RequestStats>) -> Self {
        self.stats = stats;
        self
    }

    /// Request statistics of this channel.
    #[must_use]
    pub fn stats(&self) -> &Arc<RequestStats> {
        &self.stats
    }

    /// Send `subrequests` from `position` using `session`.
    ///
    /// Network and protocol trouble never surfaces as an error: once the retry
    /// budget is spent the call returns [`RpcResponse::Failed`].
    ///
    /// # Errors
    /// Returns `RpcError::EmptySubrequestChain` or `RpcError::MissingPosition`
    /// for contract violations, and `RpcError::Auth` when the account cannot
    /// log in.
    pub async fn call(
        &self,
        session: &mut AccountSession,
        subrequests: Vec<SubRequest>,
        position: Point,
    ) -> Result<RpcResponse> {
        if subrequests.is_empty() {
            return Err(RpcError::EmptySubrequestChain);
        }
        if !position.is_complete() {
            return Err(RpcError::MissingPosition);
        }

        let mut chain = subrequests;
        let mut context_prepended = false;
        let mut failures = 0u32;
        let mut last_error = String::new();
        let mut state = CallState::Send;

        loop {
            state = match state {
                CallState::Send => {
                    if failures >= self.retry_budget {
                        warn!(
                            username = session.username(),
                            "Giving up after {} failed attempts: {}", failures, last_error
                        );
                        return Ok(RpcResponse::Failed {
                            attempts: failures,
                            last_error,
                        });
                    }
                    match self.send(session, &chain, position).await? {
                        Ok(envelope) => Self::classify(session, envelope),
                        Err(error) => CallState::Retry(error),
                    }
                }
                CallState::Retry(error) => {
                    failures += 1;
                    warn!(
                        username = session.username(),
                        "Request failed (attempt {}/{}): {}",
                        failures,
                        self.retry_budget,
                        error
                    );
                    last_error = error;
                    CallState::Send
                }
                CallState::Redirect(host) => {
                    session.set_endpoint(format!("https://{host}/rpc"));
                    CallState::Send
                }
                CallState::NeedsContext => {
                    if !context_prepended {
                        chain.insert(0, SubRequest::GetPlayer);
                        context_prepended = true;
                    }
                    session.record_rate_limit_hit();
                    CallState::Send
                }
                CallState::EmptyPayload => {
                    failures += 1;
                    last_error = "server returned an empty payload".to_string();
                    warn!(
                        username = session.username(),
                        "Empty response payload (attempt {}/{}), forcing re-login",
                        failures,
                        self.retry_budget
                    );
                    session.force_expire();
                    CallState::Send
                }
                CallState::Done(envelope) => {
                    session.clear_rate_limit_counter();
                    return Ok(RpcResponse::Success(envelope));
                }
            };
        }
    }

    /// One POST. The outer error is fatal for the call, the inner one consumes budget.
    async fn send(
        &self,
        session: &mut AccountSession,
        chain: &[SubRequest],
        position: Point,
    ) -> Result<std::result::Result<ParsedEnvelope, String>> {
        session
            .ensure_logged_in(self.identity.as_ref(), now_millis())
            .await?;
        let auth = session.auth_info().ok_or_else(|| AuthError::MissingToken {
            username: session.username().to_string(),
        })?;

        let body = codec::encode(&auth, position, chain)
            .map_err(|e| RpcError::Encode(e.to_string()))?;
        let request_types: Vec<RequestType> = chain.iter().map(SubRequest::request_type).collect();
        let bytes_up = body.len();
        let url = session.current_endpoint().to_string();

        debug!(username = session.username(), %url, "Executing RPC");
        let started = Instant::now();
        let reply = self.transport.post(&url, body).await;
        let latency = started.elapsed();

        let reply = match reply {
            Ok(reply) => reply,
            Err(e) => {
                self.stats.record(bytes_up, 0, latency);
                return Ok(Err(e.to_string()));
            }
        };
        self.stats.record(bytes_up, reply.body.len(), latency);

        Ok(codec::decode(reply.status, &reply.body, &request_types).map_err(|e| e.to_string()))
    }

    fn classify(session: &mut AccountSession, envelope: ParsedEnvelope) -> CallState {
        if envelope.status_code == STATUS_REDIRECT {
            return match envelope.redirect_host() {
                Some(host) => CallState::Redirect(host.to_string()),
                None => CallState::Retry("redirect without a host".to_string()),
            };
        }
        if let Some(host) = envelope.redirect_host() {
            session.set_endpoint(format!("https://{host}/rpc"));
        }
        if envelope.status_code == STATUS_NEEDS_CONTEXT {
            return CallState::NeedsContext;
        }
        if envelope.is_empty_payload() {
            return CallState::EmptyPayload;
        }
        CallState::Done(envelope)
    }
}

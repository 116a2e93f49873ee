//! Retry-protocol tests for `RpcChannel` against scripted transports.

use async_trait::async_trait;
use scout_core::{now_millis, AccountConfig, AuthProvider, Point};
use scout_rpc::response::PlayerResponse;
use scout_rpc::{
    AccountSession, AuthError, AuthToken, HttpReply, IdentityProvider, RequestEnvelope,
    RequestType, ResponseEnvelope, ResponsePayload, RpcChannel, RpcError, RpcResponse,
    SubRequest, Transport, TransportError, STATUS_NEEDS_CONTEXT, STATUS_OK, STATUS_REDIRECT,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

const START_ENDPOINT: &str = "https://start.invalid/rpc";

type Script = Box<dyn Fn(u32, &RequestEnvelope) -> Result<HttpReply, TransportError> + Send + Sync>;

/// Transport answering each post through a closure of (post index, request).
struct ScriptedTransport {
    script: Script,
    posts: AtomicU32,
    urls: Mutex<Vec<String>>,
    requests: Mutex<Vec<RequestEnvelope>>,
}

impl ScriptedTransport {
    fn new(
        script: impl Fn(u32, &RequestEnvelope) -> Result<HttpReply, TransportError>
            + Send
            + Sync
            + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Box::new(script),
            posts: AtomicU32::new(0),
            urls: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn posts(&self) -> u32 {
        self.posts.load(Ordering::SeqCst)
    }

    fn last_url(&self) -> String {
        self.urls.lock().unwrap().last().cloned().unwrap_or_default()
    }

    fn last_request(&self) -> RequestEnvelope {
        self.requests.lock().unwrap().last().cloned().expect("a request was sent")
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post(&self, url: &str, body: Vec<u8>) -> Result<HttpReply, TransportError> {
        let index = self.posts.fetch_add(1, Ordering::SeqCst);
        let request = RequestEnvelope::from_bytes(&body).expect("valid request envelope");
        self.urls.lock().unwrap().push(url.to_string());
        self.requests.lock().unwrap().push(request.clone());
        (self.script)(index, &request)
    }
}

struct StaticIdentity {
    logins: AtomicU32,
    fail: bool,
}

impl StaticIdentity {
    fn ok() -> Arc<Self> {
        Arc::new(Self {
            logins: AtomicU32::new(0),
            fail: false,
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            logins: AtomicU32::new(0),
            fail: true,
        })
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn login(&self, account: &AccountConfig) -> Result<AuthToken, AuthError> {
        let n = self.logins.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AuthError::Rejected {
                username: account.username.clone(),
                status: 403,
                message: "banned".to_string(),
            });
        }
        Ok(AuthToken {
            token: format!("token-{n}"),
            expires_at_ms: now_millis() + 3_600_000,
        })
    }
}

fn session() -> AccountSession {
    AccountSession::new(
        AccountConfig::new("ash", "pikachu", AuthProvider::Ptc),
        START_ENDPOINT,
    )
}

fn position() -> Point {
    Point::new(48.0, 11.0, 500.0)
}

fn reply(status_code: i32, api_url: Option<&str>, payloads: &[ResponsePayload]) -> HttpReply {
    let body = ResponseEnvelope::new(status_code, api_url.map(str::to_string), payloads)
        .and_then(|e| e.to_bytes())
        .expect("build response");
    HttpReply { status: 200, body }
}

fn player_reply() -> HttpReply {
    reply(
        STATUS_OK,
        None,
        &[ResponsePayload::Player(PlayerResponse {
            success: true,
            username: "ash".to_string(),
        })],
    )
}

fn channel(transport: Arc<ScriptedTransport>, identity: Arc<StaticIdentity>) -> RpcChannel {
    RpcChannel::new(transport, identity)
}

#[tokio::test]
async fn test_redirects_are_followed_without_limit() {
    let transport = ScriptedTransport::new(|index, _| {
        if index < 50 {
            Ok(reply(STATUS_REDIRECT, Some(&format!("host{index}")), &[]))
        } else {
            Ok(player_reply())
        }
    });
    let channel = channel(transport.clone(), StaticIdentity::ok());
    let mut session = session();

    let response = channel
        .call(&mut session, vec![SubRequest::GetPlayer], position())
        .await
        .expect("call succeeds");

    assert!(response.is_success());
    assert_eq!(transport.posts(), 51);
    assert_eq!(session.current_endpoint(), "https://host49/rpc");
    assert_eq!(transport.last_url(), "https://host49/rpc");
}

#[tokio::test]
async fn test_transient_failures_make_exactly_five_attempts() {
    let transport = ScriptedTransport::new(|_, _| {
        Err(TransportError::Timeout {
            url: START_ENDPOINT.to_string(),
        })
    });
    let channel = channel(transport.clone(), StaticIdentity::ok());
    let mut session = session();

    let response = channel
        .call(&mut session, vec![SubRequest::GetPlayer], position())
        .await
        .expect("failures are not errors");

    assert!(matches!(response, RpcResponse::Failed { attempts: 5, .. }));
    assert_eq!(transport.posts(), 5);
    assert_eq!(channel.stats().requests(), 5);
}

#[tokio::test]
async fn test_retry_budget_is_configurable() {
    let transport = ScriptedTransport::new(|_, _| {
        Ok(HttpReply {
            status: 500,
            body: Vec::new(),
        })
    });
    let channel = channel(transport.clone(), StaticIdentity::ok()).with_retry_budget(2);
    let mut session = session();

    let response = channel
        .call(&mut session, vec![SubRequest::GetPlayer], position())
        .await
        .expect("failures are not errors");

    assert!(matches!(response, RpcResponse::Failed { attempts: 2, .. }));
    assert_eq!(transport.posts(), 2);
}

#[tokio::test]
async fn test_needs_context_prepends_get_player_once() {
    let transport = ScriptedTransport::new(|index, _| {
        if index < 3 {
            Ok(reply(STATUS_NEEDS_CONTEXT, None, &[]))
        } else {
            Ok(player_reply())
        }
    });
    let channel = channel(transport.clone(), StaticIdentity::ok());
    let mut session = session();

    let response = channel
        .call(
            &mut session,
            SubRequest::scan_chain(position()),
            position(),
        )
        .await
        .expect("call succeeds");

    assert!(response.is_success());
    assert_eq!(transport.posts(), 4);
    let types = transport.last_request().request_types();
    assert_eq!(types[0], RequestType::GetPlayer);
    assert_eq!(types[1], RequestType::GetMapObjects);
    assert_eq!(
        types.iter().filter(|t| **t == RequestType::GetPlayer).count(),
        1
    );
    assert_eq!(session.rate_limit_hits(), 0);
}

#[tokio::test]
async fn test_empty_payload_forces_relogin_and_consumes_budget() {
    let transport = ScriptedTransport::new(|index, _| {
        if index < 2 {
            Ok(reply(STATUS_OK, None, &[]))
        } else {
            Ok(player_reply())
        }
    });
    let identity = StaticIdentity::ok();
    let channel = channel(transport.clone(), identity.clone());
    let mut session = session();

    let response = channel
        .call(&mut session, vec![SubRequest::GetPlayer], position())
        .await
        .expect("call succeeds");

    assert!(response.is_success());
    assert_eq!(identity.logins.load(Ordering::SeqCst), 3);
    assert_eq!(transport.last_request().auth.token, "token-2");
}

#[tokio::test]
async fn test_empty_payload_exhausts_budget() {
    let transport = ScriptedTransport::new(|_, _| Ok(reply(STATUS_OK, None, &[])));
    let channel = channel(transport.clone(), StaticIdentity::ok());
    let mut session = session();

    let response = channel
        .call(&mut session, vec![SubRequest::GetPlayer], position())
        .await
        .expect("failures are not errors");

    assert!(matches!(response, RpcResponse::Failed { attempts: 5, .. }));
}

#[tokio::test]
async fn test_redirect_without_host_counts_as_failure() {
    let transport = ScriptedTransport::new(|_, _| Ok(reply(STATUS_REDIRECT, None, &[])));
    let channel = channel(transport.clone(), StaticIdentity::ok());
    let mut session = session();

    let response = channel
        .call(&mut session, vec![SubRequest::GetPlayer], position())
        .await
        .expect("failures are not errors");

    assert!(matches!(response, RpcResponse::Failed { attempts: 5, .. }));
    assert_eq!(session.current_endpoint(), START_ENDPOINT);
}

#[tokio::test]
async fn test_api_url_on_success_updates_endpoint() {
    let transport = ScriptedTransport::new(|_, _| {
        Ok(reply(
            STATUS_OK,
            Some("pgorelease.invalid/plfe/123"),
            &[ResponsePayload::Player(PlayerResponse::default())],
        ))
    });
    let channel = channel(transport.clone(), StaticIdentity::ok());
    let mut session = session();

    let response = channel
        .call(&mut session, vec![SubRequest::GetPlayer], position())
        .await
        .expect("call succeeds");

    assert!(response.is_success());
    assert_eq!(transport.posts(), 1);
    assert_eq!(
        session.current_endpoint(),
        "https://pgorelease.invalid/plfe/123/rpc"
    );
}

#[tokio::test]
async fn test_contract_violations_are_errors() {
    let transport = ScriptedTransport::new(|_, _| Ok(player_reply()));
    let channel = channel(transport.clone(), StaticIdentity::ok());
    let mut session = session();

    let err = channel
        .call(&mut session, Vec::new(), position())
        .await
        .expect_err("empty chain");
    assert!(matches!(err, RpcError::EmptySubrequestChain));

    let err = channel
        .call(
            &mut session,
            vec![SubRequest::GetPlayer],
            Point::new(48.0, 11.0, f64::NAN),
        )
        .await
        .expect_err("incomplete position");
    assert!(matches!(err, RpcError::MissingPosition));
    assert_eq!(transport.posts(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_login_failure_is_reported_as_auth_error() {
    let transport = ScriptedTransport::new(|_, _| Ok(player_reply()));
    let identity = StaticIdentity::failing();
    let channel = channel(transport.clone(), identity.clone());
    let mut session = session();

    let err = channel
        .call(&mut session, vec![SubRequest::GetPlayer], position())
        .await
        .expect_err("login fails");

    assert!(matches!(
        err,
        RpcError::Auth(AuthError::LoginFailed { attempts: 5, .. })
    ));
    assert_eq!(identity.logins.load(Ordering::SeqCst), 5);
    assert_eq!(transport.posts(), 0);
}

//! Scout RPC - Client for the remote game-world API.
//!
//! Builds binary request envelopes from typed subrequests, posts them through
//! a [`Transport`] and decodes the typed sub-responses, following server-side
//! redirects and context-refresh signals along the way.
//!
//! # Features
//!
//! - Compile-time registry of request types and their parameter structs
//! - Best-effort decoding: one malformed sub-response never fails the envelope
//! - Per-account login with exponential backoff
//! - Bounded retries for network and decode failures
//! - Request throughput statistics
//!
//! # Example
//!
//! ```rust,ignore
//! use scout_rpc::{AccountSession, RpcChannel, SubRequest};
//! use std::sync::Arc;
//!
//! let channel = RpcChannel::new(Arc::new(transport), Arc::new(identity));
//! let mut session = AccountSession::new(account, endpoint);
//! let response = channel
//!     .call(&mut session, SubRequest::scan_chain(position), position)
//!     .await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod auth;
pub mod channel;
pub mod codec;
pub mod error;
pub mod map;
pub mod request;
pub mod response;
pub mod session;
pub mod stats;
pub mod transport;

// Re-export commonly used types
pub use auth::{AuthToken, HttpIdentityProvider, IdentityProvider};
pub use channel::{RpcChannel, RpcResponse, DEFAULT_RETRY_BUDGET};
pub use codec::{
    decode, encode, AuthInfo, ParsedEnvelope, RequestEnvelope, ResponseEnvelope,
    STATUS_NEEDS_CONTEXT, STATUS_OK, STATUS_REDIRECT,
};
pub use error::{AuthError, DecodeError, Result, RpcError, TransportError};
pub use map::world_snapshot;
pub use request::{RequestType, SubRequest};
pub use response::{ResponsePayload, SubResponse};
pub use session::{login_backoff, AccountSession};
pub use stats::RequestStats;
pub use transport::{HttpReply, HttpTransport, Transport};

//! Request and response envelopes.
//!
//! A request envelope bundles the caller's position, its auth token and an
//! ordered list of `(type id, parameters)` pairs. The response envelope carries
//! a status code, an optional redirect host and one opaque payload per answered
//! subrequest, in request order.

use crate::error::DecodeError;
use crate::request::{RequestType, SubRequest};
use crate::response::{ResponsePayload, SubResponse};
use scout_core::Point;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Fixed RPC id sent with every request.
pub const RPC_ID: u64 = 8_145_806_132_888_207_460;

/// Constant trailer field expected by the server.
pub const UNKNOWN12: u64 = 989;

/// Plain success.
pub const STATUS_OK: i32 = 1;

/// The server needs baseline account state before answering.
pub const STATUS_NEEDS_CONTEXT: i32 = 3;

/// The server names another host to resubmit to.
pub const STATUS_REDIRECT: i32 = 53;

/// Direction marker of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Client to server
    Request,
    /// Server to client
    Response,
}

/// Bearer credentials attached to a request envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthInfo {
    /// Identity provider name
    pub provider: String,
    /// Bearer token
    pub token: String,
}

/// One subrequest on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireRequest {
    /// Request type id
    pub type_id: u32,
    /// Serialized parameter struct
    pub parameters: Option<Vec<u8>>,
}

/// Request envelope as sent on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Always [`Direction::Request`]
    pub direction: Direction,
    /// Always [`RPC_ID`]
    pub rpc_id: u64,
    /// Subrequests in call order
    pub requests: Vec<WireRequest>,
    /// Caller latitude
    pub latitude: f64,
    /// Caller longitude
    pub longitude: f64,
    /// Caller altitude
    pub altitude: f64,
    /// Credentials
    pub auth: AuthInfo,
    /// Always [`UNKNOWN12`]
    pub unknown12: u64,
}

impl RequestEnvelope {
    /// Parse a request envelope from its wire form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }

    /// Request types in call order; unknown ids are skipped.
    #[must_use]
    pub fn request_types(&self) -> Vec<RequestType> {
        self.requests
            .iter()
            .filter_map(|r| RequestType::from_id(r.type_id))
            .collect()
    }
}

/// Response envelope as received on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Always [`Direction::Response`]
    pub direction: Direction,
    /// Echo of the request's RPC id
    pub rpc_id: u64,
    /// Protocol status code
    pub status_code: i32,
    /// Host to use for subsequent requests
    pub api_url: Option<String>,
    /// One payload per answered subrequest
    pub returns: Vec<Vec<u8>>,
}

impl ResponseEnvelope {
    /// Build a response envelope from typed payloads.
    pub fn new(
        status_code: i32,
        api_url: Option<String>,
        payloads: &[ResponsePayload],
    ) -> Result<Self, bincode::Error> {
        let returns = payloads
            .iter()
            .map(ResponsePayload::to_bytes)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            direction: Direction::Response,
            rpc_id: RPC_ID,
            status_code,
            api_url,
            returns,
        })
    }

    /// Serialize into the wire form.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }
}

/// A decoded response with best-effort typed sub-responses.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEnvelope {
    /// Protocol status code
    pub status_code: i32,
    /// Redirect host named by the server
    pub api_url: Option<String>,
    /// Sub-responses keyed by request type name
    pub responses: BTreeMap<String, SubResponse>,
    /// Number of payloads the server returned
    pub returned: usize,
}

impl ParsedEnvelope {
    /// The parsed payload for `request_type`, if present and well-formed.
    #[must_use]
    pub fn payload(&self, request_type: RequestType) -> Option<&ResponsePayload> {
        self.responses
            .get(request_type.name())
            .and_then(SubResponse::payload)
    }

    /// Whether the server returned a payload list with nothing in it.
    #[must_use]
    pub fn is_empty_payload(&self) -> bool {
        self.returned == 0
    }

    /// The redirect host, ignoring empty strings.
    #[must_use]
    pub fn redirect_host(&self) -> Option<&str> {
        self.api_url.as_deref().filter(|host| !host.is_empty())
    }
}

/// Build the wire form of a request envelope.
pub fn encode(
    auth: &AuthInfo,
    position: Point,
    subrequests: &[SubRequest],
) -> Result<Vec<u8>, bincode::Error> {
    let requests = subrequests
        .iter()
        .map(|sub| {
            Ok(WireRequest {
                type_id: sub.request_type().id(),
                parameters: sub.encode_parameters()?,
            })
        })
        .collect::<Result<Vec<_>, bincode::Error>>()?;

    let envelope = RequestEnvelope {
        direction: Direction::Request,
        rpc_id: RPC_ID,
        requests,
        latitude: position.latitude,
        longitude: position.longitude,
        altitude: position.altitude,
        auth: auth.clone(),
        unknown12: UNKNOWN12,
    };
    bincode::serialize(&envelope)
}

/// Decode an HTTP reply into a [`ParsedEnvelope`].
///
/// Sub-responses are matched to `request_types` by position. A payload that
/// does not parse as its registered shape becomes [`SubResponse::Error`]
/// instead of failing the whole decode.
pub fn decode(
    http_status: u16,
    body: &[u8],
    request_types: &[RequestType],
) -> Result<ParsedEnvelope, DecodeError> {
    if http_status != 200 {
        return Err(DecodeError::HttpStatus(http_status));
    }
    if body.is_empty() {
        return Err(DecodeError::EmptyBody);
    }

    let envelope: ResponseEnvelope =
        bincode::deserialize(body).map_err(|e| DecodeError::Malformed(e.to_string()))?;
    if envelope.direction != Direction::Response {
        return Err(DecodeError::Malformed(
            "envelope is not a response".to_string(),
        ));
    }

    if envelope.returns.len() > request_types.len() {
        warn!(
            expected = request_types.len(),
            returned = envelope.returns.len(),
            "Response has more payloads than subrequests, ignoring the extra ones"
        );
    }

    let responses = request_types
        .iter()
        .zip(&envelope.returns)
        .map(|(request_type, bytes)| {
            let sub = match ResponsePayload::parse(*request_type, bytes) {
                Ok(payload) => SubResponse::Parsed(payload),
                Err(e) => {
                    SubResponse::Error(format!("could not parse {request_type} response: {e}"))
                }
            };
            (request_type.name().to_string(), sub)
        })
        .collect();

    Ok(ParsedEnvelope {
        status_code: envelope.status_code,
        api_url: envelope.api_url,
        responses,
        returned: envelope.returns.len(),
    })
}

//! Test doubles shared by the scanner integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use scout_core::{now_millis, AccountConfig, AuthProvider, Point, WorldSnapshot, WorldStore};
use scout_rpc::response::{MapCell, MapObjectsResponse, WildEntity};
use scout_rpc::{
    AuthError, AuthToken, HttpReply, IdentityProvider, RequestEnvelope, ResponseEnvelope,
    ResponsePayload, Transport, TransportError, STATUS_OK,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Answers map requests, failing for positions whose latitude is in `failing`.
pub struct MapTransport {
    failing: HashSet<u64>,
    delay: Duration,
    pub posts: AtomicU32,
}

impl MapTransport {
    pub fn new() -> Arc<Self> {
        Self::failing_at(&[])
    }

    pub fn failing_at(latitudes: &[f64]) -> Arc<Self> {
        Arc::new(Self {
            failing: latitudes.iter().map(|l| l.to_bits()).collect(),
            delay: Duration::ZERO,
            posts: AtomicU32::new(0),
        })
    }

    /// Answers every request after `delay`.
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            failing: HashSet::new(),
            delay,
            posts: AtomicU32::new(0),
        })
    }

    pub fn posts(&self) -> u32 {
        self.posts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MapTransport {
    async fn post(&self, url: &str, body: Vec<u8>) -> Result<HttpReply, TransportError> {
        let n = self.posts.fetch_add(1, Ordering::SeqCst);
        let request = RequestEnvelope::from_bytes(&body).expect("valid request envelope");
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing.contains(&request.latitude.to_bits()) {
            return Err(TransportError::Timeout {
                url: url.to_string(),
            });
        }
        Ok(map_reply(
            Point::new(request.latitude, request.longitude, request.altitude),
            u64::from(n),
        ))
    }
}

pub fn map_reply(position: Point, encounter_id: u64) -> HttpReply {
    let map = MapObjectsResponse {
        status: 1,
        cells: vec![MapCell {
            cell_id: 1,
            current_timestamp_ms: now_millis(),
            wild: vec![WildEntity {
                encounter_id,
                spawn_point_id: "sp".to_string(),
                species_id: 16,
                latitude: position.latitude,
                longitude: position.longitude,
                last_modified_ms: now_millis(),
                time_till_hidden_ms: 600_000,
            }],
            forts: Vec::new(),
        }],
    };
    let body = ResponseEnvelope::new(STATUS_OK, None, &[ResponsePayload::MapObjects(map)])
        .and_then(|e| e.to_bytes())
        .expect("build response");
    HttpReply { status: 200, body }
}

/// Logs every account in, except those named in `rejected`.
pub struct StaticIdentity {
    rejected: HashSet<String>,
    pub logins: AtomicU32,
}

impl StaticIdentity {
    pub fn ok() -> Arc<Self> {
        Self::rejecting(&[])
    }

    pub fn rejecting(usernames: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            rejected: usernames.iter().map(|u| (*u).to_string()).collect(),
            logins: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn login(&self, account: &AccountConfig) -> Result<AuthToken, AuthError> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        if self.rejected.contains(&account.username) {
            return Err(AuthError::Rejected {
                username: account.username.clone(),
                status: 403,
                message: "banned".to_string(),
            });
        }
        Ok(AuthToken {
            token: format!("token-{}", account.username),
            expires_at_ms: now_millis() + 3_600_000,
        })
    }
}

/// Keeps every stored snapshot in memory.
#[derive(Default)]
pub struct MemoryStore {
    pub snapshots: Mutex<Vec<WorldSnapshot>>,
}

impl MemoryStore {
    /// Stored snapshots with a sighting near `latitude`.
    pub fn snapshots_near(&self, latitude: f64) -> usize {
        self.snapshots
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.sightings.iter().any(|x| (x.latitude - latitude).abs() < 0.1))
            .count()
    }

    pub fn sightings(&self) -> usize {
        self.snapshots
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.sightings.len())
            .sum()
    }
}

#[async_trait]
impl WorldStore for MemoryStore {
    async fn store(&self, snapshot: &WorldSnapshot) -> scout_core::Result<()> {
        self.snapshots.lock().unwrap().push(snapshot.clone());
        Ok(())
    }
}

pub fn accounts(names: &[&str]) -> Vec<AccountConfig> {
    names
        .iter()
        .map(|name| AccountConfig::new(*name, "secret", AuthProvider::Ptc))
        .collect()
}

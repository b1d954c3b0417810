use crate::application_impl::MemoryTokenStore;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Semaphore;
use tracing::warn;

const SIGNING_KEY: &[u8] = b"flashline-fake-signing-key";
const DEFAULT_TTL_MINUTES: i64 = 30;

const REFRESH_PATH: &str = "/auth/refresh-token";
const SIGNOUT_PATH: &str = "/auth/signout";

fn lock<T>(slot: &Mutex<T>) -> MutexGuard<'_, T> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

/// In-process stand-in for the backend, paired with a `MemoryTokenStore`
/// playing the cookie jar. Behaves like the real thing at the transport
/// boundary: it mints signed tokens on refresh, 401s calls whose token is
/// missing or expired, and clears the session on signout. Tests script it
/// with canned replies, gates, and induced failures.
pub struct FakeBackend {
    tokens: Arc<MemoryTokenStore>,
    subject: Mutex<String>,
    access_ttl: Mutex<ChronoDuration>,
    refresh_calls: AtomicUsize,
    fail_refresh: AtomicBool,
    skip_token: AtomicBool,
    gates: DashMap<String, Arc<Semaphore>>,
    held: AtomicUsize,
    scripted: Mutex<HashMap<String, VecDeque<HttpReply>>>,
    broken: DashMap<String, ()>,
    log: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn new(tokens: Arc<MemoryTokenStore>) -> Arc<Self> {
        Arc::new(Self {
            tokens,
            subject: Mutex::new("user-1".to_string()),
            access_ttl: Mutex::new(ChronoDuration::minutes(DEFAULT_TTL_MINUTES)),
            refresh_calls: AtomicUsize::new(0),
            fail_refresh: AtomicBool::new(false),
            skip_token: AtomicBool::new(false),
            gates: DashMap::new(),
            held: AtomicUsize::new(0),
            scripted: Mutex::new(HashMap::new()),
            broken: DashMap::new(),
            log: Mutex::new(Vec::new()),
        })
    }

    /// Store a freshly minted token for `subject`, as if the user had just
    /// signed in.
    pub fn seed_session(&self, subject: &str) {
        let ttl = *lock(&self.access_ttl);
        self.seed_session_with_ttl(subject, ttl);
    }

    pub fn seed_session_with_ttl(&self, subject: &str, ttl: ChronoDuration) {
        *lock(&self.subject) = subject.to_string();
        if let Some(token) = self.mint(ttl) {
            self.tokens.set_access(Some(token));
        }
    }

    /// Gate the refresh endpoint; each `release_refresh` permit lets one
    /// request through.
    pub fn hold_refresh(&self) {
        self.hold_endpoint(REFRESH_PATH);
    }

    pub fn release_refresh(&self, permits: usize) {
        if let Some(gate) = self.gates.get(REFRESH_PATH) {
            gate.add_permits(permits);
        }
    }

    /// Make the next refreshes come back 401.
    pub fn fail_refresh(&self) {
        self.fail_refresh.store(true, Ordering::SeqCst);
    }

    /// Refresh replies 2xx but never stores a new token, so replays expire
    /// again.
    pub fn skip_token_on_refresh(&self) {
        self.skip_token.store(true, Ordering::SeqCst);
    }

    pub fn hold_endpoint(&self, endpoint: &str) {
        self.gates
            .insert(endpoint.to_string(), Arc::new(Semaphore::new(0)));
    }

    pub fn release_endpoint(&self, endpoint: &str) {
        if let Some(gate) = self.gates.get(endpoint) {
            gate.add_permits(1024);
        }
    }

    /// How many requests are currently parked at a gate.
    pub fn held_waiters(&self) -> usize {
        self.held.load(Ordering::SeqCst)
    }

    /// Simulate connectivity loss for one endpoint.
    pub fn break_network(&self, endpoint: &str) {
        self.broken.insert(endpoint.to_string(), ());
    }

    /// Queue a canned reply for an endpoint; consumed in order.
    pub fn push_reply(&self, endpoint: &str, reply: HttpReply) {
        lock(&self.scripted)
            .entry(endpoint.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Every endpoint hit, in arrival order (replays included).
    pub fn calls(&self) -> Vec<String> {
        lock(&self.log).clone()
    }

    fn mint(&self, ttl: ChronoDuration) -> Option<String> {
        let now = Utc::now();
        let claims = Claims {
            id: lock(&self.subject).clone(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SIGNING_KEY),
        )
        .inspect_err(|e| warn!("fake backend could not mint a token: {e}"))
        .ok()
    }

    async fn pass_gate(&self, endpoint: &str) {
        // Clone out of the map so no shard guard is held across the wait.
        let gate = match self.gates.get(endpoint) {
            Some(gate) => Arc::clone(&gate),
            None => return,
        };

        struct Parked<'a>(&'a AtomicUsize);
        impl Drop for Parked<'_> {
            fn drop(&mut self) {
                self.0.fetch_sub(1, Ordering::SeqCst);
            }
        }

        self.held.fetch_add(1, Ordering::SeqCst);
        let _parked = Parked(&self.held);
        if let Ok(permit) = gate.acquire().await {
            permit.forget();
        }
    }

    async fn token_is_valid(&self) -> bool {
        match self.tokens.access_token().await {
            Some(token) => time_until_expiry(&token, Utc::now()) > ChronoDuration::zero(),
            None => false,
        }
    }
}

#[async_trait::async_trait]
impl HttpTransport for FakeBackend {
    async fn send(&self, request: &CallRequest) -> Result<HttpReply, TransportError> {
        lock(&self.log).push(request.endpoint.clone());

        if self.broken.contains_key(&request.endpoint) {
            return Err(TransportError::Network("connection refused".to_string()));
        }

        if request.endpoint == REFRESH_PATH {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            self.pass_gate(REFRESH_PATH).await;

            if self.fail_refresh.load(Ordering::SeqCst) {
                return Ok(HttpReply {
                    status: 401,
                    body: Some(json!({ "status": "error", "message": "invalid refresh token" })),
                });
            }
            if !self.skip_token.load(Ordering::SeqCst) {
                let ttl = *lock(&self.access_ttl);
                if let Some(token) = self.mint(ttl) {
                    self.tokens.set_access(Some(token));
                }
            }
            return Ok(HttpReply {
                status: 200,
                body: Some(json!({ "status": "success", "message": "token refreshed", "data": null })),
            });
        }

        self.pass_gate(&request.endpoint).await;

        if request.endpoint == SIGNOUT_PATH {
            self.tokens.clear();
            return Ok(HttpReply {
                status: 200,
                body: Some(json!({ "status": "success", "message": "signed out", "data": null })),
            });
        }

        if let Some(reply) = lock(&self.scripted)
            .get_mut(&request.endpoint)
            .and_then(VecDeque::pop_front)
        {
            return Ok(reply);
        }

        if !self.token_is_valid().await {
            return Ok(HttpReply {
                status: 401,
                body: Some(json!({ "status": "error", "message": "jwt expired" })),
            });
        }

        Ok(HttpReply {
            status: 200,
            body: Some(json!({
                "status": "success",
                "message": "ok",
                "data": { "endpoint": request.endpoint },
            })),
        })
    }
}

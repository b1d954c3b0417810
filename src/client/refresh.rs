use crate::client::ApiError;
use crate::client::queue::{self, CallResult, PendingCall, ReplayFn, RequestQueue};
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::Utc;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, warn};

pub const REFRESH_ENDPOINT: &str = "/auth/refresh-token";

#[derive(Debug, Clone, thiserror::Error)]
pub enum RefreshError {
    #[error("refresh rejected with status {0}")]
    Rejected(u16),
    #[error("refresh transport failure: {0}")]
    Transport(String),
}

/// Handle to the in-flight refresh cycle. Anyone who needs to wait for the
/// session to come back clones this instead of polling a flag.
pub type RefreshCompletion = Shared<BoxFuture<'static, Result<(), RefreshError>>>;

struct RefreshState {
    /// Bumped per cycle and on reset, so a cycle that was abandoned by
    /// sign-out cannot settle a later cycle's queue.
    cycle: u64,
    inflight: Option<RefreshCompletion>,
    queue: RequestQueue,
}

/// Process-wide single-flight refresh. However many callers observe an
/// expired session at once, exactly one network call is made, and every
/// caller settles on that call's outcome.
pub struct RefreshCoordinator {
    transport: Arc<dyn HttpTransport>,
    events: broadcast::Sender<AuthEvent>,
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        events: broadcast::Sender<AuthEvent>,
    ) -> Arc<Self> {
        Arc::new(Self {
            transport,
            events,
            state: Mutex::new(RefreshState {
                cycle: 0,
                inflight: None,
                queue: RequestQueue::default(),
            }),
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start a refresh, or attach to the one already in flight. The state
    /// lock is the first thing taken, so a 401 arriving concurrently can
    /// never start a second cycle.
    pub fn refresh(self: &Arc<Self>) -> RefreshCompletion {
        let mut state = self.lock_state();
        if let Some(completion) = &state.inflight {
            return completion.clone();
        }
        let completion = self.start_cycle(&mut state);
        state.inflight = Some(completion.clone());
        completion
    }

    /// Observe without starting anything.
    pub fn current_completion(&self) -> Option<RefreshCompletion> {
        self.lock_state().inflight.clone()
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock_state().inflight.is_some()
    }

    /// Park a call behind the refresh, starting a cycle if none is in
    /// flight. Enqueue and the single-flight check are atomic, so the call
    /// can neither miss the flush nor trigger a duplicate refresh.
    pub fn recover(self: &Arc<Self>, replay: ReplayFn) -> oneshot::Receiver<CallResult> {
        let (entry, rx) = PendingCall::new(replay);
        let mut state = self.lock_state();
        state.queue.push(entry);
        if state.inflight.is_none() {
            let completion = self.start_cycle(&mut state);
            state.inflight = Some(completion);
        }
        rx
    }

    /// Sign-out: reject anything still parked and abandon the cycle.
    pub fn reset(&self) {
        let entries = {
            let mut state = self.lock_state();
            state.cycle += 1;
            state.inflight = None;
            state.queue.take()
        };
        queue::drain(entries, ApiError::RefreshFailed);
    }

    pub fn queued(&self) -> usize {
        self.lock_state().queue.len()
    }

    fn start_cycle(self: &Arc<Self>, state: &mut RefreshState) -> RefreshCompletion {
        state.cycle += 1;
        let id = state.cycle;
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move { this.run_cycle(id).await });
        async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => Err(RefreshError::Transport(format!("refresh task died: {e}"))),
            }
        }
        .boxed()
        .shared()
    }

    async fn run_cycle(self: Arc<Self>, id: u64) -> Result<(), RefreshError> {
        let request = CallRequest::post(REFRESH_ENDPOINT, None);
        let result = match self.transport.send(&request).await {
            Ok(reply) if reply.is_success() => Ok(()),
            Ok(reply) => Err(RefreshError::Rejected(reply.status)),
            Err(TransportError::Network(e)) => Err(RefreshError::Transport(e)),
        };

        // Back to Idle before anything queued is replayed: a caller arriving
        // during the flush must be able to start the next cycle.
        let entries = {
            let mut state = self.lock_state();
            if state.cycle != id {
                debug!("stale refresh cycle settled after reset");
                return result;
            }
            state.inflight = None;
            state.queue.take()
        };

        match &result {
            Ok(()) => {
                info!(queued = entries.len(), "token refresh completed");
                let _ = self.events.send(AuthEvent::Refreshed { at: Utc::now() });
                queue::flush(entries).await;
            }
            Err(e) => {
                warn!(queued = entries.len(), "token refresh failed: {e}");
                let _ = self.events.send(AuthEvent::RefreshFailed);
                queue::drain(entries, ApiError::RefreshFailed);
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::{FakeBackend, MemoryTokenStore};

    fn bus() -> broadcast::Sender<AuthEvent> {
        broadcast::channel(16).0
    }

    #[tokio::test]
    async fn concurrent_refreshes_share_one_network_call() {
        let tokens = Arc::new(MemoryTokenStore::new());
        let backend = FakeBackend::new(tokens);
        backend.hold_refresh();
        let coordinator = RefreshCoordinator::new(backend.clone(), bus());

        let a = coordinator.refresh();
        let b = coordinator.refresh();
        let c = coordinator.refresh();
        assert!(coordinator.is_refreshing());

        backend.release_refresh(1);
        let (a, b, c) = tokio::join!(a, b, c);
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(backend.refresh_calls(), 1);
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn completion_reports_rejection() {
        let tokens = Arc::new(MemoryTokenStore::new());
        let backend = FakeBackend::new(tokens);
        backend.fail_refresh();
        let events = bus();
        let mut rx = events.subscribe();
        let coordinator = RefreshCoordinator::new(backend.clone(), events);

        let result = coordinator.refresh().await;
        assert!(matches!(result, Err(RefreshError::Rejected(401))));
        assert_eq!(rx.recv().await.unwrap(), AuthEvent::RefreshFailed);
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn a_settled_cycle_does_not_block_the_next() {
        let tokens = Arc::new(MemoryTokenStore::new());
        let backend = FakeBackend::new(tokens);
        let coordinator = RefreshCoordinator::new(backend.clone(), bus());

        coordinator.refresh().await.unwrap();
        coordinator.refresh().await.unwrap();
        assert_eq!(backend.refresh_calls(), 2);
    }

    #[tokio::test]
    async fn reset_rejects_parked_calls() {
        let tokens = Arc::new(MemoryTokenStore::new());
        let backend = FakeBackend::new(tokens);
        backend.hold_refresh();
        let coordinator = RefreshCoordinator::new(backend.clone(), bus());

        let rx = coordinator.recover(Box::new(|| {
            async { Ok(ApiResponse::from_reply(&HttpReply { status: 200, body: None })) }.boxed()
        }));
        assert_eq!(coordinator.queued(), 1);

        coordinator.reset();
        assert_eq!(coordinator.queued(), 0);
        assert!(!coordinator.is_refreshing());
        assert!(matches!(rx.await.unwrap(), Err(ApiError::RefreshFailed)));

        // Let the abandoned cycle settle; it must not touch the new state.
        backend.release_refresh(1);
        tokio::task::yield_now().await;
        assert!(!coordinator.is_refreshing());
    }
}

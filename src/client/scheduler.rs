use crate::client::refresh::RefreshCoordinator;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::Utc;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Sleep, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Sentinel deadline for the unarmed state; the timer branch is disabled
/// whenever `armed` is false, so this never actually fires.
fn parked() -> Instant {
    Instant::now() + Duration::from_secs(60 * 60 * 24 * 365)
}

/// Arms a timer that refreshes the session a lead window ahead of token
/// expiry, so the 401 recovery path stays the fallback rather than the
/// common case. Re-arms on cross-tab token changes, window focus, and
/// completed refreshes; disarms on sign-out and on refresh failure.
pub struct ProactiveScheduler {
    coordinator: Arc<RefreshCoordinator>,
    token_store: Arc<dyn TokenStore>,
    events: broadcast::Sender<AuthEvent>,
    lead: Duration,
    cancel: CancellationToken,
}

impl ProactiveScheduler {
    pub fn new(
        coordinator: Arc<RefreshCoordinator>,
        token_store: Arc<dyn TokenStore>,
        events: broadcast::Sender<AuthEvent>,
        lead: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            coordinator,
            token_store,
            events,
            lead,
            cancel,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        let mut bus = self.events.subscribe();
        let timer = sleep_until(parked());
        tokio::pin!(timer);

        let mut armed = self.arm(timer.as_mut()).await;

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                event = bus.recv() => match event {
                    Ok(AuthEvent::LoggedOut) => {
                        armed = false;
                        timer.as_mut().reset(parked());
                        debug!("proactive refresh disarmed on sign-out");
                    }
                    Ok(AuthEvent::RefreshFailed) => {
                        // A broken refresh makes any future timer moot until
                        // the user re-authenticates.
                        armed = false;
                        timer.as_mut().reset(parked());
                    }
                    Ok(
                        AuthEvent::TokenChanged
                        | AuthEvent::WindowFocused
                        | AuthEvent::Refreshed { .. },
                    ) => {
                        armed = self.arm(timer.as_mut()).await;
                    }
                    Ok(AuthEvent::RefreshScheduled { .. }) => {}
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "scheduler lagged behind the event bus, re-arming");
                        armed = self.arm(timer.as_mut()).await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },

                () = &mut timer, if armed => {
                    armed = false;
                    timer.as_mut().reset(parked());
                    // Completion re-arms through the Refreshed event; failure
                    // leaves the scheduler disarmed.
                    let _ = self.coordinator.refresh().await;
                }
            }
        }
    }

    /// Arm for whatever token is stored right now. Inside the lead window
    /// the refresh happens immediately instead of arming a timer.
    async fn arm(&self, mut timer: Pin<&mut Sleep>) -> bool {
        let Some(token) = self.token_store.access_token().await else {
            timer.as_mut().reset(parked());
            debug!("no access token, proactive refresh unarmed");
            return false;
        };

        let ttl = time_until_expiry(&token, Utc::now())
            .to_std()
            .unwrap_or_default();

        if ttl <= self.lead {
            timer.as_mut().reset(parked());
            debug!("token inside the lead window, refreshing now");
            let _ = self.coordinator.refresh().await;
            return false;
        }

        let fire_in = ttl - self.lead;
        timer.as_mut().reset(Instant::now() + fire_in);
        let _ = self
            .events
            .send(AuthEvent::RefreshScheduled { fire_in });
        info!("token refresh scheduled in {} minutes", fire_in.as_secs() / 60);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::{FakeBackend, MemoryTokenStore};
    use tokio::time::timeout;

    const LEAD: Duration = Duration::from_secs(300);

    struct Fixture {
        backend: Arc<FakeBackend>,
        events: broadcast::Sender<AuthEvent>,
        cancel: CancellationToken,
        handle: JoinHandle<()>,
    }

    fn spawn_scheduler(tokens: Arc<MemoryTokenStore>, backend: Arc<FakeBackend>) -> Fixture {
        let (events, _) = broadcast::channel(16);
        let cancel = CancellationToken::new();
        let coordinator = RefreshCoordinator::new(backend.clone(), events.clone());
        let scheduler =
            ProactiveScheduler::new(coordinator, tokens, events.clone(), LEAD, cancel.clone());
        let handle = scheduler.spawn();
        Fixture {
            backend,
            events,
            cancel,
            handle,
        }
    }

    async fn next_scheduled(bus: &mut broadcast::Receiver<AuthEvent>) -> Duration {
        loop {
            match bus.recv().await.unwrap() {
                AuthEvent::RefreshScheduled { fire_in } => return fire_in,
                _ => continue,
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn arms_a_lead_window_ahead_of_expiry() {
        let tokens = Arc::new(MemoryTokenStore::new());
        let backend = FakeBackend::new(tokens.clone());
        backend.seed_session_with_ttl("user-1", chrono::Duration::minutes(10));

        let fixture = spawn_scheduler(tokens, backend);
        let mut bus = fixture.events.subscribe();

        let fire_in = next_scheduled(&mut bus).await;
        // 10 minutes to expiry minus the 5 minute lead.
        assert!(fire_in > Duration::from_secs(295) && fire_in <= Duration::from_secs(300));
        assert_eq!(fixture.backend.refresh_calls(), 0);

        fixture.cancel.cancel();
        let _ = fixture.handle.await;
    }

    #[tokio::test(start_paused = true)]
    async fn refreshes_immediately_inside_the_lead_window() {
        let tokens = Arc::new(MemoryTokenStore::new());
        let backend = FakeBackend::new(tokens.clone());
        backend.seed_session_with_ttl("user-1", chrono::Duration::minutes(2));

        let fixture = spawn_scheduler(tokens, backend);
        let mut bus = fixture.events.subscribe();

        // No timer: the refresh runs now, and its completion re-arms with
        // the renewed (30 minute) token.
        loop {
            match timeout(Duration::from_secs(5), bus.recv()).await.unwrap() {
                Ok(AuthEvent::Refreshed { .. }) => break,
                Ok(_) => continue,
                Err(e) => panic!("bus closed: {e}"),
            }
        }
        assert_eq!(fixture.backend.refresh_calls(), 1);
        let fire_in = next_scheduled(&mut bus).await;
        assert!(fire_in > Duration::from_secs(60));

        fixture.cancel.cancel();
        let _ = fixture.handle.await;
    }

    #[tokio::test(start_paused = true)]
    async fn fires_and_chains_the_next_cycle() {
        let tokens = Arc::new(MemoryTokenStore::new());
        let backend = FakeBackend::new(tokens.clone());
        backend.seed_session_with_ttl("user-1", chrono::Duration::minutes(10));

        let fixture = spawn_scheduler(tokens, backend);
        let mut bus = fixture.events.subscribe();

        // First arm, then let virtual time reach the fire point.
        let first = next_scheduled(&mut bus).await;
        tokio::time::sleep(first + Duration::from_secs(1)).await;

        assert_eq!(fixture.backend.refresh_calls(), 1);
        // The completed refresh re-armed for the renewed token.
        let second = next_scheduled(&mut bus).await;
        assert!(second > Duration::from_secs(0));

        fixture.cancel.cancel();
        let _ = fixture.handle.await;
    }

    #[tokio::test(start_paused = true)]
    async fn no_token_means_unarmed() {
        let tokens = Arc::new(MemoryTokenStore::new());
        let backend = FakeBackend::new(tokens.clone());

        let fixture = spawn_scheduler(tokens, backend);
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(fixture.backend.refresh_calls(), 0);

        fixture.cancel.cancel();
        let _ = fixture.handle.await;
    }

    #[tokio::test(start_paused = true)]
    async fn token_change_rearms_with_the_current_token() {
        let tokens = Arc::new(MemoryTokenStore::new());
        let backend = FakeBackend::new(tokens.clone());

        let fixture = spawn_scheduler(tokens.clone(), backend.clone());
        let mut bus = fixture.events.subscribe();

        // Let the scheduler start (and find no token) before signalling.
        tokio::task::yield_now().await;

        // Another tab signs in: the store changes and the signal arrives.
        fixture
            .backend
            .seed_session_with_ttl("user-2", chrono::Duration::minutes(20));
        let _ = fixture.events.send(AuthEvent::TokenChanged);

        let fire_in = next_scheduled(&mut bus).await;
        assert!(fire_in > Duration::from_secs(14 * 60));

        fixture.cancel.cancel();
        let _ = fixture.handle.await;
    }
}

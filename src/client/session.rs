use crate::application_impl::*;
use crate::client::dispatcher::Dispatcher;
use crate::client::queue::CallResult;
use crate::client::refresh::RefreshCoordinator;
use crate::client::scheduler::ProactiveScheduler;
use crate::client::status::{RefreshStatus, StatusMonitor};
use crate::domain_model::*;
use crate::domain_port::*;
use crate::infra_http::ReqwestTransport;
use crate::settings::Settings;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub const SIGNOUT_ENDPOINT: &str = "/auth/signout";

const EVENT_BUS_CAPACITY: usize = 64;

/// Owns the whole token-lifecycle machinery for one signed-in session:
/// coordinator, scheduler, dispatcher, and the status fold. Constructed on
/// session start, disposed on sign-out; nothing here is ambient state.
pub struct Session {
    dispatcher: Arc<Dispatcher>,
    coordinator: Arc<RefreshCoordinator>,
    events: broadcast::Sender<AuthEvent>,
    status: watch::Receiver<RefreshStatus>,
    scheduler_handle: Mutex<Option<JoinHandle<()>>>,
    monitor_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl Session {
    /// Wire the session from settings: `auth.backend = "real"` drives
    /// reqwest against `http.base_url`, `"fake"` runs the in-process
    /// backend with a seeded demo session.
    pub fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let lead = Duration::from_secs(settings.auth.refresh_lead_secs);
        let navigator: Arc<dyn Navigator> = Arc::new(TracingNavigator);
        let alerts: Arc<dyn AlertSink> = Arc::new(TracingAlert);

        let session = match settings.auth.backend.as_str() {
            "real" => {
                let (transport, tokens) = ReqwestTransport::try_new(settings)?;
                Self::with_parts(transport, tokens, navigator, alerts, lead)
            }
            "fake" => {
                let tokens = Arc::new(MemoryTokenStore::new());
                let backend = FakeBackend::new(tokens.clone());
                backend.seed_session("demo-user");
                Self::with_parts(backend, tokens, navigator, alerts, lead)
            }
            other => return Err(anyhow::anyhow!("Unknown auth backend: {}", other)),
        };

        info!("session started");
        Ok(session)
    }

    /// Explicit wiring for tests and embedders.
    pub fn with_parts(
        transport: Arc<dyn HttpTransport>,
        token_store: Arc<dyn TokenStore>,
        navigator: Arc<dyn Navigator>,
        alerts: Arc<dyn AlertSink>,
        lead: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        let cancel = CancellationToken::new();

        let coordinator = RefreshCoordinator::new(transport.clone(), events.clone());
        let dispatcher = Dispatcher::new(transport, coordinator.clone(), navigator, alerts);

        let (status, monitor_handle) = StatusMonitor::spawn(&events, cancel.clone());

        let scheduler = ProactiveScheduler::new(
            coordinator.clone(),
            token_store,
            events.clone(),
            lead,
            cancel.clone(),
        );
        let scheduler_handle = scheduler.spawn();

        Self {
            dispatcher,
            coordinator,
            events,
            status,
            scheduler_handle: Mutex::new(Some(scheduler_handle)),
            monitor_handle: Mutex::new(Some(monitor_handle)),
            cancel,
        }
    }

    pub async fn call(&self, request: CallRequest) -> CallResult {
        self.dispatcher.call(request).await
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        self.dispatcher.clone()
    }

    pub fn coordinator(&self) -> Arc<RefreshCoordinator> {
        self.coordinator.clone()
    }

    pub fn events(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    pub fn status(&self) -> watch::Receiver<RefreshStatus> {
        self.status.clone()
    }

    /// Another tab rewrote the stored token.
    pub fn notify_token_changed(&self) {
        let _ = self.events.send(AuthEvent::TokenChanged);
    }

    /// The window regained focus; the scheduler re-checks the token.
    pub fn notify_window_focused(&self) {
        let _ = self.events.send(AuthEvent::WindowFocused);
    }

    /// Invalidate the server-side session (best effort) and always clear
    /// local state: disarm the scheduler, abandon the refresh cycle, empty
    /// the queue.
    pub async fn sign_out(&self) {
        if let Err(e) = self.dispatcher.call(CallRequest::post(SIGNOUT_ENDPOINT, None)).await {
            warn!("signout call failed: {e}");
        }
        self.coordinator.reset();
        let _ = self.events.send(AuthEvent::LoggedOut);
        info!("signed out, local session state cleared");
    }

    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self
            .scheduler_handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        let handle = self
            .monitor_handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

use crate::client::cancel::CancellationRegistry;
use crate::client::classify::{classify, session_expired};
use crate::client::error::ApiError;
use crate::client::queue::CallResult;
use crate::client::refresh::RefreshCoordinator;
use crate::domain_model::*;
use crate::domain_port::*;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Fresh,
    Replay,
}

/// The resilient call path: supersede the previous call to the same
/// endpoint, send, and turn whatever comes back into a response, a
/// transparent refresh-and-replay, or a classified failure with its
/// notification and navigation side effects.
pub struct Dispatcher {
    transport: Arc<dyn HttpTransport>,
    coordinator: Arc<RefreshCoordinator>,
    cancels: CancellationRegistry,
    navigator: Arc<dyn Navigator>,
    alerts: Arc<dyn AlertSink>,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        coordinator: Arc<RefreshCoordinator>,
        navigator: Arc<dyn Navigator>,
        alerts: Arc<dyn AlertSink>,
    ) -> Arc<Self> {
        Arc::new(Self {
            transport,
            coordinator,
            cancels: CancellationRegistry::new(),
            navigator,
            alerts,
        })
    }

    pub async fn call(self: &Arc<Self>, request: CallRequest) -> CallResult {
        self.execute(request, Attempt::Fresh).await
    }

    fn execute<'a>(
        self: &'a Arc<Self>,
        request: CallRequest,
        attempt: Attempt,
    ) -> BoxFuture<'a, CallResult> {
        async move {
            // A fresh call supersedes the in-flight call to the same endpoint.
            // Replays are internal re-dispatches of already-admitted calls and
            // race no one; registering them would let a replay cancel a newer
            // user-initiated call.
            let sent = match attempt {
                Attempt::Fresh => {
                    let cancel = self.cancels.begin(&request.endpoint);
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            debug!(endpoint = %request.endpoint, "superseded by a newer request");
                            return Err(ApiError::Canceled);
                        }
                        sent = self.transport.send(&request) => sent,
                    }
                }
                Attempt::Replay => self.transport.send(&request).await,
            };

            let reply = match sent {
                Ok(reply) => reply,
                Err(TransportError::Network(e)) => {
                    warn!(endpoint = %request.endpoint, "transport failure: {e}");
                    self.alerts.error("Network error. Please check your connection.");
                    return Err(ApiError::Network);
                }
            };

            if reply.status == 401 {
                return match attempt {
                    Attempt::Fresh => self.recover(request).await,
                    // The session was refreshed and the server still says
                    // expired: terminal, never a second cycle.
                    Attempt::Replay => Err(ApiError::RefreshFailed),
                };
            }

            if reply.is_success() {
                return Ok(ApiResponse::from_reply(&reply));
            }

            let outcome = classify(&reply);
            self.alerts.error(&outcome.message);
            if let Some(route) = outcome.route {
                self.navigator.replace(route);
            }
            Err(outcome.error)
        }
        .boxed()
    }

    /// Park the expired call behind the (single) refresh cycle and await its
    /// slot in the flush.
    async fn recover(self: &Arc<Self>, request: CallRequest) -> CallResult {
        let this = Arc::clone(self);
        let rx = self.coordinator.recover(Box::new(move || {
            async move { this.execute(request, Attempt::Replay).await }.boxed()
        }));

        let result = match rx.await {
            Ok(result) => result,
            // The queue itself went away (sign-out mid-refresh).
            Err(_) => Err(ApiError::RefreshFailed),
        };

        if matches!(result, Err(ApiError::RefreshFailed)) {
            let outcome = session_expired();
            self.alerts.error(&outcome.message);
            if let Some(route) = outcome.route {
                self.navigator.replace(route);
            }
        }
        result
    }
}

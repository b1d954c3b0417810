use crate::client::ApiError;
use crate::domain_model::ApiResponse;
use futures_util::future::BoxFuture;
use tokio::sync::oneshot;

pub type CallResult = Result<ApiResponse, ApiError>;

/// Re-issues a parked call as a fresh dispatch.
pub type ReplayFn = Box<dyn FnOnce() -> BoxFuture<'static, CallResult> + Send>;

pub struct PendingCall {
    replay: ReplayFn,
    tx: oneshot::Sender<CallResult>,
}

impl PendingCall {
    pub fn new(replay: ReplayFn) -> (Self, oneshot::Receiver<CallResult>) {
        let (tx, rx) = oneshot::channel();
        (Self { replay, tx }, rx)
    }
}

/// FIFO buffer of calls parked behind the in-flight refresh. Entries leave
/// the queue exactly once, all together: replayed on success, rejected on
/// failure.
#[derive(Default)]
pub struct RequestQueue {
    entries: Vec<PendingCall>,
}

impl RequestQueue {
    pub fn push(&mut self, entry: PendingCall) {
        self.entries.push(entry);
    }

    pub fn take(&mut self) -> Vec<PendingCall> {
        std::mem::take(&mut self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Replay everything in enqueue order. Each replay is a fresh call whose
/// outcome is independent of its neighbours'; a receiver that went away is
/// ignored.
pub async fn flush(entries: Vec<PendingCall>) {
    for entry in entries {
        let result = (entry.replay)().await;
        let _ = entry.tx.send(result);
    }
}

/// Reject everything with the same cause.
pub fn drain(entries: Vec<PendingCall>, cause: ApiError) {
    for entry in entries {
        let _ = entry.tx.send(Err(cause.clone()));
    }
}

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

/// Tracks the most recent in-flight call per endpoint key. Starting a new
/// call for a key cancels the previous holder; calls to different keys never
/// interfere. Slots are keyed by endpoint and overwritten, never removed, so
/// the map stays bounded by the number of distinct endpoints.
#[derive(Default)]
pub struct CancellationRegistry {
    slots: DashMap<String, CancellationToken>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a call for `key`, superseding whatever was there.
    pub fn begin(&self, key: &str) -> CancellationToken {
        let token = CancellationToken::new();
        if let Some(previous) = self.slots.insert(key.to_owned(), token.clone()) {
            previous.cancel();
        }
        token
    }
}

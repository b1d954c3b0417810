use crate::domain_port::TokenStore;
use std::sync::{Mutex, MutexGuard};

/// In-memory credential slot: the fake backend writes it, the scheduler and
/// transport read it. Stands in for the browser cookie jar.
#[derive(Default)]
pub struct MemoryTokenStore {
    access: Mutex<Option<String>>,
    csrf: Mutex<Option<String>>,
}

fn lock<T>(slot: &Mutex<T>) -> MutexGuard<'_, T> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_access(&self, token: Option<String>) {
        *lock(&self.access) = token;
    }

    pub fn set_csrf(&self, token: Option<String>) {
        *lock(&self.csrf) = token;
    }

    pub fn clear(&self) {
        *lock(&self.access) = None;
        *lock(&self.csrf) = None;
    }
}

#[async_trait::async_trait]
impl TokenStore for MemoryTokenStore {
    async fn access_token(&self) -> Option<String> {
        lock(&self.access).clone()
    }

    async fn csrf_token(&self) -> Option<String> {
        lock(&self.csrf).clone()
    }
}

use crate::domain_port::{AlertSink, Navigator, Route};
use std::sync::{Mutex, MutexGuard};

fn lock<T>(slot: &Mutex<T>) -> MutexGuard<'_, T> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

/// Records redirects so tests can assert the navigation policy.
#[derive(Default)]
pub struct RecordingNavigator {
    routes: Mutex<Vec<Route>>,
}

impl RecordingNavigator {
    pub fn routes(&self) -> Vec<Route> {
        lock(&self.routes).clone()
    }
}

impl Navigator for RecordingNavigator {
    fn replace(&self, route: Route) {
        lock(&self.routes).push(route);
    }
}

/// Records user-visible messages so tests can assert the one-notification
/// rule.
#[derive(Default)]
pub struct RecordingAlert {
    messages: Mutex<Vec<String>>,
}

impl RecordingAlert {
    pub fn messages(&self) -> Vec<String> {
        lock(&self.messages).clone()
    }
}

impl AlertSink for RecordingAlert {
    fn error(&self, message: &str) {
        lock(&self.messages).push(message.to_owned());
    }
}

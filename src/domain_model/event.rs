use chrono::{DateTime, Utc};
use std::time::Duration;

/// Session signals carried over the in-process broadcast bus. These replace
/// the browser-style custom events (`token-refresh`, `token-schedule`,
/// `user-logout`) plus the storage and focus listeners, so delivery can be
/// asserted in tests without a global event target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// A refresh completed successfully.
    Refreshed { at: DateTime<Utc> },
    /// The proactive timer was armed; fires this far from now.
    RefreshScheduled { fire_in: Duration },
    /// A refresh cycle settled with a failure.
    RefreshFailed,
    /// Another tab (or any external writer) updated the stored token.
    TokenChanged,
    /// The window regained focus; token state may be stale.
    WindowFocused,
    /// Sign-out: listeners reset their state.
    LoggedOut,
}

/// Terminal outcomes of a dispatched call, as the caller sees them.
///
/// `Canceled` is not a failure: the call was superseded by a newer one to
/// the same endpoint and the caller must neither retry nor report it.
/// `RefreshFailed` is the uniform outcome for every request parked behind a
/// refresh cycle that did not produce a new session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("network unavailable")]
    Network,
    #[error("invalid request")]
    InvalidRequest,
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("request timed out")]
    Timeout,
    #[error("email not verified")]
    UnverifiedEmail,
    #[error("rate limited")]
    RateLimited,
    #[error("server error")]
    Server,
    #[error("canceled by a newer request")]
    Canceled,
    #[error("session refresh failed")]
    RefreshFailed,
    #[error("unexpected status {0}")]
    Unexpected(u16),
}

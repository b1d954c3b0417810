use crate::client::ApiError;
use crate::domain_model::HttpReply;
use crate::domain_port::Route;
use tracing::error;

/// What the caller, the user, and the router each get out of a failed reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub error: ApiError,
    pub message: String,
    pub route: Option<Route>,
}

fn with_default(reply: &HttpReply, fallback: &str) -> String {
    reply.message().unwrap_or(fallback).to_string()
}

/// Map a non-2xx, non-401 reply to its user-facing outcome. 401 never gets
/// here; the dispatcher owns the recovery path.
pub fn classify(reply: &HttpReply) -> Classified {
    match reply.status {
        400 => Classified {
            error: ApiError::InvalidRequest,
            message: with_default(reply, "Invalid request"),
            route: None,
        },
        403 => Classified {
            error: ApiError::Forbidden,
            message: with_default(reply, "Permission denied"),
            route: Some(Route::Home),
        },
        404 => Classified {
            error: ApiError::NotFound,
            message: with_default(reply, "Not found"),
            route: None,
        },
        408 => Classified {
            error: ApiError::Timeout,
            message: with_default(reply, "Request timed out"),
            route: None,
        },
        422 => Classified {
            error: ApiError::UnverifiedEmail,
            message: with_default(reply, "Please verify your email."),
            route: Some(Route::VerifyEmail),
        },
        429 => Classified {
            error: ApiError::RateLimited,
            message: with_default(reply, "Too many requests"),
            route: None,
        },
        500 | 502 | 503 | 504 => Classified {
            error: ApiError::Server,
            message: "Server error. Please try again later.".to_string(),
            route: Some(Route::ServerError),
        },
        status => {
            error!(status, body = ?reply.body, "unhandled api status");
            Classified {
                error: ApiError::Unexpected(status),
                message: "Something went wrong. Please try again.".to_string(),
                route: None,
            }
        }
    }
}

/// The uniform refresh-failure outcome: the session is gone, back to sign-in.
pub fn session_expired() -> Classified {
    Classified {
        error: ApiError::RefreshFailed,
        message: "Session expired. Please sign in again.".to_string(),
        route: Some(Route::SignIn),
    }
}

use std::fmt;

/// Destinations the error policy can route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    SignIn,
    Home,
    NotFound,
    VerifyEmail,
    ServerError,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::SignIn => "/sign-in",
            Route::Home => "/",
            Route::NotFound => "/not-found",
            Route::VerifyEmail => "/verify-email",
            Route::ServerError => "/server-error",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Routing seam. The host application replaces the current location;
/// nothing in this crate renders a page.
pub trait Navigator: Send + Sync {
    fn replace(&self, route: Route);
}

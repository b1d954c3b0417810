use crate::domain_model::is_cookie_safe;
use crate::domain_port::TokenStore;
use reqwest::Url;
use reqwest::cookie::{CookieStore, Jar};
use std::sync::Arc;

/// Reads credentials out of the reqwest cookie jar the transport shares.
/// The jar is the client-side twin of the browser's cookie storage: the
/// backend sets `flashAccessToken` there via `Set-Cookie` on sign-in and on
/// every refresh.
pub struct CookieJarTokenStore {
    jar: Arc<Jar>,
    origin: Url,
    access_name: String,
    csrf_name: String,
}

impl CookieJarTokenStore {
    pub fn new(jar: Arc<Jar>, origin: Url, access_name: String, csrf_name: String) -> Self {
        Self {
            jar,
            origin,
            access_name,
            csrf_name,
        }
    }

    fn cookie_value(&self, name: &str) -> Option<String> {
        let header = self.jar.cookies(&self.origin)?;
        let raw = header.to_str().ok()?;
        raw.split("; ")
            .find_map(|pair| pair.strip_prefix(name)?.strip_prefix('='))
            .filter(|value| is_cookie_safe(value))
            .map(str::to_owned)
    }
}

#[async_trait::async_trait]
impl TokenStore for CookieJarTokenStore {
    async fn access_token(&self) -> Option<String> {
        self.cookie_value(&self.access_name)
    }

    async fn csrf_token(&self) -> Option<String> {
        self.cookie_value(&self.csrf_name)
    }
}

use crate::domain_model::*;
use crate::domain_port::*;
use crate::infra_http::CookieJarTokenStore;
use crate::settings::Settings;
use reqwest::cookie::Jar;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// The real wire: reqwest with a shared cookie jar, so the http-only token
/// cookie rides along on every call exactly as it would in a browser.
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
    frontend_origin: String,
    tokens: Arc<CookieJarTokenStore>,
}

impl ReqwestTransport {
    /// Build the transport and the token store view over the same jar.
    pub fn try_new(settings: &Settings) -> anyhow::Result<(Arc<Self>, Arc<CookieJarTokenStore>)> {
        let origin: reqwest::Url = settings.http.base_url.parse()?;
        let jar = Arc::new(Jar::default());
        let client = reqwest::Client::builder()
            .cookie_provider(jar.clone())
            .build()?;

        let tokens = Arc::new(CookieJarTokenStore::new(
            jar,
            origin,
            settings.auth.cookie_name.clone(),
            settings.auth.csrf_cookie_name.clone(),
        ));

        let transport = Arc::new(Self {
            client,
            base_url: settings.http.base_url.trim_end_matches('/').to_string(),
            frontend_origin: settings.http.frontend_origin.clone(),
            tokens: tokens.clone(),
        });

        Ok((transport, tokens))
    }

    fn method_of(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

#[async_trait::async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &CallRequest) -> Result<HttpReply, TransportError> {
        let url = format!("{}{}", self.base_url, request.endpoint);
        let mut builder = self
            .client
            .request(Self::method_of(request.method), &url)
            .header("x-referrer", &self.frontend_origin);

        if request.method.is_mutating() {
            let csrf = self.tokens.csrf_token().await.unwrap_or_default();
            builder = builder.header("x-csrf-token", csrf);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response.json::<Value>().await.ok();
        debug!(%url, status, "api reply");

        Ok(HttpReply { status, body })
    }
}

/// Read-only view of the credential cookies. The access token itself is
/// http-only on the wire; this port models wherever the client can observe
/// it (a cookie jar, an in-memory slot in tests).
#[async_trait::async_trait]
pub trait TokenStore: Send + Sync {
    /// Current raw access token, if one is stored.
    async fn access_token(&self) -> Option<String>;

    /// Current csrf token, if one is stored.
    async fn csrf_token(&self) -> Option<String>;
}

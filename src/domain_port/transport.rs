use crate::domain_model::*;

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// No response was received at all (connectivity, DNS, aborted socket).
    #[error("network unreachable: {0}")]
    Network(String),
}

/// The wire. Implementations attach credentials (cookies) and the standard
/// headers; they return a reply for any HTTP status and an error only when
/// no response arrived.
#[async_trait::async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &CallRequest) -> Result<HttpReply, TransportError>;
}

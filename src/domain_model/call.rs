use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// State-changing methods carry the csrf header.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Method::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logical API call. The endpoint doubles as the supersession key:
/// issuing a new call for an endpoint cancels the previous one.
#[derive(Debug, Clone)]
pub struct CallRequest {
    pub endpoint: String,
    pub method: Method,
    pub body: Option<Value>,
}

impl CallRequest {
    pub fn new(endpoint: &str, method: Method, body: Option<Value>) -> Self {
        Self {
            endpoint: endpoint.to_owned(),
            method,
            body,
        }
    }

    /// GET without a body, POST with one.
    pub fn of(endpoint: &str, body: Option<Value>) -> Self {
        let method = if body.is_some() {
            Method::Post
        } else {
            Method::Get
        };
        Self::new(endpoint, method, body)
    }

    pub fn get(endpoint: &str) -> Self {
        Self::new(endpoint, Method::Get, None)
    }

    pub fn post(endpoint: &str, body: Option<Value>) -> Self {
        Self::new(endpoint, Method::Post, body)
    }
}

/// What came back over the wire: a status line and whatever body parsed.
/// Transport-level failures (no response at all) are a `TransportError`,
/// not a reply.
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: Option<Value>,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Server-supplied human message from the standard envelope, if any.
    pub fn message(&self) -> Option<&str> {
        self.body.as_ref()?.get("message")?.as_str()
    }
}

/// The backend's uniform response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T = Value> {
    pub status: String,
    pub message: String,
    #[serde(default)]
    pub data: T,
}

impl ApiResponse<Value> {
    pub fn from_reply(reply: &HttpReply) -> Self {
        match reply
            .body
            .clone()
            .and_then(|b| serde_json::from_value(b).ok())
        {
            Some(parsed) => parsed,
            None => ApiResponse {
                status: "success".to_string(),
                message: String::new(),
                data: Value::Null,
            },
        }
    }
}

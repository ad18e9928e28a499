//! HTTP transport for report submission
//!
//! The reporter only needs "POST this JSON document there"; the [`Transport`]
//! trait is that seam. [`HttpTransport`] is the reqwest implementation used in
//! production.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Longest slice of an error response body kept in failure messages.
const MAX_ERROR_BODY: usize = 200;

/// Raw failure of a POST, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFailure {
    /// HTTP status, `None` when no response was received.
    pub status: Option<u16>,
    pub message: String,
}

impl TransportFailure {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }
}

/// Authenticated POST of a JSON document.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, url: &str, body: &Value) -> Result<(), TransportFailure>;
}

/// Credentials attached to every request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Credentials {
    #[default]
    Anonymous,
    Token(String),
    Basic {
        username: String,
        password: Option<String>,
    },
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    credentials: Credentials,
    verify_tls: bool,
}

impl HttpTransport {
    /// Build a client. With `verify_tls` off, invalid or self-signed server
    /// certificates are accepted.
    pub fn new(credentials: Credentials, verify_tls: bool, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(!verify_tls)
            .timeout(timeout)
            .user_agent(concat!("compliance-report/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            credentials,
            verify_tls,
        })
    }

    pub fn verifies_tls(&self) -> bool {
        self.verify_tls
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, url: &str, body: &Value) -> Result<(), TransportFailure> {
        let request = self.client.post(url).json(body);
        let request = match &self.credentials {
            Credentials::Anonymous => request,
            Credentials::Token(token) => request.bearer_auth(token),
            Credentials::Basic { username, password } => request.basic_auth(username, password.as_ref()),
        };

        let response = request.send().await.map_err(|e| TransportFailure {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        })?;

        let status = response.status();
        debug!("POST {} -> {}", url, status);

        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let body: String = body.trim().chars().take(MAX_ERROR_BODY).collect();
        let message = if body.is_empty() {
            status.to_string()
        } else {
            format!("{status}: {body}")
        };

        Err(TransportFailure::status(status.as_u16(), message))
    }
}

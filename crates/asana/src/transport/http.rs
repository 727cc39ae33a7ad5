//! `reqwest` implementation of [`HttpTransport`].

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use serde_json::Value;
use tracing::debug;

use super::HttpTransport;
use crate::error::TransportError;
use crate::request::RequestOptions;

/// Plain HTTP transport backed by a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new() -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("cto-asana/1.0"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self { client })
    }

    /// Wrap an existing client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub(crate) fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Send `options` once and decode the response.
    pub(crate) async fn send(&self, options: &RequestOptions) -> Result<Value, TransportError> {
        let url = options.url()?;

        let mut request = self.client.request(options.method.clone(), url);
        for (name, value) in &options.headers {
            request = request.header(name, value);
        }
        if options.json {
            request = request.header(ACCEPT, "application/json");
        }

        debug!(method = %options.method, uri = %options.uri, "Sending Asana request");

        let response = request.json(&options.body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        let body = decode_body(&text, options.json);

        if !status.is_success() {
            debug!(status = %status, "Asana request failed");
            return Err(TransportError::status(status.as_u16(), body));
        }

        Ok(body.unwrap_or(Value::Null))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn request(&self, options: RequestOptions) -> Result<Value, TransportError> {
        self.send(&options).await
    }
}

/// Decode a response body. Empty bodies are `None`; text that is not JSON is
/// kept as a string.
pub(crate) fn decode_body(text: &str, json: bool) -> Option<Value> {
    if text.is_empty() {
        return None;
    }
    if json {
        if let Ok(value) = serde_json::from_str(text) {
            return Some(value);
        }
    }
    Some(Value::String(text.to_string()))
}

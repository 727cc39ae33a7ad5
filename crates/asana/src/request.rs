//! Request descriptor handed to the transports.

use std::collections::BTreeMap;

use reqwest::{Method, Url};
use serde_json::{json, Map, Value};

use crate::error::TransportError;

/// One outbound request, built fresh for every call.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    pub method: Method,
    /// Base URL joined with the endpoint path, without query string.
    pub uri: String,
    pub headers: BTreeMap<String, String>,
    /// Payload as sent, already wrapped under `data`.
    pub body: Value,
    /// Query-string parameters.
    pub qs: Option<Map<String, Value>>,
    /// Decode the response as JSON.
    pub json: bool,
}

impl RequestOptions {
    /// Build a descriptor for `endpoint` below `base_url`.
    ///
    /// `body` is wrapped as `{"data": body}`, which is how Asana expects
    /// every payload.
    #[must_use]
    pub fn new(
        method: Method,
        base_url: &str,
        endpoint: &str,
        body: Value,
        query: Option<Map<String, Value>>,
    ) -> Self {
        let uri = format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        );

        Self {
            method,
            uri,
            headers: BTreeMap::new(),
            body: json!({ "data": body }),
            qs: query,
            json: true,
        }
    }

    /// Set a header, replacing an existing value.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }

    /// Full URL including the query string.
    ///
    /// # Errors
    ///
    /// Returns an error if `uri` is not a valid absolute URL.
    pub fn url(&self) -> Result<Url, TransportError> {
        let mut url = Url::parse(&self.uri)
            .map_err(|e| TransportError::new(format!("Invalid URI \"{}\": {e}", self.uri)))?;

        let pairs: Vec<(&String, String)> = self
            .qs
            .iter()
            .flatten()
            .filter_map(|(key, value)| query_value(value).map(|value| (key, value)))
            .collect();

        if !pairs.is_empty() {
            let mut serializer = url.query_pairs_mut();
            for (key, value) in pairs {
                serializer.append_pair(key, &value);
            }
        }

        Ok(url)
    }
}

/// Render a query value. Strings are emitted raw, `null` is dropped.
fn query_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

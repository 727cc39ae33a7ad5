//! Credential records and lookup.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::auth::{API_CREDENTIALS, OAUTH2_CREDENTIALS};
use crate::config::Config;

/// An opaque credential record as stored by the host.
///
/// Keys follow the host's camelCase naming (`accessToken`, `clientId`,
/// `oauthTokenData`, ...).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CredentialData(Map<String, Value>);

impl CredentialData {
    /// Create an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field, builder style.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Get a raw field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Get a string field, ignoring empty strings.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Decode the whole record into a typed structure.
    ///
    /// # Errors
    ///
    /// Returns an error if the record does not match `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(Value::Object(self.0.clone()))
    }
}

impl From<Map<String, Value>> for CredentialData {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Host capability: credential lookup by credential-set name.
pub trait CredentialStore: Send + Sync {
    /// Look up a credential record. `None` when nothing is stored under `name`.
    fn get_credentials(&self, name: &str) -> Option<CredentialData>;
}

/// In-memory credential store.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialStore {
    records: HashMap<String, CredentialData>,
}

impl StaticCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record under `name`, replacing any previous one.
    #[must_use]
    pub fn with_credentials(mut self, name: impl Into<String>, data: CredentialData) -> Self {
        self.records.insert(name.into(), data);
        self
    }

    /// Build the `asanaApi` / `asanaOAuth2Api` records from configuration.
    ///
    /// A record is only stored when its token is configured, so an unset
    /// `ASANA_ACCESS_TOKEN` surfaces as missing credentials.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let mut store = Self::new();

        if let Some(token) = &config.access_token {
            store = store.with_credentials(
                API_CREDENTIALS,
                CredentialData::new().with("accessToken", token.clone()),
            );
        }

        if let Some(oauth) = &config.oauth2 {
            let mut token_data = Map::new();
            token_data.insert("access_token".into(), oauth.access_token.clone().into());
            if let Some(refresh) = &oauth.refresh_token {
                token_data.insert("refresh_token".into(), refresh.clone().into());
            }

            let mut data = CredentialData::new()
                .with("accessTokenUrl", oauth.token_url.clone())
                .with("oauthTokenData", Value::Object(token_data));
            if let Some(id) = &oauth.client_id {
                data = data.with("clientId", id.clone());
            }
            if let Some(secret) = &oauth.client_secret {
                data = data.with("clientSecret", secret.clone());
            }

            store = store.with_credentials(OAUTH2_CREDENTIALS, data);
        }

        store
    }
}

impl CredentialStore for StaticCredentialStore {
    fn get_credentials(&self, name: &str) -> Option<CredentialData> {
        self.records.get(name).cloned()
    }
}

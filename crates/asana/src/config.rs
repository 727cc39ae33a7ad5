//! Configuration for the Asana adapter.

use std::env;

use crate::auth::AuthenticationMethod;

/// Asana REST API base URL.
pub const DEFAULT_API_URL: &str = "https://app.asana.com/api/1.0/";

/// Asana OAuth2 token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://app.asana.com/-/oauth_token";

/// Asana adapter configuration.
#[derive(Clone)]
pub struct Config {
    /// Authentication mode (`ASANA_AUTHENTICATION`, default `accessToken`).
    pub authentication: AuthenticationMethod,
    /// Personal access token for the `asanaApi` credential set.
    pub access_token: Option<String>,
    /// OAuth2 settings for the `asanaOAuth2Api` credential set.
    pub oauth2: Option<OAuth2Config>,
    /// API base URL, overridable for testing.
    pub api_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            authentication: env::var("ASANA_AUTHENTICATION")
                .ok()
                .filter(|s| !s.is_empty())
                .map(|s| AuthenticationMethod::from_parameter(&s))
                .unwrap_or_default(),
            access_token: env::var("ASANA_ACCESS_TOKEN")
                .ok()
                .filter(|s| !s.is_empty()),
            oauth2: OAuth2Config::from_env(),
            api_url: env::var("ASANA_API_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("authentication", &self.authentication)
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("oauth2", &self.oauth2)
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// OAuth2 client settings.
#[derive(Clone)]
pub struct OAuth2Config {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub token_url: String,
}

impl OAuth2Config {
    /// Read OAuth2 settings. `None` unless `ASANA_OAUTH_ACCESS_TOKEN` is set.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let access_token = env::var("ASANA_OAUTH_ACCESS_TOKEN")
            .ok()
            .filter(|s| !s.is_empty())?;

        Some(Self {
            access_token,
            refresh_token: env::var("ASANA_OAUTH_REFRESH_TOKEN").ok(),
            client_id: env::var("ASANA_CLIENT_ID").ok(),
            client_secret: env::var("ASANA_CLIENT_SECRET").ok(),
            token_url: env::var("ASANA_TOKEN_URL")
                .unwrap_or_else(|_| DEFAULT_TOKEN_URL.to_string()),
        })
    }
}

impl std::fmt::Debug for OAuth2Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth2Config")
            .field("client_id", &self.client_id)
            .field("token_url", &self.token_url)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish_non_exhaustive()
    }
}

//! OAuth2-signed transport with token refresh.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::http::{decode_body, ReqwestTransport};
use super::OAuth2Transport;
use crate::config::DEFAULT_TOKEN_URL;
use crate::credentials::CredentialStore;
use crate::error::{TransportError, NO_CREDENTIALS};
use crate::request::RequestOptions;

/// Tokens are refreshed this long before they expire.
const EXPIRY_LEEWAY_SECS: i64 = 60;

/// Access token material stored under `oauthTokenData`.
///
/// Stored records carry no usable expiry; only tokens refreshed by this
/// transport get an `expires_at`, so stored tokens are refreshed after a 401
/// rather than ahead of time.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthTokenData {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(skip)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl OAuthTokenData {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|at| now + Duration::seconds(EXPIRY_LEEWAY_SECS) >= at)
    }
}

/// A refreshed token together with the stored token it replaced.
///
/// The entry is only valid while the store still holds that same token.
#[derive(Debug, Clone)]
struct CachedToken {
    replaced_access_token: String,
    replaced_refresh_token: Option<String>,
    token: OAuthTokenData,
}

impl CachedToken {
    fn replaces(&self, stored: &OAuthTokenData) -> bool {
        self.replaced_access_token == stored.access_token
            && self.replaced_refresh_token == stored.refresh_token
    }
}

/// OAuth2 credential record as stored by the host.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OAuth2Credentials {
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    access_token_url: Option<String>,
    #[serde(default)]
    oauth_token_data: Option<OAuthTokenData>,
}

/// OAuth2 transport backed by `reqwest`.
///
/// Reads the credential record on every call, signs the request with the
/// current access token and refreshes it once when it is expired or rejected
/// with a 401. Refreshed tokens are cached per credential-set name until the
/// stored token changes; the store is never written to.
pub struct ReqwestOAuth2Transport {
    http: ReqwestTransport,
    credentials: Arc<dyn CredentialStore>,
    tokens: RwLock<HashMap<String, CachedToken>>,
}

impl ReqwestOAuth2Transport {
    #[must_use]
    pub fn new(http: ReqwestTransport, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            http,
            credentials,
            tokens: RwLock::new(HashMap::new()),
        }
    }

    fn load_credentials(&self, credentials_type: &str) -> Result<OAuth2Credentials, TransportError> {
        self.credentials
            .get_credentials(credentials_type)
            .ok_or_else(|| TransportError::new(NO_CREDENTIALS))?
            .deserialize()
            .map_err(|e| TransportError::new(format!("Invalid OAuth2 credentials: {e}")))
    }

    /// The cached token when it still belongs to `stored`, otherwise `stored`.
    async fn current_token(&self, credentials_type: &str, stored: &OAuthTokenData) -> OAuthTokenData {
        match self.tokens.read().await.get(credentials_type) {
            Some(cached) if cached.replaces(stored) => cached.token.clone(),
            _ => stored.clone(),
        }
    }

    async fn refresh(
        &self,
        credentials_type: &str,
        credentials: &OAuth2Credentials,
        stored: &OAuthTokenData,
        token: &OAuthTokenData,
    ) -> Result<OAuthTokenData, TransportError> {
        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            #[serde(default)]
            refresh_token: Option<String>,
            #[serde(default)]
            expires_in: Option<i64>,
        }

        let refresh_token = token
            .refresh_token
            .as_deref()
            .ok_or_else(|| TransportError::new("OAuth2 token cannot be refreshed"))?;
        let token_url = credentials
            .access_token_url
            .as_deref()
            .unwrap_or(DEFAULT_TOKEN_URL);

        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        if let Some(id) = credentials.client_id.as_deref() {
            form.push(("client_id", id));
        }
        if let Some(secret) = credentials.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }

        debug!(credentials_type, "Refreshing OAuth2 access token");

        let response = self
            .http
            .client()
            .post(token_url)
            .form(&form)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(TransportError::status(status.as_u16(), decode_body(&text, true)));
        }

        let fresh: TokenResponse = serde_json::from_str(&text)
            .map_err(|e| TransportError::new(format!("Invalid OAuth2 token response: {e}")))?;

        // An expiry that does not fit a timestamp counts as unknown.
        let expires_at = fresh
            .expires_in
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime));

        let refreshed = OAuthTokenData {
            access_token: fresh.access_token,
            refresh_token: fresh.refresh_token.or_else(|| token.refresh_token.clone()),
            expires_at,
        };

        self.tokens.write().await.insert(
            credentials_type.to_string(),
            CachedToken {
                replaced_access_token: stored.access_token.clone(),
                replaced_refresh_token: stored.refresh_token.clone(),
                token: refreshed.clone(),
            },
        );
        info!(credentials_type, "OAuth2 access token refreshed");

        Ok(refreshed)
    }

    async fn send_signed(
        &self,
        options: &RequestOptions,
        token: &OAuthTokenData,
    ) -> Result<Value, TransportError> {
        let mut signed = options.clone();
        signed.set_header("Authorization", format!("Bearer {}", token.access_token));
        self.http.send(&signed).await
    }
}

#[async_trait]
impl OAuth2Transport for ReqwestOAuth2Transport {
    async fn request_oauth2(
        &self,
        credentials_type: &str,
        options: RequestOptions,
    ) -> Result<Value, TransportError> {
        let credentials = self.load_credentials(credentials_type)?;
        let stored = credentials
            .oauth_token_data
            .clone()
            .ok_or_else(|| TransportError::new("OAuth2 credentials have no access token"))?;
        let mut token = self.current_token(credentials_type, &stored).await;
        let mut refreshed = false;

        if token.is_expired(Utc::now()) && token.refresh_token.is_some() {
            token = self
                .refresh(credentials_type, &credentials, &stored, &token)
                .await?;
            refreshed = true;
        }

        match self.send_signed(&options, &token).await {
            Err(err)
                if err.status_code == Some(401)
                    && !refreshed
                    && token.refresh_token.is_some() =>
            {
                debug!(credentials_type, "Access token rejected, retrying after refresh");
                match self
                    .refresh(credentials_type, &credentials, &stored, &token)
                    .await
                {
                    Ok(token) => self.send_signed(&options, &token).await,
                    // The service's 401 is what the caller needs to see.
                    Err(refresh_err) => {
                        debug!(credentials_type, error = %refresh_err, "OAuth2 refresh failed");
                        Err(err)
                    }
                }
            }
            result => result,
        }
    }
}

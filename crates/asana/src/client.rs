//! Asana API request adapter.

use std::sync::Arc;

use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::auth::{AuthenticationMethod, API_CREDENTIALS, OAUTH2_CREDENTIALS};
use crate::config::{Config, DEFAULT_API_URL};
use crate::credentials::{CredentialStore, StaticCredentialStore};
use crate::error::{AsanaError, NO_CREDENTIALS};
use crate::request::RequestOptions;
use crate::transport::{HttpTransport, OAuth2Transport, ReqwestOAuth2Transport, ReqwestTransport};

/// Page size used when following pagination without an explicit `limit`.
const DEFAULT_PAGE_LIMIT: u64 = 100;

/// Asana REST API client.
///
/// Every call builds one request descriptor and hands it to exactly one
/// transport, chosen by the configured [`AuthenticationMethod`]. The client
/// holds no per-call state and is cheap to clone.
#[derive(Clone)]
pub struct AsanaClient {
    authentication: AuthenticationMethod,
    api_url: String,
    credentials: Arc<dyn CredentialStore>,
    http: Arc<dyn HttpTransport>,
    oauth2: Arc<dyn OAuth2Transport>,
}

impl std::fmt::Debug for AsanaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsanaClient")
            .field("authentication", &self.authentication)
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl AsanaClient {
    /// Create a client from injected host capabilities.
    #[must_use]
    pub fn new(
        authentication: AuthenticationMethod,
        credentials: Arc<dyn CredentialStore>,
        http: Arc<dyn HttpTransport>,
        oauth2: Arc<dyn OAuth2Transport>,
    ) -> Self {
        Self {
            authentication,
            api_url: DEFAULT_API_URL.to_string(),
            credentials,
            http,
            oauth2,
        }
    }

    /// Create a client with `reqwest` transports and credentials taken from
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn from_config(config: &Config) -> Result<Self, AsanaError> {
        let credentials: Arc<dyn CredentialStore> =
            Arc::new(StaticCredentialStore::from_config(config));
        let http = ReqwestTransport::new()?;
        let oauth2 = ReqwestOAuth2Transport::new(http.clone(), Arc::clone(&credentials));

        Ok(Self::new(
            config.authentication,
            credentials,
            Arc::new(http),
            Arc::new(oauth2),
        )
        .with_api_url(&config.api_url))
    }

    /// Override the API base URL.
    #[must_use]
    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.to_string();
        self
    }

    /// Authentication mode used for every request.
    #[must_use]
    pub fn authentication(&self) -> AuthenticationMethod {
        self.authentication
    }

    /// Make one request to the Asana API.
    ///
    /// `body` is sent as `{"data": body}`. The response is returned exactly
    /// as the transport decoded it.
    ///
    /// # Errors
    ///
    /// - [`AsanaError::Authentication`] when no token credentials are stored
    ///   or the service answers 401.
    /// - [`AsanaError::Api`] when the service returns structured error entries.
    /// - [`AsanaError::InvalidRequest`] when the URL or a header is malformed;
    ///   nothing is sent.
    /// - [`AsanaError::Transport`] for any other failure.
    #[instrument(skip(self, body, query), fields(authentication = %self.authentication))]
    pub async fn api_request(
        &self,
        method: Method,
        endpoint: &str,
        body: Value,
        query: Option<Map<String, Value>>,
    ) -> Result<Value, AsanaError> {
        let mut options = RequestOptions::new(method, &self.api_url, endpoint, body, query);

        if self.authentication == AuthenticationMethod::AccessToken {
            let access_token = self
                .credentials
                .get_credentials(API_CREDENTIALS)
                .and_then(|data| data.get_str("accessToken").map(str::to_string))
                .ok_or_else(|| AsanaError::Authentication(NO_CREDENTIALS.to_string()))?;

            options.set_header("Authorization", format!("Bearer {access_token}"));
        }

        validate(&options)?;

        let result = match self.authentication {
            AuthenticationMethod::AccessToken => {
                debug!("Sending request with access token");
                self.http.request(options).await
            }
            AuthenticationMethod::OAuth2 => {
                debug!("Sending request through OAuth2 transport");
                self.oauth2.request_oauth2(OAUTH2_CREDENTIALS, options).await
            }
        };

        result.map_err(AsanaError::from_transport)
    }

    /// Make one request and decode the response into `T`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::api_request`], plus [`AsanaError::Decode`] when the
    /// response does not match `T`.
    pub async fn api_request_as<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Value,
        query: Option<Map<String, Value>>,
    ) -> Result<T, AsanaError> {
        let response = self.api_request(method, endpoint, body, query).await?;
        Ok(serde_json::from_value(response)?)
    }

    /// Fetch every page of a collection endpoint.
    ///
    /// Follows `next_page.offset` until Asana reports no further page, or
    /// hands back the offset it was just given, and concatenates each page's
    /// `data` array.
    ///
    /// # Errors
    ///
    /// Fails on the first page that fails; see [`Self::api_request`].
    pub async fn api_request_all_items(
        &self,
        method: Method,
        endpoint: &str,
        body: Value,
        query: Option<Map<String, Value>>,
    ) -> Result<Vec<Value>, AsanaError> {
        let mut query = query.unwrap_or_default();
        query
            .entry("limit")
            .or_insert_with(|| Value::from(DEFAULT_PAGE_LIMIT));

        let mut items = Vec::new();
        loop {
            let response = self
                .api_request(method.clone(), endpoint, body.clone(), Some(query.clone()))
                .await?;

            match response.get("data") {
                Some(Value::Array(page)) => items.extend(page.iter().cloned()),
                Some(Value::Null) | None => {}
                Some(other) => items.push(other.clone()),
            }

            let Some(offset) = response
                .get("next_page")
                .and_then(|page| page.get("offset"))
                .and_then(Value::as_str)
            else {
                break;
            };

            if query.get("offset").and_then(Value::as_str) == Some(offset) {
                debug!(endpoint, offset, "Offset repeated, stopping pagination");
                break;
            }

            debug!(endpoint, offset, fetched = items.len(), "Fetching next page");
            query.insert("offset".to_string(), Value::from(offset));
        }

        Ok(items)
    }
}

/// Reject descriptors no transport could send.
fn validate(options: &RequestOptions) -> Result<(), AsanaError> {
    options
        .url()
        .map_err(|e| AsanaError::InvalidRequest(e.message))?;

    for (name, value) in &options.headers {
        HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| AsanaError::InvalidRequest(format!("Invalid header name \"{name}\"")))?;
        // Header values may hold tokens; name the header only.
        HeaderValue::from_str(value)
            .map_err(|_| AsanaError::InvalidRequest(format!("Invalid value for header \"{name}\"")))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CredentialData;
    use crate::error::TransportError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records every descriptor it receives and replays canned results.
    #[derive(Default)]
    struct FakeTransport {
        calls: Mutex<Vec<(Option<String>, RequestOptions)>>,
        responses: Mutex<Vec<Result<Value, TransportError>>>,
    }

    impl FakeTransport {
        fn replying(responses: Vec<Result<Value, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                responses: Mutex::new(responses),
            })
        }

        fn record(
            &self,
            credentials_type: Option<&str>,
            options: RequestOptions,
        ) -> Result<Value, TransportError> {
            self.calls
                .lock()
                .unwrap()
                .push((credentials_type.map(str::to_string), options));
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(json!({"data": {}}))
            } else {
                responses.remove(0)
            }
        }

        fn calls(&self) -> Vec<(Option<String>, RequestOptions)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpTransport for FakeTransport {
        async fn request(&self, options: RequestOptions) -> Result<Value, TransportError> {
            self.record(None, options)
        }
    }

    #[async_trait]
    impl OAuth2Transport for FakeTransport {
        async fn request_oauth2(
            &self,
            credentials_type: &str,
            options: RequestOptions,
        ) -> Result<Value, TransportError> {
            self.record(Some(credentials_type), options)
        }
    }

    fn token_store(token: &str) -> Arc<StaticCredentialStore> {
        Arc::new(StaticCredentialStore::new().with_credentials(
            API_CREDENTIALS,
            CredentialData::new().with("accessToken", token),
        ))
    }

    fn client(
        authentication: AuthenticationMethod,
        store: Arc<StaticCredentialStore>,
        http: Arc<FakeTransport>,
        oauth2: Arc<FakeTransport>,
    ) -> AsanaClient {
        AsanaClient::new(authentication, store, http, oauth2)
    }

    fn query(value: Value) -> Option<Map<String, Value>> {
        value.as_object().cloned()
    }

    #[tokio::test]
    async fn test_missing_credentials_skips_http() {
        let http = FakeTransport::replying(vec![]);
        let oauth2 = FakeTransport::replying(vec![]);
        let client = client(
            AuthenticationMethod::AccessToken,
            Arc::new(StaticCredentialStore::new()),
            http.clone(),
            oauth2.clone(),
        );

        let err = client
            .api_request(Method::GET, "users/me", json!({}), None)
            .await
            .unwrap_err();

        assert!(matches!(err, AsanaError::Authentication(_)));
        assert_eq!(err.to_string(), "No credentials got returned!");
        assert!(http.calls().is_empty());
        assert!(oauth2.calls().is_empty());
    }

    #[tokio::test]
    async fn test_access_token_sets_bearer_header() {
        let http = FakeTransport::replying(vec![Ok(json!({"data": {"gid": "1"}}))]);
        let oauth2 = FakeTransport::replying(vec![]);
        let client = client(
            AuthenticationMethod::AccessToken,
            token_store("0/abc123"),
            http.clone(),
            oauth2.clone(),
        );

        let result = client
            .api_request(
                Method::POST,
                "tasks",
                json!({"name": "Task"}),
                query(json!({"limit": 5})),
            )
            .await
            .unwrap();

        assert_eq!(result, json!({"data": {"gid": "1"}}));
        assert!(oauth2.calls().is_empty());

        let calls = http.calls();
        assert_eq!(calls.len(), 1);
        let (credentials_type, options) = &calls[0];
        assert_eq!(credentials_type, &None);
        assert_eq!(options.method, Method::POST);
        assert_eq!(options.uri, "https://app.asana.com/api/1.0/tasks");
        assert_eq!(
            options.headers.get("Authorization").map(String::as_str),
            Some("Bearer 0/abc123")
        );
        assert_eq!(options.body, json!({"data": {"name": "Task"}}));
        assert_eq!(options.url().unwrap().query(), Some("limit=5"));
    }

    #[tokio::test]
    async fn test_oauth2_delegates_descriptor_verbatim() {
        let http = FakeTransport::replying(vec![]);
        let oauth2 = FakeTransport::replying(vec![Ok(json!({"data": [1, 2, 3]}))]);
        let client = client(
            AuthenticationMethod::OAuth2,
            token_store("unused"),
            http.clone(),
            oauth2.clone(),
        );

        let result = client
            .api_request(Method::PUT, "tasks/9", json!({"completed": true}), None)
            .await
            .unwrap();

        assert_eq!(result, json!({"data": [1, 2, 3]}));
        assert!(http.calls().is_empty());

        let calls = oauth2.calls();
        assert_eq!(calls.len(), 1);
        let (credentials_type, options) = &calls[0];
        assert_eq!(credentials_type.as_deref(), Some("asanaOAuth2Api"));
        assert_eq!(
            options,
            &RequestOptions::new(
                Method::PUT,
                DEFAULT_API_URL,
                "tasks/9",
                json!({"completed": true}),
                None
            )
        );
        assert!(options.headers.is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_is_reported_as_invalid_credentials() {
        for authentication in [AuthenticationMethod::AccessToken, AuthenticationMethod::OAuth2] {
            let failure = TransportError::status(401, Some(json!({"errors": [{"message": "x"}]})));
            let transport = FakeTransport::replying(vec![Err(failure)]);
            let client = client(
                authentication,
                token_store("bad"),
                transport.clone(),
                transport.clone(),
            );

            let err = client
                .api_request(Method::GET, "users/me", json!({}), None)
                .await
                .unwrap_err();

            assert_eq!(err.to_string(), "The Asana credentials are not valid!");
        }
    }

    #[tokio::test]
    async fn test_structured_errors_are_aggregated() {
        let failure = TransportError::status(
            422,
            Some(json!({
                "errors": [
                    {"message": "Name is required"},
                    {"message": "Invalid workspace"}
                ]
            })),
        );
        let http = FakeTransport::replying(vec![Err(failure)]);
        let client = client(
            AuthenticationMethod::AccessToken,
            token_store("tok"),
            http,
            FakeTransport::replying(vec![]),
        );

        let err = client
            .api_request(Method::POST, "tasks", json!({}), None)
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Asana error response [422]: Name is required | Invalid workspace"
        );
    }

    #[tokio::test]
    async fn test_other_failures_are_returned_unchanged() {
        let failure = TransportError::status(503, Some(json!("Service Unavailable")));
        let oauth2 = FakeTransport::replying(vec![Err(failure)]);
        let client = client(
            AuthenticationMethod::OAuth2,
            token_store("tok"),
            FakeTransport::replying(vec![]),
            oauth2,
        );

        let err = client
            .api_request(Method::GET, "workspaces", json!({}), None)
            .await
            .unwrap_err();

        match err {
            AsanaError::Transport(inner) => {
                assert_eq!(inner.status_code, Some(503));
                assert_eq!(inner.body, Some(json!("Service Unavailable")));
                assert_eq!(inner.message, "503 - Service Unavailable");
            }
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_api_request_as_decodes() {
        #[derive(Debug, serde::Deserialize)]
        struct User {
            data: UserData,
        }
        #[derive(Debug, serde::Deserialize)]
        struct UserData {
            gid: String,
            name: String,
        }

        let http = FakeTransport::replying(vec![
            Ok(json!({"data": {"gid": "7", "name": "Ada"}})),
            Ok(json!({"data": []})),
        ]);
        let client = client(
            AuthenticationMethod::AccessToken,
            token_store("tok"),
            http,
            FakeTransport::replying(vec![]),
        );

        let user: User = client
            .api_request_as(Method::GET, "users/me", json!({}), None)
            .await
            .unwrap();
        assert_eq!(user.data.gid, "7");
        assert_eq!(user.data.name, "Ada");

        let err = client
            .api_request_as::<User>(Method::GET, "users/me", json!({}), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AsanaError::Decode(_)));
    }

    #[tokio::test]
    async fn test_all_items_follows_offsets() {
        let http = FakeTransport::replying(vec![
            Ok(json!({
                "data": [{"gid": "1"}, {"gid": "2"}],
                "next_page": {"offset": "abc", "path": "/tasks?offset=abc"}
            })),
            Ok(json!({"data": [{"gid": "3"}], "next_page": null})),
        ]);
        let client = client(
            AuthenticationMethod::AccessToken,
            token_store("tok"),
            http.clone(),
            FakeTransport::replying(vec![]),
        );

        let items = client
            .api_request_all_items(
                Method::GET,
                "tasks",
                json!({}),
                query(json!({"project": "p1"})),
            )
            .await
            .unwrap();

        assert_eq!(items, vec![json!({"gid": "1"}), json!({"gid": "2"}), json!({"gid": "3"})]);

        let calls = http.calls();
        assert_eq!(calls.len(), 2);
        let first = calls[0].1.qs.clone().unwrap();
        assert_eq!(first.get("limit"), Some(&json!(100)));
        assert_eq!(first.get("project"), Some(&json!("p1")));
        assert!(first.get("offset").is_none());
        let second = calls[1].1.qs.clone().unwrap();
        assert_eq!(second.get("offset"), Some(&json!("abc")));
    }

    #[tokio::test]
    async fn test_all_items_stops_on_first_failure() {
        let http = FakeTransport::replying(vec![
            Ok(json!({"data": [{"gid": "1"}], "next_page": {"offset": "n"}})),
            Err(TransportError::status(
                400,
                Some(json!({"errors": [{"message": "offset expired"}]})),
            )),
        ]);
        let client = client(
            AuthenticationMethod::AccessToken,
            token_store("tok"),
            http,
            FakeTransport::replying(vec![]),
        );

        let err = client
            .api_request_all_items(Method::GET, "tasks", json!({}), None)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Asana error response [400]: offset expired");
    }

    #[tokio::test]
    async fn test_all_items_stops_on_repeated_offset() {
        let http = FakeTransport::replying(vec![
            Ok(json!({"data": [{"gid": "1"}], "next_page": {"offset": "same"}})),
            Ok(json!({"data": [{"gid": "2"}], "next_page": {"offset": "same"}})),
            Ok(json!({"data": [{"gid": "3"}], "next_page": {"offset": "same"}})),
        ]);
        let client = client(
            AuthenticationMethod::AccessToken,
            token_store("tok"),
            http.clone(),
            FakeTransport::replying(vec![]),
        );

        let items = client
            .api_request_all_items(Method::GET, "tasks", json!({}), None)
            .await
            .unwrap();

        assert_eq!(items, vec![json!({"gid": "1"}), json!({"gid": "2"})]);
        assert_eq!(http.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_base_url_is_rejected_before_sending() {
        let http = FakeTransport::replying(vec![]);
        let oauth2 = FakeTransport::replying(vec![]);
        let client = client(
            AuthenticationMethod::OAuth2,
            token_store("tok"),
            http.clone(),
            oauth2.clone(),
        )
        .with_api_url("not a url");

        let err = client
            .api_request(Method::GET, "users/me", json!({}), None)
            .await
            .unwrap_err();

        assert!(matches!(err, AsanaError::InvalidRequest(_)));
        assert!(err.to_string().contains("Invalid URI"));
        assert!(http.calls().is_empty());
        assert!(oauth2.calls().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_token_header_is_rejected_before_sending() {
        let http = FakeTransport::replying(vec![]);
        let client = client(
            AuthenticationMethod::AccessToken,
            token_store("tok\nInjected: yes"),
            http.clone(),
            FakeTransport::replying(vec![]),
        );

        let err = client
            .api_request(Method::GET, "users/me", json!({}), None)
            .await
            .unwrap_err();

        assert!(matches!(err, AsanaError::InvalidRequest(_)));
        assert_eq!(
            err.to_string(),
            "Invalid request: Invalid value for header \"Authorization\""
        );
        assert!(http.calls().is_empty());
    }
}

//! Transports that execute request descriptors.

pub mod http;
pub mod oauth2;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportError;
use crate::request::RequestOptions;

pub use http::ReqwestTransport;
pub use oauth2::{OAuthTokenData, ReqwestOAuth2Transport};

/// Host capability: plain HTTP execution.
///
/// Sends the descriptor as-is and returns the decoded response body.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn request(&self, options: RequestOptions) -> Result<Value, TransportError>;
}

/// Host capability: OAuth2-signed HTTP execution.
///
/// Implementations attach (and refresh) the access token stored under
/// `credentials_type` before sending.
#[async_trait]
pub trait OAuth2Transport: Send + Sync {
    async fn request_oauth2(
        &self,
        credentials_type: &str,
        options: RequestOptions,
    ) -> Result<Value, TransportError>;
}

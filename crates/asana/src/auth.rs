//! Authentication mode selection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Credential-set name for personal access token credentials.
pub const API_CREDENTIALS: &str = "asanaApi";

/// Credential-set name for OAuth2 credentials.
pub const OAUTH2_CREDENTIALS: &str = "asanaOAuth2Api";

/// How requests to Asana are authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum AuthenticationMethod {
    /// Static personal access token sent as a bearer header.
    #[default]
    #[serde(rename = "accessToken")]
    AccessToken,
    /// Delegated OAuth2 authorization handled by the OAuth2 transport.
    #[serde(rename = "oAuth2")]
    OAuth2,
}

impl AuthenticationMethod {
    /// Resolve a node parameter value.
    ///
    /// Only `accessToken` selects the static token path; every other value
    /// falls through to OAuth2.
    #[must_use]
    pub fn from_parameter(value: &str) -> Self {
        if value == "accessToken" {
            Self::AccessToken
        } else {
            Self::OAuth2
        }
    }

    /// Parameter value for this mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AccessToken => "accessToken",
            Self::OAuth2 => "oAuth2",
        }
    }

    /// Name of the credential set this mode reads.
    #[must_use]
    pub const fn credentials_name(self) -> &'static str {
        match self {
            Self::AccessToken => API_CREDENTIALS,
            Self::OAuth2 => OAUTH2_CREDENTIALS,
        }
    }
}

impl fmt::Display for AuthenticationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for AuthenticationMethod {
    fn from(value: String) -> Self {
        Self::from_parameter(&value)
    }
}

impl FromStr for AuthenticationMethod {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_parameter(s))
    }
}

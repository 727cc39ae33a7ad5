//! Asana REST API request adapter for CTO platform workflow nodes.
//!
//! This crate provides:
//! - [`AsanaClient`], which turns a method, endpoint, body and query into one
//!   request against `https://app.asana.com/api/1.0/`
//! - Authentication by personal access token or delegated OAuth2
//! - Normalization of Asana error responses into readable messages
//! - `reqwest` transports and an in-memory credential store for standalone use
//!
//! # Example
//!
//! ```no_run
//! use asana::{AsanaClient, Config};
//! use reqwest::Method;
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), asana::AsanaError> {
//! let client = AsanaClient::from_config(&Config::default())?;
//! let me = client.api_request(Method::GET, "users/me", json!({}), None).await?;
//! println!("{me}");
//! # Ok(())
//! # }
//! ```
//!
//! # Host capabilities
//!
//! Credential lookup and both transports are traits ([`CredentialStore`],
//! [`HttpTransport`], [`OAuth2Transport`]) so a workflow host can inject its
//! own implementations.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod request;
pub mod transport;

pub use auth::{AuthenticationMethod, API_CREDENTIALS, OAUTH2_CREDENTIALS};
pub use client::AsanaClient;
pub use config::Config;
pub use credentials::{CredentialData, CredentialStore, StaticCredentialStore};
pub use error::{AsanaError, TransportError};
pub use request::RequestOptions;
pub use transport::{HttpTransport, OAuth2Transport, ReqwestOAuth2Transport, ReqwestTransport};

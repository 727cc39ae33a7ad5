//! CLI for one-off Asana API requests.
//!
//! Run `asana --help` for usage information.

// CLI binaries legitimately need println! for user output
#![allow(clippy::disallowed_macros)]

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use reqwest::Method;
use serde_json::{Map, Value};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use asana::{AsanaClient, AuthenticationMethod, Config};

#[derive(Parser)]
#[command(name = "asana")]
#[command(about = "Send a request to the Asana REST API")]
#[command(version)]
struct Cli {
    /// HTTP method (GET, POST, PUT, DELETE, ...)
    method: String,

    /// Endpoint below the API base URL, e.g. `users/me`
    endpoint: String,

    /// JSON body, sent wrapped as {"data": ...}
    #[arg(short, long, default_value = "{}")]
    data: String,

    /// Query parameter as key=value (repeatable)
    #[arg(short, long = "query", value_name = "KEY=VALUE")]
    query: Vec<String>,

    /// Follow pagination and print every item
    #[arg(short, long)]
    all: bool,

    /// Authentication mode: accessToken or oAuth2
    #[arg(long, env = "ASANA_AUTHENTICATION")]
    auth: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Parse `key=value` pairs. Values that read as JSON scalars keep their type.
fn parse_query(pairs: &[String]) -> Result<Option<Map<String, Value>>> {
    if pairs.is_empty() {
        return Ok(None);
    }

    let mut query = Map::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid query parameter '{pair}', expected key=value"))?;
        let value = serde_json::from_str::<Value>(value)
            .ok()
            .filter(|v| !v.is_object() && !v.is_array())
            .unwrap_or_else(|| Value::String(value.to_string()));
        query.insert(key.to_string(), value);
    }
    Ok(Some(query))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("asana=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("asana=info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mut config = Config::default();
    if let Some(auth) = &cli.auth {
        config.authentication = AuthenticationMethod::from_parameter(auth);
    }

    let method = Method::from_bytes(cli.method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("Invalid HTTP method '{}'", cli.method))?;
    let body: Value = serde_json::from_str(&cli.data).context("--data is not valid JSON")?;
    let query = parse_query(&cli.query)?;

    let client = AsanaClient::from_config(&config)?;
    info!(
        authentication = %client.authentication(),
        method = %method,
        endpoint = %cli.endpoint,
        "Sending Asana request"
    );

    let output = if cli.all {
        let items = client
            .api_request_all_items(method, &cli.endpoint, body, query)
            .await?;
        Value::Array(items)
    } else {
        client.api_request(method, &cli.endpoint, body, query).await?
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

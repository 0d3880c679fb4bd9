// # HTTP Registry Fetcher
//
// This crate provides the HTTP-based RegistryFetcher for the sinkhole
// synchronizer.
//
// ## Behavior
//
// Each call to `fetch()` performs exactly one GET of the registry endpoint
// and parses the XML body. There is no caching and no retry here: the
// orchestrator owns retry and calls again when it wants another attempt.
//
// ## Errors
//
// - Connection, TLS and timeout failures → `FetchError::Transport`
// - Non-2xx response → `FetchError::Status`
// - Body could not be read → `FetchError::ReadFailure`
// - Body is not a registry document → `FetchError::ParseFailure`
// - Registry has no usable entries → `FetchError::EmptyResult`

mod parse;

pub use parse::parse_registry;

use async_trait::async_trait;
use sinkhole_core::config::RegistryConfig;
use sinkhole_core::{Error, FetchError, RegistryFetcher, RegistryList, RegistrySchema, Result};
use std::time::Duration;
use tracing::debug;

/// User agent sent with every registry request
const USER_AGENT: &str = concat!("sinkhole/", env!("CARGO_PKG_VERSION"));

/// Registry fetcher that downloads the registry document over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpRegistryFetcher {
    /// URL of the registry document
    endpoint: String,

    /// Element names of the document
    schema: RegistrySchema,

    /// HTTP client (carries the request timeout)
    client: reqwest::Client,
}

impl HttpRegistryFetcher {
    /// Create a fetcher for `endpoint` with the default schema
    ///
    /// `timeout` bounds a whole request, body included.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into(),
            schema: RegistrySchema::default(),
            client,
        })
    }

    /// Create a fetcher from configuration
    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config.endpoint.clone(), config.timeout())?.with_schema(config.schema.clone()))
    }

    /// Use different element names
    pub fn with_schema(mut self, schema: RegistrySchema) -> Self {
        self.schema = schema;
        self
    }
}

#[async_trait]
impl RegistryFetcher for HttpRegistryFetcher {
    async fn fetch(&self) -> std::result::Result<RegistryList, FetchError> {
        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| FetchError::Transport(error_chain(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::ReadFailure(error_chain(&e)))?;
        debug!("Downloaded {} bytes from {}", body.len(), self.endpoint);

        let content = body.strip_prefix(UTF8_BOM).unwrap_or(&body[..]);
        let xml = std::str::from_utf8(content)
            .map_err(|e| FetchError::ParseFailure(format!("registry is not valid UTF-8: {}", e)))?;

        parse_registry(xml, &self.schema)
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Render an error with its causes, `outer: inner: root`
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

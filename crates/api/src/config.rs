//! Server configuration, read from the environment.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::{Context, Result};

use echoapi_core::{OpenApiDocument, SpecResult};
use echoapi_observability::LogFormat;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Paths that never go through OpenAPI validation.
pub const DEFAULT_SKIP_PATHS: &[&str] = &["/health"];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Run the OpenAPI request validator in front of the handlers.
    pub validate_requests: bool,
    /// Load the document from this file instead of the embedded one.
    pub openapi_path: Option<PathBuf>,
    pub max_body_bytes: usize,
    /// Paths the validator lets through untouched.
    pub skip_paths: Vec<String>,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            validate_requests: true,
            openapi_path: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            skip_paths: DEFAULT_SKIP_PATHS.iter().map(|p| p.to_string()).collect(),
            log_format: LogFormat::Json,
        }
    }
}

impl ServerConfig {
    /// Read configuration from `ECHO_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup; unset keys keep
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(addr) = lookup("ECHO_BIND_ADDRESS") {
            config.bind_address = addr;
        }
        if let Some(port) = lookup("ECHO_PORT") {
            config.port = port
                .parse()
                .with_context(|| format!("ECHO_PORT must be a port number, got {port:?}"))?;
        }
        if let Some(flag) = lookup("ECHO_VALIDATE_REQUESTS") {
            config.validate_requests = flag
                .parse::<bool>()
                .with_context(|| format!("ECHO_VALIDATE_REQUESTS must be true or false, got {flag:?}"))?;
        }
        if let Some(path) = lookup("ECHO_OPENAPI_PATH").filter(|p| !p.is_empty()) {
            config.openapi_path = Some(PathBuf::from(path));
        }
        if let Some(limit) = lookup("ECHO_MAX_BODY_BYTES") {
            config.max_body_bytes = limit
                .parse()
                .with_context(|| format!("ECHO_MAX_BODY_BYTES must be a byte count, got {limit:?}"))?;
        }
        if let Some(paths) = lookup("ECHO_VALIDATION_SKIP_PATHS") {
            config.skip_paths.extend(
                paths
                    .split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string),
            );
        }
        if let Some(format) = lookup("ECHO_LOG_FORMAT") {
            config.log_format = format.parse().map_err(anyhow::Error::msg)?;
        }

        Ok(config)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .bind_address
            .parse()
            .with_context(|| format!("invalid bind address {:?}", self.bind_address))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Load the OpenAPI document this server validates against.
    ///
    /// The `servers` list is cleared so validation never depends on the host
    /// name a client used.
    pub fn load_document(&self) -> SpecResult<OpenApiDocument> {
        let mut document = match &self.openapi_path {
            Some(path) => OpenApiDocument::from_path(path)?,
            None => OpenApiDocument::embedded()?,
        };
        document.clear_servers();
        Ok(document)
    }
}

//! Configuration for docstore-bench
//!
//! Centralized configuration with sensible defaults. Environment variables
//! are read once by [`BenchConfig::from_env`]; CLI flags override them.

use std::env;
use std::path::PathBuf;

use crate::error::{Result, StoreError};

/// Env var holding the service-account credential file path
pub const CREDENTIAL_FILE_ENV: &str = "CREDENTIAL_FILE_PATH";

/// Env var pointing at a local Datastore emulator (`host:port`)
pub const EMULATOR_HOST_ENV: &str = "DATASTORE_EMULATOR_HOST";

/// Env var holding a pre-minted OAuth2 bearer token (overrides the key)
pub const ACCESS_TOKEN_ENV: &str = "DATASTORE_ACCESS_TOKEN";

/// Main configuration for a benchmark run
#[derive(Debug, Clone)]
pub struct BenchConfig {
    // -------------------------------------------------------------------------
    // Credentials
    // -------------------------------------------------------------------------
    /// Service-account JSON file; supplies the project id and signing key
    pub credential_path: Option<PathBuf>,

    /// Bearer token for the production endpoint; when unset, tokens are
    /// minted from the credential file
    pub access_token: Option<String>,

    /// Project id override (wins over the credential file)
    pub project_id: Option<String>,

    // -------------------------------------------------------------------------
    // Endpoint Configuration
    // -------------------------------------------------------------------------
    /// Production REST endpoint
    pub endpoint: String,

    /// Emulator `host:port`; when set, requests go there unauthenticated
    pub emulator_host: Option<String>,

    /// Per-request timeout (milliseconds)
    pub request_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Client Behaviour
    // -------------------------------------------------------------------------
    /// Attempts made by `run_in_transaction` before giving up on conflicts
    pub max_transaction_attempts: usize,

    /// Page size requested when iterating query results
    pub query_batch_size: usize,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            credential_path: None,
            access_token: None,
            project_id: None,
            endpoint: "https://datastore.googleapis.com".to_string(),
            emulator_host: None,
            request_timeout_ms: 30_000,
            max_transaction_attempts: 3,
            query_batch_size: 300,
        }
    }
}

impl BenchConfig {
    /// Create a new config builder
    pub fn builder() -> BenchConfigBuilder {
        BenchConfigBuilder::default()
    }

    /// Default config with credential, emulator and token settings taken
    /// from the environment. Empty variables count as unset.
    pub fn from_env() -> Self {
        let var = |name: &str| env::var(name).ok().filter(|v| !v.is_empty());

        Self {
            credential_path: var(CREDENTIAL_FILE_ENV).map(PathBuf::from),
            emulator_host: var(EMULATOR_HOST_ENV),
            access_token: var(ACCESS_TOKEN_ENV),
            ..Self::default()
        }
    }

    /// Check the values that would otherwise fail later in confusing ways
    pub fn validate(&self) -> Result<()> {
        if self.max_transaction_attempts == 0 {
            return Err(StoreError::Config(
                "max_transaction_attempts must be at least 1".to_string(),
            ));
        }
        if self.query_batch_size == 0 {
            return Err(StoreError::Config(
                "query_batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Base URL for project-scoped REST calls
    pub fn base_url(&self, project_id: &str) -> String {
        match &self.emulator_host {
            Some(host) => format!("http://{}/v1/projects/{}", host, project_id),
            None => format!(
                "{}/v1/projects/{}",
                self.endpoint.trim_end_matches('/'),
                project_id
            ),
        }
    }
}

/// Builder for BenchConfig
#[derive(Default)]
pub struct BenchConfigBuilder {
    config: BenchConfig,
}

impl BenchConfigBuilder {
    /// Start from an existing config (e.g. one read from the environment)
    pub fn from_config(config: BenchConfig) -> Self {
        Self { config }
    }

    /// Set the credential file path
    pub fn credential_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.credential_path = Some(path.into());
        self
    }

    /// Set the bearer token
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.config.access_token = Some(token.into());
        self
    }

    /// Override the project id
    pub fn project_id(mut self, project_id: impl Into<String>) -> Self {
        self.config.project_id = Some(project_id.into());
        self
    }

    /// Set the production endpoint
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    /// Route requests to an emulator
    pub fn emulator_host(mut self, host: impl Into<String>) -> Self {
        self.config.emulator_host = Some(host.into());
        self
    }

    /// Set the request timeout (in milliseconds)
    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.config.request_timeout_ms = ms;
        self
    }

    /// Set the transaction attempt limit
    pub fn max_transaction_attempts(mut self, attempts: usize) -> Self {
        self.config.max_transaction_attempts = attempts;
        self
    }

    /// Set the query page size
    pub fn query_batch_size(mut self, size: usize) -> Self {
        self.config.query_batch_size = size;
        self
    }

    pub fn build(self) -> BenchConfig {
        self.config
    }
}

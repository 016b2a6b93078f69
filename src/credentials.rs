//! Service-account credentials and bearer tokens
//!
//! The credential file supplies the project id and the RSA key used to mint
//! OAuth2 access tokens (JWT bearer grant). Minted tokens are cached until
//! shortly before they expire.

use std::fmt;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// OAuth2 scope for Cloud Datastore
pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

/// Token endpoint used when the credential file names none
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for each assertion (the maximum Google accepts)
const ASSERTION_LIFETIME_SECS: u64 = 3600;

/// Cached tokens are replaced this long before they expire
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// The subset of a service-account JSON key the client uses
#[derive(Clone, Deserialize)]
pub struct ServiceAccount {
    /// Credential type, normally `service_account`
    #[serde(rename = "type", default)]
    pub kind: Option<String>,

    /// Project the store lives in
    pub project_id: Option<String>,

    /// Account identity; the issuer of minted assertions
    pub client_email: Option<String>,

    /// PEM-encoded RSA private key
    #[serde(default)]
    pub private_key: Option<String>,

    #[serde(default)]
    pub private_key_id: Option<String>,

    /// OAuth2 token endpoint
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccount {
    /// Read and parse a credential file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            StoreError::Credentials(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&raw)
            .map_err(|e| StoreError::Credentials(format!("{}: {}", path.display(), e)))
    }

    /// Parse credential JSON
    pub fn parse(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Project id, or an error naming what is missing
    pub fn require_project_id(&self) -> Result<&str> {
        self.project_id
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| StoreError::Credentials("credential file has no project_id".to_string()))
    }
}

// The private key must never reach the logs
impl fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("kind", &self.kind)
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Token Sources
// =============================================================================

/// Where the bearer token for the production endpoint comes from
pub enum TokenSource {
    /// A token supplied by the caller, sent as is
    Static(String),
    /// Tokens minted from a service-account key
    ServiceAccount(ServiceAccountTokens),
}

impl TokenSource {
    /// Token source backed by the key in `account`
    pub fn from_service_account(account: &ServiceAccount) -> Result<Self> {
        Ok(TokenSource::ServiceAccount(ServiceAccountTokens::new(account)?))
    }

    /// Short description for logs
    pub fn describe(&self) -> &'static str {
        match self {
            TokenSource::Static(_) => "access token",
            TokenSource::ServiceAccount(_) => "service-account key",
        }
    }

    /// Current bearer token, minting a new one when needed
    pub fn bearer_token(&self, http: &reqwest::blocking::Client) -> Result<String> {
        match self {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::ServiceAccount(tokens) => tokens.token(http),
        }
    }
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// JWT-bearer token minting for one service account
pub struct ServiceAccountTokens {
    client_email: String,
    key_id: Option<String>,
    key: EncodingKey,
    token_uri: String,
    /// Held across a refresh so concurrent callers mint only once
    cached: Mutex<Option<CachedToken>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AssertionClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

impl ServiceAccountTokens {
    fn new(account: &ServiceAccount) -> Result<Self> {
        if let Some(kind) = account.kind.as_deref() {
            if kind != "service_account" {
                return Err(StoreError::Credentials(format!(
                    "credential type {:?} cannot mint tokens, expected \"service_account\"",
                    kind
                )));
            }
        }
        let client_email = account
            .client_email
            .clone()
            .ok_or_else(|| StoreError::Credentials("credential file has no client_email".to_string()))?;
        let pem = account
            .private_key
            .as_deref()
            .ok_or_else(|| StoreError::Credentials("credential file has no private_key".to_string()))?;
        let key = EncodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| StoreError::Credentials(format!("invalid private_key: {}", e)))?;

        Ok(Self {
            client_email,
            key_id: account.private_key_id.clone(),
            key,
            token_uri: account
                .token_uri
                .clone()
                .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            cached: Mutex::new(None),
        })
    }

    /// Signed assertion issued at `issued_at` (seconds since the epoch)
    fn assertion(&self, issued_at: u64) -> Result<String> {
        let header = Header {
            kid: self.key_id.clone(),
            ..Header::new(Algorithm::RS256)
        };
        let claims = AssertionClaims {
            iss: self.client_email.clone(),
            scope: DATASTORE_SCOPE.to_string(),
            aud: self.token_uri.clone(),
            iat: issued_at,
            exp: issued_at + ASSERTION_LIFETIME_SECS,
        };
        jsonwebtoken::encode(&header, &claims, &self.key)
            .map_err(|e| StoreError::Credentials(format!("cannot sign assertion: {}", e)))
    }

    fn token(&self, http: &reqwest::blocking::Client) -> Result<String> {
        let mut cached = self.cached.lock();
        if let Some(token) = cached.as_ref() {
            if Instant::now() + REFRESH_MARGIN < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.exchange(http)?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    fn exchange(&self, http: &reqwest::blocking::Client) -> Result<CachedToken> {
        let requested_at = Instant::now();
        let assertion = self.assertion(unix_now()?)?;

        let response = http
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(StoreError::Credentials(format!(
                "token exchange with {} failed with {}: {}",
                self.token_uri, status, body
            )));
        }

        let token: TokenResponse = response.json()?;
        tracing::debug!("minted access token for {}", self.client_email);
        Ok(CachedToken {
            value: token.access_token,
            expires_at: requested_at
                + Duration::from_secs(token.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS)),
        })
    }
}

fn unix_now() -> Result<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| StoreError::Credentials(format!("system clock before epoch: {}", e)))
}

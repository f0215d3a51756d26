//! Application configuration loaded from environment variables.
//!
//! Loaded once at startup; `.env` files are honored for local development.

use std::env;
use std::time::Duration;

/// Default endpoint of the fiscal authority's item specification API.
pub const DEFAULT_SPECIFICATIONS_URL: &str = "https://suf.purs.gov.rs/specifications";

/// Which persistence adapter backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Google Cloud Firestore (production, or the emulator).
    Firestore,
    /// Process-local store for development; data is lost on restart.
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(StorageBackend::Firestore),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(ConfigError::Invalid("STORAGE_BACKEND", s.to_string())),
        }
    }
}

/// API key issued to a partner webshop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebshopKey {
    pub key: String,
    /// Partner name reported in webshop responses
    pub name: String,
}

/// Parse `key:Name` entries separated by commas. Blank entries are skipped.
pub fn parse_webshop_keys(raw: &str) -> Result<Vec<WebshopKey>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once(':') {
            Some((key, name)) if !key.trim().is_empty() && !name.trim().is_empty() => {
                Ok(WebshopKey {
                    key: key.trim().to_string(),
                    name: name.trim().to_string(),
                })
            }
            _ => Err(ConfigError::Invalid("WEBSHOP_API_KEYS", entry.to_string())),
        })
        .collect()
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Persistence adapter
    pub storage: StorageBackend,
    /// Fiscal service endpoint returning receipt line items
    pub fiscal_specifications_url: String,
    /// Upper bound for each fiscal service request
    pub fiscal_timeout: Duration,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Partner webshops allowed on `/api/webshop/*`
    pub webshop_api_keys: Vec<WebshopKey>,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            storage: StorageBackend::Memory,
            fiscal_specifications_url: DEFAULT_SPECIFICATIONS_URL.to_string(),
            fiscal_timeout: Duration::from_secs(5),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            webshop_api_keys: vec![WebshopKey {
                key: "ws_test_loyalty2026".to_string(),
                name: "Test Webshop".to_string(),
            }],
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let storage = match env::var("STORAGE_BACKEND") {
            Ok(v) => v.parse()?,
            Err(_) => StorageBackend::Firestore,
        };

        let timeout_secs = match env::var("FISCAL_TIMEOUT_SECS") {
            Ok(v) => v
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::Invalid("FISCAL_TIMEOUT_SECS", v.clone()))?,
            Err(_) => 15,
        };

        // No keys configured leaves the webshop API closed
        let webshop_api_keys = match env::var("WEBSHOP_API_KEYS") {
            Ok(v) => parse_webshop_keys(&v)?,
            Err(_) => Vec::new(),
        };

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            storage,
            fiscal_specifications_url: env::var("FISCAL_SPECIFICATIONS_URL")
                .unwrap_or_else(|_| DEFAULT_SPECIFICATIONS_URL.to_string()),
            fiscal_timeout: Duration::from_secs(timeout_secs),
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            webshop_api_keys,
        })
    }

    /// Partner owning `key`, if any.
    pub fn webshop_for_key(&self, key: &str) -> Option<&WebshopKey> {
        self.webshop_api_keys.iter().find(|w| w.key == key)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

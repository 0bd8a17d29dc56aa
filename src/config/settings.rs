use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use url::Url;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppSettings {
    pub app: AppConfig,
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub security: SecurityConfig,
    pub inference: InferenceConfig,
    pub limits: LimitsConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
    pub environment: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend: {}", other)),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Required when the backend is Postgres, ignored otherwise.
    pub database_url: Option<String>,
    /// Memory backend only: provision one well-known subscriber per tier at
    /// startup for local development.
    pub seed_demo_keys: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub api_key_hmac_secret: String,
    /// Unset disables the billing webhook routes entirely.
    pub billing_webhook_secret: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InferenceConfig {
    pub base_url: String,
    pub api_token: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub max_upload_bytes: usize,
}

impl AppSettings {
    pub fn from_env() -> Result<Self, ApiError> {
        // App config
        let name = env::var("APP_NAME").unwrap_or_else(|_| "visioncore".to_string());
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        // Server config
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .map_err(|_| ApiError::Configuration("PORT must be a valid port number".to_string()))?;

        let cors_origins = env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        // Subscriber store
        let backend = env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .parse::<StoreBackend>()
            .map_err(ApiError::Configuration)?;

        let database_url = env::var("DATABASE_URL").ok();
        if backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(ApiError::Configuration(
                "DATABASE_URL must be set when STORE_BACKEND is postgres".to_string(),
            ));
        }

        let seed_demo_keys = env::var("SEED_DEMO_KEYS")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        // Secrets
        let api_key_hmac_secret = env::var("API_KEY_HMAC_SECRET")
            .map_err(|_| ApiError::Configuration("API_KEY_HMAC_SECRET must be set".to_string()))?;

        let billing_webhook_secret = env::var("BILLING_WEBHOOK_SECRET").ok();

        // Inference backend
        let raw_base = env::var("INFERENCE_BASE_URL")
            .map_err(|_| ApiError::Configuration("INFERENCE_BASE_URL must be set".to_string()))?;
        Url::parse(&raw_base).map_err(|e| {
            ApiError::Configuration(format!("INFERENCE_BASE_URL is not a valid URL: {}", e))
        })?;
        let base_url = raw_base.trim_end_matches('/').to_string();

        let api_token = env::var("INFERENCE_API_TOKEN").ok();

        // Upload cap
        let max_upload_bytes = env::var("MAX_UPLOAD_BYTES")
            .unwrap_or_else(|_| (25 * 1024 * 1024).to_string())
            .parse::<usize>()
            .map_err(|_| {
                ApiError::Configuration("MAX_UPLOAD_BYTES must be an integer".to_string())
            })?;

        Ok(AppSettings {
            app: AppConfig { name, environment },
            server: ServerConfig {
                host,
                port,
                cors_origins,
            },
            store: StoreConfig {
                backend,
                database_url,
                seed_demo_keys,
            },
            security: SecurityConfig {
                api_key_hmac_secret,
                billing_webhook_secret,
            },
            inference: InferenceConfig {
                base_url,
                api_token,
            },
            limits: LimitsConfig { max_upload_bytes },
        })
    }
}

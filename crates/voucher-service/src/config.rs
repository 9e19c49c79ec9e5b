//! Service configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// PostgreSQL connection URL. Without one the service runs on the
    /// in-memory store.
    pub database_url: Option<String>,

    /// Maximum pooled database connections (default: 10).
    pub database_max_connections: u32,

    /// HS256 secret for user JWTs. Without one every bearer token is rejected.
    pub jwt_secret: Option<String>,

    /// Expected JWT issuer (default: "voucher-ledger").
    pub jwt_issuer: String,

    /// Admin API key accepted in `X-Admin-Key`.
    pub admin_api_key: Option<String>,

    /// Webhook receiving notifications (optional).
    pub notify_webhook_url: Option<String>,

    /// Secret used to sign notification webhooks (optional).
    pub notify_webhook_secret: Option<String>,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

/// Database secrets file structure.
#[derive(Debug, Deserialize)]
pub struct DatabaseSecrets {
    /// Connection URL.
    pub url: String,
    /// Pool size override.
    #[serde(default)]
    pub max_connections: Option<u32>,
}

impl DatabaseSecrets {
    /// Load from the first readable file in `paths`.
    #[must_use]
    pub fn load_from(paths: &[PathBuf]) -> Option<Self> {
        paths.iter().find_map(|path| match load_secrets_file(path) {
            Ok(secrets) => {
                tracing::info!(path = %path.display(), "Loaded database secrets from file");
                Some(secrets)
            }
            Err(_) => None,
        })
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let secret_paths: Vec<PathBuf> = [
            ".secrets/database.json",
            "voucher-service/.secrets/database.json",
            "../.secrets/database.json",
        ]
        .into_iter()
        .map(PathBuf::from)
        .collect();

        let (database_url, file_max_connections) = match DatabaseSecrets::load_from(&secret_paths)
        {
            Some(secrets) => (Some(secrets.url), secrets.max_connections),
            None => {
                tracing::debug!("Database secrets file not found, using environment variables");
                (std::env::var("DATABASE_URL").ok(), None)
            }
        };

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            database_url,
            database_max_connections: file_max_connections
                .or_else(|| env_parse("DATABASE_MAX_CONNECTIONS"))
                .unwrap_or(defaults.database_max_connections),
            jwt_secret: std::env::var("JWT_SECRET").ok(),
            jwt_issuer: std::env::var("JWT_ISSUER").unwrap_or(defaults.jwt_issuer),
            admin_api_key: std::env::var("ADMIN_API_KEY").ok(),
            notify_webhook_url: std::env::var("NOTIFY_WEBHOOK_URL").ok(),
            notify_webhook_secret: std::env::var("NOTIFY_WEBHOOK_SECRET").ok(),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|o| o.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            max_body_bytes: env_parse("MAX_BODY_BYTES").unwrap_or(defaults.max_body_bytes),
            request_timeout_seconds: env_parse("REQUEST_TIMEOUT_SECONDS")
                .unwrap_or(defaults.request_timeout_seconds),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, std::io::Error> {
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            database_url: None,
            database_max_connections: 10,
            jwt_secret: None,
            jwt_issuer: "voucher-ledger".into(),
            admin_api_key: None,
            notify_webhook_url: None,
            notify_webhook_secret: None,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_file_is_loaded_from_first_readable_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        let broken = dir.path().join("broken.json");
        let valid = dir.path().join("database.json");
        std::fs::write(&broken, "not json").unwrap();
        std::fs::write(
            &valid,
            r#"{ "url": "postgres://ledger@localhost/vouchers", "max_connections": 4 }"#,
        )
        .unwrap();

        let secrets = DatabaseSecrets::load_from(&[missing, broken, valid]).unwrap();
        assert_eq!(secrets.url, "postgres://ledger@localhost/vouchers");
        assert_eq!(secrets.max_connections, Some(4));
    }

    #[test]
    fn no_secrets_file_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(DatabaseSecrets::load_from(&[dir.path().join("nope.json")]).is_none());
    }
}

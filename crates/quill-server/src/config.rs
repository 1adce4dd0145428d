use std::net::SocketAddr;
use std::path::PathBuf;

/// Secrets that ship in sample env files and must never reach production.
const PLACEHOLDER_SECRETS: &[&str] = &["dev-secret-change-me", "changeme", "secret"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("QUILL_JWT_SECRET is not set")]
    MissingSecret,
    #[error("QUILL_JWT_SECRET is a placeholder value")]
    PlaceholderSecret,
    #[error("invalid listen address {0}")]
    BadAddress(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("QUILL_JWT_SECRET")
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::MissingSecret)?;
        if PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            return Err(ConfigError::PlaceholderSecret);
        }

        let db_path = lookup("QUILL_DB_PATH").unwrap_or_else(|| "quill.db".into());
        let host = lookup("QUILL_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = lookup("QUILL_PORT").unwrap_or_else(|| "3000".into());

        let raw = format!("{}:{}", host, port);
        let addr = raw.parse().map_err(|_| ConfigError::BadAddress(raw))?;

        Ok(Self {
            jwt_secret,
            db_path: PathBuf::from(db_path),
            addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = load(&[("QUILL_JWT_SECRET", "a-real-secret")]).unwrap();
        assert_eq!(config.db_path, PathBuf::from("quill.db"));
        assert_eq!(config.addr.port(), 3000);
    }

    #[test]
    fn refuses_missing_or_placeholder_secret() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingSecret)));
        assert!(matches!(load(&[("QUILL_JWT_SECRET", "  ")]), Err(ConfigError::MissingSecret)));
        assert!(matches!(
            load(&[("QUILL_JWT_SECRET", "dev-secret-change-me")]),
            Err(ConfigError::PlaceholderSecret)
        ));
    }

    #[test]
    fn rejects_bad_port() {
        let result = load(&[("QUILL_JWT_SECRET", "a-real-secret"), ("QUILL_PORT", "http")]);
        assert!(matches!(result, Err(ConfigError::BadAddress(_))));
    }
}

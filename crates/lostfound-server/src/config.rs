use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that must not reach production.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "jwt-secret-key-forced-logout-v2",
];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub token_ttl_days: i64,
    /// Seconds between background rematch sweeps; 0 disables the sweep.
    pub rematch_interval_secs: u64,
    pub embedding_url: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = get("LOSTFOUND_JWT_SECRET").unwrap_or_default();
        if jwt_secret.trim().is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("LOSTFOUND_JWT_SECRET is unset or still a placeholder");
        }

        let port = get("LOSTFOUND_PORT")
            .unwrap_or_else(|| "5000".into())
            .parse::<u16>()
            .context("LOSTFOUND_PORT is not a valid port")?;
        let token_ttl_days = get("LOSTFOUND_TOKEN_TTL_DAYS")
            .map(|v| v.parse::<i64>())
            .transpose()
            .context("LOSTFOUND_TOKEN_TTL_DAYS is not a number")?
            .unwrap_or(30);
        let rematch_interval_secs = get("LOSTFOUND_REMATCH_INTERVAL_SECS")
            .map(|v| v.parse::<u64>())
            .transpose()
            .context("LOSTFOUND_REMATCH_INTERVAL_SECS is not a number")?
            .unwrap_or(300);

        Ok(Self {
            jwt_secret,
            db_path: get("LOSTFOUND_DB_PATH").unwrap_or_else(|| "lostfound.db".into()).into(),
            host: get("LOSTFOUND_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            token_ttl_days,
            rematch_interval_secs,
            embedding_url: get("LOSTFOUND_EMBEDDING_URL").filter(|u| !u.trim().is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn placeholder_secrets_are_refused() {
        assert!(ServerConfig::from_lookup(lookup(&[])).is_err());
        for secret in PLACEHOLDER_SECRETS {
            assert!(ServerConfig::from_lookup(lookup(&[("LOSTFOUND_JWT_SECRET", secret)])).is_err());
        }
    }

    #[test]
    fn defaults_apply() {
        let config = ServerConfig::from_lookup(lookup(&[("LOSTFOUND_JWT_SECRET", "s3cret")])).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.token_ttl_days, 30);
        assert_eq!(config.rematch_interval_secs, 300);
        assert!(config.embedding_url.is_none());
    }

    #[test]
    fn bad_numbers_are_errors() {
        let result = ServerConfig::from_lookup(lookup(&[
            ("LOSTFOUND_JWT_SECRET", "s3cret"),
            ("LOSTFOUND_REMATCH_INTERVAL_SECS", "soon"),
        ]));
        assert!(result.is_err());
    }
}

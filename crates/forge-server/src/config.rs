use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use forge_worker::FailurePolicy;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub jwt_issuer: Option<String>,
    pub jwt_audience: Option<String>,
    pub admin_subjects: HashSet<String>,
    pub dispatch_interval: Duration,
    pub failure_policy: FailurePolicy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());
        let optional = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = var("FORGE_JWT_SECRET", "");
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("FORGE_JWT_SECRET is unset or still a placeholder");
        }

        let host = var("FORGE_HOST", "0.0.0.0");
        let port: u16 = var("FORGE_PORT", "50051")
            .parse()
            .context("FORGE_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        let interval_secs: u64 = var("FORGE_DISPATCH_INTERVAL_SECS", "60")
            .parse()
            .context("FORGE_DISPATCH_INTERVAL_SECS must be a whole number of seconds")?;
        if interval_secs == 0 {
            bail!("FORGE_DISPATCH_INTERVAL_SECS must be greater than zero");
        }

        let retry_retryable: bool = var("FORGE_RETRY_RETRYABLE", "false")
            .parse()
            .context("FORGE_RETRY_RETRYABLE must be true or false")?;

        let admin_subjects = var("FORGE_ADMIN_SUBJECTS", "")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            addr,
            db_path: var("FORGE_DB_PATH", "socialforge.db").into(),
            jwt_secret,
            jwt_issuer: optional("FORGE_JWT_ISSUER"),
            jwt_audience: optional("FORGE_JWT_AUDIENCE"),
            admin_subjects,
            dispatch_interval: Duration::from_secs(interval_secs),
            failure_policy: if retry_retryable {
                FailurePolicy::RetryNextTick
            } else {
                FailurePolicy::MarkFailed
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = load(&[("FORGE_JWT_SECRET", "s3cret")]).unwrap();
        assert_eq!(config.addr, "0.0.0.0:50051".parse().unwrap());
        assert_eq!(config.db_path, PathBuf::from("socialforge.db"));
        assert_eq!(config.dispatch_interval, Duration::from_secs(60));
        assert_eq!(config.failure_policy, FailurePolicy::MarkFailed);
        assert!(config.admin_subjects.is_empty());
        assert!(config.jwt_issuer.is_none());
    }

    #[test]
    fn placeholder_secret_is_refused() {
        assert!(load(&[]).is_err());
        assert!(load(&[("FORGE_JWT_SECRET", "dev-secret-change-me")]).is_err());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = load(&[
            ("FORGE_JWT_SECRET", "s3cret"),
            ("FORGE_PORT", "8080"),
            ("FORGE_ADMIN_SUBJECTS", "auth0|a, auth0|b,,"),
            ("FORGE_DISPATCH_INTERVAL_SECS", "5"),
            ("FORGE_RETRY_RETRYABLE", "true"),
            ("FORGE_JWT_AUDIENCE", "forge"),
        ])
        .unwrap();
        assert_eq!(config.addr.port(), 8080);
        assert_eq!(config.admin_subjects.len(), 2);
        assert!(config.admin_subjects.contains("auth0|b"));
        assert_eq!(config.dispatch_interval, Duration::from_secs(5));
        assert_eq!(config.failure_policy, FailurePolicy::RetryNextTick);
        assert_eq!(config.jwt_audience.as_deref(), Some("forge"));
    }

    #[test]
    fn bad_numbers_fail_startup() {
        let secret = ("FORGE_JWT_SECRET", "s3cret");
        assert!(load(&[secret, ("FORGE_PORT", "http")]).is_err());
        assert!(load(&[secret, ("FORGE_DISPATCH_INTERVAL_SECS", "0")]).is_err());
        assert!(load(&[secret, ("FORGE_RETRY_RETRYABLE", "maybe")]).is_err());
    }
}

use serde::Deserialize;
use std::time::Duration;

use crate::tokens::DEFAULT_MINT_ATTEMPTS;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// Seconds to wait for in-flight requests on shutdown.
    /// Set via KURO_SHUTDOWN_TIMEOUT_SECS. Default: 10.
    pub shutdown_timeout_secs: u64,
    /// Browser origin allowed to call the API with credentials.
    pub dashboard_origin: String,
    pub log_json: bool,
    /// Total insert attempts per mint when the token id collides.
    pub mint_max_attempts: u32,
    /// Period of the expired-token cleanup job. 0 = disabled.
    pub cleanup_interval_secs: u64,
    pub github: Option<GithubProvider>,
}

/// Identity provider credentials used by the sign-in layer.
#[derive(Debug, Clone, Deserialize)]
pub struct GithubProvider {
    pub client_id: String,
    pub client_secret: String,
}

impl Config {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn cleanup_interval(&self) -> Option<Duration> {
        (self.cleanup_interval_secs > 0).then(|| Duration::from_secs(self.cleanup_interval_secs))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            database_url: "postgres://localhost/kuro".into(),
            shutdown_timeout_secs: 10,
            dashboard_origin: "http://localhost:3000".into(),
            log_json: false,
            mint_max_attempts: DEFAULT_MINT_ATTEMPTS,
            cleanup_interval_secs: 3600,
            github: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let defaults = Config::default();

    let github = match (
        std::env::var("GITHUB_CLIENT_ID").ok(),
        std::env::var("GITHUB_CLIENT_SECRET").ok(),
    ) {
        (Some(client_id), Some(client_secret)) => Some(GithubProvider {
            client_id,
            client_secret,
        }),
        _ => None,
    };

    if github.is_none() {
        let env_mode = std::env::var("KURO_ENV")
            .or_else(|_| std::env::var("RUST_ENV"))
            .unwrap_or_default();
        if env_mode == "production" {
            anyhow::bail!(
                "GITHUB_CLIENT_ID and GITHUB_CLIENT_SECRET must be set when running in production"
            );
        }
    }

    Ok(Config {
        port: env_parse("KURO_PORT", defaults.port),
        database_url: std::env::var("DATABASE_URL").unwrap_or(defaults.database_url),
        shutdown_timeout_secs: env_parse("KURO_SHUTDOWN_TIMEOUT_SECS", defaults.shutdown_timeout_secs),
        dashboard_origin: std::env::var("KURO_DASHBOARD_ORIGIN").unwrap_or(defaults.dashboard_origin),
        log_json: env_parse("KURO_LOG_JSON", defaults.log_json),
        mint_max_attempts: env_parse("KURO_MINT_MAX_ATTEMPTS", defaults.mint_max_attempts).max(1),
        cleanup_interval_secs: env_parse("KURO_CLEANUP_INTERVAL_SECS", defaults.cleanup_interval_secs),
        github,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.shutdown_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.cleanup_interval(), Some(Duration::from_secs(3600)));
        assert_eq!(cfg.mint_max_attempts, 3);
    }

    #[test]
    fn test_zero_cleanup_interval_disables_job() {
        let cfg = Config {
            cleanup_interval_secs: 0,
            ..Config::default()
        };
        assert!(cfg.cleanup_interval().is_none());
    }

    #[test]
    fn test_env_parse_falls_back_on_garbage() {
        std::env::set_var("KURO_TEST_ENV_PARSE", "not-a-number");
        assert_eq!(env_parse("KURO_TEST_ENV_PARSE", 42u16), 42);
        std::env::set_var("KURO_TEST_ENV_PARSE", " 7 ");
        assert_eq!(env_parse("KURO_TEST_ENV_PARSE", 42u16), 7);
        std::env::remove_var("KURO_TEST_ENV_PARSE");
    }
}

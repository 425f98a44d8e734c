use std::{env, time::Duration};

pub const DEFAULT_GATEWAY_BASE_URL: &str = "https://api.razorpay.com/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Test,
    Production,
}

impl AppEnv {
    fn parse(value: &str) -> anyhow::Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            "production" | "prod" => Ok(Self::Production),
            other => Err(anyhow::anyhow!("unknown APP_ENV value: {other}")),
        }
    }
}

/// Credentials for the external payment gateway. When absent the engine mints
/// gateway order ids locally (test mode).
#[derive(Debug, Clone)]
pub struct GatewayCredentials {
    pub key_id: String,
    pub key_secret: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub app_env: AppEnv,
    pub default_currency: String,
    pub gateway_credentials: Option<GatewayCredentials>,
    pub gateway_base_url: String,
    pub gateway_timeout: Duration,
    pub webhook_secret: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let app_env = match env::var("APP_ENV") {
            Ok(value) => AppEnv::parse(&value)?,
            Err(_) => AppEnv::Development,
        };
        let default_currency = env::var("DEFAULT_CURRENCY")
            .ok()
            .filter(|c| !c.trim().is_empty())
            .map(|c| c.trim().to_ascii_uppercase())
            .unwrap_or_else(|| "INR".to_string());

        let gateway_credentials = match (
            non_empty_var("PAYMENT_GATEWAY_KEY_ID"),
            non_empty_var("PAYMENT_GATEWAY_KEY_SECRET"),
        ) {
            (Some(key_id), Some(key_secret)) => Some(GatewayCredentials { key_id, key_secret }),
            _ => None,
        };
        let gateway_base_url = non_empty_var("PAYMENT_GATEWAY_BASE_URL")
            .unwrap_or_else(|| DEFAULT_GATEWAY_BASE_URL.to_string());
        let gateway_timeout = env::var("PAYMENT_GATEWAY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(10));

        Ok(Self {
            port,
            database_url,
            host,
            app_env,
            default_currency,
            gateway_credentials,
            gateway_base_url,
            gateway_timeout,
            webhook_secret: non_empty_var("PAYMENT_WEBHOOK_SECRET"),
        })
    }

    /// Configuration for local runs and tests: test-mode gateway, no webhook secret.
    pub fn for_database(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            app_env: AppEnv::Test,
            default_currency: "INR".to_string(),
            gateway_credentials: None,
            gateway_base_url: DEFAULT_GATEWAY_BASE_URL.to_string(),
            gateway_timeout: Duration::from_secs(10),
            webhook_secret: None,
        }
    }

    pub fn is_production(&self) -> bool {
        self.app_env == AppEnv::Production
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_app_env_aliases() {
        assert_eq!(AppEnv::parse("prod").unwrap(), AppEnv::Production);
        assert_eq!(AppEnv::parse(" Test ").unwrap(), AppEnv::Test);
        assert_eq!(AppEnv::parse("dev").unwrap(), AppEnv::Development);
        assert!(AppEnv::parse("staging").is_err());
    }

    #[test]
    fn database_config_runs_in_test_mode() {
        let config = AppConfig::for_database("postgres://localhost/test");
        assert!(config.gateway_credentials.is_none());
        assert!(config.webhook_secret.is_none());
        assert!(!config.is_production());
        assert_eq!(config.default_currency, "INR");
    }
}

//! Configuration loading for the Formbase API.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `FORMBASE_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, env, net::SocketAddr, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application configuration derived from `FORMBASE_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_api_bind_addr")]
    pub api_bind_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_acquire_timeout_ms")]
    pub db_acquire_timeout_ms: u64,
    #[serde(default = "default_jwt_secret", skip_serializing)]
    pub jwt_secret: String,
    #[serde(default = "default_jwt_ttl_seconds")]
    pub jwt_ttl_seconds: u64,
    #[serde(default = "default_plan_cache_capacity")]
    pub plan_cache_capacity: usize,
    #[serde(default = "default_response_cache_ttl_seconds")]
    pub response_cache_ttl_seconds: u64,
    #[serde(default = "default_login_code_ttl_seconds")]
    pub login_code_ttl_seconds: u64,
    #[serde(default = "default_task_queue_depth")]
    pub task_queue_depth: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etl_webhook_url: Option<String>,
    #[serde(default)]
    pub sms: SmsGatewayConfig,
    #[serde(default)]
    pub mail: MailGatewayConfig,
}

/// SMS gateway configuration (tencent-cloud style signed JSON API).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SmsGatewayConfig {
    #[serde(default = "default_sms_endpoint")]
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_id: Option<String>,
    #[serde(default, skip_serializing, skip_deserializing)]
    pub secret_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    #[serde(default = "default_sms_region")]
    pub region: String,
}

/// Mail relay configuration (JSON POST with bearer secret).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct MailGatewayConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing, skip_deserializing)]
    pub token: Option<String>,
    #[serde(default = "default_mail_from")]
    pub from: String,
}

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read env file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("database URL cannot be empty")]
    EmptyDatabaseUrl,
    #[error("JWT secret must be set outside the test profile")]
    MissingJwtSecret,
    #[error("plan cache capacity must be greater than zero")]
    ZeroPlanCacheCapacity,
}

impl AppConfig {
    /// Parse the configured bind address.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.api_bind_addr.parse()
    }

    /// Serialize the configuration with secret fields omitted.
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Validate configuration bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.is_empty() {
            return Err(ConfigError::EmptyDatabaseUrl);
        }
        if self.plan_cache_capacity == 0 {
            return Err(ConfigError::ZeroPlanCacheCapacity);
        }
        if self.jwt_secret.is_empty() && self.profile != "test" {
            return Err(ConfigError::MissingJwtSecret);
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            api_bind_addr: default_api_bind_addr(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            database_url: default_database_url(),
            db_max_connections: default_db_max_connections(),
            db_acquire_timeout_ms: default_db_acquire_timeout_ms(),
            jwt_secret: default_jwt_secret(),
            jwt_ttl_seconds: default_jwt_ttl_seconds(),
            plan_cache_capacity: default_plan_cache_capacity(),
            response_cache_ttl_seconds: default_response_cache_ttl_seconds(),
            login_code_ttl_seconds: default_login_code_ttl_seconds(),
            task_queue_depth: default_task_queue_depth(),
            etl_webhook_url: None,
            sms: SmsGatewayConfig::default(),
            mail: MailGatewayConfig::default(),
        }
    }
}

impl Default for SmsGatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: default_sms_endpoint(),
            secret_id: None,
            secret_key: None,
            sign_name: None,
            template_id: None,
            region: default_sms_region(),
        }
    }
}

impl Default for MailGatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            token: None,
            from: default_mail_from(),
        }
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_api_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_database_url() -> String {
    "sqlite::memory:".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_acquire_timeout_ms() -> u64 {
    5_000
}

fn default_jwt_secret() -> String {
    String::new()
}

fn default_jwt_ttl_seconds() -> u64 {
    24 * 60 * 60
}

fn default_plan_cache_capacity() -> usize {
    256
}

fn default_response_cache_ttl_seconds() -> u64 {
    60 * 60
}

fn default_login_code_ttl_seconds() -> u64 {
    5 * 60
}

fn default_task_queue_depth() -> usize {
    1024
}

fn default_sms_endpoint() -> String {
    "https://sms.tencentcloudapi.com".to_string()
}

fn default_sms_region() -> String {
    "ap-guangzhou".to_string()
}

fn default_mail_from() -> String {
    "noreply@formbase.local".to_string()
}

/// Loads configuration using layered `.env` files and `FORMBASE_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads configuration from layered env files, then process environment.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        // Overlay process environment last so it wins.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix("FORMBASE_") {
                layered.insert(stripped.to_string(), value);
            }
        }

        let take = |layered: &mut BTreeMap<String, String>, key: &str| {
            layered.remove(key).filter(|v| !v.is_empty())
        };

        let profile = take(&mut layered, "PROFILE").unwrap_or(profile_hint);
        let api_bind_addr =
            take(&mut layered, "API_BIND_ADDR").unwrap_or_else(default_api_bind_addr);
        let log_level = take(&mut layered, "LOG_LEVEL").unwrap_or_else(default_log_level);
        let log_format = take(&mut layered, "LOG_FORMAT").unwrap_or_else(default_log_format);
        let database_url = take(&mut layered, "DATABASE_URL").unwrap_or_else(default_database_url);
        let db_max_connections = layered
            .remove("DB_MAX_CONNECTIONS")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_db_max_connections);
        let db_acquire_timeout_ms = layered
            .remove("DB_ACQUIRE_TIMEOUT_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_db_acquire_timeout_ms);
        let jwt_secret = take(&mut layered, "JWT_SECRET").unwrap_or_else(default_jwt_secret);
        let jwt_ttl_seconds = layered
            .remove("JWT_TTL_SECONDS")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_jwt_ttl_seconds);
        let plan_cache_capacity = layered
            .remove("PLAN_CACHE_CAPACITY")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_plan_cache_capacity);
        let response_cache_ttl_seconds = layered
            .remove("RESPONSE_CACHE_TTL_SECONDS")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_response_cache_ttl_seconds);
        let login_code_ttl_seconds = layered
            .remove("LOGIN_CODE_TTL_SECONDS")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_login_code_ttl_seconds);
        let task_queue_depth = layered
            .remove("TASK_QUEUE_DEPTH")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_task_queue_depth);
        let etl_webhook_url = take(&mut layered, "ETL_WEBHOOK_URL");

        let sms = SmsGatewayConfig {
            endpoint: take(&mut layered, "SMS_ENDPOINT").unwrap_or_else(default_sms_endpoint),
            secret_id: take(&mut layered, "SMS_SECRET_ID"),
            secret_key: take(&mut layered, "SMS_SECRET_KEY"),
            sign_name: take(&mut layered, "SMS_SIGN_NAME"),
            template_id: take(&mut layered, "SMS_TEMPLATE_ID"),
            region: take(&mut layered, "SMS_REGION").unwrap_or_else(default_sms_region),
        };

        let mail = MailGatewayConfig {
            endpoint: take(&mut layered, "MAIL_ENDPOINT"),
            token: take(&mut layered, "MAIL_TOKEN"),
            from: take(&mut layered, "MAIL_FROM").unwrap_or_else(default_mail_from),
        };

        let config = AppConfig {
            profile,
            api_bind_addr,
            log_level,
            log_format,
            database_url,
            db_max_connections,
            db_acquire_timeout_ms,
            jwt_secret,
            jwt_ttl_seconds,
            plan_cache_capacity,
            response_cache_ttl_seconds,
            login_code_ttl_seconds,
            task_queue_depth,
            etl_webhook_url,
            sms,
            mail,
        };

        config.validate()?;

        match config.bind_addr() {
            Ok(_) => Ok(config),
            Err(source) => Err(ConfigError::InvalidBindAddr {
                value: config.api_bind_addr.clone(),
                source,
            }),
        }
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var("FORMBASE_PROFILE")
            .ok()
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix("FORMBASE_") {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.profile, "local");
        assert_eq!(config.api_bind_addr, "0.0.0.0:8080");
        assert_eq!(config.plan_cache_capacity, 256);
        assert_eq!(config.login_code_ttl_seconds, 300);
        assert!(config.bind_addr().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_database_url() {
        let config = AppConfig {
            database_url: String::new(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyDatabaseUrl)
        ));
    }

    #[test]
    fn test_validate_requires_jwt_secret_outside_test_profile() {
        let config = AppConfig {
            profile: "prod".to_string(),
            jwt_secret: String::new(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingJwtSecret)
        ));

        let test_config = AppConfig {
            profile: "test".to_string(),
            jwt_secret: String::new(),
            ..Default::default()
        };
        assert!(test_config.validate().is_ok());
    }

    #[test]
    fn test_layered_env_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(".env"),
            "FORMBASE_PROFILE=test\nFORMBASE_LOG_LEVEL=debug\n",
        )
        .unwrap();
        fs::write(
            dir.path().join(".env.test"),
            "FORMBASE_LOG_FORMAT=pretty\nFORMBASE_DATABASE_URL=sqlite::memory:\n",
        )
        .unwrap();

        let loader = ConfigLoader::with_base_dir(dir.path().to_path_buf());
        let config = loader.load().unwrap();

        assert_eq!(config.profile, "test");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, "pretty");
        assert_eq!(config.database_url, "sqlite::memory:");
    }

    #[test]
    fn test_redacted_json_omits_secrets() {
        let config = AppConfig {
            jwt_secret: "super-secret".to_string(),
            ..Default::default()
        };
        let json = config.redacted_json().unwrap();
        assert!(!json.contains("super-secret"));
    }
}

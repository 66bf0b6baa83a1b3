//! Gateway configuration.
//!
//! Layered: compiled-in defaults, then an optional config file, then
//! `ENTREGA_`-prefixed environment variables.

use serde::{Deserialize, Serialize};

use crate::auth::rate_limit::RateLimitConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitSettings,
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_ttl_hours: i64,
    pub refresh_ttl_hours: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    pub general: RateLimitConfig,
    pub sensitive: RateLimitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    pub buffer_size: usize,
}

impl Config {
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Config::default())?)
            .add_source(config::File::with_name(path.unwrap_or("gateway")).required(false))
            .add_source(config::Environment::with_prefix("ENTREGA").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8090,
            },
            auth: AuthConfig {
                jwt_secret: "entrega-dev-secret-change-in-production".to_string(),
                access_ttl_hours: 24,
                refresh_ttl_hours: 24 * 7,
            },
            rate_limit: RateLimitSettings {
                general: RateLimitConfig {
                    max_requests: 120,
                    window_secs: 60,
                },
                sensitive: RateLimitConfig {
                    max_requests: 30,
                    window_secs: 60,
                },
            },
            audit: AuditConfig { buffer_size: 1024 },
        }
    }
}

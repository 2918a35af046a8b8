use serde::Deserialize;
use std::env;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub cors: CorsConfig,
    pub features: FeatureFlags,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum LogFormat {
    Pretty,
    Json,
}

// Настройки базы данных. Без DATABASE_URL сервис работает на in-memory хранилище
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub pool_size: u32,
    pub acquire_timeout_seconds: u64,
}

// Настройки Redis (кеш снимка мест). Без REDIS_URL кеш выключен
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: Option<String>,
    pub seats_ttl_seconds: u64,
}

// Настройки JWT и хеширования паролей
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expires_in_hours: i64,
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub allowed_origin: String,
}

// Feature flags для включения/выключения функциональности
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureFlags {
    pub enable_reset: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Config {
            app: AppConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_or("PORT", 5000)?,
                environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
                rust_log: env::var("RUST_LOG")
                    .unwrap_or_else(|_| "train_booking=debug,tower_http=debug".to_string()),
                log_format: match env::var("LOG_FORMAT").as_deref() {
                    Ok("json") => LogFormat::Json,
                    Ok("pretty") | Err(_) => LogFormat::Pretty,
                    Ok(other) => {
                        return Err(ConfigError::Invalid { name: "LOG_FORMAT", value: other.to_string() })
                    }
                },
            },
            database: DatabaseConfig {
                url: optional("DATABASE_URL"),
                pool_size: parse_or("DB_POOL_SIZE", 20)?,
                acquire_timeout_seconds: parse_or("DB_ACQUIRE_TIMEOUT_SECONDS", 5)?,
            },
            redis: RedisConfig {
                url: optional("REDIS_URL"),
                seats_ttl_seconds: parse_or("REDIS_SEATS_TTL_SECONDS", 30)?,
            },
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?,
                expires_in_hours: parse_or("JWT_EXPIRES_IN_HOURS", 24)?,
                bcrypt_cost: parse_or("BCRYPT_COST", bcrypt::DEFAULT_COST)?,
            },
            cors: CorsConfig {
                allowed_origin: env::var("CORS_ALLOWED_ORIGIN")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            },
            features: FeatureFlags {
                enable_reset: parse_or("ENABLE_RESET", false)?,
            },
        })
    }

    /// Конфигурация для тестов: in-memory хранилище, без Redis, дешёвый bcrypt.
    pub fn for_tests() -> Self {
        Config {
            app: AppConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                environment: "test".to_string(),
                rust_log: "train_booking=debug".to_string(),
                log_format: LogFormat::Pretty,
            },
            database: DatabaseConfig { url: None, pool_size: 1, acquire_timeout_seconds: 1 },
            redis: RedisConfig { url: None, seats_ttl_seconds: 30 },
            jwt: JwtConfig {
                secret: "test-secret".to_string(),
                expires_in_hours: 1,
                bcrypt_cost: 4,
            },
            cors: CorsConfig { allowed_origin: "http://localhost:3000".to_string() },
            features: FeatureFlags { enable_reset: true },
        }
    }
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        Err(_) => Ok(default),
    }
}

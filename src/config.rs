use std::str::FromStr;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// Requests allowed per client IP in each fixed window. Every request counts
/// against `default`; auth, search, booking and review writes also count
/// against their own bucket.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub window_seconds: u64,
    pub default: u64,
    pub auth: u64,
    pub search: u64,
    pub booking: u64,
    pub review: u64,
    /// Take the client address from `X-Forwarded-For` instead of the socket.
    pub trust_forwarded_for: bool,
}

impl RateLimitConfig {
    fn from_env() -> Self {
        Self {
            enabled: var_or("RATE_LIMIT_ENABLED", true),
            window_seconds: var_or("RATE_LIMIT_WINDOW_SECONDS", 60),
            default: var_or("RATE_LIMIT_DEFAULT", 100),
            auth: var_or("RATE_LIMIT_AUTH", 10),
            search: var_or("RATE_LIMIT_SEARCH", 30),
            booking: var_or("RATE_LIMIT_BOOKING", 5),
            review: var_or("RATE_LIMIT_REVIEW", 10),
            trust_forwarded_for: var_or("RATE_LIMIT_TRUST_FORWARDED_FOR", false),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt: JwtConfig,
    /// No cache when unset.
    pub redis_url: Option<String>,
    pub cache_ttl_seconds: u64,
    pub rate_limit: RateLimitConfig,
    pub host: String,
    pub port: u16,
}

fn var_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "staybook".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "staybook-users".into()),
            ttl_minutes: var_or("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: var_or("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
        };
        Ok(Self {
            database_url,
            database_max_connections: var_or("DATABASE_MAX_CONNECTIONS", 10),
            jwt,
            redis_url: std::env::var("REDIS_URL").ok().filter(|v| !v.is_empty()),
            cache_ttl_seconds: var_or("CACHE_TTL_SECONDS", 3600),
            rate_limit: RateLimitConfig::from_env(),
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: var_or("APP_PORT", 8080),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

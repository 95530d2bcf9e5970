//! Runtime configuration
//!
//! Everything is read from environment variables once at startup. Parsing goes
//! through [`AppConfig::from_lookup`] so tests can feed a plain map instead of
//! mutating the process environment.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use super::errors::{AppError, AppResult};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DATABASE_URL: &str = "sqlite://link_a.db?mode=rwc";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_RATE_LIMIT: u32 = 120;
const DEFAULT_TOKEN_CACHE_TTL_SECS: u64 = 300;

/// Server-wide configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    /// Firebase Web API key used for ID token lookups
    pub firebase_api_key: Option<String>,
    pub firebase_project_id: Option<String>,
    /// Accept `dev:<uid>:<email>` bearer tokens. Local development only.
    pub dev_auth: bool,
    /// Emails promoted to `admin` when they register
    pub admin_emails: Vec<String>,
    /// Allowed CORS origins, empty means any
    pub cors_origins: Vec<String>,
    /// Requests per minute per client key
    pub rate_limit_per_minute: u32,
    pub token_cache_ttl: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            database_max_connections: DEFAULT_MAX_CONNECTIONS,
            firebase_api_key: None,
            firebase_project_id: None,
            dev_auth: false,
            admin_emails: Vec::new(),
            cors_origins: Vec::new(),
            rate_limit_per_minute: DEFAULT_RATE_LIMIT,
            token_cache_ttl: Duration::from_secs(DEFAULT_TOKEN_CACHE_TTL_SECS),
        }
    }
}

impl AppConfig {
    /// Load from the process environment
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_map(vars: &HashMap<String, String>) -> AppResult<Self> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // Hosting platforms set PORT, LINKA_PORT is for local runs
        let port = match get("PORT").or_else(|| get("LINKA_PORT")) {
            Some(raw) => parse_value("PORT", &raw)?,
            None => DEFAULT_PORT,
        };

        let config = Self {
            host: get("LINKA_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            database_max_connections: parse_or(
                get("DATABASE_MAX_CONNECTIONS"),
                "DATABASE_MAX_CONNECTIONS",
                DEFAULT_MAX_CONNECTIONS,
            )?,
            firebase_api_key: get("FIREBASE_API_KEY"),
            firebase_project_id: get("FIREBASE_PROJECT_ID"),
            dev_auth: parse_bool(get("LINKA_DEV_AUTH"), "LINKA_DEV_AUTH")?,
            admin_emails: split_list(get("LINKA_ADMIN_EMAILS"))
                .into_iter()
                .map(|e| e.to_lowercase())
                .collect(),
            cors_origins: split_list(get("LINKA_CORS_ORIGINS"))
                .into_iter()
                .filter(|o| o != "*")
                .collect(),
            rate_limit_per_minute: parse_or(
                get("LINKA_RATE_LIMIT"),
                "LINKA_RATE_LIMIT",
                DEFAULT_RATE_LIMIT,
            )?,
            token_cache_ttl: Duration::from_secs(parse_or(
                get("LINKA_TOKEN_CACHE_TTL_SECS"),
                "LINKA_TOKEN_CACHE_TTL_SECS",
                DEFAULT_TOKEN_CACHE_TTL_SECS,
            )?),
        };

        if config.rate_limit_per_minute == 0 {
            return Err(AppError::invalid_config("LINKA_RATE_LIMIT", "0"));
        }

        Ok(config)
    }

    /// Fail fast when no identity verifier can be built
    pub fn validate_auth(&self) -> AppResult<()> {
        if self.firebase_api_key.is_none() && !self.dev_auth {
            return Err(AppError::missing_env("FIREBASE_API_KEY"));
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> AppResult<SocketAddr> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse()
            .map_err(|_| AppError::invalid_config("LINKA_HOST", &self.host))
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = email.to_lowercase();
        self.admin_emails.iter().any(|e| *e == email)
    }

    /// Log the effective configuration. Secrets are never printed.
    pub fn log_summary(&self) {
        info!("Database: {}", redact_url(&self.database_url));
        info!(
            "Auth: firebase={} dev_auth={} project={}",
            self.firebase_api_key.is_some(),
            self.dev_auth,
            self.firebase_project_id.as_deref().unwrap_or("-")
        );
        info!(
            "Rate limit: {}/min, token cache TTL: {}s",
            self.rate_limit_per_minute,
            self.token_cache_ttl.as_secs()
        );
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> AppResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::invalid_config(key, raw))
}

fn parse_or<T: FromStr>(raw: Option<String>, key: &str, default: T) -> AppResult<T> {
    match raw {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_bool(raw: Option<String>, key: &str) -> AppResult<bool> {
    match raw.as_deref().map(|s| s.trim().to_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(AppError::invalid_config(key, &v)),
        },
    }
}

fn split_list(raw: Option<String>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}

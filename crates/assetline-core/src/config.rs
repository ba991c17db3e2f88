//! Configuration module
//!
//! Environment-driven settings for the API binary and the background services:
//! database pools, media platform credentials, owner-service routing, paging
//! and the cleanup sweeper.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::models::OwnerType;

// Common constants
const SERVER_PORT: u16 = 4000;
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const UPLOAD_FOLDER: &str = "assets";
const WEBHOOK_VALIDITY_WINDOW_SECS: u64 = 300;
const OWNER_SERVICE_TIMEOUT_SECS: u64 = 10;
const RECONCILE_MAX_PARALLEL_TYPES: usize = 4;
const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;
const CLEANUP_INTERVAL_SECS: u64 = 3600;
const BROKEN_RETENTION_HOURS: i64 = 72;
const DEV_CURSOR_SECRET: &str = "assetline-dev-cursor-secret";

/// One `type=url` entry of `OWNER_SERVICES`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnerServiceEndpoint {
    pub owner_type: OwnerType,
    pub base_url: String,
}

impl FromStr for OwnerServiceEndpoint {
    type Err = anyhow::Error;

    fn from_str(entry: &str) -> Result<Self, Self::Err> {
        let (owner_type, base_url) = entry
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("owner service entry '{}' must be type=url", entry))?;
        let owner_type = OwnerType::new(owner_type.trim())
            .map_err(|e| anyhow::anyhow!("owner service entry '{}': {}", entry, e))?;
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(anyhow::anyhow!(
                "owner service entry '{}' must use an http(s) URL",
                entry
            ));
        }
        Ok(Self {
            owner_type,
            base_url,
        })
    }
}

/// Parse `OWNER_SERVICES` (`course=http://...,product=http://...`).
pub fn parse_owner_services(raw: &str) -> Result<Vec<OwnerServiceEndpoint>, anyhow::Error> {
    let endpoints = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(OwnerServiceEndpoint::from_str)
        .collect::<Result<Vec<_>, _>>()?;

    let mut seen = std::collections::HashSet::new();
    for endpoint in &endpoints {
        if !seen.insert(endpoint.owner_type.clone()) {
            return Err(anyhow::anyhow!(
                "owner type '{}' is routed more than once in OWNER_SERVICES",
                endpoint.owner_type
            ));
        }
    }
    Ok(endpoints)
}

/// Base configuration shared by the API and background services
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub environment: String,
}

#[derive(Clone, Debug)]
pub struct PlatformConfig {
    pub api_url: String,
    pub api_key: String,
    pub webhook_secret: String,
    pub upload_folder: String,
    pub webhook_validity_window_secs: u64,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub base: BaseConfig,
    pub database_url: String,
    /// Metadata documents live on their own pool; defaults to `database_url`.
    pub metadata_database_url: String,
    pub platform: PlatformConfig,
    pub cursor_secret: String,
    pub owner_services: Vec<OwnerServiceEndpoint>,
    pub owner_service_timeout_secs: u64,
    pub reconcile_max_parallel_types: usize,
    pub default_page_size: u32,
    pub max_page_size: u32,
    /// Interval in seconds between cleanup sweeps. 0 = disabled.
    pub cleanup_interval_secs: u64,
    pub broken_retention_hours: i64,
    /// Delete remote assets that have no canonical row instead of only logging them.
    pub orphan_sweep_delete: bool,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn is_production_env(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());
        let is_production = is_production_env(&environment);

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        if is_production && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }
        let cors_origins = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let base = BaseConfig {
            server_port: env_or("PORT", SERVER_PORT),
            cors_origins,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", MAX_CONNECTIONS),
            db_timeout_seconds: env_or("DB_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS),
            environment,
        };

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
        let metadata_database_url =
            env::var("METADATA_DATABASE_URL").unwrap_or_else(|_| database_url.clone());

        let platform = PlatformConfig {
            api_url: env::var("PLATFORM_API_URL")
                .map_err(|_| anyhow::anyhow!("PLATFORM_API_URL must be set"))?,
            api_key: env::var("PLATFORM_API_KEY")
                .map_err(|_| anyhow::anyhow!("PLATFORM_API_KEY must be set"))?,
            webhook_secret: env::var("PLATFORM_WEBHOOK_SECRET")
                .map_err(|_| anyhow::anyhow!("PLATFORM_WEBHOOK_SECRET must be set"))?,
            upload_folder: env::var("PLATFORM_UPLOAD_FOLDER")
                .unwrap_or_else(|_| UPLOAD_FOLDER.to_string()),
            webhook_validity_window_secs: env_or(
                "WEBHOOK_VALIDITY_WINDOW_SECS",
                WEBHOOK_VALIDITY_WINDOW_SECS,
            ),
        };

        let cursor_secret = match env::var("CURSOR_SECRET") {
            Ok(secret) => secret,
            Err(_) if is_production => {
                return Err(anyhow::anyhow!("CURSOR_SECRET must be set in production"))
            }
            Err(_) => DEV_CURSOR_SECRET.to_string(),
        };

        let owner_services =
            parse_owner_services(&env::var("OWNER_SERVICES").unwrap_or_default())?;

        Ok(Config {
            base,
            database_url,
            metadata_database_url,
            platform,
            cursor_secret,
            owner_services,
            owner_service_timeout_secs: env_or(
                "OWNER_SERVICE_TIMEOUT_SECS",
                OWNER_SERVICE_TIMEOUT_SECS,
            ),
            reconcile_max_parallel_types: env_or(
                "RECONCILE_MAX_PARALLEL_TYPES",
                RECONCILE_MAX_PARALLEL_TYPES,
            ),
            default_page_size: env_or("DEFAULT_PAGE_SIZE", DEFAULT_PAGE_SIZE),
            max_page_size: env_or("MAX_PAGE_SIZE", MAX_PAGE_SIZE),
            cleanup_interval_secs: env_or("CLEANUP_INTERVAL_SECS", CLEANUP_INTERVAL_SECS),
            broken_retention_hours: env_or("BROKEN_RETENTION_HOURS", BROKEN_RETENTION_HOURS),
            orphan_sweep_delete: env_or("ORPHAN_SWEEP_DELETE", false),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        for (name, url) in [
            ("DATABASE_URL", &self.database_url),
            ("METADATA_DATABASE_URL", &self.metadata_database_url),
        ] {
            if !(url.starts_with("postgresql://") || url.starts_with("postgres://")) {
                return Err(anyhow::anyhow!(
                    "{} must be a valid PostgreSQL connection string",
                    name
                ));
            }
        }

        if self.default_page_size == 0 || self.max_page_size == 0 {
            return Err(anyhow::anyhow!("page sizes must be greater than zero"));
        }
        if self.default_page_size > self.max_page_size {
            return Err(anyhow::anyhow!(
                "DEFAULT_PAGE_SIZE ({}) cannot exceed MAX_PAGE_SIZE ({})",
                self.default_page_size,
                self.max_page_size
            ));
        }

        if self.platform.webhook_validity_window_secs == 0 {
            return Err(anyhow::anyhow!(
                "WEBHOOK_VALIDITY_WINDOW_SECS must be greater than zero"
            ));
        }
        if self.platform.webhook_secret.trim().is_empty() {
            return Err(anyhow::anyhow!("PLATFORM_WEBHOOK_SECRET cannot be empty"));
        }
        if self.cursor_secret.len() < 16 {
            return Err(anyhow::anyhow!(
                "CURSOR_SECRET must be at least 16 characters long"
            ));
        }
        if self.reconcile_max_parallel_types == 0 {
            return Err(anyhow::anyhow!(
                "RECONCILE_MAX_PARALLEL_TYPES must be greater than zero"
            ));
        }
        if self.owner_service_timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "OWNER_SERVICE_TIMEOUT_SECS must be greater than zero"
            ));
        }
        if self.broken_retention_hours < 0 {
            return Err(anyhow::anyhow!("BROKEN_RETENTION_HOURS cannot be negative"));
        }

        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        is_production_env(&self.base.environment)
    }

    pub fn server_port(&self) -> u16 {
        self.base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.base.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.base.environment
    }

    pub fn db_max_connections(&self) -> u32 {
        self.base.db_max_connections
    }

    pub fn db_timeout(&self) -> Duration {
        Duration::from_secs(self.base.db_timeout_seconds)
    }

    pub fn webhook_validity_window(&self) -> Duration {
        Duration::from_secs(self.platform.webhook_validity_window_secs)
    }

    pub fn owner_service_timeout(&self) -> Duration {
        Duration::from_secs(self.owner_service_timeout_secs)
    }

    pub fn cleanup_interval(&self) -> Option<Duration> {
        (self.cleanup_interval_secs > 0).then(|| Duration::from_secs(self.cleanup_interval_secs))
    }
}

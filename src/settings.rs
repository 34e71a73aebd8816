use anyhow::{Context, Result};

use std::str::FromStr;

const DEFAULT_DATABASE_URL: &str = "sqlite://contacts.db";
const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8000";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_PAGE_LIMIT: u32 = 100;
const MAX_PAGE_LIMIT: u32 = 1000;

/// Runtime configuration, read from the environment (and `.env` if present).
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub bind_address: String,
    pub max_connections: u32,
    pub default_page_limit: u32,
    pub max_page_limit: u32,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        // A missing .env is fine, the process environment still applies
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                return Err(e).context("Could not read .env file");
            }
        }

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let settings = Self {
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.into()),
            bind_address: lookup("BIND_ADDRESS").unwrap_or_else(|| DEFAULT_BIND_ADDRESS.into()),
            max_connections: parse_var(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
            default_page_limit: parse_var(&lookup, "DEFAULT_PAGE_LIMIT", DEFAULT_PAGE_LIMIT)?,
            max_page_limit: parse_var(&lookup, "MAX_PAGE_LIMIT", MAX_PAGE_LIMIT)?,
        };

        if settings.max_connections == 0 {
            anyhow::bail!("DB_MAX_CONNECTIONS must be at least 1");
        }

        Ok(settings)
    }

    /// Resolve the requested page size against the configured default and cap.
    pub fn page_limit(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_page_limit)
            .min(self.max_page_limit)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {key}: {raw:?}")),
        None => Ok(default),
    }
}

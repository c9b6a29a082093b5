use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use nexsyn_client::RestStoreConfig;

#[derive(Debug, Clone)]
pub struct Settings {
    pub store_url: Option<String>,
    pub store_key: Option<String>,
    pub posts_table: String,
    pub page_size: u32,
    pub http_connect_timeout_secs: u64,
    pub http_timeout_secs: u64,
    pub cache_ttl_secs: u64,
    pub cache_max_entries: usize,
    pub log_level: String,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let store_url = get_optional(&lookup, "NEXSYN_STORE_URL");
        let store_key = get_optional(&lookup, "NEXSYN_STORE_KEY");
        let posts_table =
            get_optional(&lookup, "NEXSYN_POSTS_TABLE").unwrap_or_else(|| "posts".to_string());
        let log_level = lookup("LOG_LEVEL")
            .or_else(|| lookup("RUST_LOG"))
            .unwrap_or_else(|| "info".to_string());

        let page_size = parse_positive(&lookup, "NEXSYN_PAGE_SIZE", 6u32)?;
        let http_connect_timeout_secs =
            parse_positive(&lookup, "NEXSYN_HTTP_CONNECT_TIMEOUT_SECS", 5u64)?;
        let http_timeout_secs = parse_positive(&lookup, "NEXSYN_HTTP_TIMEOUT_SECS", 15u64)?;
        let cache_ttl_secs = parse_env(&lookup, "NEXSYN_CACHE_TTL_SECS", 60u64)?;
        let cache_max_entries = parse_positive(&lookup, "NEXSYN_CACHE_MAX_ENTRIES", 256usize)?;

        Ok(Self {
            store_url,
            store_key,
            posts_table,
            page_size,
            http_connect_timeout_secs,
            http_timeout_secs,
            cache_ttl_secs,
            cache_max_entries,
            log_level,
        })
    }

    /// Настройки REST-хранилища; URL и ключ обязательны только здесь.
    pub fn rest_config(&self) -> Result<RestStoreConfig> {
        let base_url = self
            .store_url
            .clone()
            .ok_or_else(|| anyhow!("NEXSYN_STORE_URL must not be empty"))
            .context("NEXSYN_STORE_URL is required without --fixture")?;
        let api_key = self
            .store_key
            .clone()
            .ok_or_else(|| anyhow!("NEXSYN_STORE_KEY must not be empty"))
            .context("NEXSYN_STORE_KEY is required without --fixture")?;

        Ok(RestStoreConfig {
            base_url,
            api_key,
            table: self.posts_table.clone(),
            connect_timeout: Duration::from_secs(self.http_connect_timeout_secs),
            timeout: Duration::from_secs(self.http_timeout_secs),
        })
    }

    /// `None`, если кэш выключен (`NEXSYN_CACHE_TTL_SECS=0`).
    pub fn cache_ttl(&self) -> Option<Duration> {
        (self.cache_ttl_secs > 0).then(|| Duration::from_secs(self.cache_ttl_secs))
    }
}

fn get_optional(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_env<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr + ToString,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .unwrap_or_else(|| default.to_string())
        .trim()
        .parse::<T>()
        .with_context(|| format!("Failed to parse {key}, expecting non-negative integer"))
}

fn parse_positive<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr + ToString + PartialEq + Default,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = parse_env(lookup, key, default)?;
    if value == T::default() {
        return Err(anyhow!("{key} must be > 0"));
    }
    Ok(value)
}

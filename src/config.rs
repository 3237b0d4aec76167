use std::{fs::read_to_string, sync::Arc};

use serde::Deserialize;

pub type Config = Arc<InnerConfig>;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InnerConfig {
    /// Bot token used for the `Authorization` header.
    pub token: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Attempts per request before giving up, rate limit waits included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(default)]
    pub channels: EntityCacheConfig,
    #[serde(default)]
    pub members: EntityCacheConfig,
    #[serde(default = "message_cache_default")]
    pub messages: EntityCacheConfig,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityCacheConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            channels: EntityCacheConfig::default(),
            members: EntityCacheConfig::default(),
            messages: message_cache_default(),
        }
    }
}

impl Default for EntityCacheConfig {
    fn default() -> Self {
        EntityCacheConfig {
            capacity: default_capacity(),
            ttl_seconds: default_ttl_seconds(),
        }
    }
}

fn default_api_base() -> String {
    crate::API_BASE.to_owned()
}

fn default_max_attempts() -> usize {
    5
}

fn default_capacity() -> usize {
    1024
}

fn default_ttl_seconds() -> u64 {
    600
}

fn message_cache_default() -> EntityCacheConfig {
    // Messages churn faster than channels or members.
    EntityCacheConfig {
        capacity: 4096,
        ttl_seconds: 300,
    }
}

impl InnerConfig {
    pub fn read_from_file(path: &str) -> Result<Self, Error> {
        let content = read_to_string(path)?;
        Ok(toml::from_str::<Self>(&content)?)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to read configuration file")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration file")]
    Toml(#[from] toml::de::Error),
}

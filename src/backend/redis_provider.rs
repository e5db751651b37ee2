//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了Redis提供者接口和默认实现。

use crate::{
    config::StoreConfig,
    error::{CacheError, Result, StoreFault},
    utils::redaction::redact_connection_string,
};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client};
use secrecy::ExposeSecret;
use tokio::time::{timeout, Duration};

/// Redis连接提供者
///
/// 负责建立连接，测试中可以替换
#[async_trait]
pub trait RedisProvider: Send + Sync {
    async fn get_standalone_client(&self, config: &StoreConfig)
        -> Result<(Client, ConnectionManager)>;
    async fn get_sentinel_client(&self, config: &StoreConfig)
        -> Result<(Client, ConnectionManager)>;
}

pub struct DefaultRedisProvider;

impl DefaultRedisProvider {
    async fn connect(client: &Client, timeout_ms: u64, target: &str) -> Result<ConnectionManager> {
        match timeout(
            Duration::from_millis(timeout_ms),
            client.get_connection_manager(),
        )
        .await
        {
            Ok(res) => res.map_err(|e| CacheError::Store(StoreFault::from(e))),
            Err(_) => Err(CacheError::Store(StoreFault::Connection(format!(
                "Connection timed out after {}ms. Target: {}",
                timeout_ms,
                redact_connection_string(target)
            )))),
        }
    }
}

#[async_trait]
impl RedisProvider for DefaultRedisProvider {
    async fn get_standalone_client(
        &self,
        config: &StoreConfig,
    ) -> Result<(Client, ConnectionManager)> {
        let raw = config.connection_string.expose_secret();
        let connection_string = if config.enable_tls && !raw.starts_with("rediss://") {
            raw.replace("redis://", "rediss://")
        } else {
            raw.to_string()
        };

        let client = Client::open(connection_string.as_str()).map_err(|e| {
            CacheError::ConfigError(format!(
                "Invalid connection string '{}': {}",
                redact_connection_string(&connection_string),
                e
            ))
        })?;
        let manager =
            Self::connect(&client, config.connection_timeout_ms, &connection_string).await?;
        Ok((client, manager))
    }

    async fn get_sentinel_client(
        &self,
        config: &StoreConfig,
    ) -> Result<(Client, ConnectionManager)> {
        let sentinel_config = config.sentinel.as_ref().ok_or_else(|| {
            CacheError::ConfigError("Sentinel configuration is missing".to_string())
        })?;

        tracing::info!("Initializing Sentinel client with automatic failover support");

        // redis+sentinel://[:password@]host:port[,host:port]/service_name
        let mut url = "redis+sentinel://".to_string();
        if let Some(password) = &config.password {
            url.push_str(&format!(":{}@", password.expose_secret()));
        }

        let nodes: Vec<String> = sentinel_config
            .nodes
            .iter()
            .map(|n| {
                n.trim_start_matches("redis://")
                    .trim_start_matches("redis+sentinel://")
                    .to_string()
            })
            .collect();
        if nodes.is_empty() {
            return Err(CacheError::ConfigError(
                "No sentinel nodes provided".to_string(),
            ));
        }

        url.push_str(&nodes.join(","));
        url.push('/');
        url.push_str(&sentinel_config.master_name);

        let client = Client::open(url.as_str()).map_err(|e| {
            CacheError::ConfigError(format!(
                "Invalid sentinel url '{}': {}",
                redact_connection_string(&url),
                e
            ))
        })?;
        let manager = Self::connect(&client, config.connection_timeout_ms, &url).await?;
        Ok((client, manager))
    }
}

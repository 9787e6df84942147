//! Process configuration for the HTTP binary.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use bazaar_infra::{ConfigError as EngineConfigError, EngineConfig};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Engine(#[from] EngineConfigError),

    #[error("BAZAAR_BIND_ADDR: '{0}' is not a socket address")]
    BindAddr(String),
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    /// JSON list of variants to register at startup.
    pub catalog_seed: Option<PathBuf>,
    pub engine: EngineConfig,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let engine = EngineConfig::from_lookup(&lookup)?;

        let raw_addr = lookup("BAZAAR_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw_addr
            .trim()
            .parse()
            .map_err(|_| ConfigError::BindAddr(raw_addr.clone()))?;

        let jwt_secret = lookup("JWT_SECRET").filter(|s| !s.is_empty()).unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        Ok(Self {
            bind_addr,
            jwt_secret,
            catalog_seed: lookup("BAZAAR_CATALOG_SEED").map(PathBuf::from),
            engine,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ApiConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR.parse::<SocketAddr>().unwrap());
        assert_eq!(config.jwt_secret, DEV_JWT_SECRET);
        assert!(config.catalog_seed.is_none());
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn bad_bind_addr_is_rejected() {
        let err = ApiConfig::from_lookup(|k| (k == "BAZAAR_BIND_ADDR").then(|| "localhost".to_string())).unwrap_err();
        assert!(matches!(err, ConfigError::BindAddr(_)));
    }
}

//! Configuration for the lineage client
//!
//! This module contains the configuration type and its loading from the environment.

use serde::{Deserialize, Serialize};
use std::env;
use tracing::{info, warn};

use catalog_interfaces::{LineageDepth, LineageError, LineageResult};

use crate::adapters::RemoteCatalogClientConfig;

/// Deepest lineage fetch the backend accepts on either side
pub const MAX_LINEAGE_DEPTH: u32 = 3;

/// Lineage client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageClientConfig {
    /// Base URL of the catalog REST API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Bearer token sent with every request
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Upstream hops requested per fetch
    #[serde(default = "default_depth")]
    pub upstream_depth: u32,

    /// Downstream hops requested per fetch
    #[serde(default = "default_depth")]
    pub downstream_depth: u32,

    /// `EnvFilter` directive for [`crate::init_tracing`]
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_api_url() -> String {
    "http://localhost:8585/api/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_depth() -> u32 {
    1
}

fn default_log_filter() -> String {
    "info,catalog_lineage=debug".to_string()
}

impl Default for LineageClientConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            timeout_secs: default_timeout_secs(),
            auth_token: None,
            upstream_depth: default_depth(),
            downstream_depth: default_depth(),
            log_filter: default_log_filter(),
        }
    }
}

impl LineageClientConfig {
    /// Load configuration from an optional `.env` file and the process environment
    pub fn load() -> LineageResult<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, starting from defaults
    pub fn from_lookup<F>(lookup: F) -> LineageResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(api_url) = lookup("CATALOG_API_URL") {
            config.api_url = api_url.trim().to_string();
        }

        if let Some(timeout) = lookup("CATALOG_API_TIMEOUT_SECS") {
            match timeout.parse::<u64>() {
                Ok(secs) if secs > 0 => config.timeout_secs = secs,
                _ => warn!("Invalid CATALOG_API_TIMEOUT_SECS value: {}", timeout),
            }
        }

        if let Some(token) = lookup("CATALOG_API_TOKEN") {
            if !token.is_empty() {
                config.auth_token = Some(token);
            }
        }

        if let Some(depth) = parse_depth(&lookup, "LINEAGE_UPSTREAM_DEPTH") {
            config.upstream_depth = depth;
        }

        if let Some(depth) = parse_depth(&lookup, "LINEAGE_DOWNSTREAM_DEPTH") {
            config.downstream_depth = depth;
        }

        if let Some(filter) = lookup("LOG_FILTER") {
            config.log_filter = filter;
        }

        if config.api_url.is_empty() {
            return Err(LineageError::Configuration(
                "Catalog API URL is required".to_string(),
            ));
        }

        if config.auth_token.is_none() {
            warn!("No CATALOG_API_TOKEN provided - requests will be sent unauthenticated");
        }

        info!(api_url = %config.api_url, timeout_secs = config.timeout_secs, "lineage client configuration loaded");
        Ok(config)
    }

    /// Hops requested on each side of a fetched entity
    pub fn depth(&self) -> LineageDepth {
        LineageDepth {
            upstream: self.upstream_depth,
            downstream: self.downstream_depth,
        }
    }

    /// Settings for the REST client
    pub fn remote_client_config(&self) -> RemoteCatalogClientConfig {
        RemoteCatalogClientConfig {
            api_url: self.api_url.clone(),
            timeout_secs: self.timeout_secs,
            auth_token: self.auth_token.clone(),
        }
    }
}

fn parse_depth<F>(lookup: &F, key: &str) -> Option<u32>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.parse::<u32>() {
        Ok(depth) if depth <= MAX_LINEAGE_DEPTH => Some(depth),
        _ => {
            warn!("Invalid {} value: {} (expected 0..={})", key, raw, MAX_LINEAGE_DEPTH);
            None
        }
    }
}

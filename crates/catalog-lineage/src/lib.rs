//! Entity lineage graph maintenance for the data catalog
//!
//! Fetches lineage neighbourhoods from the catalog REST API, merges them into
//! an in-memory graph, tracks leaf nodes and expansion states, and applies
//! edge additions and removals once the backend has accepted them.

pub mod adapters;
pub mod config;
pub mod graph;
pub mod services;
pub mod session;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use std::sync::Arc;

use catalog_interfaces::{LineageApi, LineageError, LineageResult};

pub use adapters::{RemoteCatalogClient, RemoteCatalogClientConfig};
pub use config::LineageClientConfig;
pub use graph::{ExpansionState, ExpansionTracker, LeafNodes, LineageGraph, MergeOutcome};
pub use services::{LineageHandlers, LineageTabData, LineageView, LoadOutcome};
pub use session::{CurrentUser, SessionContext};

/// Initialize tracing for the lineage client.
///
/// `RUST_LOG` takes precedence over `filter` when set. Calling this more than
/// once is harmless.
pub fn init_tracing(filter: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let _ = fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .try_init();
}

/// Creates a LineageApi implementation based on configuration
///
/// # Arguments
/// * `provider` - `"remote"` for the catalog REST API, `"memory"` for the in-memory fake
/// * `config` - Client configuration (used by the remote provider)
pub fn create_lineage_api(provider: &str, config: &LineageClientConfig) -> LineageResult<Arc<dyn LineageApi>> {
    match provider {
        "remote" => {
            let client: Arc<dyn LineageApi> =
                adapters::create_remote_catalog_client(config.remote_client_config())?;
            Ok(client)
        }
        #[cfg(any(test, feature = "test-utils"))]
        "memory" => Ok(Arc::new(test_utils::FakeLineageBackend::new())),
        other => Err(LineageError::Configuration(format!(
            "Unknown lineage provider: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_lineage_api_providers() {
        let config = LineageClientConfig::default();
        assert!(create_lineage_api("remote", &config).is_ok());
        assert!(create_lineage_api("memory", &config).is_ok());
        assert!(matches!(
            create_lineage_api("neo4j", &config),
            Err(LineageError::Configuration(_))
        ));
    }

    #[test]
    fn test_remote_provider_rejects_bad_url() {
        let config = LineageClientConfig {
            api_url: "::not-a-url".to_string(),
            ..LineageClientConfig::default()
        };
        assert!(create_lineage_api("remote", &config).is_err());
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing("debug");
        init_tracing("info");
    }
}

//! Adapters implementation for external services

pub mod remote_client;

pub use remote_client::{create_remote_catalog_client, RemoteCatalogClient, RemoteCatalogClientConfig};

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use catalog_interfaces::{
    AddLineage, EntityLineage, EntityType, LineageApi, LineageDepth, LineageError, LineageResult,
    LineageTarget, PermissionApi, ResourcePermission,
};

/// Configuration for the catalog REST client
#[derive(Debug, Clone)]
pub struct RemoteCatalogClientConfig {
    /// Base URL of the catalog REST API, e.g. `http://localhost:8585/api/v1`
    pub api_url: String,
    /// Timeout in seconds for HTTP requests
    pub timeout_secs: u64,
    /// Bearer token sent with every request
    pub auth_token: Option<String>,
}

impl Default for RemoteCatalogClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8585/api/v1".to_string(),
            timeout_secs: 30,
            auth_token: None,
        }
    }
}

/// Client for the catalog's lineage and permission endpoints
#[derive(Debug, Clone)]
pub struct RemoteCatalogClient {
    config: RemoteCatalogClientConfig,
    base_url: Url,
    client: Client,
}

/// Envelope of list endpoints
#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

/// Error body answered by the backend
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

impl RemoteCatalogClient {
    /// Creates a client. Fails when the URL cannot be parsed or the HTTP client cannot be built.
    pub fn new(config: RemoteCatalogClientConfig) -> LineageResult<Self> {
        let base_url = Url::parse(&config.api_url).map_err(|e| {
            LineageError::Configuration(format!("Invalid catalog API URL {}: {}", config.api_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(LineageError::Configuration(format!(
                "Catalog API URL {} cannot carry a path",
                config.api_url
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LineageError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, base_url, client })
    }

    /// Creates a client from a URL and timeout, without authentication
    pub fn with_url_and_timeout(api_url: impl Into<String>, timeout_secs: u64) -> LineageResult<Self> {
        Self::new(RemoteCatalogClientConfig {
            api_url: api_url.into(),
            timeout_secs,
            auth_token: None,
        })
    }

    pub fn config(&self) -> &RemoteCatalogClientConfig {
        &self.config
    }

    /// Appends percent-encoded path segments to the base URL
    fn endpoint<I>(&self, segments: I) -> LineageResult<Url>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                LineageError::Configuration(format!("Catalog API URL {} cannot carry a path", self.base_url))
            })?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Maps a transport error to a LineageError
    fn map_http_error(&self, error: reqwest::Error) -> LineageError {
        if error.is_timeout() {
            LineageError::Communication(format!("Request timeout: {}", error))
        } else if error.is_connect() {
            LineageError::Communication(format!("Connection error: {}", error))
        } else if error.is_builder() {
            LineageError::Internal(format!("Failed to build request: {}", error))
        } else {
            LineageError::Communication(format!("HTTP error: {}", error))
        }
    }

    async fn send(&self, request: RequestBuilder) -> LineageResult<Response> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| self.map_http_error(e))?;
        error_for_status(response).await
    }

    async fn read_json<T: DeserializeOwned>(&self, response: Response) -> LineageResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| LineageError::Serialization(format!("Failed to parse response: {}", e)))
    }
}

/// Turns a non-success response into the matching LineageError
async fn error_for_status(response: Response) -> LineageResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.is_empty())
        .or_else(|| Some(body.trim().to_string()).filter(|b| !b.is_empty()))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("no response body").to_string());

    warn!(status = status.as_u16(), %message, "catalog request failed");

    Err(match status {
        StatusCode::NOT_FOUND => LineageError::NotFound(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LineageError::AccessDenied(message),
        s if s.is_client_error() => LineageError::InvalidRequest { status: s.as_u16(), message },
        s if s.is_server_error() => LineageError::Server { status: s.as_u16(), message },
        s => LineageError::Communication(format!("Unexpected status {}: {}", s, message)),
    })
}

#[async_trait]
impl LineageApi for RemoteCatalogClient {
    #[instrument(skip(self), fields(entity_type = %entity_type, target = %target))]
    async fn get_lineage(
        &self,
        entity_type: EntityType,
        target: &LineageTarget,
        depth: LineageDepth,
    ) -> LineageResult<EntityLineage> {
        entity_type.ensure_known()?;
        debug!("Fetching lineage with depth {:?}", depth);

        let url = match target {
            LineageTarget::Id(id) => {
                let id = id.to_string();
                self.endpoint(["lineage", entity_type.as_str(), id.as_str()])?
            }
            LineageTarget::Fqn(fqn) => {
                if fqn.is_empty() {
                    return Err(LineageError::InvalidParameter(
                        "fully qualified name must not be empty".to_string(),
                    ));
                }
                self.endpoint(["lineage", entity_type.as_str(), "name", fqn.as_str()])?
            }
        };

        let request = self.client.get(url).query(&[
            ("upstreamDepth", depth.upstream),
            ("downstreamDepth", depth.downstream),
        ]);
        let response = self.send(request).await?;
        self.read_json(response).await
    }

    #[instrument(skip(self, edge), fields(from = %edge.edge.from_entity.id, to = %edge.edge.to_entity.id))]
    async fn add_lineage(&self, edge: &AddLineage) -> LineageResult<()> {
        edge.validate()?;
        debug!("Adding lineage edge");

        let url = self.endpoint(["lineage"])?;
        self.send(self.client.put(url).json(edge)).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(from = %from_id, to = %to_id))]
    async fn delete_lineage_edge(
        &self,
        from_entity: EntityType,
        from_id: Uuid,
        to_entity: EntityType,
        to_id: Uuid,
    ) -> LineageResult<()> {
        from_entity.ensure_known()?;
        to_entity.ensure_known()?;
        debug!("Removing lineage edge");

        let (from_id, to_id) = (from_id.to_string(), to_id.to_string());
        let url = self.endpoint([
            "lineage",
            from_entity.as_str(),
            from_id.as_str(),
            to_entity.as_str(),
            to_id.as_str(),
        ])?;
        self.send(self.client.delete(url)).await?;
        Ok(())
    }
}

#[async_trait]
impl PermissionApi for RemoteCatalogClient {
    #[instrument(skip(self))]
    async fn list_permissions(&self) -> LineageResult<Vec<ResourcePermission>> {
        let url = self.endpoint(["permissions"])?;
        let response = self.send(self.client.get(url)).await?;
        let list: ListResponse<ResourcePermission> = self.read_json(response).await?;
        debug!(resources = list.data.len(), "Loaded permissions");
        Ok(list.data)
    }
}

/// Creates a RemoteCatalogClient behind an Arc
pub fn create_remote_catalog_client(config: RemoteCatalogClientConfig) -> LineageResult<Arc<RemoteCatalogClient>> {
    RemoteCatalogClient::new(config).map(Arc::new)
}

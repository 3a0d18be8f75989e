//! OpenSearch client implementation.
//!
//! This module provides the concrete implementation of `SearchEngineClient`
//! using the OpenSearch Rust client.
//!
//! OpenSearch has no per-type mappings, so every document type shares the
//! index mapping. The types that have sent their mapping are recorded under
//! `_meta.doc_types` so `has_mapping` can answer per type.

use async_trait::async_trait;
use opensearch::{
    cluster::ClusterHealthParts,
    http::request::JsonBody,
    http::response::Response,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{
        IndicesCreateParts, IndicesDeleteParts, IndicesExistsParts, IndicesGetMappingParts,
        IndicesPutMappingParts, IndicesRefreshParts,
    },
    BulkParts, DeleteParts, IndexParts, OpenSearch, SearchParts,
};
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::errors::SearchError;
use crate::interfaces::SearchEngineClient;
use crate::opensearch::index_config::IndexConfig;
use crate::opensearch::queries::{build_search_query, parse_search_response};
use record_index_shared::{Document, SearchQuery, SearchResponse, TypeMapping};

/// Markers OpenSearch uses when it cannot parse a document.
const PARSE_FAILURE_MARKERS: [&str; 2] = ["mapper_parsing_exception", "failed to parse"];

/// OpenSearch client implementation.
///
/// # Example
///
/// ```ignore
/// use record_index_repository::{IndexConfig, OpenSearchClient, SearchEngineClient};
///
/// let client = OpenSearchClient::new("http://localhost:9200", IndexConfig::new("records"))?;
/// if !client.index_exists().await? {
///     client.create_index().await?;
/// }
/// ```
pub struct OpenSearchClient {
    client: OpenSearch,
    index_config: IndexConfig,
}

impl OpenSearchClient {
    /// Create a new OpenSearch client connected to the specified URL.
    ///
    /// # Arguments
    ///
    /// * `url` - The OpenSearch server URL (e.g., "http://localhost:9200")
    /// * `index_config` - The index the client reads and writes
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchClient)` - A new client instance
    /// * `Err(SearchError)` - If the URL is invalid or transport setup fails
    pub fn new(url: &str, index_config: IndexConfig) -> Result<Self, SearchError> {
        let parsed_url = Url::parse(url).map_err(|e| SearchError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .build()
            .map_err(|e| SearchError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(url = %url, index = %index_config.name, "Created OpenSearch client");

        Ok(Self {
            client,
            index_config,
        })
    }

    /// The configured index name.
    pub fn index_name(&self) -> &str {
        &self.index_config.name
    }

    /// Document types recorded in the index mapping metadata.
    async fn registered_types(&self) -> Result<Vec<String>, SearchError> {
        let response = self
            .client
            .indices()
            .get_mapping(IndicesGetMappingParts::Index(&[self.index_name()]))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status_code();
        if status.as_u16() == 404 {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::mapping(format!(
                "Get mapping failed with status {}: {}",
                status, body
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchError::parse(e.to_string()))?;

        // The response is keyed by the concrete index name, which differs
        // from the configured name when that is an alias.
        let types = body
            .as_object()
            .and_then(|indices| indices.values().next())
            .and_then(|index| index["mappings"]["_meta"]["doc_types"].as_array())
            .map(|types| {
                types
                    .iter()
                    .filter_map(|t| t.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        Ok(types)
    }

    async fn send_bulk_chunk(&self, documents: &[Document]) -> Result<(), SearchError> {
        let mut body: Vec<JsonBody<Value>> = Vec::with_capacity(documents.len() * 2);
        for document in documents {
            body.push(json!({ "index": { "_id": document.doc_id() } }).into());
            body.push(document.source().into());
        }

        let response = self
            .client
            .bulk(BulkParts::Index(self.index_name()))
            .body(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status_code();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Bulk request failed");
            return Err(SearchError::bulk_index(format!(
                "Bulk request failed with status {}: {}",
                status, body
            )));
        }

        let result: Value = response
            .json()
            .await
            .map_err(|e| SearchError::parse(e.to_string()))?;

        if result["errors"].as_bool().unwrap_or(false) {
            let items = result["items"].as_array().cloned().unwrap_or_default();
            let failures: Vec<&Value> = items
                .iter()
                .filter_map(|item| item.get("index"))
                .filter(|op| op.get("error").is_some())
                .collect();

            let first_reason = failures
                .first()
                .and_then(|op| op["error"]["reason"].as_str())
                .unwrap_or("unknown reason");

            return Err(SearchError::bulk_index(format!(
                "{} of {} documents failed: {}",
                failures.len(),
                documents.len(),
                first_reason
            )));
        }

        Ok(())
    }
}

/// Errors raised before a response arrives mean the cluster is unreachable.
fn transport_error(err: opensearch::Error) -> SearchError {
    SearchError::connection(err.to_string())
}

/// Read the body of a failed response for error reporting.
async fn failure_body(response: Response) -> String {
    response.text().await.unwrap_or_default()
}

fn is_parse_failure(body: &str) -> bool {
    PARSE_FAILURE_MARKERS.iter().any(|marker| body.contains(marker))
}

fn is_missing_index(body: &str) -> bool {
    body.contains("index_not_found_exception")
}

#[async_trait]
impl SearchEngineClient for OpenSearchClient {
    async fn index_exists(&self) -> Result<bool, SearchError> {
        let response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[self.index_name()]))
            .send()
            .await
            .map_err(transport_error)?;

        Ok(response.status_code().is_success())
    }

    #[instrument(skip(self), fields(index = %self.index_config.name))]
    async fn create_index(&self) -> Result<(), SearchError> {
        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(self.index_name()))
            .body(self.index_config.settings())
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status_code();
        if !status.is_success() {
            let body = failure_body(response).await;
            // Losing a creation race to another writer is fine.
            if body.contains("resource_already_exists_exception") {
                debug!("Index already exists");
                return Ok(());
            }
            error!(status = %status, body = %body, "Index creation failed");
            return Err(SearchError::index_creation(format!(
                "Create index failed with status {}: {}",
                status, body
            )));
        }

        info!("Created search index");
        Ok(())
    }

    #[instrument(skip(self), fields(index = %self.index_config.name))]
    async fn delete_index(&self) -> Result<(), SearchError> {
        let response = self
            .client
            .indices()
            .delete(IndicesDeleteParts::Index(&[self.index_name()]))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status_code();
        if status.as_u16() == 404 {
            return Err(SearchError::not_found(self.index_name().to_string()));
        }
        if !status.is_success() {
            let body = failure_body(response).await;
            return Err(SearchError::index_creation(format!(
                "Delete index failed with status {}: {}",
                status, body
            )));
        }

        info!("Deleted search index");
        Ok(())
    }

    async fn has_mapping(&self, doc_type: &str) -> Result<bool, SearchError> {
        Ok(self
            .registered_types()
            .await?
            .iter()
            .any(|registered| registered == doc_type))
    }

    #[instrument(skip(self, mapping), fields(doc_type = %mapping.doc_type))]
    async fn put_mapping(&self, mapping: &TypeMapping) -> Result<(), SearchError> {
        let mut doc_types = self.registered_types().await?;
        if !doc_types.contains(&mapping.doc_type) {
            doc_types.push(mapping.doc_type.clone());
        }

        let mut body = mapping.to_body();
        body["_meta"] = json!({ "doc_types": doc_types });

        let response = self
            .client
            .indices()
            .put_mapping(IndicesPutMappingParts::Index(&[self.index_name()]))
            .body(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status_code();
        if !status.is_success() {
            let body = failure_body(response).await;
            error!(status = %status, body = %body, "Put mapping failed");
            return Err(SearchError::mapping(format!(
                "Put mapping failed with status {}: {}",
                status, body
            )));
        }

        debug!(fields = mapping.properties.len(), "Mapping sent");
        Ok(())
    }

    async fn index_document(&self, document: &Document) -> Result<(), SearchError> {
        let doc_id = document.doc_id();

        let response = self
            .client
            .index(IndexParts::IndexId(self.index_name(), &doc_id))
            .body(document.source())
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status_code();
        if !status.is_success() {
            let body = failure_body(response).await;
            if status.as_u16() == 400 && is_parse_failure(&body) {
                return Err(SearchError::document_rejected(format!("{}: {}", doc_id, body)));
            }
            if status.as_u16() == 404 && is_missing_index(&body) {
                return Err(SearchError::index_missing(self.index_name()));
            }
            error!(status = %status, body = %body, doc_id = %doc_id, "Index request failed");
            return Err(SearchError::index(format!(
                "Index failed with status {}: {}",
                status, body
            )));
        }

        debug!(doc_id = %doc_id, "Document indexed");
        Ok(())
    }

    #[instrument(skip(self, documents), fields(count = documents.len()))]
    async fn bulk_index(&self, doc_type: &str, documents: &[Document]) -> Result<(), SearchError> {
        for chunk in documents.chunks(self.index_config.batch_size()) {
            self.send_bulk_chunk(chunk).await?;
        }

        debug!(doc_type = %doc_type, "Bulk indexed documents");
        Ok(())
    }

    async fn delete_document(&self, doc_type: &str, id: &str) -> Result<(), SearchError> {
        let response = self
            .client
            .delete(DeleteParts::IndexId(self.index_name(), id))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status_code();
        if status.as_u16() == 404 {
            return Err(SearchError::not_found(id.to_string()));
        }
        if !status.is_success() {
            let body = failure_body(response).await;
            warn!(status = %status, body = %body, doc_type = %doc_type, "Delete request failed");
            return Err(SearchError::index(format!(
                "Delete failed with status {}: {}",
                status, body
            )));
        }

        debug!(doc_id = %id, "Document deleted");
        Ok(())
    }

    async fn refresh(&self) -> Result<(), SearchError> {
        let response = self
            .client
            .indices()
            .refresh(IndicesRefreshParts::Index(&[self.index_name()]))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status_code();
        if !status.is_success() {
            let body = failure_body(response).await;
            return Err(SearchError::index(format!(
                "Refresh failed with status {}: {}",
                status, body
            )));
        }

        Ok(())
    }

    #[instrument(skip(self, query))]
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SearchError> {
        let body = build_search_query(query);

        let response = self
            .client
            .search(SearchParts::Index(&[self.index_name()]))
            .body(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status_code();
        if !status.is_success() {
            let body = failure_body(response).await;
            error!(status = %status, body = %body, "Search request failed");
            return Err(SearchError::query(format!(
                "Search failed with status {}: {}",
                status, body
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchError::parse(e.to_string()))?;

        parse_search_response(&body)
    }

    async fn health_check(&self) -> Result<bool, SearchError> {
        let response = self
            .client
            .cluster()
            .health(ClusterHealthParts::None)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status_code().is_success() {
            return Ok(false);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchError::parse(e.to_string()))?;

        Ok(matches!(body["status"].as_str(), Some("green") | Some("yellow")))
    }
}

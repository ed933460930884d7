//! Pinecone connector over the REST API.
//!
//! The control plane lives at a fixed URL per account; every index gets its
//! own data-plane host, discovered through `describe_index`.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::config::ServiceConfig;
use crate::connectors::common::{
    check_response, create_http_client, handle_http_error, host_url, validate_url,
};
use crate::connectors::{
    ControlPlane, CreateIndexRequest, DataPlane, DistanceMetric, IdPage, IndexDescription,
    IndexStats, Metadata, NamespaceStats, QueryRequest, ScoredRecord, VectorRecord,
};
use crate::error::{Error, Result};

/// REST API version sent with every request.
pub const API_VERSION: &str = "2024-07";

const SERVICE: &str = "Pinecone";

#[derive(Debug, Deserialize)]
struct ListIndexesResponse {
    #[serde(default)]
    indexes: Vec<IndexModel>,
}

#[derive(Debug, Deserialize)]
struct IndexModel {
    name: String,
    #[serde(default)]
    dimension: Option<usize>,
    #[serde(default)]
    metric: DistanceMetric,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    status: Option<IndexStatus>,
}

#[derive(Debug, Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
    #[serde(default)]
    state: Option<String>,
}

impl From<IndexModel> for IndexDescription {
    fn from(model: IndexModel) -> Self {
        let (ready, state) = model
            .status
            .map_or((false, None), |status| (status.ready, status.state));
        Self {
            name: model.name,
            dimension: model.dimension.unwrap_or(0),
            metric: model.metric,
            host: model.host.filter(|h| !h.is_empty()),
            ready,
            state,
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateIndexBody<'a> {
    name: &'a str,
    dimension: usize,
    metric: DistanceMetric,
    spec: SpecBody<'a>,
}

#[derive(Debug, Serialize)]
struct SpecBody<'a> {
    serverless: ServerlessBody<'a>,
}

#[derive(Debug, Serialize)]
struct ServerlessBody<'a> {
    cloud: &'a str,
    region: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    // Ordered map: namespaces keep the order the service reported them in.
    #[serde(default)]
    namespaces: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    dimension: Option<usize>,
    #[serde(default)]
    index_fullness: Option<f64>,
    #[serde(default)]
    total_vector_count: u64,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    vectors: Vec<ListItem>,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct ListItem {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FetchResponse {
    #[serde(default)]
    vectors: HashMap<String, FetchedVector>,
}

#[derive(Debug, Deserialize)]
struct FetchedVector {
    id: String,
    #[serde(default)]
    values: Vec<f32>,
    #[serde(default)]
    metadata: Option<Metadata>,
}

#[derive(Debug, Serialize)]
struct UpsertBody<'a> {
    vectors: Vec<UpsertVector<'a>>,
    namespace: &'a str,
}

#[derive(Debug, Serialize)]
struct UpsertVector<'a> {
    id: &'a str,
    values: &'a [f32],
    #[serde(skip_serializing_if = "is_empty_metadata")]
    metadata: &'a Metadata,
}

fn is_empty_metadata(metadata: &&Metadata) -> bool {
    metadata.is_empty()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryBody<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_values: bool,
    include_metadata: bool,
    namespace: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<ScoredRecord>,
}

/// Pinecone control plane for one account.
pub struct PineconeService {
    api_key: String,
    control_plane_url: String,
    client: Client,
}

impl PineconeService {
    /// Creates a control-plane client from account settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is empty or the URL is invalid.
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(Error::Config("Pinecone API key is empty".to_string()));
        }
        validate_url(&config.control_plane_url)?;
        Ok(Self {
            api_key: config.api_key.clone(),
            control_plane_url: config.control_plane_url.trim_end_matches('/').to_string(),
            client: create_http_client(),
        })
    }

    fn indexes_url(&self) -> String {
        format!("{}/indexes", self.control_plane_url)
    }

    fn index_url(&self, name: &str) -> String {
        format!("{}/indexes/{}", self.control_plane_url, name)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        authorize(req, &self.api_key)
    }
}

fn is_listing_unsupported(body: &str) -> bool {
    let body = body.to_lowercase();
    body.contains("only supported for serverless")
        || (body.contains("list") && body.contains("not supported"))
}

fn authorize(req: RequestBuilder, api_key: &str) -> RequestBuilder {
    req.header("Api-Key", api_key)
        .header("X-Pinecone-API-Version", API_VERSION)
}

#[async_trait]
impl ControlPlane for PineconeService {
    fn service_type(&self) -> &'static str {
        "pinecone"
    }

    async fn list_indexes(&self) -> Result<Vec<String>> {
        let response = self
            .authorize(self.client.get(self.indexes_url()))
            .send()
            .await?;
        let body: ListIndexesResponse = check_response(response, SERVICE).await?.json().await?;
        Ok(body.indexes.into_iter().map(|idx| idx.name).collect())
    }

    async fn describe_index(&self, name: &str) -> Result<IndexDescription> {
        let response = self
            .authorize(self.client.get(self.index_url(name)))
            .send()
            .await?;
        if response.status().as_u16() == 404 {
            return Err(Error::IndexNotFound(name.to_string()));
        }
        let model: IndexModel = check_response(response, SERVICE).await?.json().await?;
        Ok(model.into())
    }

    async fn create_index(&self, request: &CreateIndexRequest) -> Result<()> {
        let body = CreateIndexBody {
            name: &request.name,
            dimension: request.dimension,
            metric: request.metric,
            spec: SpecBody {
                serverless: ServerlessBody {
                    cloud: &request.spec.cloud,
                    region: &request.spec.region,
                },
            },
        };
        debug!(
            "Creating Pinecone index '{}' ({}D, {}) in {}/{}",
            request.name, request.dimension, request.metric, request.spec.cloud, request.spec.region
        );
        let response = self
            .authorize(self.client.post(self.indexes_url()))
            .json(&body)
            .send()
            .await?;
        check_response(response, SERVICE).await?;
        Ok(())
    }

    async fn delete_index(&self, name: &str) -> Result<()> {
        let response = self
            .authorize(self.client.delete(self.index_url(name)))
            .send()
            .await?;
        if response.status().as_u16() == 404 {
            return Err(Error::IndexNotFound(name.to_string()));
        }
        check_response(response, SERVICE).await?;
        Ok(())
    }

    async fn connect(&self, index: &IndexDescription) -> Result<Box<dyn DataPlane>> {
        let host = index.host.as_deref().ok_or_else(|| {
            Error::Config(format!(
                "Index '{}' has no data-plane host yet (state: {})",
                index.name,
                index.state.as_deref().unwrap_or("unknown")
            ))
        })?;
        Ok(Box::new(PineconeIndex {
            name: index.name.clone(),
            base_url: host_url(host),
            api_key: self.api_key.clone(),
            client: self.client.clone(),
        }))
    }
}

/// Data-plane connection to one Pinecone index.
pub struct PineconeIndex {
    name: String,
    base_url: String,
    api_key: String,
    client: Client,
}

impl PineconeIndex {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl DataPlane for PineconeIndex {
    async fn describe_stats(&self) -> Result<IndexStats> {
        let response = authorize(
            self.client.post(self.url("/describe_index_stats")),
            &self.api_key,
        )
        .json(&serde_json::json!({}))
        .send()
        .await?;
        let body: StatsResponse = check_response(response, SERVICE).await?.json().await?;
        Ok(IndexStats {
            total_vector_count: body.total_vector_count,
            namespaces: body
                .namespaces
                .into_iter()
                .map(|(name, summary)| NamespaceStats {
                    vector_count: summary
                        .get("vectorCount")
                        .and_then(serde_json::Value::as_u64)
                        .unwrap_or(0),
                    name,
                })
                .collect(),
            dimension: body.dimension,
            index_fullness: body.index_fullness,
        })
    }

    async fn list_ids(
        &self,
        namespace: &str,
        limit: Option<u32>,
        pagination_token: Option<String>,
    ) -> Result<IdPage> {
        let mut query: Vec<(&str, String)> = vec![("namespace", namespace.to_string())];
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        if let Some(token) = pagination_token {
            query.push(("paginationToken", token));
        }

        let response = authorize(self.client.get(self.url("/vectors/list")), &self.api_key)
            .query(&query)
            .send()
            .await?;

        let status = response.status().as_u16();
        if matches!(status, 405 | 501) {
            debug!("List route unavailable for index '{}'", self.name);
            return Err(Error::ListingUnsupported(self.name.clone()));
        }
        if status == 400 {
            // Pod-based indexes answer 400 with a serverless-only message.
            let body = response.text().await.unwrap_or_default();
            if is_listing_unsupported(&body) {
                debug!("List rejected for index '{}': {}", self.name, body);
                return Err(Error::ListingUnsupported(self.name.clone()));
            }
            return Err(handle_http_error(status, &body, SERVICE));
        }

        let body: ListResponse = check_response(response, SERVICE).await?.json().await?;
        Ok(IdPage {
            ids: body.vectors.into_iter().map(|item| item.id).collect(),
            next: body
                .pagination
                .and_then(|p| p.next)
                .filter(|token| !token.is_empty()),
        })
    }

    async fn fetch(&self, ids: &[String], namespace: &str) -> Result<HashMap<String, VectorRecord>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut query: Vec<(&str, &str)> = ids.iter().map(|id| ("ids", id.as_str())).collect();
        query.push(("namespace", namespace));

        let response = authorize(self.client.get(self.url("/vectors/fetch")), &self.api_key)
            .query(&query)
            .send()
            .await?;
        let body: FetchResponse = check_response(response, SERVICE).await?.json().await?;

        Ok(body
            .vectors
            .into_iter()
            .map(|(key, fetched)| {
                let record = VectorRecord {
                    id: fetched.id,
                    values: fetched.values,
                    metadata: fetched.metadata.unwrap_or_default(),
                };
                (key, record)
            })
            .collect())
    }

    async fn upsert(&self, records: &[VectorRecord], namespace: &str) -> Result<usize> {
        let body = UpsertBody {
            vectors: records
                .iter()
                .map(|r| UpsertVector {
                    id: &r.id,
                    values: &r.values,
                    metadata: &r.metadata,
                })
                .collect(),
            namespace,
        };
        let response = authorize(self.client.post(self.url("/vectors/upsert")), &self.api_key)
            .json(&body)
            .send()
            .await?;
        let body: UpsertResponse = check_response(response, SERVICE).await?.json().await?;
        Ok(body.upserted_count.unwrap_or(records.len()))
    }

    async fn query(&self, request: &QueryRequest) -> Result<Vec<ScoredRecord>> {
        let body = QueryBody {
            vector: &request.vector,
            top_k: request.top_k,
            include_values: request.include_values,
            include_metadata: request.include_metadata,
            namespace: &request.namespace,
            filter: request.filter.as_ref(),
        };
        let response = authorize(self.client.post(self.url("/query")), &self.api_key)
            .json(&body)
            .send()
            .await?;
        let body: QueryResponse = check_response(response, SERVICE).await?.json().await?;
        Ok(body
            .matches
            .into_iter()
            .map(|mut m| {
                if !request.include_values {
                    m.values = None;
                }
                m
            })
            .collect())
    }
}

#[cfg(test)]
#[path = "pinecone_tests.rs"]
mod tests;

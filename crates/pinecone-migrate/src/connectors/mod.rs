//! Index service connectors.
//!
//! A connector is split the way the hosted services split their APIs: a
//! [`ControlPlane`] manages indexes for one account, and a [`DataPlane`]
//! reads and writes the records of one index. The pipeline and the index
//! client only ever talk to these traits.

pub mod common;
pub mod memory;
pub mod pinecone;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Record metadata: string keys to JSON scalars or strings.
pub type Metadata = HashMap<String, serde_json::Value>;

/// A single vector record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Record id, unique within a namespace.
    pub id: String,
    /// Vector values; length must equal the index dimension.
    pub values: Vec<f32>,
    /// Metadata (empty when the record has none).
    #[serde(default)]
    pub metadata: Metadata,
}

impl VectorRecord {
    /// Creates a record without metadata.
    pub fn new(id: impl Into<String>, values: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            values,
            metadata: Metadata::new(),
        }
    }

    /// Sets the metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Distance metric of an index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Cosine similarity (default).
    #[default]
    Cosine,
    /// Euclidean distance.
    Euclidean,
    /// Dot product.
    #[serde(rename = "dotproduct")]
    DotProduct,
}

impl DistanceMetric {
    /// Wire name of the metric.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Euclidean => "euclidean",
            Self::DotProduct => "dotproduct",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "euclidean" => Ok(Self::Euclidean),
            "dotproduct" | "dot-product" | "dot_product" | "dot" => Ok(Self::DotProduct),
            other => Err(Error::Config(format!(
                "Unknown metric '{}'. Allowed: cosine, euclidean, dotproduct",
                other
            ))),
        }
    }
}

/// Configuration of an existing index, as reported by the control plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDescription {
    /// Index name.
    pub name: String,
    /// Vector dimension.
    pub dimension: usize,
    /// Distance metric.
    pub metric: DistanceMetric,
    /// Data-plane host, once provisioned.
    pub host: Option<String>,
    /// Whether the index accepts traffic.
    pub ready: bool,
    /// Provisioning state reported by the service (e.g. "Initializing").
    pub state: Option<String>,
}

/// Serverless placement of a new index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerlessSpec {
    /// Cloud provider.
    pub cloud: String,
    /// Cloud region.
    pub region: String,
}

impl Default for ServerlessSpec {
    fn default() -> Self {
        Self {
            cloud: "aws".to_string(),
            region: "us-east-1".to_string(),
        }
    }
}

/// Request to create an index.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndexRequest {
    /// Index name.
    pub name: String,
    /// Vector dimension.
    pub dimension: usize,
    /// Distance metric.
    pub metric: DistanceMetric,
    /// Placement.
    pub spec: ServerlessSpec,
}

/// Record count of one namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceStats {
    /// Namespace name ("" is the default namespace).
    pub name: String,
    /// Number of records.
    pub vector_count: u64,
}

/// Point-in-time statistics of an index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Total records across namespaces.
    pub total_vector_count: u64,
    /// Per-namespace counts, in the order the service reported them.
    pub namespaces: Vec<NamespaceStats>,
    /// Dimension, when reported.
    pub dimension: Option<usize>,
    /// Fullness in `[0, 1]`, when reported.
    pub index_fullness: Option<f64>,
}

/// One page of record ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdPage {
    /// Ids in this page.
    pub ids: Vec<String>,
    /// Continuation token; `None` on the last page.
    pub next: Option<String>,
}

/// Similarity query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRequest {
    /// Query vector.
    pub vector: Vec<f32>,
    /// Namespace to search.
    pub namespace: String,
    /// Number of matches to return.
    pub top_k: usize,
    /// Return vector values with matches.
    pub include_values: bool,
    /// Return metadata with matches.
    pub include_metadata: bool,
    /// Optional metadata filter.
    pub filter: Option<serde_json::Value>,
}

/// A ranked query match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    /// Record id.
    pub id: String,
    /// Similarity score (or distance, for euclidean indexes).
    pub score: f32,
    /// Values, when requested.
    #[serde(default)]
    pub values: Option<Vec<f32>>,
    /// Metadata, when requested.
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

/// Account-level index management.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Get the service type name.
    fn service_type(&self) -> &'static str;

    /// Names of all indexes visible to the credentials.
    async fn list_indexes(&self) -> Result<Vec<String>>;

    /// Configuration of one index.
    async fn describe_index(&self, name: &str) -> Result<IndexDescription>;

    /// Creates an index. Returns once the request is accepted, not when ready.
    async fn create_index(&self, request: &CreateIndexRequest) -> Result<()>;

    /// Deletes an index.
    async fn delete_index(&self, name: &str) -> Result<()>;

    /// Opens a data-plane connection to a described index.
    async fn connect(&self, index: &IndexDescription) -> Result<Box<dyn DataPlane>>;
}

/// Record operations on one index.
#[async_trait]
pub trait DataPlane: Send + Sync {
    /// Aggregate statistics.
    async fn describe_stats(&self) -> Result<IndexStats>;

    /// Lists one page of ids in a namespace.
    ///
    /// Returns [`Error::ListingUnsupported`] when the index cannot enumerate ids.
    async fn list_ids(
        &self,
        namespace: &str,
        limit: Option<u32>,
        pagination_token: Option<String>,
    ) -> Result<IdPage>;

    /// Fetches full records by id. Unknown ids are absent from the result.
    async fn fetch(&self, ids: &[String], namespace: &str) -> Result<HashMap<String, VectorRecord>>;

    /// Upserts records; returns the number written.
    async fn upsert(&self, records: &[VectorRecord], namespace: &str) -> Result<usize>;

    /// Similarity query.
    async fn query(&self, request: &QueryRequest) -> Result<Vec<ScoredRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_parse() {
        assert_eq!(
            "cosine".parse::<DistanceMetric>().unwrap(),
            DistanceMetric::Cosine
        );
        assert_eq!(
            "Dot-Product".parse::<DistanceMetric>().unwrap(),
            DistanceMetric::DotProduct
        );
        assert!("manhattan".parse::<DistanceMetric>().is_err());
    }

    #[test]
    fn test_metric_wire_name() {
        let json = serde_json::to_string(&DistanceMetric::DotProduct).unwrap();
        assert_eq!(json, "\"dotproduct\"");
        let parsed: DistanceMetric = serde_json::from_str("\"euclidean\"").unwrap();
        assert_eq!(parsed, DistanceMetric::Euclidean);
    }

    #[test]
    fn test_record_metadata_defaults_to_empty() {
        let record: VectorRecord =
            serde_json::from_str(r#"{"id":"a","values":[0.1,0.2]}"#).unwrap();
        assert_eq!(record.id, "a");
        assert!(record.metadata.is_empty());
    }

    #[test]
    fn test_serverless_spec_default() {
        let spec = ServerlessSpec::default();
        assert_eq!(spec.cloud, "aws");
        assert_eq!(spec.region, "us-east-1");
    }
}

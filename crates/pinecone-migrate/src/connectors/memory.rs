//! In-process index service.
//!
//! Behaves like a hosted index service: dimension checks on upsert, sorted
//! paginated id listing, metadata filters on query and an optional
//! provisioning delay. Cloned handles share the same state, so a caller can
//! hand one clone to a client and inspect the other.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::connectors::{
    ControlPlane, CreateIndexRequest, DataPlane, DistanceMetric, IdPage, IndexDescription,
    IndexStats, Metadata, NamespaceStats, QueryRequest, ScoredRecord, ServerlessSpec,
    VectorRecord,
};
use crate::error::{Error, Result};

const DEFAULT_LIST_PAGE_SIZE: usize = 100;

/// An upsert call observed by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertCall {
    /// Target index.
    pub index: String,
    /// Target namespace.
    pub namespace: String,
    /// Record ids in call order.
    pub ids: Vec<String>,
}

#[derive(Debug, Clone)]
struct MemoryOptions {
    list_page_size: usize,
    id_listing: bool,
    provisioning_polls: u32,
    namespace_stats: bool,
}

impl Default for MemoryOptions {
    fn default() -> Self {
        Self {
            list_page_size: DEFAULT_LIST_PAGE_SIZE,
            id_listing: true,
            provisioning_polls: 0,
            namespace_stats: true,
        }
    }
}

#[derive(Debug)]
struct MemoryIndex {
    dimension: usize,
    metric: DistanceMetric,
    spec: ServerlessSpec,
    namespaces: BTreeMap<String, BTreeMap<String, VectorRecord>>,
    pending_polls: u32,
}

#[derive(Debug, Default)]
struct MemoryState {
    indexes: BTreeMap<String, MemoryIndex>,
    upserts: Vec<UpsertCall>,
}

/// In-memory index service for one account.
#[derive(Debug, Clone, Default)]
pub struct MemoryService {
    state: Arc<Mutex<MemoryState>>,
    options: MemoryOptions,
}

impl MemoryService {
    /// Creates an empty service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default number of ids per list page.
    #[must_use]
    pub fn with_list_page_size(mut self, size: usize) -> Self {
        self.options.list_page_size = size.max(1);
        self
    }

    /// Makes id listing unavailable, like pod-based index topologies.
    #[must_use]
    pub fn without_id_listing(mut self) -> Self {
        self.options.id_listing = false;
        self
    }

    /// Newly created indexes report "not ready" for this many describe calls.
    #[must_use]
    pub fn with_provisioning_polls(mut self, polls: u32) -> Self {
        self.options.provisioning_polls = polls;
        self
    }

    /// Stats report totals only, without a per-namespace breakdown.
    #[must_use]
    pub fn without_namespace_stats(mut self) -> Self {
        self.options.namespace_stats = false;
        self
    }

    /// Adds a ready index directly.
    pub fn insert_index(&self, name: &str, dimension: usize, metric: DistanceMetric) {
        self.state.lock().indexes.insert(
            name.to_string(),
            MemoryIndex {
                dimension,
                metric,
                spec: ServerlessSpec::default(),
                namespaces: BTreeMap::new(),
                pending_polls: 0,
            },
        );
    }

    /// Writes records without recording an upsert call.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is missing or a vector has the wrong length.
    pub fn seed(&self, index: &str, namespace: &str, records: Vec<VectorRecord>) -> Result<()> {
        let mut state = self.state.lock();
        write_records(&mut state, index, namespace, &records)
    }

    /// Records of a namespace, sorted by id.
    #[must_use]
    pub fn records(&self, index: &str, namespace: &str) -> Vec<VectorRecord> {
        self.state
            .lock()
            .indexes
            .get(index)
            .and_then(|idx| idx.namespaces.get(namespace))
            .map(|ns| ns.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Every upsert call issued through a data-plane connection.
    #[must_use]
    pub fn upsert_calls(&self) -> Vec<UpsertCall> {
        self.state.lock().upserts.clone()
    }

    /// Dimension and metric of an index, if it exists.
    #[must_use]
    pub fn index_shape(&self, index: &str) -> Option<(usize, DistanceMetric)> {
        self.state
            .lock()
            .indexes
            .get(index)
            .map(|idx| (idx.dimension, idx.metric))
    }

    /// Placement an index was created with.
    #[must_use]
    pub fn index_spec(&self, index: &str) -> Option<ServerlessSpec> {
        self.state.lock().indexes.get(index).map(|idx| idx.spec.clone())
    }
}

fn write_records(
    state: &mut MemoryState,
    index: &str,
    namespace: &str,
    records: &[VectorRecord],
) -> Result<()> {
    let idx = state
        .indexes
        .get_mut(index)
        .ok_or_else(|| Error::IndexNotFound(index.to_string()))?;

    // The whole request is rejected if any vector is malformed.
    if let Some(bad) = records.iter().find(|r| r.values.len() != idx.dimension) {
        return Err(Error::DimensionMismatch {
            expected: idx.dimension,
            actual: bad.values.len(),
        });
    }

    let ns = idx.namespaces.entry(namespace.to_string()).or_default();
    for record in records {
        ns.insert(record.id.clone(), record.clone());
    }
    Ok(())
}

#[async_trait]
impl ControlPlane for MemoryService {
    fn service_type(&self) -> &'static str {
        "memory"
    }

    async fn list_indexes(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().indexes.keys().cloned().collect())
    }

    async fn describe_index(&self, name: &str) -> Result<IndexDescription> {
        let mut state = self.state.lock();
        let idx = state
            .indexes
            .get_mut(name)
            .ok_or_else(|| Error::IndexNotFound(name.to_string()))?;

        let ready = if idx.pending_polls > 0 {
            idx.pending_polls -= 1;
            false
        } else {
            true
        };

        Ok(IndexDescription {
            name: name.to_string(),
            dimension: idx.dimension,
            metric: idx.metric,
            host: Some(format!("memory://{}", name)),
            ready,
            state: Some(if ready { "Ready" } else { "Initializing" }.to_string()),
        })
    }

    async fn create_index(&self, request: &CreateIndexRequest) -> Result<()> {
        if request.dimension == 0 {
            return Err(Error::Config("dimension must be greater than 0".to_string()));
        }
        let mut state = self.state.lock();
        if state.indexes.contains_key(&request.name) {
            return Err(Error::Service {
                service: "memory".to_string(),
                status: 409,
                body: format!("Index '{}' already exists", request.name),
            });
        }
        state.indexes.insert(
            request.name.clone(),
            MemoryIndex {
                dimension: request.dimension,
                metric: request.metric,
                spec: request.spec.clone(),
                namespaces: BTreeMap::new(),
                pending_polls: self.options.provisioning_polls,
            },
        );
        Ok(())
    }

    async fn delete_index(&self, name: &str) -> Result<()> {
        self.state
            .lock()
            .indexes
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::IndexNotFound(name.to_string()))
    }

    async fn connect(&self, index: &IndexDescription) -> Result<Box<dyn DataPlane>> {
        if !self.state.lock().indexes.contains_key(&index.name) {
            return Err(Error::IndexNotFound(index.name.clone()));
        }
        Ok(Box::new(MemoryIndexHandle {
            name: index.name.clone(),
            state: Arc::clone(&self.state),
            options: self.options.clone(),
        }))
    }
}

/// Data-plane handle on one in-memory index.
pub struct MemoryIndexHandle {
    name: String,
    state: Arc<Mutex<MemoryState>>,
    options: MemoryOptions,
}

#[async_trait]
impl DataPlane for MemoryIndexHandle {
    async fn describe_stats(&self) -> Result<IndexStats> {
        let state = self.state.lock();
        let idx = state
            .indexes
            .get(&self.name)
            .ok_or_else(|| Error::IndexNotFound(self.name.clone()))?;

        let namespaces: Vec<NamespaceStats> = idx
            .namespaces
            .iter()
            .filter(|(_, records)| !records.is_empty())
            .map(|(name, records)| NamespaceStats {
                name: name.clone(),
                vector_count: records.len() as u64,
            })
            .collect();
        let total = namespaces.iter().map(|ns| ns.vector_count).sum();

        Ok(IndexStats {
            total_vector_count: total,
            namespaces: if self.options.namespace_stats {
                namespaces
            } else {
                Vec::new()
            },
            dimension: Some(idx.dimension),
            index_fullness: Some(0.0),
        })
    }

    async fn list_ids(
        &self,
        namespace: &str,
        limit: Option<u32>,
        pagination_token: Option<String>,
    ) -> Result<IdPage> {
        if !self.options.id_listing {
            return Err(Error::ListingUnsupported(self.name.clone()));
        }

        let offset = match pagination_token {
            Some(token) => token.parse::<usize>().map_err(|_| Error::Service {
                service: "memory".to_string(),
                status: 400,
                body: format!("Invalid pagination token '{}'", token),
            })?,
            None => 0,
        };
        let limit = limit.map_or(self.options.list_page_size, |l| l.max(1) as usize);

        let state = self.state.lock();
        let idx = state
            .indexes
            .get(&self.name)
            .ok_or_else(|| Error::IndexNotFound(self.name.clone()))?;

        let all: Vec<&String> = idx
            .namespaces
            .get(namespace)
            .map(|ns| ns.keys().collect())
            .unwrap_or_default();
        let ids: Vec<String> = all.iter().skip(offset).take(limit).map(|id| (*id).clone()).collect();
        let end = offset + ids.len();
        let next = (end < all.len()).then(|| end.to_string());

        Ok(IdPage { ids, next })
    }

    async fn fetch(&self, ids: &[String], namespace: &str) -> Result<HashMap<String, VectorRecord>> {
        let state = self.state.lock();
        let idx = state
            .indexes
            .get(&self.name)
            .ok_or_else(|| Error::IndexNotFound(self.name.clone()))?;

        let Some(ns) = idx.namespaces.get(namespace) else {
            return Ok(HashMap::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| ns.get(id).map(|r| (id.clone(), r.clone())))
            .collect())
    }

    async fn upsert(&self, records: &[VectorRecord], namespace: &str) -> Result<usize> {
        let mut state = self.state.lock();
        write_records(&mut state, &self.name, namespace, records)?;
        state.upserts.push(UpsertCall {
            index: self.name.clone(),
            namespace: namespace.to_string(),
            ids: records.iter().map(|r| r.id.clone()).collect(),
        });
        Ok(records.len())
    }

    async fn query(&self, request: &QueryRequest) -> Result<Vec<ScoredRecord>> {
        let state = self.state.lock();
        let idx = state
            .indexes
            .get(&self.name)
            .ok_or_else(|| Error::IndexNotFound(self.name.clone()))?;

        if request.vector.len() != idx.dimension {
            return Err(Error::DimensionMismatch {
                expected: idx.dimension,
                actual: request.vector.len(),
            });
        }

        let mut matches = Vec::new();
        if let Some(ns) = idx.namespaces.get(&request.namespace) {
            for record in ns.values() {
                if let Some(filter) = &request.filter {
                    if !matches_filter(&record.metadata, filter)? {
                        continue;
                    }
                }
                matches.push(ScoredRecord {
                    id: record.id.clone(),
                    score: score(idx.metric, &request.vector, &record.values),
                    values: request.include_values.then(|| record.values.clone()),
                    metadata: request.include_metadata.then(|| record.metadata.clone()),
                });
            }
        }

        match idx.metric {
            DistanceMetric::Euclidean => matches.sort_by(|a, b| a.score.total_cmp(&b.score)),
            _ => matches.sort_by(|a, b| b.score.total_cmp(&a.score)),
        }
        matches.truncate(request.top_k);
        Ok(matches)
    }
}

/// Similarity for cosine/dot product, squared distance for euclidean.
fn score(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        DistanceMetric::DotProduct => a.iter().zip(b).map(|(x, y)| x * y).sum(),
        DistanceMetric::Euclidean => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum(),
        DistanceMetric::Cosine => {
            let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
            let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
            let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm_a == 0.0 || norm_b == 0.0 {
                0.0
            } else {
                dot / (norm_a * norm_b)
            }
        }
    }
}

/// Evaluates a metadata filter (`$eq`, `$ne`, `$in`, `$nin`, `$gt`, `$gte`,
/// `$lt`, `$lte`, `$and`, `$or`; a bare value means `$eq`).
fn matches_filter(metadata: &Metadata, filter: &Value) -> Result<bool> {
    let Value::Object(clauses) = filter else {
        return Err(Error::Config("Filter must be a JSON object".to_string()));
    };

    for (key, condition) in clauses {
        let ok = match key.as_str() {
            "$and" => all_of(metadata, condition, true)?,
            "$or" => all_of(metadata, condition, false)?,
            field => matches_condition(metadata.get(field), condition)?,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn all_of(metadata: &Metadata, clauses: &Value, conjunction: bool) -> Result<bool> {
    let Value::Array(items) = clauses else {
        return Err(Error::Config("$and/$or expects an array".to_string()));
    };
    for item in items {
        let ok = matches_filter(metadata, item)?;
        if conjunction && !ok {
            return Ok(false);
        }
        if !conjunction && ok {
            return Ok(true);
        }
    }
    Ok(conjunction)
}

fn matches_condition(value: Option<&Value>, condition: &Value) -> Result<bool> {
    let Value::Object(ops) = condition else {
        return Ok(value == Some(condition));
    };

    for (op, operand) in ops {
        let ok = match op.as_str() {
            "$eq" => value == Some(operand),
            "$ne" => value != Some(operand),
            "$in" => operand
                .as_array()
                .is_some_and(|items| value.is_some_and(|v| items.contains(v))),
            "$nin" => operand
                .as_array()
                .is_some_and(|items| value.map_or(true, |v| !items.contains(v))),
            "$gt" | "$gte" | "$lt" | "$lte" => {
                match (value.and_then(Value::as_f64), operand.as_f64()) {
                    (Some(v), Some(o)) => match op.as_str() {
                        "$gt" => v > o,
                        "$gte" => v >= o,
                        "$lt" => v < o,
                        _ => v <= o,
                    },
                    _ => false,
                }
            }
            other => {
                return Err(Error::Config(format!(
                    "Unsupported filter operator '{}'",
                    other
                )))
            }
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

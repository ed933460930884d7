//! Index client: one named index under one set of credentials.
//!
//! Every operation returns a [`Result`] and logs its failure before handing
//! it back, so callers decide whether to stop without losing the diagnostic.

use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::{IndexDefaults, ServiceConfig};
use crate::connectors::pinecone::PineconeService;
use crate::connectors::{
    ControlPlane, CreateIndexRequest, DataPlane, DistanceMetric, IdPage, IndexDescription,
    IndexStats, QueryRequest, ScoredRecord, VectorRecord,
};
use crate::embeddings::{Embedder, DEFAULT_EMBEDDING_MODEL};
use crate::error::{Error, Result};
use crate::supplier::Supplier;

/// Records per upsert call when the caller has no preference.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Query parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    /// Namespace to search.
    pub namespace: String,
    /// Number of matches.
    pub top_k: usize,
    /// Return vector values.
    pub include_values: bool,
    /// Return metadata.
    pub include_metadata: bool,
    /// Metadata filter.
    pub filter: Option<serde_json::Value>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            top_k: 20,
            include_values: false,
            include_metadata: true,
            filter: None,
        }
    }
}

/// Client bound to a single index.
pub struct IndexClient {
    service: Arc<dyn ControlPlane>,
    index_name: String,
    connection: Option<Box<dyn DataPlane>>,
    defaults: IndexDefaults,
    embedder: Option<Arc<dyn Embedder>>,
    show_progress: bool,
}

impl IndexClient {
    /// Creates a client for `index_name` on `service`. Nothing is contacted yet.
    pub fn new(service: Arc<dyn ControlPlane>, index_name: impl Into<String>) -> Self {
        Self {
            service,
            index_name: index_name.into(),
            connection: None,
            defaults: IndexDefaults::default(),
            embedder: None,
            show_progress: true,
        }
    }

    /// Creates a client for a Pinecone index.
    ///
    /// # Errors
    ///
    /// Returns an error if the account settings are invalid.
    pub fn pinecone(config: &ServiceConfig, index_name: impl Into<String>) -> Result<Self> {
        let service = PineconeService::new(config)?;
        Ok(Self::new(Arc::new(service), index_name))
    }

    /// Shape used when the index has to be created implicitly.
    #[must_use]
    pub fn with_defaults(mut self, defaults: IndexDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Embedding provider for text operations.
    #[must_use]
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Enables or disables the upsert progress bar.
    #[must_use]
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Name of the bound index.
    #[must_use]
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// Backend type of the underlying service.
    #[must_use]
    pub fn service_type(&self) -> &'static str {
        self.service.service_type()
    }

    /// Names of every index visible to the credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the service cannot be reached or rejects the key.
    pub async fn list_indexes(&self) -> Result<Vec<String>> {
        self.service
            .list_indexes()
            .await
            .inspect_err(|e| error!("Failed to list indexes: {}", e))
    }

    /// Whether the bound index exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the index list cannot be read.
    pub async fn exists(&self) -> Result<bool> {
        Ok(self.list_indexes().await?.contains(&self.index_name))
    }

    /// Creates the index. An existing index is kept unless `replace_existing`
    /// is set, in which case it is deleted and recreated.
    ///
    /// # Errors
    ///
    /// Returns an error if any service call fails.
    pub async fn create_index(
        &mut self,
        dimension: usize,
        metric: DistanceMetric,
        replace_existing: bool,
    ) -> Result<()> {
        if self.exists().await? {
            if !replace_existing {
                info!(
                    "Index '{}' already exists. Skipping creation.",
                    self.index_name
                );
                return Ok(());
            }
            info!(
                "Index '{}' already exists. Deleting and recreating.",
                self.index_name
            );
            self.delete_index().await?;
        }

        self.connection = None;
        self.create_remote(dimension, metric).await
    }

    async fn create_remote(&self, dimension: usize, metric: DistanceMetric) -> Result<()> {
        info!(
            "Creating index '{}' with dimension {} and metric '{}'",
            self.index_name, dimension, metric
        );
        let request = CreateIndexRequest {
            name: self.index_name.clone(),
            dimension,
            metric,
            spec: self.defaults.spec.clone(),
        };
        self.service
            .create_index(&request)
            .await
            .inspect_err(|e| error!("Failed to create index '{}': {}", self.index_name, e))?;
        info!("Index '{}' created", self.index_name);
        Ok(())
    }

    /// Deletes the index. Deleting an absent index is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails.
    pub async fn delete_index(&mut self) -> Result<()> {
        self.connection = None;
        if !self.exists().await? {
            info!("Index '{}' does not exist", self.index_name);
            return Ok(());
        }
        self.service
            .delete_index(&self.index_name)
            .await
            .inspect_err(|e| error!("Failed to delete index '{}': {}", self.index_name, e))?;
        info!("Index '{}' deleted", self.index_name);
        Ok(())
    }

    /// Configuration of the bound index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexNotFound`] if the index is absent.
    pub async fn describe_index(&self) -> Result<IndexDescription> {
        self.service
            .describe_index(&self.index_name)
            .await
            .inspect_err(|e| error!("Failed to describe index '{}': {}", self.index_name, e))
    }

    /// Data-plane connection, opened on first use. A missing index is
    /// created with the configured defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be described, created or reached.
    pub async fn connection(&mut self) -> Result<&dyn DataPlane> {
        if self.connection.is_none() {
            let connection = self.open_connection().await?;
            self.connection = Some(connection);
        }
        self.connection
            .as_deref()
            .ok_or_else(|| Error::Config(format!("No connection to '{}'", self.index_name)))
    }

    async fn open_connection(&self) -> Result<Box<dyn DataPlane>> {
        if self.exists().await? {
            debug!("Index '{}' found, connecting", self.index_name);
        } else {
            info!(
                "Index '{}' does not exist, creating it ({}D, {})",
                self.index_name, self.defaults.dimension, self.defaults.metric
            );
            self.create_remote(self.defaults.dimension, self.defaults.metric)
                .await?;
        }
        let description = self.describe_index().await?;
        self.service
            .connect(&description)
            .await
            .inspect_err(|e| error!("Failed to connect to index '{}': {}", self.index_name, e))
    }

    /// Aggregate statistics of the index.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or the stats call fails.
    pub async fn describe_stats(&mut self) -> Result<IndexStats> {
        let name = self.index_name.clone();
        self.connection()
            .await?
            .describe_stats()
            .await
            .inspect_err(|e| error!("Failed to read stats of '{}': {}", name, e))
    }

    /// One page of record ids.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ListingUnsupported`] when the index cannot enumerate
    /// ids, or any transport error.
    pub async fn list_ids(
        &mut self,
        namespace: &str,
        limit: Option<u32>,
        pagination_token: Option<String>,
    ) -> Result<IdPage> {
        let name = self.index_name.clone();
        self.connection()
            .await?
            .list_ids(namespace, limit, pagination_token)
            .await
            .inspect_err(|e| error!("Failed to list ids of '{}/{}': {}", name, namespace, e))
    }

    /// Full records by id. Unknown ids are absent from the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch call fails.
    pub async fn fetch(
        &mut self,
        ids: &[String],
        namespace: &str,
    ) -> Result<HashMap<String, VectorRecord>> {
        let name = self.index_name.clone();
        self.connection()
            .await?
            .fetch(ids, namespace)
            .await
            .inspect_err(|e| error!("Failed to fetch from '{}/{}': {}", name, namespace, e))
    }

    /// Upserts `records` in order, `batch_size` per call. Chunks already
    /// written stay written if a later one fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero batch size, or the first failing
    /// call's error.
    pub async fn upsert_batch(
        &mut self,
        records: &[VectorRecord],
        namespace: &str,
        batch_size: usize,
    ) -> Result<usize> {
        if batch_size == 0 {
            error!("Upsert into '{}' rejected: batch size is 0", self.index_name);
            return Err(Error::Config(
                "batch_size must be greater than 0".to_string(),
            ));
        }
        if records.is_empty() {
            info!("No records to upsert into '{}'", self.index_name);
            return Ok(0);
        }

        let name = self.index_name.clone();
        let show_progress = self.show_progress;
        let index = self.connection().await?;

        let batches = records.len().div_ceil(batch_size);
        let progress = show_progress.then(|| create_progress_bar(records.len() as u64));
        let mut written = 0;

        for (i, chunk) in records.chunks(batch_size).enumerate() {
            let count = index.upsert(chunk, namespace).await.inspect_err(|e| {
                error!(
                    "Upsert batch {}/{} into '{}/{}' failed: {}",
                    i + 1,
                    batches,
                    name,
                    namespace,
                    e
                );
            })?;
            written += count;
            if let Some(pb) = &progress {
                pb.inc(chunk.len() as u64);
            }
        }

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }
        debug!(
            "Upserted {} records into '{}/{}' in {} batches",
            written, name, namespace, batches
        );
        Ok(written)
    }

    /// Similarity search.
    ///
    /// # Errors
    ///
    /// Returns an error if the query call fails.
    pub async fn query(
        &mut self,
        vector: &[f32],
        options: &QueryOptions,
    ) -> Result<Vec<ScoredRecord>> {
        let name = self.index_name.clone();
        let request = QueryRequest {
            vector: vector.to_vec(),
            namespace: options.namespace.clone(),
            top_k: options.top_k,
            include_values: options.include_values,
            include_metadata: options.include_metadata,
            filter: options.filter.clone(),
        };
        self.connection()
            .await?
            .query(&request)
            .await
            .inspect_err(|e| error!("Query on '{}' failed: {}", name, e))
    }

    /// Embeds `texts` with the configured embedder.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when no embedder is configured, or the
    /// embedder's error.
    pub async fn create_embeddings(&self, texts: &[String], model: &str) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            debug!("No texts to embed");
            return Ok(Vec::new());
        }
        let embedder = self.embedder.as_ref().ok_or_else(|| {
            error!("No embedder configured for index '{}'", self.index_name);
            Error::Config("No embedding provider configured".to_string())
        })?;
        embedder
            .embed(texts, model)
            .await
            .inspect_err(|e| error!("Error creating embeddings: {}", e))
    }

    /// Embeds a supplier profile and stores it under a fresh random id.
    /// Returns the id.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding or upserting fails.
    pub async fn upsert_supplier(&mut self, supplier: &Supplier, namespace: &str) -> Result<String> {
        let text = supplier.text();
        let values = self
            .create_embeddings(std::slice::from_ref(&text), DEFAULT_EMBEDDING_MODEL)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                error!("Failed to create embedding for supplier '{}'", supplier.name);
                Error::Embedding(format!("no embedding returned for '{}'", supplier.name))
            })?;

        let id = Uuid::new_v4().simple().to_string();
        let record = VectorRecord::new(id.clone(), values).with_metadata(supplier.metadata(&text));
        self.upsert_batch(std::slice::from_ref(&record), namespace, 1)
            .await?;

        info!(
            "Supplier '{}' upserted into namespace '{}' as {}",
            supplier.name, namespace, id
        );
        Ok(id)
    }
}

pub(crate) fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = if total > 0 {
        ProgressBar::new(total)
    } else {
        ProgressBar::new_spinner()
    };

    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    pb
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

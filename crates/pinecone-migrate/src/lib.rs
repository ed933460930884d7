// Migration tool - pedantic lints relaxed for CLI ergonomics
#![allow(clippy::pedantic)]

//! # Pinecone Index Migration
//!
//! `pinecone-migrate` copies every record of a Pinecone index (all
//! namespaces, vectors and metadata) into another index, usually under a
//! different account. It also ships a small management client for one index:
//! create, delete, stats, upsert, query and text embedding.
//!
//! ## Quick Start
//!
//! ```bash
//! export PINECONE_SOURCE_API_KEY=...
//! export PINECONE_DEST_API_KEY=...
//!
//! # Copy "products" into "products" on the destination account
//! pinecone-migrate products
//!
//! # Copy into a differently named index, preview only
//! pinecone-migrate products products-eu --dry-run
//! ```
//!
//! ## Configuration Example
//!
//! ```yaml
//! source:
//!   api_key: pc-source-key
//!   index: products
//!
//! destination:
//!   api_key: pc-dest-key
//!   index: products-eu
//!
//! options:
//!   page_size: 100
//!   ready_timeout_secs: 300
//!   spec:
//!     cloud: aws
//!     region: eu-west-1
//! ```
//!
//! ## Backends
//!
//! The pipeline and the client only talk to the [`ControlPlane`] and
//! [`DataPlane`] traits. [`PineconeService`] speaks the Pinecone REST API;
//! [`MemoryService`] keeps everything in process.

#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod connectors;
pub mod embeddings;
pub mod error;
pub mod pipeline;
pub mod supplier;
pub mod wizard;

pub use client::{IndexClient, QueryOptions, DEFAULT_BATCH_SIZE};
pub use config::{EndpointConfig, IndexDefaults, MigrationConfig, MigrationOptions, ServiceConfig};
pub use connectors::memory::MemoryService;
pub use connectors::pinecone::PineconeService;
pub use connectors::{
    ControlPlane, DataPlane, DistanceMetric, IndexDescription, IndexStats, ScoredRecord,
    VectorRecord,
};
pub use embeddings::{Embedder, OpenAiEmbedder, DEFAULT_EMBEDDING_MODEL};
pub use error::{Error, Result};
pub use pipeline::{MigrationStats, NamespaceFailure, Pipeline};
pub use supplier::Supplier;

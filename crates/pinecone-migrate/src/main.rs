//! Pinecone Migration CLI
//!
//! Copies a Pinecone index into another index (usually under another
//! account) and offers a few management commands for a single index.

// CLI tool - relax pedantic lints for ergonomics
#![allow(clippy::pedantic)]

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use pinecone_migrate::config::{
    clean_api_key, API_KEY_VAR, DEFAULT_CONTROL_PLANE_URL, DEST_API_KEY_VAR, OPENAI_API_KEY_VAR,
    SOURCE_API_KEY_VAR,
};
use pinecone_migrate::connectors::ServerlessSpec;
use pinecone_migrate::pipeline::EXIT_FATAL;
use pinecone_migrate::supplier::DEFAULT_SUPPLIER_NAMESPACE;
use pinecone_migrate::wizard::{Wizard, WizardUI};
use pinecone_migrate::{
    ControlPlane, DistanceMetric, Error, IndexClient, IndexDefaults, MigrationConfig,
    OpenAiEmbedder, PineconeService, Pipeline, QueryOptions, ServiceConfig, Supplier,
    DEFAULT_EMBEDDING_MODEL,
};

#[derive(Parser)]
#[command(name = "pinecone-migrate")]
#[command(version)]
#[command(about = "Copy a Pinecone index into another index, across accounts", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
#[command(after_help = "An index named like a subcommand (indexes, stats, create, delete, query, \
add-supplier) must follow `--`, e.g. `pinecone-migrate -- stats stats-copy`.")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Source index name (prompted for when omitted; put `--` before names
    /// that collide with a subcommand)
    source_index: Option<String>,

    /// Destination index name (defaults to the source name)
    dest_index: Option<String>,

    /// API key of the source account
    #[arg(long, env = SOURCE_API_KEY_VAR, hide_env_values = true)]
    source_api_key: Option<String>,

    /// API key of the destination account
    #[arg(long, env = DEST_API_KEY_VAR, hide_env_values = true)]
    dest_api_key: Option<String>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Dry run mode (list and fetch, don't write to destination)
    #[arg(long)]
    dry_run: bool,

    /// Ids requested per list call
    #[arg(long)]
    page_size: Option<u32>,

    /// Seconds to wait for a new destination index (0 = no limit)
    #[arg(long, value_name = "SECS")]
    ready_timeout: Option<u64>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Args)]
struct ServiceArgs {
    /// Pinecone API key
    #[arg(long, env = API_KEY_VAR, hide_env_values = true)]
    api_key: Option<String>,

    /// Control-plane URL
    #[arg(long, default_value = DEFAULT_CONTROL_PLANE_URL)]
    control_plane_url: String,
}

impl ServiceArgs {
    fn config(&self) -> anyhow::Result<ServiceConfig> {
        let key = self
            .api_key
            .as_deref()
            .map(clean_api_key)
            .filter(|k| !k.is_empty())
            .with_context(|| format!("Missing API key: set {} or pass --api-key", API_KEY_VAR))?;
        Ok(ServiceConfig::new(key).with_control_plane_url(&self.control_plane_url))
    }

    fn client(&self, index: &str) -> anyhow::Result<IndexClient> {
        Ok(IndexClient::pinecone(&self.config()?, index)?)
    }

    /// Client for an index that must already exist.
    async fn existing_client(&self, index: &str) -> anyhow::Result<IndexClient> {
        let client = self.client(index)?;
        if !client.exists().await? {
            return Err(Error::IndexNotFound(index.to_string()).into());
        }
        Ok(client)
    }
}

#[derive(Args)]
struct EmbeddingArgs {
    /// OpenAI API key
    #[arg(long, env = OPENAI_API_KEY_VAR, hide_env_values = true)]
    openai_api_key: Option<String>,
}

impl EmbeddingArgs {
    fn embedder(&self) -> anyhow::Result<Arc<OpenAiEmbedder>> {
        let key = self
            .openai_api_key
            .as_deref()
            .map(clean_api_key)
            .filter(|k| !k.is_empty())
            .with_context(|| format!("Missing {}", OPENAI_API_KEY_VAR))?;
        Ok(Arc::new(OpenAiEmbedder::new(key)?))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List indexes of an account
    Indexes {
        #[command(flatten)]
        service: ServiceArgs,
    },

    /// Show index statistics
    Stats {
        /// Index name
        index: String,

        #[command(flatten)]
        service: ServiceArgs,
    },

    /// Create a serverless index
    Create {
        /// Index name
        index: String,

        /// Vector dimension
        #[arg(long, default_value_t = 1536)]
        dimension: usize,

        /// Distance metric (cosine, euclidean, dotproduct)
        #[arg(long, default_value = "cosine")]
        metric: DistanceMetric,

        /// Delete and recreate the index if it exists
        #[arg(long)]
        replace: bool,

        /// Cloud provider
        #[arg(long, default_value = "aws")]
        cloud: String,

        /// Cloud region
        #[arg(long, default_value = "us-east-1")]
        region: String,

        #[command(flatten)]
        service: ServiceArgs,
    },

    /// Delete an index
    Delete {
        /// Index name
        index: String,

        #[command(flatten)]
        service: ServiceArgs,
    },

    /// Query an index by text or by vector
    Query {
        /// Index name
        index: String,

        /// Text to embed and search for
        #[arg(long, conflicts_with = "vector", required_unless_present = "vector")]
        text: Option<String>,

        /// Query vector as a JSON array
        #[arg(long)]
        vector: Option<String>,

        /// Namespace to search
        #[arg(long, default_value = "")]
        namespace: String,

        /// Number of matches
        #[arg(long, default_value_t = 20)]
        top_k: usize,

        /// Metadata filter as JSON
        #[arg(long)]
        filter: Option<String>,

        /// Include vector values in the output
        #[arg(long)]
        include_values: bool,

        /// Embedding model used with --text
        #[arg(long, default_value = DEFAULT_EMBEDDING_MODEL)]
        model: String,

        #[command(flatten)]
        embedding: EmbeddingArgs,

        #[command(flatten)]
        service: ServiceArgs,
    },

    /// Embed and store a supplier profile
    AddSupplier {
        /// Index name
        index: String,

        /// Company name
        #[arg(long)]
        name: String,

        /// Country
        #[arg(long)]
        country: Option<String>,

        /// Postal address
        #[arg(long)]
        address: Option<String>,

        /// Phone number
        #[arg(long)]
        phone: Option<String>,

        /// Contact email
        #[arg(long)]
        email: Option<String>,

        /// Listing page URL
        #[arg(long)]
        listing_url: Option<String>,

        /// Free-text description
        #[arg(long)]
        description: Option<String>,

        /// Target namespace
        #[arg(long, default_value = DEFAULT_SUPPLIER_NAMESPACE)]
        namespace: String,

        #[command(flatten)]
        embedding: EmbeddingArgs,

        #[command(flatten)]
        service: ServiceArgs,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Keys may come from a .env file; load it before clap reads the environment.
    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            eprintln!("Failed to load .env file: {err}");
        }
    }

    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to initialize logging: {err}");
    }

    let ui = WizardUI::new();
    let result = match cli.command {
        Some(command) => run_command(command, &ui).await.map(|()| ExitCode::SUCCESS),
        None => run_migration(cli, &ui).await,
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            error!("{:#}", err);
            ui.print_error(&format!("{:#}", err));
            ExitCode::from(EXIT_FATAL)
        }
    }
}

async fn run_migration(cli: Cli, ui: &WizardUI) -> anyhow::Result<ExitCode> {
    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            MigrationConfig::from_file(path)
                .with_context(|| format!("Failed to load {}", path.display()))?
        }
        None => MigrationConfig::new("", "", "", ""),
    };

    // Command line and environment take precedence over the file.
    if let Some(key) = &cli.source_api_key {
        config.source.service.api_key = clean_api_key(key);
    }
    if let Some(key) = &cli.dest_api_key {
        config.destination.service.api_key = clean_api_key(key);
    }
    if config.source.service.api_key.is_empty() {
        bail!("Missing source API key: set {}", SOURCE_API_KEY_VAR);
    }
    if config.destination.service.api_key.is_empty() {
        bail!("Missing destination API key: set {}", DEST_API_KEY_VAR);
    }

    if let Some(source) = cli.source_index {
        config.destination.index = cli.dest_index.unwrap_or_else(|| source.clone());
        config.source.index = source;
    } else if config.source.index.trim().is_empty() {
        let selection = Wizard::new().select_indexes()?;
        config.source.index = selection.source;
        config.destination.index = selection.destination;
    } else if config.destination.index.trim().is_empty() {
        config.destination.index = config.source.index.clone();
    }

    if cli.dry_run {
        config.options.dry_run = true;
    }
    if let Some(page_size) = cli.page_size {
        config.options.page_size = Some(page_size);
    }
    if let Some(timeout) = cli.ready_timeout {
        config.options.ready_timeout_secs = timeout;
    }

    ui.print_plan(
        &config.source.index,
        &config.destination.index,
        config.options.dry_run,
    );

    let mut pipeline = Pipeline::from_config(&config)?;
    let stats = pipeline.run().await?;
    ui.print_summary(&stats);

    Ok(ExitCode::from(stats.exit_code()))
}

async fn run_command(command: Commands, ui: &WizardUI) -> anyhow::Result<()> {
    match command {
        Commands::Indexes { service } => {
            let pinecone = PineconeService::new(&service.config()?)?;
            ui.print_indexes(&pinecone.list_indexes().await?);
        }
        Commands::Stats { index, service } => {
            let mut client = service.existing_client(&index).await?;
            let stats = client.describe_stats().await?;
            ui.print_stats(&index, &stats);
        }
        Commands::Create {
            index,
            dimension,
            metric,
            replace,
            cloud,
            region,
            service,
        } => {
            let mut client = service.client(&index)?.with_defaults(IndexDefaults {
                dimension,
                metric,
                spec: ServerlessSpec { cloud, region },
            });
            client.create_index(dimension, metric, replace).await?;
            ui.print_done(&format!("Index '{}' ready for use ({}D, {})", index, dimension, metric));
        }
        Commands::Delete { index, service } => {
            service.client(&index)?.delete_index().await?;
            ui.print_done(&format!("Index '{}' deleted", index));
        }
        Commands::Query {
            index,
            text,
            vector,
            namespace,
            top_k,
            filter,
            include_values,
            model,
            embedding,
            service,
        } => {
            let mut client = service.existing_client(&index).await?;
            let vector = match (text, vector) {
                (Some(text), _) => {
                    client = client.with_embedder(embedding.embedder()?);
                    client
                        .create_embeddings(&[text], &model)
                        .await?
                        .into_iter()
                        .next()
                        .context("Embedding service returned no vector")?
                }
                (None, Some(json)) => serde_json::from_str::<Vec<f32>>(&json)
                    .context("--vector must be a JSON array of numbers")?,
                (None, None) => bail!("Pass --text or --vector"),
            };
            let filter = filter
                .map(|f| serde_json::from_str(&f))
                .transpose()
                .context("--filter must be a JSON object")?;

            let matches = client
                .query(
                    &vector,
                    &QueryOptions {
                        namespace,
                        top_k,
                        include_values,
                        filter,
                        ..QueryOptions::default()
                    },
                )
                .await?;
            ui.print_matches(&matches);
        }
        Commands::AddSupplier {
            index,
            name,
            country,
            address,
            phone,
            email,
            listing_url,
            description,
            namespace,
            embedding,
            service,
        } => {
            let supplier = Supplier {
                name,
                country,
                address,
                phone,
                email,
                listing_url,
                description,
            };
            let mut client = service
                .client(&index)?
                .with_embedder(embedding.embedder()?);
            let id = client.upsert_supplier(&supplier, &namespace).await?;
            ui.print_done(&format!(
                "Supplier '{}' stored in '{}' as {}",
                supplier.name, namespace, id
            ));
        }
    }
    Ok(())
}

//! Migration pipeline orchestration.

use indicatif::ProgressBar;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::client::{create_progress_bar, IndexClient};
use crate::config::{IndexDefaults, MigrationConfig, MigrationOptions};
use crate::connectors::{IndexDescription, IndexStats, VectorRecord};
use crate::error::{Error, Result};

/// Process exit status of a run that copied everything.
pub const EXIT_SUCCESS: u8 = 0;
/// Process exit status of a run stopped by a setup error.
pub const EXIT_FATAL: u8 = 1;
/// Process exit status of a run that finished with some records not copied.
pub const EXIT_PARTIAL: u8 = 2;

/// A namespace whose transfer stopped early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceFailure {
    /// Namespace name.
    pub namespace: String,
    /// Records written to the destination before the failure.
    pub migrated_before_failure: u64,
    /// Error description.
    pub error: String,
}

/// Migration statistics.
#[derive(Debug, Default, Clone)]
pub struct MigrationStats {
    /// Namespaces found in the source, in transfer order.
    pub namespaces: Vec<String>,
    /// Records written (or, in a dry run, read).
    pub migrated: u64,
    /// Id pages processed.
    pub pages: u64,
    /// Namespaces that failed part-way.
    pub failures: Vec<NamespaceFailure>,
    /// Why the transfer phase stopped before the last namespace, if it did.
    pub aborted: Option<String>,
    /// Duration in seconds.
    pub duration_secs: f64,
}

impl MigrationStats {
    /// Calculate throughput (records per second).
    #[must_use]
    pub fn throughput(&self) -> f64 {
        if self.duration_secs > 0.0 {
            self.migrated as f64 / self.duration_secs
        } else {
            0.0
        }
    }

    /// True when every namespace was copied in full.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.aborted.is_none()
    }

    /// Exit status for a run that reached the end of the transfer phase.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        if self.is_complete() {
            EXIT_SUCCESS
        } else {
            EXIT_PARTIAL
        }
    }
}

/// Namespaces to transfer, in the order the service reported them.
///
/// Services that report a non-zero total without a per-namespace breakdown
/// keep everything in the default namespace.
#[must_use]
pub fn namespaces_from_stats(stats: &IndexStats) -> Vec<String> {
    if stats.namespaces.is_empty() && stats.total_vector_count > 0 {
        return vec![String::new()];
    }
    stats.namespaces.iter().map(|ns| ns.name.clone()).collect()
}

pub(crate) fn display_namespace(namespace: &str) -> &str {
    if namespace.is_empty() {
        "(default)"
    } else {
        namespace
    }
}

/// Migration pipeline: copies every record of a source index into a
/// destination index.
pub struct Pipeline {
    source: IndexClient,
    destination: IndexClient,
    options: MigrationOptions,
    show_progress: bool,
}

impl Pipeline {
    /// Create a pipeline from two clients.
    pub fn new(source: IndexClient, destination: IndexClient, options: MigrationOptions) -> Self {
        let destination = destination.with_progress(false).with_defaults(IndexDefaults {
            spec: options.spec.clone(),
            ..IndexDefaults::default()
        });
        Self {
            source,
            destination,
            options,
            show_progress: true,
        }
    }

    /// Create a pipeline for two Pinecone indexes.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn from_config(config: &MigrationConfig) -> Result<Self> {
        config.validate()?;
        let source = IndexClient::pinecone(&config.source.service, &config.source.index)?;
        let destination =
            IndexClient::pinecone(&config.destination.service, &config.destination.index)?;
        Ok(Self::new(source, destination, config.options.clone()))
    }

    /// Enables or disables the transfer progress bar.
    #[must_use]
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Source index name.
    #[must_use]
    pub fn source_index(&self) -> &str {
        self.source.index_name()
    }

    /// Destination index name.
    #[must_use]
    pub fn destination_index(&self) -> &str {
        self.destination.index_name()
    }

    /// Run the migration pipeline.
    ///
    /// Setup failures (missing source, unreadable source configuration,
    /// dimension mismatch, readiness timeout) are returned as errors.
    /// Failures inside the transfer phase are reported in the stats.
    ///
    /// # Errors
    ///
    /// Returns an error if any setup phase fails.
    pub async fn run(&mut self) -> Result<MigrationStats> {
        let start = Instant::now();
        let mut stats = MigrationStats::default();

        info!(
            "Starting migration '{}' -> '{}'{}",
            self.source.index_name(),
            self.destination.index_name(),
            if self.options.dry_run { " (dry run)" } else { "" }
        );
        debug!(
            "Backends: source {}, destination {}",
            self.source.service_type(),
            self.destination.service_type()
        );

        let source = self.connect_source().await?;
        self.prepare_destination(&source).await?;

        info!(
            "[3/4] Reading namespaces of '{}'",
            self.source.index_name()
        );
        let source_stats = self.source.describe_stats().await?;
        stats.namespaces = namespaces_from_stats(&source_stats);
        info!(
            "Found {} namespaces, {} records",
            stats.namespaces.len(),
            source_stats.total_vector_count
        );

        info!("[4/4] Transferring records");
        let progress = if self.show_progress {
            create_progress_bar(source_stats.total_vector_count)
        } else {
            ProgressBar::hidden()
        };
        let namespaces = stats.namespaces.clone();
        self.transfer(&namespaces, &mut stats, &progress).await;
        progress.finish_and_clear();

        stats.duration_secs = start.elapsed().as_secs_f64();

        if stats.is_complete() {
            info!(
                "Migration complete: {} records in {} pages, {:.2}s ({:.0} rec/sec)",
                stats.migrated,
                stats.pages,
                stats.duration_secs,
                stats.throughput()
            );
        } else {
            warn!(
                "Migration finished with errors: {} records migrated, {} namespaces failed{}",
                stats.migrated,
                stats.failures.len(),
                if stats.aborted.is_some() {
                    ", transfer aborted"
                } else {
                    ""
                }
            );
        }

        Ok(stats)
    }

    async fn connect_source(&mut self) -> Result<IndexDescription> {
        let name = self.source.index_name().to_string();
        info!("[1/4] Connecting to source index '{}'", name);

        if !self.source.exists().await? {
            error!("Source index '{}' does not exist", name);
            return Err(Error::IndexNotFound(name));
        }

        let description = self
            .source
            .describe_index()
            .await
            .map_err(|e| Error::SourceDescribe {
                index: name.clone(),
                reason: e.to_string(),
            })?;
        info!(
            "Source index '{}': dimension {}, metric {}",
            name, description.dimension, description.metric
        );
        Ok(description)
    }

    async fn prepare_destination(&mut self, source: &IndexDescription) -> Result<()> {
        let name = self.destination.index_name().to_string();
        info!("[2/4] Preparing destination index '{}'", name);

        if self.destination.exists().await? {
            match self.destination.describe_index().await {
                Ok(existing) => {
                    if existing.dimension != source.dimension {
                        error!(
                            "Destination '{}' has dimension {}, source has {}",
                            name, existing.dimension, source.dimension
                        );
                        return Err(Error::DimensionMismatch {
                            expected: source.dimension,
                            actual: existing.dimension,
                        });
                    }
                    if existing.metric != source.metric {
                        warn!(
                            "Destination '{}' uses metric {}, source uses {}",
                            name, existing.metric, source.metric
                        );
                    }
                    info!("Destination index '{}' exists, reusing it", name);
                }
                Err(e) => warn!(
                    "Could not read configuration of destination '{}': {}. Continuing.",
                    name, e
                ),
            }
            return Ok(());
        }

        if self.options.dry_run {
            info!(
                "Dry run: destination '{}' would be created ({}D, {})",
                name, source.dimension, source.metric
            );
            return Ok(());
        }

        self.destination
            .create_index(source.dimension, source.metric, false)
            .await?;
        self.wait_until_ready().await
    }

    async fn wait_until_ready(&self) -> Result<()> {
        let name = self.destination.index_name();
        let interval = self.options.ready_poll_interval();
        let timeout = self.options.ready_timeout();
        let start = Instant::now();

        loop {
            let description = self.destination.describe_index().await?;
            if description.ready {
                info!(
                    "Destination index '{}' ready after {:.1}s",
                    name,
                    start.elapsed().as_secs_f64()
                );
                return Ok(());
            }

            let waited = start.elapsed();
            if timeout.is_some_and(|limit| waited >= limit) {
                error!("Destination index '{}' still not ready", name);
                return Err(Error::ReadinessTimeout {
                    index: name.to_string(),
                    waited_secs: waited.as_secs(),
                });
            }

            debug!(
                "Waiting for '{}' (state: {})",
                name,
                description.state.as_deref().unwrap_or("unknown")
            );
            tokio::time::sleep(interval).await;
        }
    }

    async fn transfer(
        &mut self,
        namespaces: &[String],
        stats: &mut MigrationStats,
        progress: &ProgressBar,
    ) {
        for namespace in namespaces {
            let mut migrated = 0;
            let result = self
                .transfer_namespace(namespace, &mut migrated, &mut stats.pages, progress)
                .await;
            stats.migrated += migrated;

            match result {
                Ok(()) => info!(
                    "Namespace '{}': {} records",
                    display_namespace(namespace),
                    migrated
                ),
                Err(Error::ListingUnsupported(index)) => {
                    let reason = format!(
                        "Index '{}' cannot list record ids; transfer stopped at namespace '{}'",
                        index,
                        display_namespace(namespace)
                    );
                    error!("{}", reason);
                    stats.aborted = Some(reason);
                    break;
                }
                Err(e) => {
                    error!(
                        "Namespace '{}' failed after {} records: {}",
                        display_namespace(namespace),
                        migrated,
                        e
                    );
                    debug!("Namespace '{}' error detail: {:?}", namespace, e);
                    stats.failures.push(NamespaceFailure {
                        namespace: namespace.clone(),
                        migrated_before_failure: migrated,
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    async fn transfer_namespace(
        &mut self,
        namespace: &str,
        migrated: &mut u64,
        pages: &mut u64,
        progress: &ProgressBar,
    ) -> Result<()> {
        let mut token: Option<String> = None;

        loop {
            let page = self
                .source
                .list_ids(namespace, self.options.page_size, token.take())
                .await?;

            if !page.ids.is_empty() {
                let mut fetched = self.source.fetch(&page.ids, namespace).await?;
                let records: Vec<VectorRecord> = page
                    .ids
                    .iter()
                    .filter_map(|id| fetched.remove(id))
                    .collect();
                if records.len() < page.ids.len() {
                    debug!(
                        "{} ids listed in '{}' were not returned by fetch",
                        page.ids.len() - records.len(),
                        display_namespace(namespace)
                    );
                }

                let written = if self.options.dry_run {
                    records.len()
                } else {
                    self.destination
                        .upsert_batch(&records, namespace, records.len().max(1))
                        .await?
                };
                *migrated += written as u64;
                *pages += 1;
                progress.inc(written as u64);
                debug!(
                    "Page {}: {} records into '{}' (namespace total {})",
                    pages,
                    written,
                    display_namespace(namespace),
                    migrated
                );
            }

            match page.next {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::NamespaceStats;

    #[test]
    fn test_migration_stats_throughput() {
        let stats = MigrationStats {
            migrated: 1000,
            duration_secs: 2.0,
            ..Default::default()
        };
        assert!((stats.throughput() - 500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_migration_stats_zero_duration() {
        let stats = MigrationStats {
            migrated: 100,
            ..Default::default()
        };
        assert!(stats.throughput().abs() < f64::EPSILON);
    }

    #[test]
    fn test_migration_stats_completion() {
        let mut stats = MigrationStats::default();
        assert!(stats.is_complete());

        stats.failures.push(NamespaceFailure {
            namespace: "A".to_string(),
            migrated_before_failure: 0,
            error: "boom".to_string(),
        });
        assert!(!stats.is_complete());

        let aborted = MigrationStats {
            aborted: Some("no listing".to_string()),
            ..Default::default()
        };
        assert!(!aborted.is_complete());
    }

    #[test]
    fn test_exit_codes() {
        let mut stats = MigrationStats::default();
        assert_eq!(stats.exit_code(), EXIT_SUCCESS);

        stats.aborted = Some("no listing".to_string());
        assert_eq!(stats.exit_code(), EXIT_PARTIAL);

        let failed = MigrationStats {
            failures: vec![NamespaceFailure {
                namespace: String::new(),
                migrated_before_failure: 4,
                error: "boom".to_string(),
            }],
            ..Default::default()
        };
        assert_eq!(failed.exit_code(), EXIT_PARTIAL);
        assert_ne!(EXIT_FATAL, EXIT_SUCCESS);
        assert_ne!(EXIT_FATAL, EXIT_PARTIAL);
    }

    #[test]
    fn test_namespaces_in_reported_order() {
        let stats = IndexStats {
            total_vector_count: 3,
            namespaces: vec![
                NamespaceStats {
                    name: "zeta".to_string(),
                    vector_count: 2,
                },
                NamespaceStats {
                    name: "alpha".to_string(),
                    vector_count: 1,
                },
            ],
            ..Default::default()
        };
        assert_eq!(namespaces_from_stats(&stats), vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_namespaces_fallback_to_default() {
        let stats = IndexStats {
            total_vector_count: 42,
            ..Default::default()
        };
        assert_eq!(namespaces_from_stats(&stats), vec![""]);
    }

    #[test]
    fn test_namespaces_empty_index() {
        assert!(namespaces_from_stats(&IndexStats::default()).is_empty());
    }

    #[test]
    fn test_display_namespace() {
        assert_eq!(display_namespace(""), "(default)");
        assert_eq!(display_namespace("A"), "A");
    }
}

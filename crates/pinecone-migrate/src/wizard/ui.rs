//! Console output for the migration and management commands.

use console::{style, Style};

use crate::connectors::{IndexStats, ScoredRecord};
use crate::pipeline::{display_namespace, MigrationStats};

/// Console UI handler.
#[derive(Debug, Default)]
pub struct WizardUI;

impl WizardUI {
    /// Creates a new UI handler.
    pub fn new() -> Self {
        Self
    }

    /// Prints the wizard header.
    pub fn print_header(&self) {
        let cyan = Style::new().cyan().bold();

        println!();
        println!(
            "{}",
            cyan.apply_to("╔═══════════════════════════════════════════════════════════════╗")
        );
        println!(
            "{}",
            cyan.apply_to("║         PINECONE INDEX MIGRATION                              ║")
        );
        println!(
            "{}",
            cyan.apply_to("╚═══════════════════════════════════════════════════════════════╝")
        );
        println!();
    }

    /// Prints what is about to be copied where.
    pub fn print_plan(&self, source: &str, destination: &str, dry_run: bool) {
        let bold = Style::new().bold();

        println!();
        println!("{}", bold.apply_to("Migration plan:"));
        println!("┌─────────────────────────────────────────────────────────────┐");
        println!("│ Source:      {}", source);
        println!("│ Destination: {}", destination);
        if dry_run {
            println!("│ Mode:        {}", style("dry run (no writes)").yellow());
        }
        println!("└─────────────────────────────────────────────────────────────┘");
        println!();
    }

    /// Prints the final migration summary.
    pub fn print_summary(&self, stats: &MigrationStats) {
        let green = Style::new().green().bold();
        let yellow = Style::new().yellow().bold();
        let bold = Style::new().bold();

        println!();
        if stats.is_complete() {
            println!("{}", green.apply_to("Migration complete"));
        } else {
            println!("{}", yellow.apply_to("Migration finished with errors"));
        }
        println!();
        println!("   {} {}", bold.apply_to("Namespaces:      "), stats.namespaces.len());
        println!("   {} {}", bold.apply_to("Records migrated:"), stats.migrated);
        println!(
            "   {} {:.1}s",
            bold.apply_to("Duration:        "),
            stats.duration_secs
        );
        println!(
            "   {} {:.0} rec/s",
            bold.apply_to("Throughput:      "),
            stats.throughput()
        );

        for failure in &stats.failures {
            println!(
                "   {} namespace '{}' after {} records: {}",
                style("Failed:").red(),
                display_namespace(&failure.namespace),
                failure.migrated_before_failure,
                failure.error
            );
        }
        if let Some(reason) = &stats.aborted {
            println!("   {} {}", style("Aborted:").red(), reason);
        }
        println!();
    }

    /// Prints index names.
    pub fn print_indexes(&self, names: &[String]) {
        if names.is_empty() {
            println!("{}", style("No indexes").dim());
            return;
        }
        for name in names {
            println!("  • {}", name);
        }
    }

    /// Prints index statistics.
    pub fn print_stats(&self, index: &str, stats: &IndexStats) {
        let bold = Style::new().bold();

        println!("{} {}", bold.apply_to("Index:"), index);
        println!("{} {}", bold.apply_to("Records:"), stats.total_vector_count);
        if let Some(dimension) = stats.dimension {
            println!("{} {}", bold.apply_to("Dimension:"), dimension);
        }
        if let Some(fullness) = stats.index_fullness {
            println!("{} {:.2}", bold.apply_to("Fullness:"), fullness);
        }
        for ns in &stats.namespaces {
            println!("  {:<30} {}", display_namespace(&ns.name), ns.vector_count);
        }
    }

    /// Prints query matches.
    pub fn print_matches(&self, matches: &[ScoredRecord]) {
        if matches.is_empty() {
            println!("{}", style("No matches").dim());
            return;
        }
        for (rank, m) in matches.iter().enumerate() {
            let metadata = m
                .metadata
                .as_ref()
                .and_then(|md| serde_json::to_string(md).ok())
                .unwrap_or_default();
            println!(
                "{:>3}. {} {:.4} {}",
                rank + 1,
                style(&m.id).bold(),
                m.score,
                style(metadata).dim()
            );
        }
    }

    /// Prints a success line.
    pub fn print_done(&self, message: &str) {
        println!("{} {}", style("✔").green().bold(), message);
    }

    /// Prints error message.
    pub fn print_error(&self, message: &str) {
        eprintln!();
        eprintln!("{} {}", style("✖").red().bold(), message);
    }
}

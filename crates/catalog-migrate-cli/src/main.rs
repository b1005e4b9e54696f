//! catalog-migrate CLI - schema diff, data migration and integrity verification
//! between two PostgreSQL catalogs.

use catalog_migrate::{
    AnalyzeResult, Config, MigrateError, MigrateRequest, MigrationMapping, MigrationStats,
    Orchestrator, VerificationReport, VerifyRequest,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "catalog-migrate")]
#[command(about = "Diff, migrate and verify data between two PostgreSQL catalogs")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare both catalogs and write the migration mapping
    Analyze {
        /// Mapping file to write [default: migration.mapping_file]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Copy rows from source to target following the mapping
    Migrate {
        /// Mapping file to read [default: migration.mapping_file]
        #[arg(long)]
        mapping: Option<PathBuf>,

        /// Checkpoint file [default: migration.checkpoint_file]
        #[arg(long)]
        checkpoint: Option<PathBuf>,

        /// Read and transform every batch but write nothing
        #[arg(long)]
        dry_run: bool,

        /// Only migrate this table
        #[arg(long)]
        table: Option<String>,

        /// Rows per batch [default: migration.batch_size]
        #[arg(long)]
        batch_size: Option<usize>,

        /// Disable foreign-key enforcement on the target for the run
        #[arg(long)]
        skip_fk_checks: bool,

        /// Forget completed tables and start over
        #[arg(long)]
        reset_checkpoint: bool,
    },

    /// Check the target against the source
    Verify {
        /// Mapping file to read [default: migration.mapping_file]
        #[arg(long)]
        mapping: Option<PathBuf>,

        /// Only verify this table
        #[arg(long)]
        table: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

/// Returns false when the command ran but recorded errors or issues.
async fn run() -> Result<bool, MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Analyze { output } => {
            let orchestrator = Orchestrator::new(config).await?;
            let result = orchestrator.analyze(output.as_deref()).await?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_analysis(&result);
            }
            Ok(true)
        }
        Commands::Migrate {
            mapping,
            checkpoint,
            dry_run,
            table,
            batch_size,
            skip_fk_checks,
            reset_checkpoint,
        } => {
            // Fail on a bad mapping before connecting
            preflight_mapping(&config, mapping.as_deref())?;

            let request = MigrateRequest {
                mapping_file: mapping,
                checkpoint_file: checkpoint,
                table,
                batch_size,
                dry_run,
                skip_fk_checks,
                reset_checkpoint,
            };
            let orchestrator = Orchestrator::new(config).await?;
            let stats = orchestrator.migrate(&request).await?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_migration(&stats);
            }
            Ok(stats.success())
        }
        Commands::Verify { mapping, table } => {
            preflight_mapping(&config, mapping.as_deref())?;

            let request = VerifyRequest {
                mapping_file: mapping,
                table,
            };
            let orchestrator = Orchestrator::new(config).await?;
            let report = orchestrator.verify(&request).await?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_verification(&report);
            }
            Ok(report.passed())
        }
    }
}

fn preflight_mapping(config: &Config, mapping: Option<&Path>) -> Result<(), MigrateError> {
    let path = mapping
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&config.migration.mapping_file));
    MigrationMapping::load(&path)?;
    Ok(())
}

fn print_analysis(result: &AnalyzeResult) {
    let summary = &result.summary;
    println!("Mapping written to {}", result.mapping_file.display());
    println!(
        "  Source tables: {}, target tables: {}",
        result.source_table_count, result.target_table_count
    );
    println!(
        "  Matched: {}, new in source: {}, removed from source: {}",
        summary.matched_tables, summary.new_in_source, summary.removed_from_source
    );
    if !summary.column_actions.is_empty() {
        println!("\nColumn actions:");
        for (action, count) in &summary.column_actions {
            println!("  {:<14} {:>6}", action.to_string(), count);
        }
    }
    println!("\nImport order:");
    for (tier, count) in &summary.tiers {
        println!("  tier {}: {} tables", tier, count);
    }
    println!("  {}", result.import_order.join(", "));
}

fn print_migration(stats: &MigrationStats) {
    let status = if stats.success() { "SUCCESS" } else { "FAILED" };
    let mode = if stats.dry_run { " (dry run)" } else { "" };
    println!("Migration: {}{}", status, mode);
    println!("  Imported: {}", stats.imported);
    println!("  Skipped (already present): {}", stats.skipped);
    println!("  Errors: {}", stats.errors);
    println!("  Tables completed: {}", stats.tables_completed.len());
    println!("  Duration: {:.2}s", stats.duration_secs);

    if !stats.tables.is_empty() {
        let width = stats
            .tables
            .iter()
            .map(|t| t.table.len())
            .max()
            .unwrap_or(0)
            .max("Table".len());
        println!();
        println!(
            "{:<width$}  {:>10}  {:>10}  {:>8}",
            "Table",
            "Imported",
            "Skipped",
            "Errors",
            width = width
        );
        for t in &stats.tables {
            println!(
                "{:<width$}  {:>10}  {:>10}  {:>8}",
                t.table,
                t.imported,
                t.skipped,
                t.errors,
                width = width
            );
        }
    }
}

fn print_verification(report: &VerificationReport) {
    print!("{}", report);
    println!("\nDuration: {:.2}s", report.duration_ms as f64 / 1000.0);
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // stdout is reserved for results
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

//! Command workflow: analyze, migrate and verify.
//!
//! Each phase is a free function over the core traits so it can run against
//! any implementation; [`Orchestrator`] binds them to the two configured
//! PostgreSQL connections.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::Config;
use crate::core::{CatalogReader, TableReader, TargetWriter};
use crate::diff::{diff_schemas, TierTable};
use crate::drivers::PostgresDb;
use crate::error::Result;
use crate::introspect::{introspect, introspect_foreign_keys};
use crate::mapping::{MappingSummary, MigrationMapping};
use crate::state::ProgressCheckpoint;
use crate::transfer::{DataMigrator, MigrateOptions, MigrationStats};
use crate::verify::{IntegrityVerifier, VerificationReport, VerifyOptions};

/// Outcome of `analyze`.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeResult {
    /// Where the mapping was written.
    pub mapping_file: PathBuf,
    /// Mapping fingerprint recorded by checkpoints.
    pub fingerprint: String,
    pub source_table_count: usize,
    pub target_table_count: usize,
    pub import_order: Vec<String>,
    pub summary: MappingSummary,
}

/// Per-invocation overrides for `migrate`.
#[derive(Debug, Clone, Default)]
pub struct MigrateRequest {
    pub mapping_file: Option<PathBuf>,
    pub checkpoint_file: Option<PathBuf>,
    pub table: Option<String>,
    pub batch_size: Option<usize>,
    pub dry_run: bool,
    pub skip_fk_checks: bool,
    /// Discard completed tables before starting.
    pub reset_checkpoint: bool,
}

/// Per-invocation overrides for `verify`.
#[derive(Debug, Clone, Default)]
pub struct VerifyRequest {
    pub mapping_file: Option<PathBuf>,
    pub table: Option<String>,
}

/// Introspect both catalogs, diff them and write the mapping to `output`.
pub async fn analyze_catalogs(
    source: &dyn CatalogReader,
    target: &dyn CatalogReader,
    config: &Config,
    output: &Path,
) -> Result<AnalyzeResult> {
    info!("Phase 1: Introspecting source catalog");
    let source_schema = introspect(source).await?;
    info!("Phase 2: Introspecting target catalog");
    let target_schema = introspect(target).await?;
    let target_fks = introspect_foreign_keys(target).await?;

    info!("Phase 3: Classifying tables and columns");
    let tiers = TierTable::with_overrides(&config.migration.tier_overrides);
    let mapping = diff_schemas(&source_schema, &target_schema, &target_fks, &tiers);
    mapping.save(output)?;
    info!("Mapping written to {}", output.display());

    Ok(AnalyzeResult {
        mapping_file: output.to_path_buf(),
        fingerprint: mapping.fingerprint(),
        source_table_count: mapping.source_table_count,
        target_table_count: mapping.target_table_count,
        summary: mapping.summary(),
        import_order: mapping.import_order,
    })
}

/// Load the mapping and checkpoint, then migrate.
pub async fn migrate_tables(
    source: &dyn TableReader,
    target: &dyn TargetWriter,
    config: &Config,
    request: &MigrateRequest,
) -> Result<MigrationStats> {
    let mapping_path = request
        .mapping_file
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.migration.mapping_file));
    let checkpoint_path = request
        .checkpoint_file
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.migration.checkpoint_file));

    let mapping = MigrationMapping::load(&mapping_path)?;
    let fingerprint = mapping.fingerprint();

    let mut checkpoint = if request.reset_checkpoint {
        info!("Resetting checkpoint {}", checkpoint_path.display());
        let mut fresh = ProgressCheckpoint::new(&fingerprint);
        if !request.dry_run {
            fresh.save(&checkpoint_path)?;
        }
        fresh
    } else {
        let mut loaded = ProgressCheckpoint::load(&checkpoint_path)?;
        loaded.validate_mapping(&fingerprint)?;
        if !loaded.completed_tables.is_empty() {
            info!(
                "Resuming: {} tables already completed",
                loaded.completed_tables.len()
            );
        }
        loaded
    };

    if request.dry_run {
        warn!("Dry run: nothing will be written to the target");
    }

    let options = MigrateOptions {
        batch_size: request.batch_size.unwrap_or(config.migration.batch_size),
        table_filter: request.table.clone(),
        dry_run: request.dry_run,
        skip_fk_checks: request.skip_fk_checks,
        checkpoint_path: (!request.dry_run).then_some(checkpoint_path),
        default_overrides: config.migration.default_overrides.clone(),
    };

    let stats = DataMigrator::new(source, target, options)
        .run(&mapping, &mut checkpoint)
        .await?;

    info!(
        "Migration {}: imported {}, skipped {}, errors {}, {} tables completed in {:.1}s",
        if stats.success() { "succeeded" } else { "finished with errors" },
        stats.imported,
        stats.skipped,
        stats.errors,
        stats.tables_completed.len(),
        stats.duration_secs
    );
    Ok(stats)
}

/// Load the mapping and verify the target against the source.
pub async fn verify_tables(
    source: &dyn TableReader,
    target: &dyn TableReader,
    config: &Config,
    request: &VerifyRequest,
) -> Result<VerificationReport> {
    let mapping_path = request
        .mapping_file
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.migration.mapping_file));
    let mapping = MigrationMapping::load(&mapping_path)?;

    let options = VerifyOptions::from_config(&config.verify, request.table.clone());
    let report = IntegrityVerifier::new(source, target, options)
        .run(&mapping)
        .await?;

    if report.passed() {
        info!("Verification passed for {} tables", report.tables.len());
    } else {
        warn!("Verification found {} issues", report.issues.len());
    }
    Ok(report)
}

/// The two configured connections.
pub struct Orchestrator {
    config: Config,
    source: PostgresDb,
    target: PostgresDb,
}

impl Orchestrator {
    /// Connect to both databases.
    pub async fn new(config: Config) -> Result<Self> {
        let source = PostgresDb::connect(&config.source).await?;
        let target = PostgresDb::connect(&config.target).await?;
        Ok(Self {
            config,
            source,
            target,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Write the mapping to `output`, or the configured mapping file.
    pub async fn analyze(&self, output: Option<&Path>) -> Result<AnalyzeResult> {
        let output = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(&self.config.migration.mapping_file));
        analyze_catalogs(&self.source, &self.target, &self.config, &output).await
    }

    pub async fn migrate(&self, request: &MigrateRequest) -> Result<MigrationStats> {
        migrate_tables(&self.source, &self.target, &self.config, request).await
    }

    pub async fn verify(&self, request: &VerifyRequest) -> Result<VerificationReport> {
        verify_tables(&self.source, &self.target, &self.config, request).await
    }
}

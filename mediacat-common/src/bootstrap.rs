//! Startup orchestration
//!
//! Runs, in order and to completion: connect to the server, create the
//! database, reconnect scoped to it, reconcile the schema, import formats,
//! import media. Connection and schema failures abort startup. An import
//! batch that fails is recorded in the [`BootstrapReport`] and startup
//! continues; a failed format batch skips the media batch.

use crate::config::CatalogConfig;
use crate::db::catalog_store::CatalogStore;
use crate::db::connection::{connect_catalog, Credentials};
use crate::db::mysql_store::MySqlCatalogStore;
use crate::db::schema_sync::ReconcileReport;
use crate::db::table_schemas::sync_catalog_schema;
use crate::import::{load_format_records, load_media_records, CatalogImporter, ImportStats};
use crate::Result;
use serde::Serialize;
use sqlx::MySqlPool;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Files read by the import step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSources {
    pub formats_file: PathBuf,
    pub media_file: PathBuf,
}

impl ImportSources {
    pub fn from_config(config: &CatalogConfig) -> Self {
        Self {
            formats_file: config.formats_file.clone(),
            media_file: config.media_file.clone(),
        }
    }
}

/// Result of one import batch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchOutcome {
    Skipped { reason: String },
    Completed { stats: ImportStats },
    Failed { error: String },
}

impl BatchOutcome {
    fn skipped(reason: impl Into<String>) -> Self {
        BatchOutcome::Skipped {
            reason: reason.into(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, BatchOutcome::Failed { .. })
    }
}

/// Outcome of both import batches
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportReport {
    pub formats: BatchOutcome,
    pub media: BatchOutcome,
}

impl ImportReport {
    pub fn disabled() -> Self {
        Self {
            formats: BatchOutcome::skipped("import disabled"),
            media: BatchOutcome::skipped("import disabled"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BootstrapReport {
    pub schema: ReconcileReport,
    pub imports: ImportReport,
}

/// A catalog ready to serve requests
pub struct Catalog {
    pub pool: MySqlPool,
    pub report: BootstrapReport,
}

/// Bring the catalog database up to date
///
/// `imports` of `None` skips both import batches.
pub async fn bootstrap(config: &CatalogConfig, imports: Option<&ImportSources>) -> Result<Catalog> {
    let credentials = Credentials::from_config(config);
    let pool = connect_catalog(&credentials, &config.db_name).await?;

    let schema = sync_catalog_schema(&pool).await?;
    if schema.is_converged() {
        info!("Schema already up to date");
    } else {
        info!("Applied {} schema change(s)", schema.applied.len());
    }
    for drift in &schema.drift {
        warn!("Schema drift left in place: {}", drift);
    }

    let imports = match imports {
        Some(sources) => {
            let store = MySqlCatalogStore::new(pool.clone());
            run_imports(&store, sources).await
        }
        None => {
            info!("Import disabled, skipping format and media batches");
            ImportReport::disabled()
        }
    };

    Ok(Catalog {
        pool,
        report: BootstrapReport { schema, imports },
    })
}

/// Import formats, then media, from the given files
///
/// A missing file skips its batch. Never fails: batch errors are returned
/// as [`BatchOutcome::Failed`].
pub async fn run_imports<S: CatalogStore + ?Sized>(store: &S, sources: &ImportSources) -> ImportReport {
    let importer = CatalogImporter::new(store);
    let importer = &importer;

    let formats = run_batch("formats", &sources.formats_file, |path| async move {
        let records = load_format_records(&path).await?;
        importer.import_formats(&records).await
    })
    .await;

    let media = if formats.is_failed() {
        warn!("Skipping media import because the format import failed");
        BatchOutcome::skipped("format import failed")
    } else {
        run_batch("media", &sources.media_file, |path| async move {
            let records = load_media_records(&path).await?;
            importer.import_media(&records).await
        })
        .await
    };

    ImportReport { formats, media }
}

async fn run_batch<F, Fut>(label: &str, path: &Path, batch: F) -> BatchOutcome
where
    F: FnOnce(PathBuf) -> Fut,
    Fut: std::future::Future<Output = Result<ImportStats>>,
{
    if !path.exists() {
        info!("No {} file at {}, skipping", label, path.display());
        return BatchOutcome::skipped(format!("{} not found", path.display()));
    }

    match batch(path.to_path_buf()).await {
        Ok(stats) => BatchOutcome::Completed { stats },
        Err(e) => {
            // Batch errors already name the record; file errors get the path
            let message = if e.is_fatal() {
                format!("{}: {}", path.display(), e)
            } else {
                e.to_string()
            };
            error!("{} import failed: {}", label, message);
            BatchOutcome::Failed { error: message }
        }
    }
}

//! Export orchestrator - distributes catalog objects across workers.
//!
//! Each database gets its own ledger, progress counter and worker pool.
//! Workers pull objects from a shared queue; every worker owns one
//! scripting session for its whole lifetime.

mod summary;

pub use summary::{DatabaseSummary, ExportSummary, Outcome};

use crate::config::ExportSettings;
use crate::error::{ExportError, Result};
use crate::ledger::Ledger;
use crate::rules::{RewriteResult, RuleTable};
use crate::script::{assemble, ScriptOptions, ScriptWriter, SplitMode};
use crate::source::{
    CatalogObject, MssqlServer, ObjectId, ObjectType, ScriptingSession, SessionProvider,
};
use chrono::Utc;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use summary::Counters;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type ObjectQueue = Arc<Mutex<VecDeque<CatalogObject>>>;

/// Drives the export of one or more databases into an output tree.
pub struct Exporter {
    settings: ExportSettings,
    rules: Arc<RuleTable>,
    output_root: PathBuf,
}

impl Exporter {
    pub fn new(settings: ExportSettings, rules: RuleTable, output_root: impl Into<PathBuf>) -> Self {
        Self {
            settings,
            rules: Arc::new(rules),
            output_root: output_root.into(),
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    fn options(&self) -> ScriptOptions {
        ScriptOptions {
            include_use_header: !self.settings.skip_use_statement,
            split_tables: self.settings.split_table_files,
        }
    }

    /// Export every requested database from a server, one after another.
    ///
    /// Absent databases are logged and skipped. A database that fails as a
    /// whole is recorded in the summary and the run moves on.
    pub async fn run(
        &self,
        server: &MssqlServer,
        databases: &[String],
        cancel: CancellationToken,
    ) -> Result<ExportSummary> {
        let started_at = Utc::now();
        let mut summary = ExportSummary {
            status: "running".to_string(),
            duration_seconds: 0.0,
            started_at,
            completed_at: started_at,
            databases: Vec::new(),
            missing_databases: Vec::new(),
            failed_databases: Vec::new(),
        };

        for database in databases {
            if cancel.is_cancelled() {
                info!("Cancellation requested, not starting {}", database);
                break;
            }

            match server.database_exists(database).await {
                Ok(true) => {}
                Ok(false) => {
                    warn!("Database {} is absent", database);
                    summary.missing_databases.push(database.clone());
                    continue;
                }
                Err(e) => {
                    error!("{}: existence check failed - {}", database, e);
                    summary.failed_databases.push((database.clone(), e.to_string()));
                    continue;
                }
            }

            let provider = Arc::new(server.session_provider(database, self.settings.get_workers()));
            match self.export_database(database, provider, cancel.clone()).await {
                Ok(db) => summary.databases.push(db),
                Err(e) => {
                    error!("{}: export failed - {}", database, e);
                    summary.failed_databases.push((database.clone(), e.to_string()));
                }
            }
        }

        let completed_at = Utc::now();
        summary.completed_at = completed_at;
        summary.duration_seconds = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;
        summary.status = if cancel.is_cancelled() {
            "cancelled"
        } else if summary.failed_databases.is_empty() {
            "completed"
        } else {
            "failed"
        }
        .to_string();

        Ok(summary)
    }

    /// Export one database into `<output>/<database>/`.
    pub async fn export_database<P>(
        &self,
        database: &str,
        provider: Arc<P>,
        cancel: CancellationToken,
    ) -> Result<DatabaseSummary>
    where
        P: SessionProvider + 'static,
    {
        let objects: VecDeque<CatalogObject> = {
            let mut session = provider.open().await?;
            session
                .list_objects()
                .await?
                .into_iter()
                .filter(|o| self.settings.includes_schema(&o.schema))
                .collect()
        };

        let total = objects.len();
        let job = Arc::new(DatabaseExport {
            database: database.to_string(),
            rules: self.rules.clone(),
            ledger: Ledger::new(),
            writer: ScriptWriter::new(self.output_root.join(database)),
            options: self.options(),
            progress: Progress::new(total),
            counters: Counters::default(),
        });

        if total == 0 {
            info!("{}: no objects to export", database);
            return Ok(job.counters.snapshot(database, 0));
        }

        let workers = self.settings.get_workers().clamp(1, total);
        info!(
            "Exporting {} objects from {} with {} workers",
            total, database, workers
        );

        let queue: ObjectQueue = Arc::new(Mutex::new(objects));
        let mut handles = Vec::with_capacity(workers);

        for worker_id in 0..workers {
            let job = job.clone();
            let provider = provider.clone();
            let queue = queue.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                run_worker(worker_id, job, provider, queue, cancel).await
            }));
        }

        let mut connected = 0;
        let mut last_error = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(())) => connected += 1,
                Ok(Err(e)) => last_error = Some(e.to_string()),
                Err(e) => {
                    error!("{}: worker panicked - {}", database, e);
                    last_error = Some(format!("Worker panicked: {}", e));
                }
            }
        }

        let remaining = drain(&queue);
        if connected == 0 {
            for object in &remaining {
                warn!(
                    "Skipped {} {}: no session available",
                    object.full_name(),
                    object.object_type
                );
            }
            return Err(ExportError::NoWorkers {
                database: database.to_string(),
                message: last_error.unwrap_or_default(),
            });
        }

        if !remaining.is_empty() {
            warn!("{}: cancelled with {} objects pending", database, remaining.len());
        }

        let summary = job.counters.snapshot(database, total);
        info!(
            "{}: {} written, {} duplicates, {} skipped, {} failed",
            database, summary.written, summary.duplicates, summary.skipped, summary.failed
        );
        Ok(summary)
    }
}

impl ExportSummary {
    /// The error a run should report, if any.
    ///
    /// Cancellation wins, then whole-database failures. A run where every
    /// requested database was absent reports the missing databases.
    pub fn error(&self) -> Option<ExportError> {
        if self.status == "cancelled" {
            return Some(ExportError::Cancelled);
        }
        if !self.failed_databases.is_empty() {
            let names: Vec<&str> = self.failed_databases.iter().map(|(db, _)| db.as_str()).collect();
            return Some(ExportError::ExportFailed(names.join(", ")));
        }
        if self.databases.is_empty() && !self.missing_databases.is_empty() {
            return Some(ExportError::DatabaseNotFound(self.missing_databases.join(", ")));
        }
        None
    }
}

async fn run_worker<P>(
    worker_id: usize,
    job: Arc<DatabaseExport>,
    provider: Arc<P>,
    queue: ObjectQueue,
    cancel: CancellationToken,
) -> Result<()>
where
    P: SessionProvider + 'static,
{
    let mut session = match provider.open().await {
        Ok(session) => session,
        Err(e) => {
            warn!(
                "{}: worker {} could not open a session: {}",
                job.database, worker_id, e
            );
            return Err(e);
        }
    };
    debug!("{}: worker {} started", job.database, worker_id);

    while !cancel.is_cancelled() {
        let Some(object) = next_object(&queue) else {
            break;
        };
        job.export_object(&mut session, &object).await;
    }

    debug!("{}: worker {} finished", job.database, worker_id);
    Ok(())
}

fn lock_queue(queue: &ObjectQueue) -> std::sync::MutexGuard<'_, VecDeque<CatalogObject>> {
    queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn next_object(queue: &ObjectQueue) -> Option<CatalogObject> {
    lock_queue(queue).pop_front()
}

fn drain(queue: &ObjectQueue) -> Vec<CatalogObject> {
    lock_queue(queue).drain(..).collect()
}

/// Shared numbering of processed objects.
struct Progress {
    done: AtomicUsize,
    total: usize,
}

impl Progress {
    fn new(total: usize) -> Self {
        Self {
            done: AtomicUsize::new(0),
            total,
        }
    }

    fn report(&self, object: &CatalogObject, rewrite: &RewriteResult<'_>) {
        let n = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            "{:05}/{} {} {}{}",
            n,
            self.total,
            object.full_name(),
            object.object_type,
            rename_note(rewrite)
        );
    }
}

fn rename_note(rewrite: &RewriteResult<'_>) -> String {
    if rewrite.is_renamed() {
        format!(" {} -> {}", rewrite.old_name, rewrite.new_name)
    } else {
        String::new()
    }
}

/// State shared by the workers of one database export.
struct DatabaseExport {
    database: String,
    rules: Arc<RuleTable>,
    ledger: Ledger,
    writer: ScriptWriter,
    options: ScriptOptions,
    progress: Progress,
    counters: Counters,
}

impl DatabaseExport {
    /// Process one catalog object. Errors are logged and counted, never
    /// propagated.
    async fn export_object<S: ScriptingSession>(&self, session: &mut S, object: &CatalogObject) {
        let rewrite = self.rules.resolve(&object.name, object.object_type);
        self.progress.report(object, &rewrite);

        let outcome = if self
            .ledger
            .contains(&object.schema, &rewrite.new_name, object.object_type)
        {
            info!(
                "[{}].[{}] {} already produced, skipping",
                object.schema, rewrite.new_name, object.object_type
            );
            Outcome::Duplicate
        } else {
            self.produce(session, object, &rewrite).await
        };
        self.counters.record(outcome);

        // Triggers are keyed on their own names, so a duplicate table still
        // contributes its triggers.
        if object.object_type == ObjectType::Table {
            self.export_triggers(session, object).await;
        }
    }

    async fn produce<S: ScriptingSession>(
        &self,
        session: &mut S,
        object: &CatalogObject,
        rewrite: &RewriteResult<'_>,
    ) -> Outcome {
        let label = object.full_name();

        if object.object_type == ObjectType::StoredProcedure {
            match session.procedure_kind(object.id).await {
                Ok(Some(kind)) if kind.is_scriptable() => {}
                Ok(Some(kind)) => {
                    warn!("Skipping {}: {} procedures cannot be scripted", label, kind);
                    return Outcome::Skipped;
                }
                Ok(None) => {
                    warn!("Skipping {}: procedure no longer exists", label);
                    return Outcome::Failed;
                }
                Err(e) => {
                    warn!("Skipping {}: {}", label, e);
                    return Outcome::Failed;
                }
            }
        }

        self.emit(session, object.id, &label, &object.schema, object.object_type, rewrite)
            .await
    }

    /// Claim the target key, then script, assemble and write the object.
    ///
    /// The key is recorded as produced only once its files are on disk. Any
    /// failure releases the claim so a later object with the same final name
    /// can still produce it.
    async fn emit<S: ScriptingSession>(
        &self,
        session: &mut S,
        id: ObjectId,
        label: &str,
        schema: &str,
        object_type: ObjectType,
        rewrite: &RewriteResult<'_>,
    ) -> Outcome {
        if !self.ledger.claim(schema, &rewrite.new_name, object_type).await {
            debug!("{} produced by another worker", label);
            return Outcome::Duplicate;
        }

        let result = self.script_and_write(session, id, object_type, rewrite).await;
        if result.is_ok() {
            self.ledger.add(schema, &rewrite.new_name, object_type);
        } else {
            self.ledger.release(schema, &rewrite.new_name, object_type);
        }

        match result {
            Ok(()) => Outcome::Written,
            Err(e @ ExportError::Unscriptable { .. }) => {
                warn!("Skipping {}: {}", label, e);
                Outcome::Skipped
            }
            Err(e) => {
                warn!("Failed to export {}: {}", label, e);
                Outcome::Failed
            }
        }
    }

    async fn script_and_write<S: ScriptingSession>(
        &self,
        session: &mut S,
        id: ObjectId,
        object_type: ObjectType,
        rewrite: &RewriteResult<'_>,
    ) -> Result<()> {
        let statements = session.script(id).await?;
        let mode = SplitMode::for_object(object_type, self.options.split_tables);
        let files = assemble(
            &statements,
            &self.database,
            self.options.include_use_header,
            mode,
            rewrite,
        );
        self.writer
            .write(object_type, &rewrite.new_name, &files)
            .await?;
        Ok(())
    }

    async fn export_triggers<S: ScriptingSession>(&self, session: &mut S, table: &CatalogObject) {
        let triggers = match session.triggers(table.id).await {
            Ok(triggers) => triggers,
            Err(e) => {
                warn!("Failed to list triggers of {}: {}", table.full_name(), e);
                self.counters.record(Outcome::Failed);
                return;
            }
        };

        for trigger in triggers {
            self.counters.record_trigger();
            let rewrite = self.rules.resolve(&trigger.name, ObjectType::Trigger);
            let label = format!("[{}].[{}]", table.schema, trigger.name);
            info!("      trigger {}{}", label, rename_note(&rewrite));

            let outcome = if self
                .ledger
                .contains(&table.schema, &rewrite.new_name, ObjectType::Trigger)
            {
                debug!("Trigger {} already produced", label);
                Outcome::Duplicate
            } else {
                self.emit(
                    session,
                    trigger.id,
                    &label,
                    &table.schema,
                    ObjectType::Trigger,
                    &rewrite,
                )
                .await
            };
            self.counters.record(outcome);
        }
    }
}

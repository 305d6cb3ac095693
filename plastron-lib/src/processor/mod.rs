use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::JobConfig;
use crate::error::{PlastronError, ProcessingOutcome, ProcessingState};
use crate::import::{MetadataSpreadsheet, RowOptions, SpreadsheetRow, ValidationReport};
use crate::item_log::{ItemLog, LogRecord};
use crate::model::{ModelRegistry, Resource};
use crate::rdf::jsonld::{graph_from_jsonld, graph_to_jsonld};
use crate::rdf::{owner_of, Graph};
use crate::repo::{KeepAlive, LocalTransaction, MemoryRepository, Repository, Transaction};
use crate::utils::datetimestamp;

/// Columns of the completed log
pub const COMPLETED_FIELDS: [&str; 4] = ["id", "timestamp", "title", "uri"];

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub limit: Option<usize>,
    pub percentage: Option<u8>,
    /// Read the current description of rows that name an existing URI
    pub read_from_repo: bool,
    /// Check every row but write nothing
    pub validate_only: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ImportSummary {
    pub total: usize,
    pub row_count: usize,
    pub loaded: usize,
    pub skipped: usize,
    pub errors: usize,
    pub validation_reports: Vec<ValidationReport>,
    pub state: ProcessingState,
}

impl ImportSummary {
    pub fn outcome(&self) -> ProcessingOutcome {
        ProcessingOutcome::from_state(self.state.clone())
    }
}

/// Resources built from the rows of one pass
struct LoadedRows {
    graph: Graph,
    loaded: usize,
    state: ProcessingState,
}

pub struct ImportProcessor {
    config: JobConfig,
    registry: Arc<ModelRegistry>,
    repository: Box<dyn Repository>,
}

impl ImportProcessor {
    /// Set up a processor from a validated job configuration, loading the
    /// job's models and repository dump.
    pub fn new(config: JobConfig) -> Result<Self, PlastronError> {
        config.validate()?;
        let registry = config.registry()?;
        let repository = match config.repository_path() {
            Some(path) => {
                info!("Reading existing resources from {:?}", path);
                MemoryRepository::from_jsonld_file(path)?
            }
            None => MemoryRepository::new(),
        };
        Ok(Self::with_repository(config, registry, Box::new(repository)))
    }

    pub fn with_repository(
        config: JobConfig,
        registry: ModelRegistry,
        repository: Box<dyn Repository>,
    ) -> Self {
        Self {
            config,
            registry: Arc::new(registry),
            repository,
        }
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    fn work_dir(&self) -> PathBuf {
        self.config
            .output_path()
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.config.base_dir.clone())
    }

    pub async fn process(&self, options: &ImportOptions) -> Result<ImportSummary, PlastronError> {
        info!("Starting import job {}", self.config.job_id);
        let mut sheet = MetadataSpreadsheet::open(
            self.config.metadata_path(),
            Arc::clone(&self.registry),
            &self.config.model,
        )?;
        let mut completed = ItemLog::new(
            self.config.completed_log_path(),
            &COMPLETED_FIELDS,
            "id",
            true,
        )?;
        if !completed.is_empty() {
            info!("{} item(s) already loaded", completed.len());
        }
        let mut state = ProcessingState::new();
        if let Some(found) = completed.mismatched_header()? {
            warn!("Unexpected columns in {}: {:?}", completed.path().display(), found);
            state.add_warning(
                format!("Unexpected columns {:?}; expected {:?}", found, COMPLETED_FIELDS),
                Some(completed.path().display().to_string()),
            );
        }

        let mut transaction =
            LocalTransaction::new(self.work_dir(), self.config.transaction_timeout())?;
        transaction.begin()?;
        let buffer_path = transaction.scratch("completed.buffer.csv")?;
        let transaction = Arc::new(Mutex::new(transaction));
        let keep_alive = KeepAlive::start(Arc::clone(&transaction), self.config.keep_alive());

        let result = match ItemLog::new(buffer_path, &COMPLETED_FIELDS, "id", false) {
            Ok(mut buffer) => self
                .load_rows(&mut sheet, &completed, &mut buffer, &keep_alive, options)
                .await
                .map(|loaded| (loaded, buffer)),
            Err(e) => Err(e),
        };
        keep_alive.stop().await;

        let mut transaction = transaction
            .lock()
            .map_err(|_| PlastronError::Transaction("Transaction lock poisoned".to_string()))?;
        let (rows, buffer) = match result {
            Ok(result) => result,
            Err(e) => return Err(abandon(&mut *transaction, e)),
        };

        if options.validate_only {
            info!("Validation only; rolling back");
            transaction.rollback()?;
        } else {
            let output = self.config.output_path();
            let buffered = match commit_output(&mut transaction, &output, rows.graph, &buffer) {
                Ok(buffered) => buffered,
                Err(e) => return Err(abandon(&mut *transaction, e)),
            };
            for record in &buffered {
                completed.append(record)?;
            }
            info!(
                "Wrote {} resource(s) to {}; {} item(s) added to {}",
                rows.loaded,
                output.display(),
                buffered.len(),
                completed.path().display()
            );
        }

        state.merge(rows.state);
        let summary = ImportSummary {
            total: sheet.total().unwrap_or(sheet.row_count()),
            row_count: sheet.row_count(),
            loaded: rows.loaded,
            skipped: sheet.skipped(),
            errors: sheet.errors(),
            validation_reports: sheet.validation_reports().to_vec(),
            state,
        };
        info!(
            "{} of {} row(s) loaded; {} skipped; {} invalid",
            summary.loaded,
            summary.total,
            summary.skipped,
            summary.errors
        );
        Ok(summary)
    }

    async fn load_rows(
        &self,
        sheet: &mut MetadataSpreadsheet,
        completed: &ItemLog,
        buffer: &mut ItemLog,
        keep_alive: &KeepAlive,
        options: &ImportOptions,
    ) -> Result<LoadedRows, PlastronError> {
        let mut loaded = LoadedRows {
            graph: Graph::new(),
            loaded: 0,
            state: ProcessingState::new(),
        };
        let rows = sheet.rows(RowOptions {
            limit: options.limit,
            percentage: options.percentage,
            completed,
        })?;

        for row in rows {
            keep_alive.check()?;
            let row = match row? {
                SpreadsheetRow::Invalid(invalid) => {
                    warn!("{}: {}", invalid.line_reference, invalid.reason);
                    loaded
                        .state
                        .add_error(invalid.reason, Some(invalid.line_reference.to_string()));
                    continue;
                }
                SpreadsheetRow::Valid(row) => row,
            };
            let line = row.line_reference.to_string();

            let mut resource =
                match row.get_object(&*self.repository, options.read_from_repo) {
                    Ok(resource) => resource,
                    Err(e) => {
                        error!("{}: {}", line, e);
                        loaded.state.add_error(e.to_string(), Some(line));
                        continue;
                    }
                };

            let problems = self.registry.validate(&resource)?;
            if !problems.is_empty() {
                for problem in problems {
                    warn!("{}: {}", line, problem);
                    loaded.state.add_error(problem, Some(line.clone()));
                }
                continue;
            }

            if resource.is_new() {
                resource.assign_uri(&format!("urn:uuid:{}", Uuid::new_v4()));
            }
            let record = self.completion_record(&resource, row.identifier().unwrap_or_default());
            buffer.append(&record)?;
            debug!("Loaded {} from {}", resource.subject(), line);
            loaded.graph.extend(resource.graph);
            loaded.loaded += 1;

            // let the keep-alive run between rows
            tokio::task::yield_now().await;
        }
        Ok(loaded)
    }

    fn completion_record(&self, resource: &Resource, identifier: &str) -> LogRecord {
        let title = resource
            .values(&self.registry, "title")
            .ok()
            .and_then(|values| values.first().map(|value| value.text().to_string()))
            .unwrap_or_default();
        HashMap::from([
            ("id".to_string(), identifier.to_string()),
            ("timestamp".to_string(), datetimestamp(false)),
            ("title".to_string(), title),
            ("uri".to_string(), resource.subject().to_string()),
        ])
    }
}

/// Stage the merged output document and commit it, returning the buffered
/// completion records.
fn commit_output(
    transaction: &mut LocalTransaction,
    output: &Path,
    loaded: Graph,
    buffer: &ItemLog,
) -> Result<Vec<LogRecord>, PlastronError> {
    let document = json!({ "@graph": merge_output(output, loaded)? });
    transaction.write(output, &serde_json::to_vec_pretty(&document)?)?;
    // scratch files are removed on commit
    let buffered = buffer.records()?;
    transaction.commit()?;
    Ok(buffered)
}

/// Roll back after a failed import. The import's error is the one reported.
fn abandon(transaction: &mut dyn Transaction, e: PlastronError) -> PlastronError {
    error!("Import failed: {}", e);
    if let Err(rollback_error) = transaction.rollback() {
        error!("Rollback failed: {}", rollback_error);
    }
    e
}

/// Combine the resources of this run with those already in `output`. A
/// resource written again replaces its earlier description.
fn merge_output(output: &Path, loaded: Graph) -> Result<Vec<Value>, PlastronError> {
    let mut graph = match File::open(output) {
        Ok(file) => {
            let existing: Value = serde_json::from_reader(BufReader::new(file))?;
            graph_from_jsonld(&existing)?
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Graph::new(),
        Err(e) => return Err(e.into()),
    };
    let rewritten: HashSet<String> = loaded
        .subjects()
        .into_iter()
        .map(|subject| owner_of(subject).to_string())
        .collect();
    let replaced = graph.remove_subjects(|subject| rewritten.contains(owner_of(subject)));
    if replaced > 0 {
        debug!("Replacing {} earlier statement(s) in {}", replaced, output.display());
    }
    graph.extend(loaded);
    Ok(graph_to_jsonld(&graph))
}

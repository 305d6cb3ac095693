use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use super::columns::{build_fields, ColumnFields};
use super::row::{InvalidRow, LineReference, Row, RowContext};
use crate::error::PlastronError;
use crate::item_log::{CompletedItems, NullLog};
use crate::model::ModelRegistry;

type RecordReader = csv::Reader<Box<dyn Read + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpreadsheetState {
    /// Opened on a stream; nothing read past the header
    Unstarted,
    /// Every row of a seekable source counted; ready to stream
    Counted,
    Streaming,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub line: String,
    pub is_valid: bool,
    pub error: String,
}

/// What the row iterator yields for each selected line
#[derive(Debug, Clone)]
pub enum SpreadsheetRow {
    Valid(Row),
    Invalid(InvalidRow),
}

pub struct RowOptions<'a> {
    /// Stop after this physical row number
    pub limit: Option<usize>,
    /// Load this share (1-100) of the rows not yet completed
    pub percentage: Option<u8>,
    pub completed: &'a dyn CompletedItems,
}

impl Default for RowOptions<'_> {
    fn default() -> Self {
        Self {
            limit: None,
            percentage: None,
            completed: &NullLog,
        }
    }
}

enum Source {
    File(File),
    /// Taken by the first call to `rows()`
    Stream(Option<RecordReader>),
}

/// The metadata CSV of an import job.
pub struct MetadataSpreadsheet {
    source: Source,
    fieldnames: Vec<String>,
    context: Arc<RowContext>,
    identifier_column: String,
    state: SpreadsheetState,
    total: Option<usize>,
    row_count: usize,
    skipped: usize,
    errors: usize,
    validation_reports: Vec<ValidationReport>,
    subset_to_load: Option<HashSet<String>>,
}

fn record_reader(source: Box<dyn Read + Send>) -> RecordReader {
    csv::ReaderBuilder::new().flexible(true).from_reader(source)
}

fn header_names(reader: &mut RecordReader) -> Result<Vec<String>, PlastronError> {
    Ok(reader.headers()?.iter().map(str::to_string).collect())
}

impl MetadataSpreadsheet {
    /// Open a metadata file, resolve its headers against the model class and
    /// count its rows.
    pub fn open<P: AsRef<Path>>(
        path: P,
        registry: Arc<ModelRegistry>,
        class_name: &str,
    ) -> Result<Self, PlastronError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            PlastronError::Metadata(format!(
                "Cannot read metadata file \"{}\": {}",
                path.display(),
                e
            ))
        })?;
        let mut sheet = Self::build(
            path.display().to_string(),
            Source::File(file),
            registry,
            class_name,
        )?;

        let mut total = 0;
        for record in sheet.reader()?.into_records() {
            record?;
            total += 1;
        }
        debug!("Counted {} row(s) in {}", total, path.display());
        sheet.total = Some(total);
        sheet.state = SpreadsheetState::Counted;
        Ok(sheet)
    }

    /// Read metadata from a stream that cannot be rewound. The total is only
    /// known once every row has been streamed, and percentage loads are not
    /// possible.
    pub fn from_reader<R: Read + Send + 'static>(
        name: impl Into<String>,
        reader: R,
        registry: Arc<ModelRegistry>,
        class_name: &str,
    ) -> Result<Self, PlastronError> {
        let reader = record_reader(Box::new(reader));
        Self::build(
            name.into(),
            Source::Stream(Some(reader)),
            registry,
            class_name,
        )
    }

    fn build(
        filename: String,
        mut source: Source,
        registry: Arc<ModelRegistry>,
        class_name: &str,
    ) -> Result<Self, PlastronError> {
        let fieldnames: Vec<String> = match &mut source {
            Source::File(file) => header_names(&mut record_reader(Box::new(file.try_clone()?)))?,
            Source::Stream(Some(reader)) => header_names(reader)?,
            Source::Stream(None) => Vec::new(),
        };
        let class = registry.class(class_name)?;
        let identifier_column = class.identifier_column()?.to_string();
        let fields = build_fields(&fieldnames, &registry, class_name)?;
        info!(
            "Mapped {} column(s) of {} to {} propert(ies) of {}",
            fieldnames.len(),
            filename,
            fields.len(),
            class_name
        );

        Ok(Self {
            source,
            fieldnames,
            context: Arc::new(RowContext {
                filename,
                fields,
                registry,
                class_name: class_name.to_string(),
            }),
            identifier_column,
            state: SpreadsheetState::Unstarted,
            total: None,
            row_count: 0,
            skipped: 0,
            errors: 0,
            validation_reports: Vec::new(),
            subset_to_load: None,
        })
    }

    /// A reader positioned at the start of the file
    fn reader(&mut self) -> Result<RecordReader, PlastronError> {
        match &mut self.source {
            Source::File(file) => {
                file.seek(SeekFrom::Start(0))?;
                Ok(record_reader(Box::new(file.try_clone()?)))
            }
            Source::Stream(reader) => reader.take().ok_or_else(|| {
                PlastronError::Metadata(format!(
                    "Cannot read the rows of {} more than once",
                    self.context.filename
                ))
            }),
        }
    }

    pub fn filename(&self) -> &str {
        &self.context.filename
    }

    pub fn fieldnames(&self) -> &[String] {
        &self.fieldnames
    }

    pub fn fields(&self) -> &ColumnFields {
        &self.context.fields
    }

    pub fn has_binaries(&self) -> bool {
        self.fieldnames.iter().any(|name| name == "FILES")
    }

    pub fn identifier_column(&self) -> &str {
        &self.identifier_column
    }

    pub fn is_seekable(&self) -> bool {
        matches!(self.source, Source::File(_))
    }

    pub fn state(&self) -> SpreadsheetState {
        self.state
    }

    /// Row count counted up front, or once streaming is done
    pub fn total(&self) -> Option<usize> {
        self.total
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn errors(&self) -> usize {
        self.errors
    }

    pub fn validation_reports(&self) -> &[ValidationReport] {
        &self.validation_reports
    }

    pub fn subset_to_load(&self) -> Option<&HashSet<String>> {
        self.subset_to_load.as_ref()
    }

    fn identifier_index(&self) -> Option<usize> {
        self.fieldnames
            .iter()
            .position(|name| *name == self.identifier_column)
    }

    /// Whether a line with this identifier belongs to the subset being
    /// loaded
    pub fn should_load(&self, identifier: &str) -> bool {
        self.subset_to_load
            .as_ref()
            .map_or(true, |subset| subset.contains(identifier))
    }

    fn select_subset(
        &mut self,
        percentage: u8,
        completed: &dyn CompletedItems,
    ) -> Result<(), PlastronError> {
        if !self.is_seekable() {
            return Err(PlastronError::Metadata(
                "Cannot execute a percentage load using a non-seekable file".to_string(),
            ));
        }
        let index = self.identifier_index().ok_or_else(|| {
            PlastronError::Metadata(format!(
                "Identifier column \"{}\" not found in {}",
                self.identifier_column, self.context.filename
            ))
        })?;

        let mut identifiers = Vec::new();
        for record in self.reader()?.into_records() {
            let record = record?;
            let identifier = record.get(index).unwrap_or_default();
            if !completed.contains_item(identifier) {
                identifiers.push(identifier.to_string());
            }
        }

        if identifiers.is_empty() {
            info!("No items remaining to load");
            self.subset_to_load = Some(HashSet::new());
            return Ok(());
        }

        let total = self.total.unwrap_or(identifiers.len());
        let percentage = f64::from(percentage);
        let target_count = (percentage / 100.0 * total as f64) as usize;
        info!(
            "Attempting to load {} items ({}% of {})",
            target_count, percentage, total
        );
        let step = if identifiers.len() > target_count {
            // spread the load evenly over what is left
            let completed_fraction = completed.item_count() as f64 / total as f64;
            ((100.0 * (1.0 - completed_fraction) / percentage) as usize).max(1)
        } else {
            1
        };
        self.subset_to_load = Some(identifiers.into_iter().step_by(step).collect());
        Ok(())
    }

    /// Iterate over the rows to load, in file order.
    ///
    /// Lines with the wrong number of fields are yielded as
    /// [`SpreadsheetRow::Invalid`]; rows whose identifier is already in
    /// `completed` are counted as skipped and not yielded at all.
    pub fn rows<'a>(&'a mut self, options: RowOptions<'a>) -> Result<Rows<'a>, PlastronError> {
        if let Some(percentage) = options.percentage {
            if !(1..=100).contains(&percentage) {
                return Err(PlastronError::Metadata(format!(
                    "Percentage must be between 1 and 100, got {}",
                    percentage
                )));
            }
            if self.subset_to_load.is_none() {
                self.select_subset(percentage, options.completed)?;
            }
        }
        let records = self.reader()?.into_records();
        self.state = SpreadsheetState::Streaming;
        Ok(Rows {
            sheet: self,
            records,
            row_number: 0,
            limit: options.limit,
            completed: options.completed,
            finished: false,
        })
    }

    fn finish(&mut self) {
        if self.total.is_none() {
            self.total = Some(self.row_count);
        }
        self.state = SpreadsheetState::Done;
    }
}

/// Iterator returned by [`MetadataSpreadsheet::rows`]
pub struct Rows<'a> {
    sheet: &'a mut MetadataSpreadsheet,
    records: csv::StringRecordsIntoIter<Box<dyn Read + Send>>,
    row_number: usize,
    limit: Option<usize>,
    completed: &'a dyn CompletedItems,
    finished: bool,
}

impl Rows<'_> {
    fn done(&mut self) -> Option<Result<SpreadsheetRow, PlastronError>> {
        self.finished = true;
        self.sheet.finish();
        None
    }
}

impl Iterator for Rows<'_> {
    type Item = Result<SpreadsheetRow, PlastronError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            let record = match self.records.next() {
                Some(Ok(record)) => record,
                Some(Err(e)) => {
                    self.done();
                    return Some(Err(e.into()));
                }
                None => return self.done(),
            };
            self.row_number += 1;
            let row_number = self.row_number;

            if self.limit.is_some_and(|limit| row_number > limit) {
                info!("Stopping after {} rows", row_number - 1);
                return self.done();
            }

            let sheet = &mut *self.sheet;
            let identifier = sheet
                .identifier_index()
                .and_then(|index| record.get(index))
                .unwrap_or_default();
            if !sheet.should_load(identifier) {
                continue;
            }

            let line_reference = LineReference::new(sheet.context.filename.clone(), row_number + 1);
            debug!("Processing {}", line_reference);
            sheet.row_count += 1;

            if record.len() != sheet.fieldnames.len() {
                sheet.errors += 1;
                sheet.validation_reports.push(ValidationReport {
                    line: line_reference.to_string(),
                    is_valid: false,
                    error: format!("Line {} has the wrong number of columns", line_reference),
                });
                return Some(Ok(SpreadsheetRow::Invalid(InvalidRow {
                    line_reference,
                    reason: "Wrong number of columns".to_string(),
                })));
            }

            let data: HashMap<String, String> = sheet
                .fieldnames
                .iter()
                .cloned()
                .zip(record.iter().map(str::to_string))
                .collect();
            let row = Row::new(
                Arc::clone(&sheet.context),
                line_reference,
                row_number,
                data,
                sheet.identifier_column.clone(),
            );

            if let Some(identifier) = row.identifier() {
                if self.completed.contains_item(identifier) {
                    info!(
                        "Already loaded \"{}\" from {}, skipping",
                        identifier, row.line_reference
                    );
                    sheet.skipped += 1;
                    continue;
                }
            }
            return Some(Ok(SpreadsheetRow::Valid(row)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::umd::{self, ITEM};
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    fn metadata(rows: usize) -> String {
        let mut csv = String::from("Identifier,Title\n");
        for n in 0..rows {
            csv.push_str(&format!("id-{},Title {}\n", n, n));
        }
        csv
    }

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn open(file: &NamedTempFile) -> MetadataSpreadsheet {
        MetadataSpreadsheet::open(file.path(), Arc::new(umd::registry()), ITEM).unwrap()
    }

    fn identifiers(rows: Vec<Result<SpreadsheetRow, PlastronError>>) -> Vec<String> {
        rows.into_iter()
            .filter_map(|row| match row.unwrap() {
                SpreadsheetRow::Valid(row) => row.identifier().map(str::to_string),
                SpreadsheetRow::Invalid(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_counts_and_streams_in_order() {
        let file = write_temp(&metadata(3));
        let mut sheet = open(&file);
        assert_eq!(sheet.total(), Some(3));
        assert_eq!(sheet.state(), SpreadsheetState::Counted);
        assert!(!sheet.has_binaries());

        let rows: Vec<_> = sheet.rows(RowOptions::default()).unwrap().collect();
        assert_eq!(identifiers(rows), vec!["id-0", "id-1", "id-2"]);
        assert_eq!(sheet.state(), SpreadsheetState::Done);
        assert_eq!(sheet.row_count(), 3);

        // a second pass starts over from the top
        let again: Vec<_> = sheet.rows(RowOptions::default()).unwrap().collect();
        assert_eq!(again.len(), 3);
    }

    #[test]
    fn test_line_numbers_count_the_header() {
        let file = write_temp(&metadata(2));
        let mut sheet = open(&file);
        let rows: Vec<_> = sheet.rows(RowOptions::default()).unwrap().collect();
        match rows[1].as_ref().unwrap() {
            SpreadsheetRow::Valid(row) => {
                assert_eq!(row.line_reference.line_number, 3);
                assert_eq!(row.number, 2);
            }
            SpreadsheetRow::Invalid(_) => panic!("row should be valid"),
        }
    }

    #[test]
    fn test_completed_rows_are_skipped() {
        let file = write_temp(&metadata(5));
        let mut sheet = open(&file);
        let completed = vec!["id-1".to_string(), "id-3".to_string()];
        let rows: Vec<_> = sheet
            .rows(RowOptions {
                completed: &completed,
                ..Default::default()
            })
            .unwrap()
            .collect();
        assert_eq!(identifiers(rows), vec!["id-0", "id-2", "id-4"]);
        assert_eq!(sheet.skipped(), 2);
        assert_eq!(sheet.row_count(), 5);
    }

    #[test]
    fn test_wrong_field_count_yields_invalid_row() {
        let file = write_temp("Identifier,Title\nid-0,One\nid-1\nid-2,Two,extra\nid-3,Three\n");
        let mut sheet = open(&file);
        let rows: Vec<_> = sheet
            .rows(RowOptions::default())
            .unwrap()
            .map(Result::unwrap)
            .collect();
        assert_eq!(rows.len(), 4);
        let invalid: Vec<&InvalidRow> = rows
            .iter()
            .filter_map(|row| match row {
                SpreadsheetRow::Invalid(invalid) => Some(invalid),
                SpreadsheetRow::Valid(_) => None,
            })
            .collect();
        assert_eq!(invalid.len(), 2);
        assert_eq!(invalid[0].line_reference.line_number, 3);
        assert_eq!(invalid[0].reason, "Wrong number of columns");
        assert_eq!(sheet.errors(), 2);
        assert_eq!(sheet.validation_reports().len(), 2);
        assert!(!sheet.validation_reports()[1].is_valid);
    }

    #[test]
    fn test_percentage_load_selects_evenly_spaced_rows() {
        let file = write_temp(&metadata(100));
        let mut sheet = open(&file);
        let rows: Vec<_> = sheet
            .rows(RowOptions {
                percentage: Some(10),
                ..Default::default()
            })
            .unwrap()
            .collect();
        let expected: Vec<String> = (0..100).step_by(10).map(|n| format!("id-{}", n)).collect();
        assert_eq!(identifiers(rows), expected);
        assert_eq!(sheet.subset_to_load().map(HashSet::len), Some(10));
    }

    #[test]
    fn test_repeated_percentage_loads_converge() {
        let file = write_temp(&metadata(100));
        let mut completed: Vec<String> = Vec::new();
        for run in 1..=3 {
            let mut sheet = open(&file);
            let loaded = identifiers(
                sheet
                    .rows(RowOptions {
                        percentage: Some(10),
                        completed: &completed,
                        ..Default::default()
                    })
                    .unwrap()
                    .collect(),
            );
            completed.extend(loaded);
            // each run loads roughly another tenth of the original total
            assert!(
                completed.len() >= run * 10 && completed.len() <= run * 10 + 2,
                "run {} loaded {} in total",
                run,
                completed.len()
            );
        }
    }

    #[test]
    fn test_percentage_loads_everything_left_when_below_target() {
        let file = write_temp(&metadata(10));
        let mut sheet = open(&file);
        let completed: Vec<String> = (0..9).map(|n| format!("id-{}", n)).collect();
        let rows: Vec<_> = sheet
            .rows(RowOptions {
                percentage: Some(50),
                completed: &completed,
                ..Default::default()
            })
            .unwrap()
            .collect();
        assert_eq!(identifiers(rows), vec!["id-9"]);
    }

    #[test]
    fn test_limit_counts_physical_rows() {
        let file = write_temp(&metadata(10));
        let mut sheet = open(&file);
        let completed = vec!["id-0".to_string(), "id-1".to_string()];
        let rows: Vec<_> = sheet
            .rows(RowOptions {
                limit: Some(4),
                completed: &completed,
                ..Default::default()
            })
            .unwrap()
            .collect();
        assert_eq!(identifiers(rows), vec!["id-2", "id-3"]);
        assert_eq!(sheet.skipped(), 2);
        assert_eq!(sheet.row_count(), 4);
    }

    #[test]
    fn test_stream_source() {
        let registry = Arc::new(umd::registry());
        let mut sheet = MetadataSpreadsheet::from_reader(
            "stdin",
            Cursor::new(metadata(4).into_bytes()),
            Arc::clone(&registry),
            ITEM,
        )
        .unwrap();
        assert!(!sheet.is_seekable());
        assert_eq!(sheet.total(), None);
        assert_eq!(sheet.state(), SpreadsheetState::Unstarted);

        let percentage = sheet.rows(RowOptions {
            percentage: Some(50),
            ..Default::default()
        });
        assert!(matches!(percentage, Err(PlastronError::Metadata(_))));

        let rows: Vec<_> = sheet.rows(RowOptions::default()).unwrap().collect();
        assert_eq!(rows.len(), 4);
        assert_eq!(sheet.total(), Some(4));
        assert!(matches!(
            sheet.rows(RowOptions::default()),
            Err(PlastronError::Metadata(_))
        ));
    }

    #[test]
    fn test_header_errors_are_fatal() {
        let file = write_temp("Identifier,Colour\nid-0,red\n");
        let result = MetadataSpreadsheet::open(file.path(), Arc::new(umd::registry()), ITEM);
        assert!(matches!(result, Err(PlastronError::DataRead(_))));

        let missing = MetadataSpreadsheet::open(
            "/nonexistent/metadata.csv",
            Arc::new(umd::registry()),
            ITEM,
        );
        assert!(matches!(missing, Err(PlastronError::Metadata(_))));
    }

    #[test]
    fn test_files_column_marks_binaries() {
        let file = write_temp("Identifier,Title,FILES\nid-0,One,a.tif;a.xml\n");
        let mut sheet = open(&file);
        assert!(sheet.has_binaries());
        let rows: Vec<_> = sheet.rows(RowOptions::default()).unwrap().collect();
        match rows[0].as_ref().unwrap() {
            SpreadsheetRow::Valid(row) => assert_eq!(row.file_groups()[0].files.len(), 2),
            SpreadsheetRow::Invalid(_) => panic!("row should be valid"),
        }
    }
}

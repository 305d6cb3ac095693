//! Append-only CSV logs of processed items, keyed by one column.

use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::PlastronError;

pub type LogRecord = HashMap<String, String>;

/// Anything that can say whether an item has already been processed
pub trait CompletedItems {
    fn contains_item(&self, key: &str) -> bool;
    fn item_count(&self) -> usize;
}

/// A CSV file recording one record per processed item, with an in-memory
/// set of the key column's values.
#[derive(Debug)]
pub struct ItemLog {
    path: PathBuf,
    fieldnames: Vec<String>,
    keyfield: String,
    write_header: bool,
    keys: HashSet<String>,
    writer: Option<csv::Writer<File>>,
}

impl ItemLog {
    /// Open a log, replaying an existing file to learn which keys it holds.
    pub fn new<P, S>(
        path: P,
        fieldnames: &[S],
        keyfield: impl Into<String>,
        header: bool,
    ) -> Result<Self, PlastronError>
    where
        P: Into<PathBuf>,
        S: AsRef<str>,
    {
        let mut log = Self {
            path: path.into(),
            fieldnames: fieldnames.iter().map(|f| f.as_ref().to_string()).collect(),
            keyfield: keyfield.into(),
            write_header: header,
            keys: HashSet::new(),
            writer: None,
        };
        if !log.fieldnames.contains(&log.keyfield) {
            return Err(PlastronError::ItemLog(format!(
                "Key field \"{}\" is not one of the fields of {}",
                log.keyfield,
                log.path.display()
            )));
        }
        if log.exists() {
            for record in log.records()? {
                if let Some(key) = record.get(&log.keyfield) {
                    log.keys.insert(key.clone());
                }
            }
            debug!("Loaded {} key(s) from {}", log.keys.len(), log.path.display());
        }
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn fieldnames(&self) -> &[String] {
        &self.fieldnames
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Create (or truncate) the log file, writing the header row if the log
    /// has one.
    pub fn create(&mut self) -> Result<(), PlastronError> {
        self.writer = None;
        let mut writer = csv::Writer::from_path(&self.path)?;
        if self.write_header {
            writer.write_record(&self.fieldnames)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Every record in the file. A missing file has no records.
    pub fn records(&self) -> Result<Vec<LogRecord>, PlastronError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(self.write_header)
            .flexible(true)
            .from_reader(file);

        let columns: Vec<String> = if self.write_header {
            let found: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
            if found != self.fieldnames {
                warn!(
                    "Fieldnames in {} do not match expected fieldnames; expected: {:?}; found: {:?}",
                    self.path.display(),
                    self.fieldnames,
                    found
                );
            }
            found
        } else {
            self.fieldnames.clone()
        };

        let mut records = Vec::new();
        for result in reader.records() {
            let row = result?;
            records.push(
                columns
                    .iter()
                    .cloned()
                    .zip(row.iter().map(str::to_string))
                    .collect(),
            );
        }
        Ok(records)
    }

    /// The header row of an existing log, when it differs from the declared
    /// fieldnames. Header-less and missing logs never mismatch.
    pub fn mismatched_header(&self) -> Result<Option<Vec<String>>, PlastronError> {
        if !self.write_header {
            return Ok(None);
        }
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);
        let found: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        Ok((found != self.fieldnames).then_some(found))
    }

    /// The `n`th record in file order
    pub fn get(&self, n: usize) -> Result<Option<LogRecord>, PlastronError> {
        Ok(self.records()?.into_iter().nth(n))
    }

    fn writer(&mut self) -> Result<&mut csv::Writer<File>, PlastronError> {
        if self.writer.is_none() {
            if !self.exists() {
                self.create()?;
            }
            let file = OpenOptions::new().append(true).open(&self.path)?;
            self.writer = Some(
                csv::WriterBuilder::new()
                    .has_headers(false)
                    .from_writer(file),
            );
        }
        self.writer
            .as_mut()
            .ok_or_else(|| PlastronError::ItemLog("Log writer unavailable".to_string()))
    }

    /// Write one record and remember its key. Fields the log does not
    /// declare are ignored; declared fields missing from the record are
    /// written empty.
    pub fn append(&mut self, record: &LogRecord) -> Result<(), PlastronError> {
        let key = record.get(&self.keyfield).cloned().ok_or_else(|| {
            PlastronError::ItemLog(format!(
                "Record for {} has no \"{}\" field",
                self.path.display(),
                self.keyfield
            ))
        })?;
        let row: Vec<String> = self
            .fieldnames
            .iter()
            .map(|name| record.get(name).cloned().unwrap_or_default())
            .collect();
        let writer = self.writer()?;
        writer.write_record(&row)?;
        writer.flush()?;
        self.keys.insert(key);
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Number of distinct keys logged
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl CompletedItems for ItemLog {
    fn contains_item(&self, key: &str) -> bool {
        self.contains(key)
    }

    fn item_count(&self) -> usize {
        self.len()
    }
}

/// Stands in for an [`ItemLog`] when nothing should be recorded
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLog;

impl NullLog {
    pub fn append(&mut self, _record: &LogRecord) -> Result<(), PlastronError> {
        Ok(())
    }

    pub fn contains(&self, _key: &str) -> bool {
        false
    }

    pub fn len(&self) -> usize {
        0
    }

    pub fn is_empty(&self) -> bool {
        true
    }
}

impl CompletedItems for NullLog {
    fn contains_item(&self, _key: &str) -> bool {
        false
    }

    fn item_count(&self) -> usize {
        0
    }
}

impl CompletedItems for HashSet<String> {
    fn contains_item(&self, key: &str) -> bool {
        self.contains(key)
    }

    fn item_count(&self) -> usize {
        self.len()
    }
}

impl CompletedItems for [String] {
    fn contains_item(&self, key: &str) -> bool {
        self.iter().any(|item| item == key)
    }

    fn item_count(&self) -> usize {
        self.len()
    }
}

impl CompletedItems for Vec<String> {
    fn contains_item(&self, key: &str) -> bool {
        self.as_slice().contains_item(key)
    }

    fn item_count(&self) -> usize {
        self.len()
    }
}

use std::collections::HashMap;
use std::fmt::Display;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use super::columns::{parse_value_string, ColumnFields, ColumnSpec};
use crate::error::PlastronError;
use crate::model::{ModelRegistry, Resource};
use crate::rdf::{Graph, Term};
use crate::repo::Repository;
use crate::serializer::{build_lookup_index, unflatten};

/// A file name and line number, displayed as `{filename}:{line}`
/// (e.g. `job-0123/metadata.csv:29`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LineReference {
    pub filename: String,
    pub line_number: usize,
}

impl LineReference {
    pub fn new(filename: impl Into<String>, line_number: usize) -> Self {
        Self {
            filename: filename.into(),
            line_number,
        }
    }
}

impl Display for LineReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.filename, self.line_number)
    }
}

/// Yielded in place of a [`Row`] for a line that could not be read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidRow {
    pub line_reference: LineReference,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSpec {
    pub name: String,
}

/// Files that share a base name, e.g. `page-1.tif` and `page-1.xml`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileGroup {
    pub rootname: String,
    pub files: Vec<FileSpec>,
}

/// Group a `;`-separated list of file names by base name without extension,
/// in the order the groups are first seen.
pub fn build_file_groups(filenames: &str) -> Vec<FileGroup> {
    let mut groups: Vec<FileGroup> = Vec::new();
    if filenames.trim().is_empty() {
        return groups;
    }
    for filename in filenames.split(';') {
        let rootname = Path::new(filename)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file = FileSpec {
            name: filename.to_string(),
        };
        match groups.iter_mut().find(|group| group.rootname == rootname) {
            Some(group) => group.files.push(file),
            None => groups.push(FileGroup {
                rootname,
                files: vec![file],
            }),
        }
    }
    debug!("Found {} unique file basename(s)", groups.len());
    groups
}

/// What every row of one spreadsheet shares
#[derive(Debug)]
pub(crate) struct RowContext {
    pub(crate) filename: String,
    pub(crate) fields: ColumnFields,
    pub(crate) registry: Arc<ModelRegistry>,
    pub(crate) class_name: String,
}

/// One data line of a metadata spreadsheet
#[derive(Debug, Clone)]
pub struct Row {
    context: Arc<RowContext>,
    pub line_reference: LineReference,
    pub number: usize,
    pub data: HashMap<String, String>,
    pub identifier_column: String,
    file_groups: Vec<FileGroup>,
}

fn non_blank<'a>(data: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    data.get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

impl Row {
    pub(crate) fn new(
        context: Arc<RowContext>,
        line_reference: LineReference,
        number: usize,
        data: HashMap<String, String>,
        identifier_column: impl Into<String>,
    ) -> Self {
        let file_groups = build_file_groups(data.get("FILES").map(String::as_str).unwrap_or(""));
        Self {
            context,
            line_reference,
            number,
            data,
            identifier_column: identifier_column.into(),
            file_groups,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    pub fn identifier(&self) -> Option<&str> {
        self.get(&self.identifier_column)
    }

    pub fn has_uri(&self) -> bool {
        non_blank(&self.data, "URI").is_some()
    }

    /// The `URI` cell exactly as written, when it is not blank
    pub fn uri(&self) -> Option<&str> {
        if self.has_uri() {
            self.get("URI")
        } else {
            None
        }
    }

    pub fn has_files(&self) -> bool {
        non_blank(&self.data, "FILES").is_some()
    }

    pub fn filenames(&self) -> Vec<&str> {
        non_blank(&self.data, "FILES")
            .map(|files| files.split(';').collect())
            .unwrap_or_default()
    }

    pub fn has_item_files(&self) -> bool {
        non_blank(&self.data, "ITEM_FILES").is_some()
    }

    pub fn item_filenames(&self) -> Vec<&str> {
        non_blank(&self.data, "ITEM_FILES")
            .map(|files| files.split(';').collect())
            .unwrap_or_default()
    }

    pub fn file_groups(&self) -> &[FileGroup] {
        &self.file_groups
    }

    pub fn index_string(&self) -> Option<&str> {
        self.get("INDEX")
    }

    pub fn parse_value(&self, column: &ColumnSpec) -> Vec<Term> {
        parse_value_string(self.get(&column.header).unwrap_or(""), column)
    }

    /// Build the resource this row describes. A row with a URI updates that
    /// resource, whose current description is read from the repository only
    /// when `read_from_repo` is set; a row without one describes a new
    /// resource.
    pub fn get_object(
        &self,
        repo: &dyn Repository,
        read_from_repo: bool,
    ) -> Result<Resource, PlastronError> {
        let graph = match self.uri() {
            Some(uri) => {
                let mut resource = repo.resource_at(uri);
                if read_from_repo {
                    resource.read()?;
                }
                resource.graph
            }
            None => {
                info!(
                    "No URI found for {}; will create new resource",
                    self.line_reference
                );
                Graph::new()
            }
        };

        let index = build_lookup_index(self.index_string())?;
        let context = &self.context;
        let params = unflatten(
            &self.data,
            &context.fields,
            &context.registry,
            &context.class_name,
            &index,
        )?;
        let mut item = Resource::new(
            context.class_name.clone(),
            self.uri().map(str::to_string),
            graph,
        );
        item.set_properties(&context.registry, &params)?;
        Ok(item)
    }
}

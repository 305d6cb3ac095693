//! Plastron Import Library
//!
//! This library loads the rows of a CSV metadata spreadsheet as RDF
//! resources, tracking completed items so an interrupted or partial
//! (percentage) load can be resumed.

mod config;
mod error;
mod import;
mod item_log;
mod model;
mod processor;
pub mod rdf;
mod repo;
mod serializer;
mod utils;

pub use config::{JobConfig, TEMPLATE};
pub use error::{PlastronError, ProcessingMessage, ProcessingOutcome, ProcessingState};
pub use import::{
    build_fields, build_file_groups, parse_value_string, ColumnFields, ColumnSpec, FileGroup,
    FileSpec, InvalidRow, LineReference, MetadataSpreadsheet, Row, RowOptions, Rows,
    SpreadsheetRow, SpreadsheetState, ValidationReport,
};
pub use item_log::{CompletedItems, ItemLog, LogRecord, NullLog};
pub use model::{
    umd, ModelClass, ModelRegistry, PropertyDescriptor, PropertyKind, Resource, IDENTIFIER_ATTR,
};
pub use processor::{ImportOptions, ImportProcessor, ImportSummary, COMPLETED_FIELDS};
pub use rdf::jsonld::{graph_from_jsonld, graph_to_jsonld};
pub use rdf::namespaces::expand_curie;
pub use rdf::{owner_of, Graph, Literal, Term, Triple};
pub use repo::{
    KeepAlive, LocalTransaction, MemoryRepository, Repository, RepositoryResource, Transaction,
};
pub use serializer::{build_lookup_index, unflatten, LookupIndex, ObjectParams, SYSTEM_HEADERS};
pub use utils::{datetimestamp, envsubst, split_escaped};

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Once};
    use tracing::info;

    static INIT: Once = Once::new();

    /// Initialize logging exactly once for all tests
    fn init_logging() {
        INIT.call_once(|| {
            tracing_subscriber::fmt()
                .with_test_writer()
                .with_max_level(tracing::Level::DEBUG)
                .init();
        });
    }

    #[test]
    fn test_spreadsheet_to_resources() {
        init_logging();

        info!("Testing spreadsheet loading");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Identifier,Title,Title [Japanese],Date {{EDTF}},INDEX").unwrap();
        writeln!(file, "dig-7,Moon,月,2021-~05,").unwrap();
        file.flush().unwrap();

        let registry = Arc::new(umd::registry());
        let mut sheet = MetadataSpreadsheet::open(file.path(), registry, umd::ITEM).unwrap();
        let repo = MemoryRepository::new();
        let rows: Vec<_> = sheet.rows(RowOptions::default()).unwrap().collect();
        assert_eq!(rows.len(), 1);

        let row = match rows.into_iter().next().unwrap().unwrap() {
            SpreadsheetRow::Valid(row) => row,
            SpreadsheetRow::Invalid(invalid) => panic!("unexpected invalid row: {:?}", invalid),
        };
        let resource = row.get_object(&repo, false).unwrap();
        let nodes = graph_to_jsonld(&resource.graph);
        info!("Built {} node(s)", nodes.len());

        let titles = &nodes[0]["http://purl.org/dc/terms/title"];
        assert_eq!(titles.as_array().unwrap().len(), 2);
        assert_eq!(titles[1]["@language"], "ja");
        let date = &nodes[0]["http://purl.org/dc/elements/1.1/date"][0];
        assert_eq!(date["@type"], "http://id.loc.gov/datatypes/edtf");
    }
}

//! Reading a metadata spreadsheet into resources.

pub mod columns;
pub mod row;
pub mod spreadsheet;

pub use columns::{build_fields, parse_value_string, ColumnFields, ColumnSpec};
pub use row::{build_file_groups, FileGroup, FileSpec, InvalidRow, LineReference, Row};
pub use spreadsheet::{
    MetadataSpreadsheet, RowOptions, Rows, SpreadsheetRow, SpreadsheetState, ValidationReport,
};

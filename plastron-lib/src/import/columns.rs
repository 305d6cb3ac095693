use std::sync::OnceLock;

use regex::Regex;

use crate::error::PlastronError;
use crate::model::{ModelRegistry, PropertyDescriptor};
use crate::rdf::namespaces::expand_curie;
use crate::rdf::{Literal, Term};
use crate::serializer::{datatype_uri, language_code, SYSTEM_HEADERS};
use crate::utils::{not_empty, split_escaped};

/// Separates multiple values within one cell
pub const VALUE_SEPARATOR: char = '|';

/// Mapping from one spreadsheet column to a model property.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    /// Dotted attribute path, e.g. `creator.label`
    pub attrs: String,
    /// Header text exactly as it appears in the spreadsheet
    pub header: String,
    pub property: PropertyDescriptor,
    pub lang_code: Option<String>,
    pub datatype: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderForm<'a> {
    /// `Label`
    Plain(&'a str),
    /// `Label [Language Label]`
    Language { label: &'a str, language: &'a str },
    /// `Label {Datatype Label}`
    Datatype { label: &'a str, datatype: &'a str },
}

fn language_header_regex() -> &'static Regex {
    static LANGUAGE_HEADER: OnceLock<Regex> = OnceLock::new();
    LANGUAGE_HEADER
        .get_or_init(|| Regex::new(r"^([^\[]+)\s+\[(.+)\]$").expect("pattern is valid"))
}

fn datatype_header_regex() -> &'static Regex {
    static DATATYPE_HEADER: OnceLock<Regex> = OnceLock::new();
    DATATYPE_HEADER
        .get_or_init(|| Regex::new(r"^([^{]+)\s+\{(.+)\}$").expect("pattern is valid"))
}

/// Sort a header into one of its three forms. A header with a bracket or
/// brace that does not fit the suffix pattern is treated as plain, and will
/// then fail to match any declared header.
pub fn classify_header(header: &str) -> HeaderForm<'_> {
    if header.contains('[') {
        if let Some(caps) = language_header_regex().captures(header) {
            if let (Some(label), Some(language)) = (caps.get(1), caps.get(2)) {
                return HeaderForm::Language {
                    label: label.as_str(),
                    language: language.as_str(),
                };
            }
        }
    } else if header.contains('{') {
        if let Some(caps) = datatype_header_regex().captures(header) {
            if let (Some(label), Some(datatype)) = (caps.get(1), caps.get(2)) {
                return HeaderForm::Datatype {
                    label: label.as_str(),
                    datatype: datatype.as_str(),
                };
            }
        }
    }
    HeaderForm::Plain(header)
}

/// Column specs grouped by attribute path, in order of first appearance.
#[derive(Debug, Clone, Default)]
pub struct ColumnFields {
    entries: Vec<(String, Vec<ColumnSpec>)>,
}

impl ColumnFields {
    pub fn push(&mut self, spec: ColumnSpec) {
        match self.entries.iter_mut().find(|(attrs, _)| *attrs == spec.attrs) {
            Some((_, specs)) => specs.push(spec),
            None => self.entries.push((spec.attrs.clone(), vec![spec])),
        }
    }

    pub fn get(&self, attrs: &str) -> Option<&[ColumnSpec]> {
        self.entries
            .iter()
            .find(|(a, _)| a == attrs)
            .map(|(_, specs)| specs.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ColumnSpec])> {
        self.entries
            .iter()
            .map(|(attrs, specs)| (attrs.as_str(), specs.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn unknown_header(header: &str) -> PlastronError {
    PlastronError::DataRead(format!("Unknown header \"{}\" in import file.", header))
}

/// Map every non-system header to the model property it feeds.
pub fn build_fields(
    fieldnames: &[String],
    registry: &ModelRegistry,
    class_name: &str,
) -> Result<ColumnFields, PlastronError> {
    let property_attrs = registry.class(class_name)?.flatten_headers();
    let mut fields = ColumnFields::default();

    for header in fieldnames {
        if SYSTEM_HEADERS.contains(&header.as_str()) {
            continue;
        }

        let spec = match classify_header(header) {
            HeaderForm::Language { label, language } => {
                let attrs = property_attrs
                    .get(label)
                    .ok_or_else(|| unknown_header(header))?;
                // a label missing from the table is taken to be a code itself
                let lang_code = language_code(language).unwrap_or(language);
                ColumnSpec {
                    attrs: attrs.clone(),
                    header: header.clone(),
                    property: registry.resolve_path(class_name, attrs)?.clone(),
                    lang_code: Some(lang_code.to_string()),
                    datatype: None,
                }
            }
            HeaderForm::Datatype { label, datatype } => {
                let attrs = property_attrs
                    .get(label)
                    .ok_or_else(|| unknown_header(header))?;
                let datatype_uri = datatype_uri(datatype)
                    .map(str::to_string)
                    .or_else(|| expand_curie(datatype))
                    .ok_or_else(|| {
                        PlastronError::DataRead(format!(
                            "Unknown datatype \"{}\" in \"{}\" in import file.",
                            datatype, header
                        ))
                    })?;
                ColumnSpec {
                    attrs: attrs.clone(),
                    header: header.clone(),
                    property: registry.resolve_path(class_name, attrs)?.clone(),
                    lang_code: None,
                    datatype: Some(datatype_uri),
                }
            }
            HeaderForm::Plain(label) => {
                let attrs = property_attrs.get(label).ok_or_else(|| {
                    PlastronError::DataRead(format!(
                        "Unrecognized header \"{}\" in import file.",
                        header
                    ))
                })?;
                let property = registry.resolve_path(class_name, attrs)?.clone();
                let datatype = property.datatype().map(str::to_string);
                ColumnSpec {
                    attrs: attrs.clone(),
                    header: header.clone(),
                    property,
                    lang_code: None,
                    datatype,
                }
            }
        };
        tracing::trace!("Header {:?} maps to {}", spec.header, spec.attrs);
        fields.push(spec);
    }
    Ok(fields)
}

/// Split a cell into its typed values; empty cells give no values.
pub fn parse_value_string(value_string: &str, column: &ColumnSpec) -> Vec<Term> {
    split_escaped(value_string, VALUE_SEPARATOR)
        .into_iter()
        .filter(not_empty)
        .map(|value| {
            if column.property.is_literal() {
                let datatype = column
                    .datatype
                    .clone()
                    .or_else(|| column.property.datatype().map(str::to_string));
                Term::Literal(Literal::with_tags(value, column.lang_code.clone(), datatype))
            } else {
                Term::Reference(value)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::umd::{self, ITEM};
    use crate::rdf::namespaces::{UMDTYPE, XSD};

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_classify_header() {
        assert_eq!(classify_header("Title"), HeaderForm::Plain("Title"));
        assert_eq!(
            classify_header("Creator [French]"),
            HeaderForm::Language {
                label: "Creator",
                language: "French"
            }
        );
        assert_eq!(
            classify_header("Date {EDTF}"),
            HeaderForm::Datatype {
                label: "Date",
                datatype: "EDTF"
            }
        );
        assert_eq!(classify_header("Title[ja]"), HeaderForm::Plain("Title[ja]"));
    }

    #[test]
    fn test_build_fields() {
        let registry = umd::registry();
        let fields = build_fields(
            &headers(&[
                "URI",
                "Identifier",
                "Title",
                "Title [Japanese]",
                "Creator [French]",
                "Creator [xx]",
                "Date {xsd:date}",
                "Handle",
                "FILES",
                "INDEX",
            ]),
            &registry,
            ITEM,
        )
        .unwrap();

        assert_eq!(fields.len(), 5);
        assert!(fields.get("URI").is_none());

        let titles = fields.get("title").unwrap();
        assert_eq!(titles.len(), 2);
        assert_eq!(titles[0].lang_code, None);
        assert_eq!(titles[1].lang_code.as_deref(), Some("ja"));

        let creators = fields.get("creator.label").unwrap();
        assert_eq!(creators[0].lang_code.as_deref(), Some("fr"));
        assert_eq!(creators[1].lang_code.as_deref(), Some("xx"));
        assert!(creators.iter().all(|c| c.datatype.is_none()));

        let date = &fields.get("date").unwrap()[0];
        assert_eq!(date.datatype, Some(format!("{}date", XSD)));

        let handle = &fields.get("handle").unwrap()[0];
        assert_eq!(handle.datatype, Some(format!("{}handle", UMDTYPE)));
    }

    #[test]
    fn test_build_fields_rejects_unknown_headers() {
        let registry = umd::registry();
        for bad in ["Colour", "Colour [French]", "Date {NotAType}", "Date {nope:x}"] {
            let result = build_fields(&headers(&["Identifier", bad]), &registry, ITEM);
            match result {
                Err(PlastronError::DataRead(message)) => assert!(message.contains(bad)),
                other => panic!("expected a data read error for {}, got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn test_parse_value_string() {
        let registry = umd::registry();
        let fields = build_fields(
            &headers(&["Title [French]", "Rights Statement", "Handle"]),
            &registry,
            ITEM,
        )
        .unwrap();

        let title = &fields.get("title").unwrap()[0];
        assert_eq!(
            parse_value_string("a|b|", title),
            vec![
                Term::Literal(Literal::with_tags("a", Some("fr".into()), None)),
                Term::Literal(Literal::with_tags("b", Some("fr".into()), None)),
            ]
        );
        assert!(parse_value_string("", title).is_empty());
        assert_eq!(
            parse_value_string("a\\|b", title)
                .iter()
                .map(Term::text)
                .collect::<Vec<_>>(),
            vec!["a|b"]
        );

        let rights = &fields.get("rights").unwrap()[0];
        assert_eq!(
            parse_value_string("http://rightsstatements.org/vocab/NoC-US/1.0/", rights),
            vec![Term::Reference(
                "http://rightsstatements.org/vocab/NoC-US/1.0/".to_string()
            )]
        );

        let handle = &fields.get("handle").unwrap()[0];
        let values = parse_value_string("hdl:1903.1/1", handle);
        assert_eq!(
            values[0].as_literal().unwrap().datatype,
            Some(format!("{}handle", UMDTYPE))
        );
    }
}

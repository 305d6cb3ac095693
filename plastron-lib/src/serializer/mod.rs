//! Tables and row-unflattening logic shared by CSV import and export.

use std::collections::HashMap;

use uuid::Uuid;

use crate::error::PlastronError;
use crate::import::columns::{parse_value_string, ColumnFields};
use crate::model::ModelRegistry;
use crate::rdf::Term;

/// Columns that carry row bookkeeping rather than model properties
pub const SYSTEM_HEADERS: [&str; 7] = [
    "URI",
    "PUBLIC URI",
    "FILES",
    "ITEM_FILES",
    "INDEX",
    "PUBLISH",
    "HIDDEN",
];

const LANGUAGE_CODES: [(&str, &str); 14] = [
    ("Chinese", "zh"),
    ("English", "en"),
    ("French", "fr"),
    ("German", "de"),
    ("Greek", "el"),
    ("Hebrew", "he"),
    ("Italian", "it"),
    ("Japanese", "ja"),
    ("Japanese (Romanized)", "ja-latn"),
    ("Korean", "ko"),
    ("Latin", "la"),
    ("Portuguese", "pt"),
    ("Russian", "ru"),
    ("Spanish", "es"),
];

const DATATYPE_URIS: [(&str, &str); 8] = [
    ("Accession Number", "http://vocab.lib.umd.edu/datatype#accessionNumber"),
    ("Boolean", "http://www.w3.org/2001/XMLSchema#boolean"),
    ("Date", "http://www.w3.org/2001/XMLSchema#date"),
    ("DateTime", "http://www.w3.org/2001/XMLSchema#dateTime"),
    ("Decimal", "http://www.w3.org/2001/XMLSchema#decimal"),
    ("EDTF", "http://id.loc.gov/datatypes/edtf"),
    ("Handle", "http://vocab.lib.umd.edu/datatype#handle"),
    ("Integer", "http://www.w3.org/2001/XMLSchema#integer"),
];

pub fn language_code(label: &str) -> Option<&'static str> {
    LANGUAGE_CODES
        .iter()
        .find(|(name, _)| *name == label)
        .map(|(_, code)| *code)
}

pub fn datatype_uri(label: &str) -> Option<&'static str> {
    DATATYPE_URIS
        .iter()
        .find(|(name, _)| *name == label)
        .map(|(_, uri)| *uri)
}

/// Attribute name to position to embedded object fragment id
pub type LookupIndex = HashMap<String, HashMap<usize, String>>;

/// Parse an INDEX cell such as `creator[0]=#a1;creator[1]=#b2`.
pub fn build_lookup_index(index_string: Option<&str>) -> Result<LookupIndex, PlastronError> {
    let mut index = LookupIndex::new();
    let Some(index_string) = index_string else {
        return Ok(index);
    };
    for entry in index_string.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let malformed = || PlastronError::DataRead(format!("Malformed INDEX entry \"{}\"", entry));
        let (key, fragment) = entry.split_once('=').ok_or_else(malformed)?;
        let (attr, position) = key
            .trim()
            .strip_suffix(']')
            .and_then(|k| k.split_once('['))
            .ok_or_else(malformed)?;
        let position: usize = position.trim().parse().map_err(|_| malformed())?;
        let fragment = fragment.trim().trim_start_matches('#');
        if attr.is_empty() || fragment.is_empty() {
            return Err(malformed());
        }
        index
            .entry(attr.to_string())
            .or_default()
            .insert(position, fragment.to_string());
    }
    Ok(index)
}

/// Property values for one object, ready to be set on a resource
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectParams {
    pub values: Vec<(String, Vec<Term>)>,
    pub embedded: Vec<(String, Vec<EmbeddedParams>)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedParams {
    pub fragment_id: String,
    pub class: String,
    pub params: ObjectParams,
}

impl ObjectParams {
    pub fn values_for(&self, attr: &str) -> Option<&[Term]> {
        self.values
            .iter()
            .find(|(a, _)| a == attr)
            .map(|(_, values)| values.as_slice())
    }

    pub fn embedded_for(&self, attr: &str) -> Option<&[EmbeddedParams]> {
        self.embedded
            .iter()
            .find(|(a, _)| a == attr)
            .map(|(_, objects)| objects.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.embedded.is_empty()
    }

    fn values_mut(&mut self, attr: &str) -> &mut Vec<Term> {
        let position = match self.values.iter().position(|(a, _)| a == attr) {
            Some(position) => position,
            None => {
                self.values.push((attr.to_string(), Vec::new()));
                self.values.len() - 1
            }
        };
        &mut self.values[position].1
    }

    /// The embedded object at `position` of `attr`, creating it (and any
    /// missing objects before it) as needed.
    fn embedded_at(
        &mut self,
        attr: &str,
        position: usize,
        class: &str,
        index: Option<&LookupIndex>,
    ) -> &mut EmbeddedParams {
        let slot = match self.embedded.iter().position(|(a, _)| a == attr) {
            Some(slot) => slot,
            None => {
                self.embedded.push((attr.to_string(), Vec::new()));
                self.embedded.len() - 1
            }
        };
        let objects = &mut self.embedded[slot].1;
        while objects.len() <= position {
            let next = objects.len();
            let fragment_id = index
                .and_then(|index| index.get(attr))
                .and_then(|positions| positions.get(&next))
                .cloned()
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            objects.push(EmbeddedParams {
                fragment_id,
                class: class.to_string(),
                params: ObjectParams::default(),
            });
        }
        &mut objects[position]
    }

    fn assign(
        &mut self,
        registry: &ModelRegistry,
        class_name: &str,
        segments: &[&str],
        values: Vec<Term>,
        index: Option<&LookupIndex>,
    ) -> Result<(), PlastronError> {
        match segments {
            [] => Ok(()),
            [attr] => {
                self.values_mut(attr).extend(values);
                Ok(())
            }
            [attr, rest @ ..] => {
                let property = registry.class(class_name)?.property(attr)?;
                let object_class = property.object_class().ok_or_else(|| {
                    PlastronError::DataRead(format!(
                        "Property \"{}\" of {} does not refer to a model class",
                        attr, class_name
                    ))
                })?;
                for (position, value) in values.into_iter().enumerate() {
                    let embedded = self.embedded_at(attr, position, object_class, index);
                    // below the first level each object holds a single value
                    embedded
                        .params
                        .assign(registry, object_class, rest, vec![value], None)?;
                }
                Ok(())
            }
        }
    }
}

/// Turn one row's cells into object parameters. Values at the same position
/// in different columns of a nested attribute land on the same embedded
/// object, so `Creator` and `Creator [French]` can label one creator.
pub fn unflatten(
    data: &HashMap<String, String>,
    fields: &ColumnFields,
    registry: &ModelRegistry,
    class_name: &str,
    index: &LookupIndex,
) -> Result<ObjectParams, PlastronError> {
    let mut params = ObjectParams::default();
    for (attrs, columns) in fields.iter() {
        let segments: Vec<&str> = attrs.split('.').collect();
        for column in columns {
            let raw = data.get(&column.header).map(String::as_str).unwrap_or("");
            let values = parse_value_string(raw, column);
            if values.is_empty() {
                continue;
            }
            params.assign(registry, class_name, &segments, values, Some(index))?;
        }
    }
    Ok(params)
}

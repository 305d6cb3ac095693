//! Model classes: a static registry of property descriptors per class, used
//! to resolve spreadsheet headers and to build resources.

pub mod resource;
pub mod umd;

use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::PlastronError;
use crate::rdf::namespaces::expand_or_keep;
use crate::rdf::Term;

pub use resource::Resource;

/// Header map key naming the column that identifies each row
pub const IDENTIFIER_ATTR: &str = "identifier";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PropertyKind {
    Literal {
        #[serde(default)]
        datatype: Option<String>,
    },
    Reference {
        #[serde(default)]
        class: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub predicate: String,
    #[serde(flatten)]
    pub kind: PropertyKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub repeatable: bool,
    #[serde(default)]
    pub embed: bool,
}

impl PropertyDescriptor {
    pub fn literal(predicate: impl Into<String>) -> Self {
        Self {
            predicate: predicate.into(),
            kind: PropertyKind::Literal { datatype: None },
            required: false,
            repeatable: false,
            embed: false,
        }
    }

    pub fn reference(predicate: impl Into<String>) -> Self {
        Self {
            predicate: predicate.into(),
            kind: PropertyKind::Reference { class: None },
            required: false,
            repeatable: false,
            embed: false,
        }
    }

    pub fn with_datatype(mut self, datatype: impl Into<String>) -> Self {
        self.kind = PropertyKind::Literal {
            datatype: Some(datatype.into()),
        };
        self
    }

    /// Values of this property are embedded objects of the given class
    pub fn embedding(mut self, class: impl Into<String>) -> Self {
        self.kind = PropertyKind::Reference {
            class: Some(class.into()),
        };
        self.embed = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn repeatable(mut self) -> Self {
        self.repeatable = true;
        self
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.kind, PropertyKind::Literal { .. })
    }

    pub fn datatype(&self) -> Option<&str> {
        match &self.kind {
            PropertyKind::Literal { datatype } => datatype.as_deref(),
            PropertyKind::Reference { .. } => None,
        }
    }

    pub fn object_class(&self) -> Option<&str> {
        match &self.kind {
            PropertyKind::Reference { class } => class.as_deref(),
            PropertyKind::Literal { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ModelClass {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub types: Vec<String>,
    pub properties: BTreeMap<String, PropertyDescriptor>,
    /// Attribute path (e.g. `creator.label`) to spreadsheet header
    #[serde(default)]
    pub header_map: BTreeMap<String, String>,
}

impl ModelClass {
    pub fn property(&self, name: &str) -> Result<&PropertyDescriptor, PlastronError> {
        self.properties.get(name).ok_or_else(|| {
            PlastronError::DataRead(format!("{} has no property \"{}\"", self.name, name))
        })
    }

    /// The spreadsheet header of the identifier column
    pub fn identifier_column(&self) -> Result<&str, PlastronError> {
        self.header_map
            .get(IDENTIFIER_ATTR)
            .map(String::as_str)
            .ok_or_else(|| {
                PlastronError::Config(format!(
                    "Model {} has no \"{}\" entry in its header map",
                    self.name, IDENTIFIER_ATTR
                ))
            })
    }

    /// Invert the header map: spreadsheet header to attribute path.
    pub fn flatten_headers(&self) -> HashMap<String, String> {
        self.header_map
            .iter()
            .map(|(attrs, header)| (header.clone(), attrs.clone()))
            .collect()
    }

    /// Whether `term`, found under the predicate of property `name`, belongs
    /// to that property. Several literal properties may share a predicate and
    /// are told apart by their datatype.
    pub fn owns_value(&self, name: &str, term: &Term) -> bool {
        let Some(property) = self.properties.get(name) else {
            return false;
        };
        match (&property.kind, term) {
            (PropertyKind::Reference { .. }, Term::Reference(_)) => true,
            (PropertyKind::Literal { datatype: Some(datatype) }, Term::Literal(literal)) => {
                literal.datatype.as_deref() == Some(datatype.as_str())
            }
            (PropertyKind::Literal { datatype: None }, Term::Literal(literal)) => {
                match &literal.datatype {
                    None => true,
                    Some(value_datatype) => !self.properties.iter().any(|(other, p)| {
                        other != name
                            && p.predicate == property.predicate
                            && p.datatype() == Some(value_datatype.as_str())
                    }),
                }
            }
            _ => false,
        }
    }

    fn expand_names(&mut self) {
        self.types = self.types.iter().map(|t| expand_or_keep(t)).collect();
        for property in self.properties.values_mut() {
            property.predicate = expand_or_keep(&property.predicate);
            if let PropertyKind::Literal {
                datatype: Some(datatype),
            } = &mut property.kind
            {
                *datatype = expand_or_keep(datatype);
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModelDefinitions {
    classes: BTreeMap<String, ModelClass>,
}

#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    classes: HashMap<String, ModelClass>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, class: ModelClass) {
        self.classes.insert(class.name.clone(), class);
    }

    /// Read class definitions from a JSON file, which may contain comments.
    /// Predicates, types, and datatypes may be written as CURIEs.
    pub fn from_file<P: Into<PathBuf>>(path: P) -> Result<Self, PlastronError> {
        let path = path.into();
        tracing::info!("Loading model definitions from {:?}", path);
        let file = std::fs::File::open(&path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, PlastronError> {
        let stripped = json_comments::StripComments::new(reader);
        let definitions: ModelDefinitions = serde_json::from_reader(stripped)?;
        let mut registry = Self::new();
        for (name, mut class) in definitions.classes {
            class.name = name;
            class.expand_names();
            registry.register(class);
        }
        registry.check_references()?;
        Ok(registry)
    }

    fn check_references(&self) -> Result<(), PlastronError> {
        for class in self.classes.values() {
            for (name, property) in &class.properties {
                if let Some(target) = property.object_class() {
                    if !self.classes.contains_key(target) {
                        return Err(PlastronError::Config(format!(
                            "Property {}.{} refers to unknown model class \"{}\"",
                            class.name, name, target
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn class(&self, name: &str) -> Result<&ModelClass, PlastronError> {
        self.classes
            .get(name)
            .ok_or_else(|| PlastronError::Config(format!("Unknown model class \"{}\"", name)))
    }

    pub fn class_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.classes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Walk a dotted attribute path from `class_name`, descending into the
    /// declared class of each reference property, and return the descriptor
    /// of the final segment.
    pub fn resolve_path(
        &self,
        class_name: &str,
        path: &str,
    ) -> Result<&PropertyDescriptor, PlastronError> {
        let mut class = self.class(class_name)?;
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            let property = class.properties.get(segment).ok_or_else(|| {
                PlastronError::DataRead(format!(
                    "Unknown property \"{}\" in \"{}\" for model {}",
                    segment, path, class.name
                ))
            })?;
            if segments.peek().is_none() {
                return Ok(property);
            }
            let next = property.object_class().ok_or_else(|| {
                PlastronError::DataRead(format!(
                    "Property \"{}\" in \"{}\" does not refer to a model class",
                    segment, path
                ))
            })?;
            class = self.class(next)?;
        }
        Err(PlastronError::DataRead(format!(
            "Empty attribute path for model {}",
            class_name
        )))
    }

    /// Required properties without a value and non-repeatable properties
    /// with more than one, for the resource and its embedded objects.
    pub fn validate(&self, resource: &Resource) -> Result<Vec<String>, PlastronError> {
        let mut problems = Vec::new();
        let mut pending = vec![(resource.subject().to_string(), resource.class.clone())];
        while let Some((subject, class_name)) = pending.pop() {
            let class = self.class(&class_name)?;
            for (name, property) in &class.properties {
                let values: Vec<&Term> = resource
                    .graph
                    .objects(&subject, &property.predicate)
                    .filter(|term| class.owns_value(name, term))
                    .collect();
                if property.required && values.is_empty() {
                    problems.push(format!("{} is required", describe(&subject, name)));
                }
                if !property.repeatable && values.len() > 1 {
                    problems.push(format!(
                        "{} is not repeatable, but has {} values",
                        describe(&subject, name),
                        values.len()
                    ));
                }
                if let (true, Some(target)) = (property.embed, property.object_class()) {
                    for value in values.iter().filter_map(|v| v.as_reference()) {
                        pending.push((value.to_string(), target.to_string()));
                    }
                }
            }
        }
        Ok(problems)
    }
}

fn describe(subject: &str, name: &str) -> String {
    match subject.split_once('#') {
        Some((_, fragment)) => format!("\"{}\" of #{}", name, fragment),
        None => format!("\"{}\"", name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::namespaces::{DCTERMS, RDFS, XSD};

    const DEFINITIONS: &str = r#"{
        // a tiny model
        "classes": {
            "Thing": {
                "types": ["pcdm:Object"],
                "properties": {
                    "title": { "predicate": "dcterms:title", "kind": "literal", "required": true },
                    "date": { "predicate": "dc:date", "kind": "literal", "datatype": "xsd:date" },
                    "creator": {
                        "predicate": "dcterms:creator",
                        "kind": "reference",
                        "class": "Agent",
                        "embed": true,
                        "repeatable": true
                    }
                },
                "headerMap": {
                    "identifier": "Identifier",
                    "title": "Title",
                    "creator.label": "Creator"
                }
            },
            "Agent": {
                "properties": {
                    "label": { "predicate": "rdfs:label", "kind": "literal" }
                }
            }
        }
    }"#;

    #[test]
    fn test_load_definitions() {
        let registry = ModelRegistry::from_reader(DEFINITIONS.as_bytes()).unwrap();
        assert_eq!(registry.class_names(), vec!["Agent", "Thing"]);
        let thing = registry.class("Thing").unwrap();
        assert_eq!(thing.types, vec!["http://pcdm.org/models#Object"]);
        assert_eq!(
            thing.property("date").unwrap().datatype(),
            Some(format!("{}date", XSD).as_str())
        );
        assert_eq!(thing.identifier_column().unwrap(), "Identifier");
        assert_eq!(
            thing.flatten_headers().get("Creator").map(String::as_str),
            Some("creator.label")
        );
    }

    #[test]
    fn test_resolve_path() {
        let registry = ModelRegistry::from_reader(DEFINITIONS.as_bytes()).unwrap();
        let label = registry.resolve_path("Thing", "creator.label").unwrap();
        assert_eq!(label.predicate, format!("{}label", RDFS));
        assert!(label.is_literal());

        let title = registry.resolve_path("Thing", "title").unwrap();
        assert_eq!(title.predicate, format!("{}title", DCTERMS));

        assert!(matches!(
            registry.resolve_path("Thing", "creator.name"),
            Err(PlastronError::DataRead(_))
        ));
        assert!(matches!(
            registry.resolve_path("Thing", "title.label"),
            Err(PlastronError::DataRead(_))
        ));
    }

    #[test]
    fn test_unknown_class_reference_is_rejected() {
        let definitions = r#"{"classes": {"A": {"properties": {
            "b": {"predicate": "dcterms:relation", "kind": "reference", "class": "B"}
        }}}}"#;
        assert!(matches!(
            ModelRegistry::from_reader(definitions.as_bytes()),
            Err(PlastronError::Config(_))
        ));
    }
}

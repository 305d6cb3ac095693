//! Built-in models for the digital collections `Item` content model.

use std::collections::BTreeMap;

use super::{ModelClass, ModelRegistry, PropertyDescriptor};
use crate::rdf::namespaces::{DC, DCTERMS, EDM, OWL, PCDM, RDFS, UMDTYPE};

pub const ITEM: &str = "Item";
pub const LABELED_THING: &str = "LabeledThing";

fn iri(namespace: &str, local: &str) -> String {
    format!("{}{}", namespace, local)
}

pub fn labeled_thing() -> ModelClass {
    ModelClass {
        name: LABELED_THING.to_string(),
        types: Vec::new(),
        properties: BTreeMap::from([
            (
                "label".to_string(),
                PropertyDescriptor::literal(iri(RDFS, "label")).required(),
            ),
            (
                "same_as".to_string(),
                PropertyDescriptor::reference(iri(OWL, "sameAs")),
            ),
        ]),
        header_map: BTreeMap::new(),
    }
}

pub fn item() -> ModelClass {
    let labeled = |predicate: &str| {
        PropertyDescriptor::reference(iri(DCTERMS, predicate))
            .embedding(LABELED_THING)
            .repeatable()
    };
    let properties = BTreeMap::from([
        (
            "object_type",
            PropertyDescriptor::reference(iri(DCTERMS, "type")).required(),
        ),
        (
            "identifier",
            PropertyDescriptor::literal(iri(DCTERMS, "identifier"))
                .required()
                .repeatable(),
        ),
        (
            "rights",
            PropertyDescriptor::reference(iri(DCTERMS, "rights")).required(),
        ),
        (
            "title",
            PropertyDescriptor::literal(iri(DCTERMS, "title"))
                .required()
                .repeatable(),
        ),
        ("format", PropertyDescriptor::reference(iri(EDM, "hasType"))),
        (
            "archival_collection",
            PropertyDescriptor::reference(iri(DCTERMS, "isPartOf")),
        ),
        ("date", PropertyDescriptor::literal(iri(DC, "date"))),
        (
            "description",
            PropertyDescriptor::literal(iri(DCTERMS, "description")).repeatable(),
        ),
        (
            "alternate_title",
            PropertyDescriptor::literal(iri(DCTERMS, "alternative")).repeatable(),
        ),
        ("creator", labeled("creator")),
        ("contributor", labeled("contributor")),
        ("publisher", labeled("publisher")),
        ("location", labeled("spatial")),
        ("subject", labeled("subject")),
        ("rights_holder", labeled("rightsHolder")),
        (
            "extent",
            PropertyDescriptor::literal(iri(DCTERMS, "extent")).repeatable(),
        ),
        (
            "language",
            PropertyDescriptor::literal(iri(DC, "language")).repeatable(),
        ),
        (
            "bibliographic_citation",
            PropertyDescriptor::literal(iri(DCTERMS, "bibliographicCitation")),
        ),
        (
            "accession_number",
            PropertyDescriptor::literal(iri(DCTERMS, "identifier"))
                .with_datatype(iri(UMDTYPE, "accessionNumber")),
        ),
        (
            "handle",
            PropertyDescriptor::literal(iri(DCTERMS, "identifier"))
                .with_datatype(iri(UMDTYPE, "handle")),
        ),
        (
            "member_of",
            PropertyDescriptor::reference(iri(PCDM, "memberOf")).repeatable(),
        ),
    ]);

    let header_map = BTreeMap::from([
        ("object_type", "Object Type"),
        ("identifier", "Identifier"),
        ("rights", "Rights Statement"),
        ("title", "Title"),
        ("format", "Format"),
        ("archival_collection", "Archival Collection"),
        ("date", "Date"),
        ("description", "Description"),
        ("alternate_title", "Alternate Title"),
        ("creator.label", "Creator"),
        ("creator.same_as", "Creator URI"),
        ("contributor.label", "Contributor"),
        ("contributor.same_as", "Contributor URI"),
        ("publisher.label", "Publisher"),
        ("publisher.same_as", "Publisher URI"),
        ("location.label", "Location"),
        ("extent", "Extent"),
        ("subject.label", "Subject"),
        ("language", "Language"),
        ("rights_holder.label", "Rights Holder"),
        ("bibliographic_citation", "Collection Information"),
        ("accession_number", "Accession Number"),
        ("handle", "Handle"),
    ]);

    ModelClass {
        name: ITEM.to_string(),
        types: vec![iri(PCDM, "Object")],
        properties: properties
            .into_iter()
            .map(|(name, property)| (name.to_string(), property))
            .collect(),
        header_map: header_map
            .into_iter()
            .map(|(attrs, header)| (attrs.to_string(), header.to_string()))
            .collect(),
    }
}

/// Registry holding the built-in classes
pub fn registry() -> ModelRegistry {
    let mut registry = ModelRegistry::new();
    registry.register(item());
    registry.register(labeled_thing());
    registry
}

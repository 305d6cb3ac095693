//! Namespace prefixes used by the repository models.

pub const ACL: &str = "http://www.w3.org/ns/auth/acl#";
pub const BIBO: &str = "http://purl.org/ontology/bibo/";
pub const DC: &str = "http://purl.org/dc/elements/1.1/";
pub const DCMITYPE: &str = "http://purl.org/dc/dcmitype/";
pub const DCTERMS: &str = "http://purl.org/dc/terms/";
pub const EBUCORE: &str = "http://www.ebu.ch/metadata/ontologies/ebucore/ebucore#";
pub const EDM: &str = "http://www.europeana.eu/schemas/edm/";
pub const FABIO: &str = "http://purl.org/spar/fabio/";
pub const FEDORA: &str = "http://fedora.info/definitions/v4/repository#";
pub const FOAF: &str = "http://xmlns.com/foaf/0.1/";
pub const IANA: &str = "http://www.iana.org/assignments/relation/";
pub const LDP: &str = "http://www.w3.org/ns/ldp#";
pub const ORE: &str = "http://www.openarchives.org/ore/terms/";
pub const OWL: &str = "http://www.w3.org/2002/07/owl#";
pub const PCDM: &str = "http://pcdm.org/models#";
pub const PCDMUSE: &str = "http://pcdm.org/use#";
pub const PREMIS: &str = "http://www.loc.gov/premis/rdf/v1#";
pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const RDFS: &str = "http://www.w3.org/2000/01/rdf-schema#";
pub const SKOS: &str = "http://www.w3.org/2004/02/skos/core#";
pub const UMDTYPE: &str = "http://vocab.lib.umd.edu/datatype#";
pub const UMDFORM: &str = "http://vocab.lib.umd.edu/form#";
pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

pub const PREFIXES: [(&str, &str); 23] = [
    ("acl", ACL),
    ("bibo", BIBO),
    ("dc", DC),
    ("dcmitype", DCMITYPE),
    ("dcterms", DCTERMS),
    ("ebucore", EBUCORE),
    ("edm", EDM),
    ("fabio", FABIO),
    ("fedora", FEDORA),
    ("foaf", FOAF),
    ("iana", IANA),
    ("ldp", LDP),
    ("ore", ORE),
    ("owl", OWL),
    ("pcdm", PCDM),
    ("pcdmuse", PCDMUSE),
    ("premis", PREMIS),
    ("rdf", RDF),
    ("rdfs", RDFS),
    ("skos", SKOS),
    ("umdtype", UMDTYPE),
    ("umdform", UMDFORM),
    ("xsd", XSD),
];

pub fn namespace_for(prefix: &str) -> Option<&'static str> {
    PREFIXES
        .iter()
        .find(|(p, _)| *p == prefix)
        .map(|(_, namespace)| *namespace)
}

/// Resolve an N3-style URI reference: either `<absolute-iri>` or a
/// `prefix:local` CURIE with a known prefix. Anything else (bare words,
/// quoted literals, unknown prefixes) is not a URI reference.
pub fn expand_curie(text: &str) -> Option<String> {
    let text = text.trim();
    if let Some(iri) = text.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
        return if iri.is_empty() { None } else { Some(iri.to_string()) };
    }
    let (prefix, local) = text.split_once(':')?;
    if local.starts_with("//") {
        // an absolute IRI written without angle brackets
        return Some(text.to_string());
    }
    namespace_for(prefix).map(|namespace| format!("{}{}", namespace, local))
}

/// Like [`expand_curie`], but passes through values that are already
/// absolute IRIs or cannot be expanded.
pub fn expand_or_keep(text: &str) -> String {
    expand_curie(text).unwrap_or_else(|| text.to_string())
}

//! Minimal RDF terms and an insertion-ordered triple graph.

pub mod jsonld;
pub mod namespaces;

use std::collections::HashSet;
use std::fmt::Display;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Literal {
    pub value: String,
    pub language: Option<String>,
    pub datatype: Option<String>,
}

impl Literal {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            language: None,
            datatype: None,
        }
    }

    /// A literal carries a language tag or a datatype, never both. When both
    /// are given the language tag wins, as it does for `rdf:langString`.
    pub fn with_tags(
        value: impl Into<String>,
        language: Option<String>,
        datatype: Option<String>,
    ) -> Self {
        let datatype = if language.is_some() { None } else { datatype };
        Self {
            value: value.into(),
            language,
            datatype,
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.value)?;
        if let Some(language) = &self.language {
            write!(f, "@{}", language)?;
        } else if let Some(datatype) = &self.datatype {
            write!(f, "^^<{}>", datatype)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    Literal(Literal),
    Reference(String),
}

impl Term {
    pub fn as_reference(&self) -> Option<&str> {
        match self {
            Term::Reference(iri) => Some(iri),
            Term::Literal(_) => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Term::Literal(literal) => Some(literal),
            Term::Reference(_) => None,
        }
    }

    /// The lexical form of a literal, or the IRI of a reference
    pub fn text(&self) -> &str {
        match self {
            Term::Literal(literal) => &literal.value,
            Term::Reference(iri) => iri,
        }
    }
}

impl Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Term::Literal(literal) => write!(f, "{}", literal),
            Term::Reference(iri) => write!(f, "<{}>", iri),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: Term,
}

impl Triple {
    pub fn new(subject: impl Into<String>, predicate: impl Into<String>, object: Term) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object,
        }
    }
}

/// The resource a subject belongs to: embedded `#fragment` subjects belong
/// to the IRI before the `#`.
pub fn owner_of(subject: &str) -> &str {
    subject.split_once('#').map(|(base, _)| base).unwrap_or(subject)
}

/// A set of triples that remembers the order they were added in.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    triples: Vec<Triple>,
    index: HashSet<Triple>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the triple was already present
    pub fn add(&mut self, triple: Triple) -> bool {
        if self.index.contains(&triple) {
            return false;
        }
        self.index.insert(triple.clone());
        self.triples.push(triple);
        true
    }

    pub fn extend(&mut self, other: Graph) {
        for triple in other.triples {
            self.add(triple);
        }
    }

    /// Remove every triple with the given subject and predicate, returning
    /// how many were removed.
    pub fn remove(&mut self, subject: &str, predicate: &str) -> usize {
        self.remove_if(subject, predicate, |_| true)
    }

    /// Remove the triples with the given subject and predicate whose object
    /// satisfies `matches`.
    pub fn remove_if<F>(&mut self, subject: &str, predicate: &str, matches: F) -> usize
    where
        F: Fn(&Term) -> bool,
    {
        let before = self.triples.len();
        let index = &mut self.index;
        self.triples.retain(|t| {
            if t.subject == subject && t.predicate == predicate && matches(&t.object) {
                index.remove(t);
                false
            } else {
                true
            }
        });
        before - self.triples.len()
    }

    /// Remove every triple whose subject satisfies `matches`
    pub fn remove_subjects<F>(&mut self, matches: F) -> usize
    where
        F: Fn(&str) -> bool,
    {
        let before = self.triples.len();
        let index = &mut self.index;
        self.triples.retain(|t| {
            if matches(&t.subject) {
                index.remove(t);
                false
            } else {
                true
            }
        });
        before - self.triples.len()
    }

    pub fn objects<'a, 'b>(
        &'a self,
        subject: &'b str,
        predicate: &'b str,
    ) -> impl Iterator<Item = &'a Term> + 'b
    where
        'a: 'b,
    {
        self.triples
            .iter()
            .filter(move |t| t.subject == subject && t.predicate == predicate)
            .map(|t| &t.object)
    }

    /// Distinct subjects, in order of first appearance
    pub fn subjects(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.triples
            .iter()
            .filter(|t| seen.insert(t.subject.as_str()))
            .map(|t| t.subject.as_str())
            .collect()
    }

    pub fn contains(&self, triple: &Triple) -> bool {
        self.index.contains(triple)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TITLE: &str = "http://purl.org/dc/terms/title";

    #[test]
    fn test_graph_add_and_remove() {
        let mut graph = Graph::new();
        assert!(graph.add(Triple::new("", TITLE, Term::Literal(Literal::new("One")))));
        assert!(!graph.add(Triple::new("", TITLE, Term::Literal(Literal::new("One")))));
        graph.add(Triple::new("", TITLE, Term::Literal(Literal::new("Two"))));
        graph.add(Triple::new("#a", TITLE, Term::Literal(Literal::new("Three"))));
        assert_eq!(graph.len(), 3);
        assert_eq!(graph.objects("", TITLE).count(), 2);
        assert_eq!(graph.subjects(), vec!["", "#a"]);

        assert_eq!(graph.remove("", TITLE), 2);
        assert_eq!(graph.len(), 1);
        // the removed triple can be added again
        assert!(graph.add(Triple::new("", TITLE, Term::Literal(Literal::new("One")))));
    }

    #[test]
    fn test_remove_subjects_by_owner() {
        let mut graph = Graph::new();
        graph.add(Triple::new("urn:a", TITLE, Term::Literal(Literal::new("A"))));
        graph.add(Triple::new("urn:a#x", TITLE, Term::Literal(Literal::new("X"))));
        graph.add(Triple::new("urn:b", TITLE, Term::Literal(Literal::new("B"))));
        assert_eq!(graph.remove_subjects(|s| owner_of(s) == "urn:a"), 2);
        assert_eq!(graph.subjects(), vec!["urn:b"]);
        assert!(graph.add(Triple::new("urn:a", TITLE, Term::Literal(Literal::new("A")))));
    }

    #[test]
    fn test_literal_tags_are_exclusive() {
        let literal = Literal::with_tags(
            "Bonjour",
            Some("fr".to_string()),
            Some("http://www.w3.org/2001/XMLSchema#string".to_string()),
        );
        assert_eq!(literal.language.as_deref(), Some("fr"));
        assert!(literal.datatype.is_none());
        assert_eq!(literal.to_string(), "\"Bonjour\"@fr");
    }
}

use super::{ModelClass, ModelRegistry};
use crate::error::PlastronError;
use crate::rdf::namespaces::RDF_TYPE;
use crate::rdf::{Graph, Term, Triple};
use crate::serializer::ObjectParams;

/// An in-memory resource of a model class. A resource without a URI has not
/// been created in the repository yet; its subject is the empty relative IRI.
#[derive(Debug, Clone)]
pub struct Resource {
    pub uri: Option<String>,
    pub class: String,
    pub graph: Graph,
}

impl Resource {
    pub fn new(class: impl Into<String>, uri: Option<String>, graph: Graph) -> Self {
        Self {
            uri,
            class: class.into(),
            graph,
        }
    }

    pub fn subject(&self) -> &str {
        self.uri.as_deref().unwrap_or("")
    }

    pub fn is_new(&self) -> bool {
        self.uri.is_none()
    }

    pub fn embedded_subject(&self, fragment_id: &str) -> String {
        format!("{}#{}", self.subject(), fragment_id)
    }

    /// Values of a top-level property
    pub fn values<'a>(
        &'a self,
        registry: &ModelRegistry,
        name: &str,
    ) -> Result<Vec<&'a Term>, PlastronError> {
        let class = registry.class(&self.class)?;
        let property = class.property(name)?;
        Ok(self
            .graph
            .objects(self.subject(), &property.predicate)
            .filter(|term| class.owns_value(name, term))
            .collect())
    }

    /// Replace the values of every property named in `params`, keeping any
    /// other statements already in the graph.
    pub fn set_properties(
        &mut self,
        registry: &ModelRegistry,
        params: &ObjectParams,
    ) -> Result<(), PlastronError> {
        let class = registry.class(&self.class)?;
        let subject = self.subject().to_string();
        add_types(&mut self.graph, &subject, class);
        apply(&mut self.graph, registry, class, &subject, &subject, params)
    }

    /// Give a new resource its URI, rebasing the relative subjects of the
    /// resource and its embedded objects onto it.
    pub fn assign_uri(&mut self, uri: &str) {
        if self.uri.is_some() {
            return;
        }
        let rebase = |iri: &str| {
            if iri.is_empty() || iri.starts_with('#') {
                Some(format!("{}{}", uri, iri))
            } else {
                None
            }
        };
        let mut graph = Graph::new();
        for triple in self.graph.iter() {
            let subject = rebase(&triple.subject).unwrap_or_else(|| triple.subject.clone());
            let object = match &triple.object {
                Term::Reference(iri) => rebase(iri)
                    .map(Term::Reference)
                    .unwrap_or_else(|| triple.object.clone()),
                literal => literal.clone(),
            };
            graph.add(Triple::new(subject, triple.predicate.as_str(), object));
        }
        self.graph = graph;
        self.uri = Some(uri.to_string());
    }
}

fn add_types(graph: &mut Graph, subject: &str, class: &ModelClass) {
    for rdf_type in &class.types {
        graph.add(Triple::new(subject, RDF_TYPE, Term::Reference(rdf_type.clone())));
    }
}

fn apply(
    graph: &mut Graph,
    registry: &ModelRegistry,
    class: &ModelClass,
    root: &str,
    subject: &str,
    params: &ObjectParams,
) -> Result<(), PlastronError> {
    for (name, values) in &params.values {
        let property = class.property(name)?;
        graph.remove_if(subject, &property.predicate, |term| {
            class.owns_value(name, term)
        });
        for value in values {
            graph.add(Triple::new(subject, property.predicate.as_str(), value.clone()));
        }
    }

    for (name, objects) in &params.embedded {
        let property = class.property(name)?;
        graph.remove_if(subject, &property.predicate, |term| {
            class.owns_value(name, term)
        });
        for object in objects {
            let object_class = registry.class(&object.class)?;
            // fragments hang off the top-level resource, however deep the nesting
            let object_subject = format!("{}#{}", root, object.fragment_id);
            graph.add(Triple::new(
                subject,
                property.predicate.as_str(),
                Term::Reference(object_subject.clone()),
            ));
            add_types(graph, &object_subject, object_class);
            apply(graph, registry, object_class, root, &object_subject, &object.params)?;
        }
    }
    Ok(())
}

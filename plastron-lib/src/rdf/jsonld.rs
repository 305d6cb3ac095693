//! Expanded JSON-LD rendering of a [`Graph`], one node object per subject.

use serde_json::{json, Map, Value};

use super::namespaces::RDF_TYPE;
use super::{Graph, Literal, Term, Triple};
use crate::error::PlastronError;

fn term_to_json(term: &Term) -> Value {
    match term {
        Term::Reference(iri) => json!({ "@id": iri }),
        Term::Literal(literal) => {
            let mut object = Map::new();
            object.insert("@value".to_string(), Value::String(literal.value.clone()));
            if let Some(language) = &literal.language {
                object.insert("@language".to_string(), Value::String(language.clone()));
            } else if let Some(datatype) = &literal.datatype {
                object.insert("@type".to_string(), Value::String(datatype.clone()));
            }
            Value::Object(object)
        }
    }
}

pub fn graph_to_jsonld(graph: &Graph) -> Vec<Value> {
    graph
        .subjects()
        .into_iter()
        .map(|subject| {
            let mut node = Map::new();
            node.insert("@id".to_string(), Value::String(subject.to_string()));
            for triple in graph.iter().filter(|t| t.subject == subject) {
                if triple.predicate == RDF_TYPE {
                    if let Term::Reference(class) = &triple.object {
                        push_value(&mut node, "@type", Value::String(class.clone()));
                        continue;
                    }
                }
                push_value(&mut node, &triple.predicate, term_to_json(&triple.object));
            }
            Value::Object(node)
        })
        .collect()
}

fn push_value(node: &mut Map<String, Value>, key: &str, value: Value) {
    if let Value::Array(values) = node
        .entry(key.to_string())
        .or_insert_with(|| Value::Array(Vec::new()))
    {
        values.push(value);
    }
}

fn json_to_term(value: &Value) -> Result<Term, PlastronError> {
    match value {
        Value::String(s) => Ok(Term::Literal(Literal::new(s.clone()))),
        Value::Object(object) => {
            if let Some(iri) = object.get("@id").and_then(Value::as_str) {
                return Ok(Term::Reference(iri.to_string()));
            }
            let lexical = match object.get("@value") {
                Some(Value::String(s)) => s.clone(),
                Some(other @ (Value::Number(_) | Value::Bool(_))) => other.to_string(),
                _ => {
                    return Err(PlastronError::DataRead(format!(
                        "JSON-LD value object without @id or @value: {}",
                        value
                    )))
                }
            };
            let language = object
                .get("@language")
                .and_then(Value::as_str)
                .map(str::to_string);
            let datatype = object.get("@type").and_then(Value::as_str).map(str::to_string);
            Ok(Term::Literal(Literal::with_tags(lexical, language, datatype)))
        }
        Value::Number(_) | Value::Bool(_) => Ok(Term::Literal(Literal::new(value.to_string()))),
        _ => Err(PlastronError::DataRead(format!(
            "Unsupported JSON-LD value: {}",
            value
        ))),
    }
}

/// Read node objects in the shape produced by [`graph_to_jsonld`]. Accepts a
/// bare array of nodes or a document with an `@graph` array.
pub fn graph_from_jsonld(document: &Value) -> Result<Graph, PlastronError> {
    let nodes = match document {
        Value::Array(nodes) => nodes,
        Value::Object(object) => match object.get("@graph") {
            Some(Value::Array(nodes)) => nodes,
            _ => {
                return Err(PlastronError::DataRead(
                    "JSON-LD document has no @graph array".to_string(),
                ))
            }
        },
        _ => {
            return Err(PlastronError::DataRead(
                "JSON-LD document must be an array or an object".to_string(),
            ))
        }
    };

    let mut graph = Graph::new();
    for node in nodes {
        let object = node.as_object().ok_or_else(|| {
            PlastronError::DataRead(format!("JSON-LD node is not an object: {}", node))
        })?;
        let subject = object
            .get("@id")
            .and_then(Value::as_str)
            .ok_or_else(|| PlastronError::DataRead("JSON-LD node without @id".to_string()))?;
        for (key, values) in object {
            if key == "@id" {
                continue;
            }
            let values = match values {
                Value::Array(values) => values.clone(),
                single => vec![single.clone()],
            };
            for value in &values {
                if key == "@type" {
                    let class = value.as_str().ok_or_else(|| {
                        PlastronError::DataRead(format!("Invalid @type on {}", subject))
                    })?;
                    graph.add(Triple::new(subject, RDF_TYPE, Term::Reference(class.to_string())));
                } else {
                    graph.add(Triple::new(subject, key.as_str(), json_to_term(value)?));
                }
            }
        }
    }
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::namespaces::{DCTERMS, PCDM};

    #[test]
    fn test_render_and_read_back() {
        let mut graph = Graph::new();
        let item = "http://localhost/fcrepo/rest/a1";
        graph.add(Triple::new(item, RDF_TYPE, Term::Reference(format!("{}Object", PCDM))));
        graph.add(Triple::new(
            item,
            format!("{}title", DCTERMS),
            Term::Literal(Literal::with_tags("Moonrise", Some("en".into()), None)),
        ));
        graph.add(Triple::new(
            item,
            format!("{}creator", DCTERMS),
            Term::Reference(format!("{}#c1", item)),
        ));

        let nodes = graph_to_jsonld(&graph);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0]["@type"][0], format!("{}Object", PCDM));
        assert_eq!(nodes[0][format!("{}title", DCTERMS)][0]["@language"], "en");

        let reread = graph_from_jsonld(&json!({ "@graph": nodes })).unwrap();
        assert_eq!(reread.len(), 3);
        for triple in graph.iter() {
            assert!(reread.contains(triple));
        }
    }

    #[test]
    fn test_rejects_nodes_without_id() {
        let result = graph_from_jsonld(&json!([{ "http://purl.org/dc/terms/title": "x" }]));
        assert!(matches!(result, Err(PlastronError::DataRead(_))));
    }
}

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use plastron::{
    ImportOptions, ImportProcessor, ItemLog, JobConfig, PlastronError, COMPLETED_FIELDS,
};
use serde_json::Value;

const MODELS: &str = r#"{
    // a two-class model for maps
    "classes": {
        "Map": {
            "types": ["bibo:Image"],
            "properties": {
                "identifier": { "predicate": "dcterms:identifier", "kind": "literal", "required": true },
                "title": { "predicate": "dcterms:title", "kind": "literal", "required": true, "repeatable": true },
                "scale": { "predicate": "dcterms:extent", "kind": "literal" },
                "place": {
                    "predicate": "dcterms:spatial",
                    "kind": "reference",
                    "class": "Place",
                    "embed": true,
                    "repeatable": true
                }
            },
            "headerMap": {
                "identifier": "Identifier",
                "title": "Title",
                "scale": "Scale",
                "place.label": "Place",
                "place.same_as": "Place URI"
            }
        },
        "Place": {
            "properties": {
                "label": { "predicate": "rdfs:label", "kind": "literal", "required": true, "repeatable": true },
                "same_as": { "predicate": "owl:sameAs", "kind": "reference" }
            }
        }
    }
}"#;

const REPOSITORY: &str = r#"{"@graph": [
    {
        "@id": "http://localhost/rest/maps/1",
        "@type": ["http://purl.org/ontology/bibo/Image"],
        "http://purl.org/dc/terms/identifier": [{"@value": "map-1"}],
        "http://purl.org/dc/terms/title": [{"@value": "Old title"}],
        "http://purl.org/dc/terms/extent": [{"@value": "1:24000"}]
    }
]}"#;

fn write_job(dir: &Path, metadata: &str, extra: &str) -> JobConfig {
    fs::write(dir.join("models.jsonc"), MODELS).unwrap();
    fs::write(dir.join("repository.jsonld"), REPOSITORY).unwrap();
    fs::write(dir.join("metadata.csv"), metadata).unwrap();
    let config = format!(
        r#"{{
            "jobId": "maps",
            "model": "Map",
            "metadata": "metadata.csv",
            "models": "models.jsonc",
            "repository": "repository.jsonld"{}
        }}"#,
        extra
    );
    fs::write(dir.join("job.jsonc"), config).unwrap();
    JobConfig::from_file(dir.join("job.jsonc")).unwrap()
}

fn output_nodes(dir: &Path) -> Vec<Value> {
    let document: Value =
        serde_json::from_str(&fs::read_to_string(dir.join("resources.jsonld")).unwrap()).unwrap();
    document["@graph"].as_array().unwrap().clone()
}

#[tokio::test]
async fn test_update_reads_existing_description() {
    let dir = tempfile::tempdir().unwrap();
    let metadata = "\
URI,Identifier,Title,Place,Place [French]
http://localhost/rest/maps/1,map-1,New title,Vienna|Prague,Vienne|Prague
";
    let config = write_job(dir.path(), metadata, "");
    let processor = ImportProcessor::new(config).unwrap();
    let summary = processor
        .process(&ImportOptions {
            read_from_repo: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(summary.loaded, 1);
    assert!(!summary.outcome().is_failure());

    let nodes = output_nodes(dir.path());
    let map = nodes
        .iter()
        .find(|node| node["@id"] == "http://localhost/rest/maps/1")
        .unwrap();
    assert_eq!(map["http://purl.org/dc/terms/title"][0]["@value"], "New title");
    assert_eq!(map["http://purl.org/dc/terms/title"].as_array().unwrap().len(), 1);
    // untouched by the row, kept from the repository
    assert_eq!(map["http://purl.org/dc/terms/extent"][0]["@value"], "1:24000");

    let places = map["http://purl.org/dc/terms/spatial"].as_array().unwrap();
    assert_eq!(places.len(), 2);
    let vienna = nodes
        .iter()
        .find(|node| node["@id"] == places[0]["@id"])
        .unwrap();
    let labels = vienna["http://www.w3.org/2000/01/rdf-schema#label"]
        .as_array()
        .unwrap();
    assert_eq!(labels.len(), 2);
    assert_eq!(labels[1]["@language"], "fr");
}

#[tokio::test]
async fn test_without_reading_only_row_values_are_written() {
    let dir = tempfile::tempdir().unwrap();
    let metadata = "URI,Identifier,Title\nhttp://localhost/rest/maps/1,map-1,New title\n";
    let config = write_job(dir.path(), metadata, "");
    let processor = ImportProcessor::new(config).unwrap();
    processor.process(&ImportOptions::default()).await.unwrap();

    let nodes = output_nodes(dir.path());
    assert!(nodes[0].get("http://purl.org/dc/terms/extent").is_none());
}

#[tokio::test]
async fn test_unknown_uri_is_a_row_error() {
    let dir = tempfile::tempdir().unwrap();
    let metadata = "URI,Identifier,Title\nhttp://localhost/rest/maps/404,map-404,Lost\n";
    let config = write_job(dir.path(), metadata, "");
    let processor = ImportProcessor::new(config).unwrap();
    let summary = processor
        .process(&ImportOptions {
            read_from_repo: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(summary.loaded, 0);
    assert!(summary.outcome().is_failure());
    assert!(summary.state.get_errors()[0].message.contains("not found"));
}

#[tokio::test]
async fn test_percentage_runs_resume() {
    let dir = tempfile::tempdir().unwrap();
    let mut metadata = String::from("Identifier,Title\n");
    for n in 0..40 {
        metadata.push_str(&format!("map-{:02},Sheet {}\n", n, n));
    }
    let config = write_job(dir.path(), &metadata, "");
    let processor = ImportProcessor::new(config).unwrap();
    let options = ImportOptions {
        percentage: Some(25),
        ..Default::default()
    };

    let first = processor.process(&options).await.unwrap();
    assert_eq!(first.loaded, 10);
    let second = processor.process(&options).await.unwrap();
    assert_eq!(second.loaded, 10);

    let completed = ItemLog::new(
        dir.path().join("completed.log.csv"),
        &COMPLETED_FIELDS,
        "id",
        true,
    )
    .unwrap();
    assert_eq!(completed.len(), 20);
    assert!(completed.contains("map-00"));

    // both runs' resources are in the output
    let identifiers: HashSet<String> = output_nodes(dir.path())
        .iter()
        .filter_map(|node| node["http://purl.org/dc/terms/identifier"][0]["@value"].as_str())
        .map(str::to_string)
        .collect();
    assert_eq!(identifiers.len(), 20);
    for record in completed.records().unwrap() {
        assert!(identifiers.contains(&record["id"]));
    }
}

#[tokio::test]
async fn test_header_errors_abort_before_any_row() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_job(dir.path(), "Identifier,Title,Colour\nmap-1,One,red\n", "");
    let processor = ImportProcessor::new(config).unwrap();
    let result = processor.process(&ImportOptions::default()).await;
    assert!(matches!(result, Err(PlastronError::DataRead(_))));
    assert!(!dir.path().join("completed.log.csv").exists());
}

#[test]
fn test_invalid_job_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_job(
        dir.path(),
        "Identifier,Title\n",
        r#", "keepAliveSeconds": 0"#,
    );
    assert!(matches!(
        ImportProcessor::new(config),
        Err(PlastronError::Config(_))
    ));
}

//! The repository that resources are read from, and the transaction that
//! a job's writes go through.

pub mod transaction;

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::error::PlastronError;
use crate::rdf::jsonld::graph_from_jsonld;
use crate::rdf::{owner_of, Graph};

pub use transaction::{KeepAlive, LocalTransaction, Transaction};

pub trait Repository: Send + Sync {
    /// The current description of the resource at `uri`
    fn read_graph(&self, uri: &str) -> Result<Graph, PlastronError>;
}

impl<'r> dyn Repository + 'r {
    /// A handle on the resource at `uri`; nothing is fetched until
    /// [`RepositoryResource::read`] is called.
    pub fn resource_at<'a>(&'a self, uri: &str) -> RepositoryResource<'a> {
        RepositoryResource {
            repo: self,
            uri: uri.to_string(),
            graph: Graph::new(),
        }
    }
}

pub struct RepositoryResource<'a> {
    repo: &'a (dyn Repository + 'a),
    pub uri: String,
    pub graph: Graph,
}

impl RepositoryResource<'_> {
    pub fn read(&mut self) -> Result<(), PlastronError> {
        debug!("Reading {}", self.uri);
        self.graph = self.repo.read_graph(&self.uri)?;
        Ok(())
    }
}

/// Resource descriptions held in memory, keyed by URI
#[derive(Debug, Default)]
pub struct MemoryRepository {
    resources: HashMap<String, Graph>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, uri: impl Into<String>, graph: Graph) {
        self.resources.insert(uri.into(), graph);
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn from_jsonld_file<P: AsRef<Path>>(path: P) -> Result<Self, PlastronError> {
        let file = File::open(path.as_ref())?;
        let document: Value = serde_json::from_reader(BufReader::new(file))?;
        Self::from_value(&document)
    }

    /// Load a JSON-LD dump. Each subject without a fragment becomes a
    /// resource; fragment subjects (`{uri}#...`) belong to the resource
    /// they hang off.
    pub fn from_value(document: &Value) -> Result<Self, PlastronError> {
        let graph = graph_from_jsonld(document)?;
        let mut repo = Self::new();
        for triple in graph.iter() {
            repo.resources
                .entry(owner_of(&triple.subject).to_string())
                .or_default()
                .add(triple.clone());
        }
        debug!("Loaded {} resource(s) from JSON-LD", repo.len());
        Ok(repo)
    }
}

impl Repository for MemoryRepository {
    fn read_graph(&self, uri: &str) -> Result<Graph, PlastronError> {
        self.resources
            .get(uri)
            .cloned()
            .ok_or_else(|| PlastronError::DataRead(format!("Resource {} not found", uri)))
    }
}

mod template;

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PlastronError;
use crate::model::{umd, ModelRegistry};
use crate::utils::envsubst_from_environment;

pub use template::TEMPLATE;

fn default_completed_log() -> PathBuf {
    PathBuf::from("completed.log.csv")
}

fn default_output() -> PathBuf {
    PathBuf::from("resources.jsonld")
}

fn default_keep_alive() -> u64 {
    90
}

fn default_timeout() -> u64 {
    180
}

/// Describes one import job. Relative paths are resolved against the
/// directory holding the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct JobConfig {
    pub job_id: String,
    /// Name of the model class every row is loaded as
    pub model: String,
    pub metadata: PathBuf,
    #[serde(default = "default_completed_log")]
    pub completed_log: PathBuf,
    #[serde(default = "default_output")]
    pub output: PathBuf,
    /// Model definitions file; the built-in models are used without one
    #[serde(default)]
    pub models: Option<PathBuf>,
    /// JSON-LD dump of the resources rows may refer to by URI
    #[serde(default)]
    pub repository: Option<PathBuf>,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_seconds: u64,
    #[serde(default = "default_timeout")]
    pub transaction_timeout_seconds: u64,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl JobConfig {
    pub fn from_file<P: Into<PathBuf>>(path: P) -> Result<Self, PlastronError> {
        let path = path.into();
        tracing::info!("Loading job configuration from {:?}", path);
        let file = File::open(&path).map_err(|e| {
            PlastronError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let config = Self::from_reader(file, base_dir)?;
        tracing::info!("Loaded configuration for job {}", config.job_id);
        Ok(config)
    }

    /// Parse a configuration, with `${VAR}` placeholders in string values
    /// replaced from the environment.
    pub fn from_reader<R: Read>(reader: R, base_dir: impl Into<PathBuf>) -> Result<Self, PlastronError> {
        let stripped = json_comments::StripComments::new(reader);
        let raw: Value = serde_json::from_reader(stripped)
            .map_err(|e| PlastronError::Config(format!("Invalid job configuration: {}", e)))?;
        let mut config: Self = serde_json::from_value(envsubst_from_environment(raw))
            .map_err(|e| PlastronError::Config(format!("Invalid job configuration: {}", e)))?;
        config.base_dir = base_dir.into();
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PlastronError> {
        tracing::debug!("Validating job configuration...");
        if self.model.trim().is_empty() {
            return Err(PlastronError::Config("No model class given".into()));
        }
        if self.metadata.as_os_str().is_empty() {
            return Err(PlastronError::Config("No metadata file given".into()));
        }
        if self.keep_alive_seconds == 0 {
            return Err(PlastronError::Config(
                "keepAliveSeconds must be greater than zero".into(),
            ));
        }
        if self.keep_alive_seconds >= self.transaction_timeout_seconds {
            return Err(PlastronError::Config(format!(
                "keepAliveSeconds ({}) must be less than transactionTimeoutSeconds ({})",
                self.keep_alive_seconds, self.transaction_timeout_seconds
            )));
        }
        Ok(())
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.resolve(&self.metadata)
    }

    pub fn completed_log_path(&self) -> PathBuf {
        self.resolve(&self.completed_log)
    }

    pub fn output_path(&self) -> PathBuf {
        self.resolve(&self.output)
    }

    pub fn repository_path(&self) -> Option<PathBuf> {
        self.repository.as_deref().map(|path| self.resolve(path))
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_seconds)
    }

    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_secs(self.transaction_timeout_seconds)
    }

    /// Model classes for this job, checked to contain the job's model
    pub fn registry(&self) -> Result<ModelRegistry, PlastronError> {
        let registry = match &self.models {
            Some(models) => ModelRegistry::from_file(self.resolve(models))?,
            None => umd::registry(),
        };
        registry.class(&self.model)?;
        Ok(registry)
    }
}

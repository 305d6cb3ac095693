use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::PlastronError;

/// A unit of work that is either committed or rolled back as a whole.
/// Every operation other than `begin` is a no-op on an inactive transaction.
pub trait Transaction: Send {
    fn begin(&mut self) -> Result<(), PlastronError>;
    /// Keep the transaction from timing out
    fn maintain(&mut self) -> Result<(), PlastronError>;
    fn commit(&mut self) -> Result<(), PlastronError>;
    fn rollback(&mut self) -> Result<(), PlastronError>;
    fn is_active(&self) -> bool;
}

/// A transaction over local files. Writes are staged in a private directory
/// under `work_dir` and only moved to their destinations on commit. Like a
/// repository transaction, it expires unless maintained.
#[derive(Debug)]
pub struct LocalTransaction {
    work_dir: PathBuf,
    timeout: TimeDelta,
    id: Option<String>,
    expires: Option<DateTime<Utc>>,
    staged: Vec<(PathBuf, PathBuf)>,
}

impl LocalTransaction {
    pub fn new(work_dir: impl Into<PathBuf>, timeout: Duration) -> Result<Self, PlastronError> {
        let timeout = TimeDelta::from_std(timeout).map_err(|e| {
            PlastronError::Transaction(format!("Invalid transaction timeout: {}", e))
        })?;
        Ok(Self {
            work_dir: work_dir.into(),
            timeout,
            id: None,
            expires: None,
            staged: Vec::new(),
        })
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn expires(&self) -> Option<DateTime<Utc>> {
        self.expires
    }

    fn directory(&self) -> Result<PathBuf, PlastronError> {
        match &self.id {
            Some(id) => Ok(self.work_dir.join(format!(".tx-{}", id))),
            None => Err(PlastronError::Transaction(
                "Transaction is not active".to_string(),
            )),
        }
    }

    fn deadline(&self) -> Result<DateTime<Utc>, PlastronError> {
        Utc::now()
            .checked_add_signed(self.timeout)
            .ok_or_else(|| PlastronError::Transaction("Transaction deadline overflow".to_string()))
    }

    /// Fails once an active transaction has passed its deadline.
    pub fn check(&self) -> Result<(), PlastronError> {
        if let (Some(id), Some(expires)) = (&self.id, self.expires) {
            if Utc::now() > expires {
                return Err(PlastronError::Transaction(format!(
                    "Transaction {} expired at {}",
                    id,
                    expires.to_rfc3339()
                )));
            }
        }
        Ok(())
    }

    /// Path to write the future contents of `destination` to
    pub fn stage(&mut self, destination: &Path) -> Result<PathBuf, PlastronError> {
        self.check()?;
        let directory = self.directory()?;
        let name = destination
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "staged".to_string());
        let staged = directory.join(format!("{}-{}", self.staged.len(), name));
        self.staged.push((staged.clone(), destination.to_path_buf()));
        Ok(staged)
    }

    pub fn write(&mut self, destination: &Path, contents: &[u8]) -> Result<(), PlastronError> {
        let staged = self.stage(destination)?;
        fs::write(&staged, contents)?;
        debug!("Staged {} for {}", staged.display(), destination.display());
        Ok(())
    }

    /// Path for a working file that is discarded when the transaction ends
    pub fn scratch(&self, name: &str) -> Result<PathBuf, PlastronError> {
        Ok(self.directory()?.join(name))
    }

    fn finish(&mut self) -> Result<(), PlastronError> {
        let directory = self.directory()?;
        self.id = None;
        self.expires = None;
        self.staged.clear();
        if directory.exists() {
            fs::remove_dir_all(&directory)?;
        }
        Ok(())
    }
}

impl Transaction for LocalTransaction {
    fn begin(&mut self) -> Result<(), PlastronError> {
        if let Some(id) = &self.id {
            return Err(PlastronError::Transaction(format!(
                "Transaction {} is already active",
                id
            )));
        }
        info!("Creating transaction");
        let id = Uuid::new_v4().to_string();
        let directory = self.work_dir.join(format!(".tx-{}", id));
        fs::create_dir_all(&directory).map_err(|e| {
            PlastronError::Transaction(format!("Failed to create transaction: {}", e))
        })?;
        self.expires = Some(self.deadline()?);
        self.id = Some(id);
        info!("Created transaction {}", self.id.as_deref().unwrap_or_default());
        Ok(())
    }

    fn maintain(&mut self) -> Result<(), PlastronError> {
        let Some(id) = self.id.clone() else {
            return Ok(());
        };
        info!("Maintaining transaction {}", id);
        self.check()?;
        let expires = self.deadline()?;
        self.expires = Some(expires);
        info!("Transaction {} is active until {}", id, expires.to_rfc3339());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), PlastronError> {
        let Some(id) = self.id.clone() else {
            return Ok(());
        };
        if let Err(e) = self.check() {
            self.finish()?;
            return Err(e);
        }
        info!("Committing transaction {}", id);
        for (staged, destination) in &self.staged {
            if !staged.exists() {
                warn!("Nothing was written to {}", staged.display());
                continue;
            }
            if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::rename(staged, destination).map_err(|e| {
                PlastronError::Transaction(format!(
                    "Failed to commit transaction {}: {}: {}",
                    id,
                    destination.display(),
                    e
                ))
            })?;
        }
        self.finish()?;
        info!("Committed transaction {}", id);
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), PlastronError> {
        let Some(id) = self.id.clone() else {
            return Ok(());
        };
        info!("Rolling back transaction {}", id);
        self.finish().map_err(|e| {
            PlastronError::Transaction(format!("Failed to roll back transaction {}: {}", id, e))
        })?;
        info!("Rolled back transaction {}", id);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.id.is_some()
    }
}

/// Periodically maintains a transaction from a background task until
/// stopped. The first failure ends the task and is kept for the caller to
/// pick up with [`KeepAlive::check`].
pub struct KeepAlive {
    stop: watch::Sender<bool>,
    failure: Arc<Mutex<Option<String>>>,
    handle: JoinHandle<()>,
}

impl KeepAlive {
    pub fn start<T>(transaction: Arc<Mutex<T>>, interval: Duration) -> Self
    where
        T: Transaction + 'static,
    {
        let (stop, mut stopped) = watch::channel(false);
        let failure = Arc::new(Mutex::new(None));
        let recorded = Arc::clone(&failure);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = stopped.changed() => break,
                    _ = ticker.tick() => {
                        let result = match transaction.lock() {
                            Ok(mut transaction) => transaction.maintain(),
                            Err(_) => Err(PlastronError::Transaction(
                                "Transaction lock poisoned".to_string(),
                            )),
                        };
                        if let Err(e) = result {
                            error!("Keep-alive failed: {}", e);
                            if let Ok(mut slot) = recorded.lock() {
                                *slot = Some(e.to_string());
                            }
                            break;
                        }
                    }
                }
            }
            debug!("Keep-alive stopped");
        });

        Self {
            stop,
            failure,
            handle,
        }
    }

    pub fn failure(&self) -> Option<String> {
        self.failure.lock().ok().and_then(|slot| slot.clone())
    }

    pub fn check(&self) -> Result<(), PlastronError> {
        match self.failure() {
            Some(message) => Err(PlastronError::Transaction(message)),
            None => Ok(()),
        }
    }

    pub async fn stop(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.handle.await {
            warn!("Keep-alive task did not finish cleanly: {}", e);
        }
    }
}

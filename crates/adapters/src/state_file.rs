//! Timestamp store persisted as a single JSON document.
//!
//! Layout: `{ "<projectKey>": { "<propertyName>": "<RFC 3339>" } }`. Every
//! mutation rewrites the whole document through a sibling temp file followed
//! by a rename, so readers never observe a partially written file. Mutations
//! hold an exclusive advisory lock on `<file>.lock` from load to rename, which
//! serializes writers across processes.

use chrono::{DateTime, Utc};
use fs2::FileExt;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::Mutex;
use tracker_indexer_domain::{ProjectKey, ScheduleProperty};
use tracker_indexer_ports::{BoxFuture, TimestampStorePort, TimestampWrite};
use tracker_indexer_shared::{ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result};

type Document = BTreeMap<String, BTreeMap<String, DateTime<Utc>>>;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Failures of the state file.
#[derive(Debug, Error)]
pub enum StateFileError {
    /// The file exists but could not be read.
    #[error("failed to read state file {path}: {source}")]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The file is not a valid state document.
    #[error("state file {path} is corrupt: {source}")]
    Corrupt {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },
    /// The writer lock could not be taken.
    #[error("failed to lock state file {path}: {source}")]
    Lock {
        /// Lock file path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The document could not be written back.
    #[error("failed to write state file {path}: {source}")]
    Write {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The document could not be encoded.
    #[error("failed to encode state document: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<StateFileError> for ErrorEnvelope {
    fn from(error: StateFileError) -> Self {
        let message = error.to_string();
        match error {
            StateFileError::Read { path, .. }
            | StateFileError::Lock { path, .. }
            | StateFileError::Write { path, .. } => {
                Self::unexpected(ErrorCode::io(), message, ErrorClass::Retriable)
                    .with_metadata("path", path.display().to_string())
            },
            StateFileError::Corrupt { path, .. } => {
                Self::expected(ErrorCode::new("storage", "corrupt_state"), message)
                    .with_metadata("path", path.display().to_string())
            },
            StateFileError::Encode(_) => {
                Self::unexpected(ErrorCode::internal(), message, ErrorClass::NonRetriable)
            },
        }
    }
}

/// File-backed [`TimestampStorePort`].
///
/// Every operation re-reads the file, so writes made by another process
/// (for example `tix force-full` next to a running `tix run`) are observed.
/// Read-modify-write cycles run under an async mutex inside this process and
/// under an exclusive lock on the sibling lock file across processes.
#[derive(Debug)]
pub struct JsonFileTimestampStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileTimestampStore {
    /// Store persisted at `path`. Nothing is touched until first use.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Location of the state file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_value(
        &self,
        project_key: &ProjectKey,
        property: ScheduleProperty,
    ) -> Result<Option<DateTime<Utc>>> {
        let _guard = self.lock.lock().await;
        let document = load(&self.path).await?;
        Ok(document
            .get(project_key.as_str())
            .and_then(|properties| properties.get(property.as_str()))
            .copied())
    }

    async fn apply(&self, mutate: impl FnOnce(&mut Document) -> bool) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let lock_file = acquire_writer_lock(lock_path(&self.path)).await?;
        let mut document = load(&self.path).await?;
        let changed = mutate(&mut document);
        if changed {
            persist(&self.path, &document).await?;
        }
        drop(lock_file);
        Ok(changed)
    }
}

/// Blocks on the advisory lock off the runtime; released when the file drops.
async fn acquire_writer_lock(path: PathBuf) -> Result<File, StateFileError> {
    let blocking_path = path.clone();
    let locked = tokio::task::spawn_blocking(move || -> std::io::Result<File> {
        if let Some(parent) = blocking_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&blocking_path)?;
        file.lock_exclusive()?;
        Ok(file)
    })
    .await
    .map_err(std::io::Error::other)
    .and_then(|result| result);
    locked.map_err(|source| StateFileError::Lock { path, source })
}

async fn load(path: &Path) -> Result<Document, StateFileError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Document::new()),
        Err(source) => {
            return Err(StateFileError::Read {
                path: path.to_path_buf(),
                source,
            });
        },
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Document::new());
    }
    serde_json::from_slice(&bytes).map_err(|source| StateFileError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

async fn persist(path: &Path, document: &Document) -> Result<(), StateFileError> {
    let mut encoded = serde_json::to_vec_pretty(document)?;
    encoded.push(b'\n');

    let write_error = |source: std::io::Error| StateFileError::Write {
        path: path.to_path_buf(),
        source,
    };
    let temp = temp_path(path, std::process::id(), TEMP_COUNTER.fetch_add(1, Ordering::Relaxed));
    if let Err(error) = tokio::fs::write(&temp, &encoded).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(write_error(error));
    }
    if let Err(error) = tokio::fs::rename(&temp, path).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(write_error(error));
    }
    Ok(())
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}

fn lock_path(path: &Path) -> PathBuf {
    sibling(path, ".lock")
}

fn temp_path(path: &Path, pid: u32, sequence: u64) -> PathBuf {
    sibling(path, &format!(".{pid}.{sequence}.tmp"))
}

fn set(document: &mut Document, project_key: ProjectKey, property: ScheduleProperty, value: DateTime<Utc>) {
    document
        .entry(project_key.into_inner().into())
        .or_default()
        .insert(property.as_str().to_owned(), value);
}

impl TimestampStorePort for JsonFileTimestampStore {
    fn read_timestamp(
        &self,
        ctx: &RequestContext,
        project_key: ProjectKey,
        property: ScheduleProperty,
    ) -> BoxFuture<'_, Result<Option<DateTime<Utc>>>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("timestamps.read")?;
            self.read_value(&project_key, property).await
        })
    }

    fn write_timestamp(
        &self,
        ctx: &RequestContext,
        project_key: ProjectKey,
        property: ScheduleProperty,
        value: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("timestamps.write")?;
            self.apply(|document| {
                set(document, project_key, property, value);
                true
            })
            .await
            .map(|_| ())
        })
    }

    fn write_batch(
        &self,
        ctx: &RequestContext,
        writes: Vec<TimestampWrite>,
    ) -> BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("timestamps.writeBatch")?;
            if writes.is_empty() {
                return Ok(());
            }
            self.apply(|document| {
                for write in writes {
                    set(document, write.project_key, write.property, write.value);
                }
                true
            })
            .await
            .map(|_| ())
        })
    }

    fn delete_timestamp(
        &self,
        ctx: &RequestContext,
        project_key: ProjectKey,
        property: ScheduleProperty,
    ) -> BoxFuture<'_, Result<bool>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            ctx.ensure_not_cancelled("timestamps.delete")?;
            self.apply(|document| {
                let Some(properties) = document.get_mut(project_key.as_str()) else {
                    return false;
                };
                let removed = properties.remove(property.as_str()).is_some();
                if properties.is_empty() {
                    document.remove(project_key.as_str());
                }
                removed
            })
            .await
        })
    }
}

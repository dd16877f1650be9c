//! Storage adapter for uploaded files and pipeline artifacts
//!
//! All artifacts live under one working directory. Each upload request gets
//! its own job directory inside it so concurrent requests never share the
//! fixed artifact names the pipeline steps use.

use crate::error::{Error, Result, StorageError};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::path::{Component, Path, PathBuf};

/// Name of the combined input artifact written for every job
pub const COMBINED_INPUT_NAME: &str = "data.txt";

/// Separator appended after every uploaded file in the combined artifact
pub const UPLOAD_SEPARATOR: &str = "\n\n";

/// A file received from a client, owned by the request that carried it
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Name the client sent with the file
    pub original_name: String,
    /// File contents
    pub bytes: Vec<u8>,
    /// When the gateway finished receiving the file
    pub received_at: DateTime<Utc>,
}

impl UploadedFile {
    /// Create an uploaded file stamped with the current time
    pub fn new(original_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            original_name: original_name.into(),
            bytes: bytes.into(),
            received_at: Utc::now(),
        }
    }

    /// Name the file is stored under: `<arrival millis>-<part index>-<sanitized original name>`
    ///
    /// `index` is the file's position in its request, so two parts with the
    /// same name never share a path.
    pub fn stored_name(&self, index: usize) -> String {
        let base = Path::new(&self.original_name)
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.trim_start_matches('.').replace(['\\', '\0'], "_"))
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "upload".to_string());
        format!("{}-{index}-{base}", self.received_at.timestamp_millis())
    }
}

/// Per-request working directory
#[derive(Debug, Clone)]
pub struct JobDir {
    id: String,
    path: PathBuf,
}

impl JobDir {
    /// Job identifier, also the directory name
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Absolute or root-relative directory path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of a named artifact inside this job
    pub fn artifact(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

/// Filesystem-backed artifact store
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    /// Create a storage adapter rooted at `root` without touching the disk
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the working directory if it does not exist
    ///
    /// Idempotent; safe to call on every start.
    pub async fn ensure_root(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| StorageError::CreateDir {
                path: self.root.clone(),
                source,
            })?;
        Ok(())
    }

    /// Working directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Allocate a fresh job directory
    ///
    /// Ids are `<UTC timestamp>-<8 hex digits>` and therefore sort by creation
    /// time. A collision on the random suffix is retried.
    pub async fn allocate_job(&self) -> Result<JobDir> {
        loop {
            let id = format!(
                "{}-{:08x}",
                Utc::now().format("%Y%m%dT%H%M%S%3f"),
                rand::thread_rng().r#gen::<u32>()
            );
            let path = self.root.join(&id);
            match tokio::fs::create_dir(&path).await {
                Ok(()) => {
                    tracing::debug!(job_id = %id, path = ?path, "allocated job directory");
                    return Ok(JobDir { id, path });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(source) => {
                    return Err(StorageError::CreateDir { path, source }.into());
                }
            }
        }
    }

    /// Open an existing job directory by id
    pub fn job(&self, id: &str) -> Result<JobDir> {
        validate_name(id)?;
        Ok(JobDir {
            id: id.to_string(),
            path: self.root.join(id),
        })
    }

    /// Write bytes to `dir/name`, returning the written path
    pub async fn save(&self, dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        validate_name(name)?;
        let path = dir.join(name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| StorageError::Write {
                path: path.clone(),
                source,
            })?;
        tracing::debug!(path = ?path, bytes = bytes.len(), "saved artifact");
        Ok(path)
    }

    /// Persist every upload into the job directory under its stored name
    pub async fn save_uploads(&self, job: &JobDir, uploads: &[UploadedFile]) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::with_capacity(uploads.len());
        for (index, upload) in uploads.iter().enumerate() {
            paths.push(self.save(job.path(), &upload.stored_name(index), &upload.bytes).await?);
        }
        Ok(paths)
    }

    /// Write the combined input artifact for a job
    ///
    /// Each upload's bytes are followed by [`UPLOAD_SEPARATOR`], so two files
    /// `a` and `b` combine to `a\n\nb\n\n`.
    pub async fn write_combined(&self, job: &JobDir, uploads: &[UploadedFile]) -> Result<PathBuf> {
        self.save(job.path(), COMBINED_INPUT_NAME, &combine(uploads))
            .await
    }

    /// Read `name` from the working directory or from a job directory
    ///
    /// Returns [`Error::NotFound`] when the file does not exist.
    pub async fn retrieve(&self, job: Option<&str>, name: &str) -> Result<Vec<u8>> {
        let path = self.resolve(job, name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if matches!(e.kind(), std::io::ErrorKind::NotFound | std::io::ErrorKind::IsADirectory) => {
                Err(Error::NotFound(name.to_string()))
            }
            Err(source) => {
                // Some platforms report reading a directory as a generic error
                if path.is_dir() {
                    return Err(Error::NotFound(name.to_string()));
                }
                Err(StorageError::Read { path, source }.into())
            }
        }
    }

    /// Map a download request onto a path under the working directory
    pub fn resolve(&self, job: Option<&str>, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        let dir = match job {
            Some(id) => self.job(id)?.path,
            None => self.root.clone(),
        };
        Ok(dir.join(name))
    }
}

/// Concatenate uploads with [`UPLOAD_SEPARATOR`] after each one
pub fn combine(uploads: &[UploadedFile]) -> Vec<u8> {
    let capacity = uploads
        .iter()
        .map(|u| u.bytes.len() + UPLOAD_SEPARATOR.len())
        .sum();
    let mut combined = Vec::with_capacity(capacity);
    for upload in uploads {
        combined.extend_from_slice(&upload.bytes);
        combined.extend_from_slice(UPLOAD_SEPARATOR.as_bytes());
    }
    combined
}

/// Accept only a single, normal, non-hidden path component
pub fn validate_name(name: &str) -> Result<()> {
    let reject = |reason: &str| -> Result<()> {
        Err(StorageError::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        }
        .into())
    };

    if name.is_empty() {
        return reject("empty name");
    }
    if name.contains('/') || name.contains('\\') {
        return reject("contains a path separator");
    }
    if name.contains('\0') {
        return reject("contains a NUL byte");
    }
    if name.starts_with('.') {
        return reject("hidden or relative name");
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => reject("not a single path component"),
    }
}

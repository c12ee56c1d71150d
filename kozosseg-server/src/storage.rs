use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid file name {0:?}")]
    InvalidName(String),
    #[error("upload is not valid base64: {0}")]
    InvalidData(#[from] base64::DecodeError),
    #[error("file {0} not found")]
    NotFound(String),
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Avatars,
    Posts,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Avatars => "avatars",
            Bucket::Posts => "posts",
        }
    }
}

#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Store `data` and return the generated file name
    async fn store(&self, bucket: Bucket, original_name: &str, data: &[u8]) -> Result<String, StorageError>;
    async fn read(&self, bucket: Bucket, name: &str) -> Result<Vec<u8>, StorageError>;
    async fn delete(&self, bucket: Bucket, name: &str) -> Result<(), StorageError>;
}

/// Keep the last path component and replace anything outside `[A-Za-z0-9._-]`
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    cleaned.trim_start_matches('.').to_string()
}

pub fn decode_base64(data: &str) -> Result<Vec<u8>, StorageError> {
    Ok(STANDARD.decode(data.trim())?)
}

/// Files on the local filesystem, one directory per bucket
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, bucket: Bucket, name: &str) -> Result<PathBuf, StorageError> {
        if name.is_empty() || sanitize_file_name(name) != name {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(bucket.as_str()).join(name))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn store(&self, bucket: Bucket, original_name: &str, data: &[u8]) -> Result<String, StorageError> {
        let sanitized = sanitize_file_name(original_name);
        if sanitized.is_empty() {
            return Err(StorageError::InvalidName(original_name.to_string()));
        }

        let name = format!("{}-{}", Uuid::new_v4(), sanitized);
        let dir = self.root.join(bucket.as_str());
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(&name), data).await?;

        tracing::debug!("Stored {} bytes as {}/{}", data.len(), bucket.as_str(), name);
        Ok(name)
    }

    async fn read(&self, bucket: Bucket, name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(bucket, name)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, bucket: Bucket, name: &str) -> Result<(), StorageError> {
        let path = self.path_for(bucket, name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

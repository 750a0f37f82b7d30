use crate::error::{Error, Result};
use crate::utils::filename::sanitize_file_name;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Top-level blob prefixes. Each object lives under `{prefix}/{owner}/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobNamespace {
    ProfileImages,
    SupportImages,
    SupportFiles,
    WeeklyReports,
    CommunityImages,
    CommunityFiles,
}

impl BlobNamespace {
    pub fn prefix(&self) -> &'static str {
        match self {
            BlobNamespace::ProfileImages => "profile-images",
            BlobNamespace::SupportImages => "support-images",
            BlobNamespace::SupportFiles => "support-files",
            BlobNamespace::WeeklyReports => "weekly-reports",
            BlobNamespace::CommunityImages => "community-images",
            BlobNamespace::CommunityFiles => "community-files",
        }
    }
}

/// `{namespace}/{owner}/{millis}_{sanitized name}`.
pub fn object_key(namespace: BlobNamespace, owner: &str, file_name: &str, at: DateTime<Utc>) -> String {
    format!(
        "{}/{}/{}_{}",
        namespace.prefix(),
        sanitize_file_name(owner),
        at.timestamp_millis(),
        sanitize_file_name(file_name)
    )
}

/// A file received from a client, not yet stored.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub body: Bytes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
    pub file_name: String,
}

#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Writes the object and returns its public URL.
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> Result<String>;
}

/// Stores objects on disk below `root`; they are served from `{base_url}/uploads/`.
#[derive(Debug, Clone)]
pub struct LocalBlobStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalBlobStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl BlobStorage for LocalBlobStorage {
    async fn put_object(&self, key: &str, body: Bytes, _content_type: &str) -> Result<String> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &body).await?;
        Ok(format!("{}/uploads/{}", self.base_url, key))
    }
}

#[derive(Debug, Default)]
pub struct MemoryBlobStorage {
    objects: RwLock<HashMap<String, (Bytes, String)>>,
}

impl MemoryBlobStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<(Bytes, String)> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl BlobStorage for MemoryBlobStorage {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> Result<String> {
        self.objects
            .write()
            .await
            .insert(key.to_string(), (body, content_type.to_string()));
        Ok(format!("memory://{}", key))
    }
}

#[derive(Clone)]
pub struct StorageService {
    backend: Arc<dyn BlobStorage>,
}

impl StorageService {
    pub fn new(backend: Arc<dyn BlobStorage>) -> Self {
        Self { backend }
    }

    pub async fn upload(&self, namespace: BlobNamespace, owner: &str, upload: &Upload) -> Result<StoredObject> {
        let key = object_key(namespace, owner, &upload.file_name, crate::utils::time::now());
        match self
            .backend
            .put_object(&key, upload.body.clone(), &upload.content_type)
            .await
        {
            Ok(url) => {
                tracing::debug!(%key, size = upload.body.len(), "Stored upload");
                Ok(StoredObject {
                    key,
                    url,
                    file_name: upload.file_name.clone(),
                })
            }
            Err(err) => {
                if let Error::Io(io) = &err {
                    if io.kind() == std::io::ErrorKind::PermissionDenied {
                        tracing::error!(
                            %key,
                            "Upload rejected by the filesystem; check that UPLOADS_DIR exists and is writable by the server user"
                        );
                    }
                }
                tracing::error!(error = %err, %key, "Upload failed");
                Err(Error::Storage(err.to_string()))
            }
        }
    }

    /// Uploads in order and stops at the first failure. Objects stored before
    /// the failure are left in place.
    pub async fn upload_sequential(
        &self,
        items: Vec<(BlobNamespace, &Upload)>,
        owner: &str,
    ) -> Result<Vec<StoredObject>> {
        let mut stored = Vec::with_capacity(items.len());
        for (namespace, upload) in items {
            stored.push(self.upload(namespace, owner, upload).await?);
        }
        Ok(stored)
    }
}

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::sync::RwLock;

const CONTENT_TYPE_DIR: &str = ".content-types";

#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

/// Blob storage keyed by opaque string keys.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<StoredObject>>;
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Objects laid out as plain files under one base directory.
#[derive(Clone, Debug)]
pub struct LocalFileStorage {
    base_dir: PathBuf,
}

impl LocalFileStorage {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Maps a key onto a path inside the base directory; `..` and root
    /// components are dropped so a key can never escape it.
    pub fn resolve_path(&self, key: &str) -> PathBuf {
        let mut path = self.base_dir.clone();
        for component in Path::new(key).components() {
            if let Component::Normal(part) = component {
                path.push(part);
            }
        }
        path
    }

    fn content_type_path(&self, key: &str) -> PathBuf {
        let normalized = key.trim_start_matches('/');
        self.resolve_path(&format!("{CONTENT_TYPE_DIR}/{normalized}"))
    }

    pub async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.resolve_path(key);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.resolve_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, data).await?;
        Ok(())
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.resolve_path(key);
        match fs::metadata(path).await {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

async fn remove_if_present(path: PathBuf) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

#[async_trait]
impl ObjectStore for LocalFileStorage {
    async fn get(&self, key: &str) -> Result<Option<StoredObject>> {
        let Some(bytes) = self.read(key).await? else {
            return Ok(None);
        };
        let content_type = match fs::read_to_string(self.content_type_path(key)).await {
            Ok(value) => Some(value.trim().to_string()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => return Err(err.into()),
        };
        Ok(Some(StoredObject {
            bytes: Bytes::from(bytes),
            content_type,
        }))
    }

    // The sidecar goes first so a failed put never leaves an object behind.
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<()> {
        let type_path = self.content_type_path(key);
        if let Some(parent) = type_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&type_path, content_type.as_bytes()).await?;
        if let Err(err) = self.write(key, data).await {
            let _ = remove_if_present(type_path).await;
            return Err(err);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        remove_if_present(self.resolve_path(key)).await?;
        remove_if_present(self.content_type_path(key)).await
    }
}

/// Process-local object store, used for ephemeral runs and tests.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, key: &str) -> Result<Option<StoredObject>> {
        Ok(self.objects.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<()> {
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                bytes: Bytes::copy_from_slice(data),
                content_type: Some(content_type.to_string()),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.objects.write().await.remove(key);
        Ok(())
    }
}

//! Blob storage interface and the filesystem implementation.
//!
//! Key layout:
//!
//! ```text
//! jobs/{job_id}/original/{filename}
//! jobs/{job_id}/chunks/chunk_{index:04}.wav
//! jobs/{job_id}/result/transcript.json
//! ```
//!
//! Keys are namespaced per job, so storage is single-writer per key and
//! deleting a job reduces to deleting its prefix.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};

/// S3 key for a job's original upload.
pub fn original_key(job_id: &str, filename: &str) -> String {
    format!("jobs/{job_id}/original/{filename}")
}

/// S3 key for one chunk artifact.
pub fn chunk_key(job_id: &str, chunk_index: usize) -> String {
    format!("jobs/{job_id}/chunks/chunk_{chunk_index:04}.wav")
}

/// S3 key for the merged transcript document.
pub fn result_key(job_id: &str) -> String {
    format!("jobs/{job_id}/result/transcript.json")
}

/// Prefix under which every artifact of a job lives.
pub fn job_prefix(job_id: &str) -> String {
    format!("jobs/{job_id}/")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresignMethod {
    Get,
    Put,
}

/// Object-store operations the pipeline needs.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Vec<u8>>;
    async fn download_to_path(&self, key: &str, local_path: &Path) -> Result<()>;
    /// Idempotent: deleting missing keys is not an error.
    async fn delete_many(&self, keys: &[String]) -> Result<()>;
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
    async fn exists(&self, key: &str) -> Result<bool>;
    async fn put_json(&self, key: &str, value: &serde_json::Value) -> Result<()>;
    async fn get_json(&self, key: &str) -> Result<serde_json::Value>;
    /// A URL a client can use to fetch/store the object directly.
    async fn presign(&self, key: &str, expiry_secs: u64, method: PresignMethod) -> Result<String>;
}

/// Filesystem-backed blob store rooted at a configured directory.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a key to its path under the root, refusing traversal.
    fn resolve(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.starts_with('/') || key.split('/').any(|part| part == "..") {
            return Err(CoreError::validation(format!("invalid storage key: {key}")));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, data: &[u8], _content_type: &str) -> Result<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CoreError::storage(format!("create dir for {key}: {e}")))?;
        }
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| CoreError::storage(format!("write {key}: {e}")))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.resolve(key)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| CoreError::storage(format!("read {key}: {e}")))
    }

    async fn download_to_path(&self, key: &str, local_path: &Path) -> Result<()> {
        let path = self.resolve(key)?;
        tokio::fs::copy(&path, local_path)
            .await
            .map(|_| ())
            .map_err(|e| CoreError::storage(format!("download {key}: {e}")))
    }

    async fn delete_many(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            let path = self.resolve(key)?;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(CoreError::storage(format!("delete {key}: {e}"))),
            }
        }
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(CoreError::storage(format!("list {prefix}: {e}"))),
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| CoreError::storage(format!("list {prefix}: {e}")))?
            {
                let path = entry.path();
                if path.is_dir() {
                    pending.push(path);
                } else if let Ok(rel) = path.strip_prefix(&self.root) {
                    let key = rel.to_string_lossy().replace('\\', "/");
                    if key.starts_with(prefix) {
                        keys.push(key);
                    }
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.resolve(key)?;
        Ok(tokio::fs::metadata(&path).await.is_ok())
    }

    async fn put_json(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.put(key, &bytes, "application/json").await
    }

    async fn get_json(&self, key: &str) -> Result<serde_json::Value> {
        let bytes = self.get(key).await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| CoreError::storage(format!("parse JSON at {key}: {e}")))
    }

    async fn presign(&self, key: &str, _expiry_secs: u64, _method: PresignMethod) -> Result<String> {
        // Local backend: the "presigned URL" is a file URL
        let path = self.resolve(key)?;
        Ok(format!("file://{}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, FsBlobStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn put_get_round_trip() {
        let (_dir, store) = store();
        store.put("jobs/a/original/x.wav", b"bytes", "audio/wav").await.unwrap();

        assert!(store.exists("jobs/a/original/x.wav").await.unwrap());
        assert_eq!(store.get("jobs/a/original/x.wav").await.unwrap(), b"bytes");
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (_dir, store) = store();
        store.put("jobs/a/result/transcript.json", b"{}", "application/json").await.unwrap();

        let keys = vec![
            "jobs/a/result/transcript.json".to_string(),
            "jobs/a/never/existed.wav".to_string(),
        ];
        store.delete_many(&keys).await.unwrap();
        store.delete_many(&keys).await.unwrap();

        assert!(!store.exists("jobs/a/result/transcript.json").await.unwrap());
    }

    #[tokio::test]
    async fn list_filters_by_prefix() {
        let (_dir, store) = store();
        store.put(&original_key("a", "in.mp3"), b"1", "audio/mpeg").await.unwrap();
        store.put(&chunk_key("a", 0), b"2", "audio/wav").await.unwrap();
        store.put(&original_key("b", "other.mp3"), b"3", "audio/mpeg").await.unwrap();

        let keys = store.list(&job_prefix("a")).await.unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.iter().all(|k| k.starts_with("jobs/a/")));
    }

    #[tokio::test]
    async fn json_round_trip() {
        let (_dir, store) = store();
        let value = serde_json::json!({"full_text": "բարև", "segments": []});
        store.put_json(&result_key("a"), &value).await.unwrap();

        assert_eq!(store.get_json(&result_key("a")).await.unwrap(), value);
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let (_dir, store) = store();
        assert!(store.get("../etc/passwd").await.is_err());
        assert!(store.get("/etc/passwd").await.is_err());
    }

    #[test]
    fn key_layout_matches_contract() {
        assert_eq!(original_key("j1", "a.mp3"), "jobs/j1/original/a.mp3");
        assert_eq!(chunk_key("j1", 7), "jobs/j1/chunks/chunk_0007.wav");
        assert_eq!(result_key("j1"), "jobs/j1/result/transcript.json");
    }
}

//! On-disk content store.
//!
//! Objects are stored by content hash in a two-level directory structure:
//!   {root}/{hash[0..2]}/{full_hash}
//!
//! Files are immutable: if the hash exists, the content is correct, so a
//! repeated put is a no-op. Filesystem work runs on the blocking pool.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use memmap2::Mmap;

use scatter_core::crypto::hash;
use scatter_core::{ContentId, StoreError};

use crate::store::ContentStore;

/// Content-addressed store rooted at a directory.
#[derive(Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    /// Create a store rooted at the given directory, creating it if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path for a content id. `None` if the id is not a 32-byte hex digest.
    fn object_path(&self, id: &ContentId) -> Option<PathBuf> {
        let text = id.as_str();
        let valid = text.len() == 64 && text.bytes().all(|b| b.is_ascii_hexdigit());
        // Two-level: root/ab/abc123...
        valid.then(|| self.root.join(&text[0..2]).join(text))
    }

    /// Count stored objects.
    pub fn count(&self) -> usize {
        let mut total = 0;
        if let Ok(entries) = fs::read_dir(&self.root) {
            for entry in entries.flatten() {
                if let Ok(subdir) = fs::read_dir(entry.path()) {
                    total += subdir.count();
                }
            }
        }
        total
    }

    pub fn clear(&self) {
        if let Ok(entries) = fs::read_dir(&self.root) {
            for entry in entries.flatten() {
                let _ = fs::remove_dir_all(entry.path());
            }
        }
    }
}

fn write_object(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    // Atomic write: tmp file → rename. Each writer gets its own tmp file so
    // concurrent puts of the same object never share one.
    static TMP_SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let tmp_path = path.with_extension(format!("{}.{seq}.tmp", std::process::id()));
    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        // Another writer landed the same content first.
        if !path.exists() {
            return Err(e.into());
        }
    }
    Ok(())
}

fn read_object(path: &Path) -> Result<Option<Bytes>, StoreError> {
    if !path.exists() {
        return Ok(None);
    }
    let file = fs::File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(Some(Bytes::new()));
    }
    // Safety: file is opened read-only and objects are never rewritten in place
    let mmap = unsafe { Mmap::map(&file)? };
    Ok(Some(Bytes::copy_from_slice(&mmap)))
}

fn join_failed(e: tokio::task::JoinError) -> StoreError {
    StoreError::Unavailable(format!("blocking task failed: {e}"))
}

#[async_trait]
impl ContentStore for DirStore {
    async fn put(&self, data: Bytes) -> Result<ContentId, StoreError> {
        let id = ContentId::new(hex::encode(hash(&data)));
        let path = self
            .object_path(&id)
            .ok_or_else(|| StoreError::Unavailable("invalid content id".into()))?;

        tokio::task::spawn_blocking(move || write_object(&path, &data))
            .await
            .map_err(join_failed)??;

        tracing::trace!(content_id = %id, root = %self.root.display(), "object stored");
        Ok(id)
    }

    async fn get(&self, id: &ContentId) -> Result<Bytes, StoreError> {
        let path = self
            .object_path(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        tokio::task::spawn_blocking(move || read_object(&path))
            .await
            .map_err(join_failed)??
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }
}

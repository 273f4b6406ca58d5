use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::AsyncWriteExt;

use super::lines::{join_lines, parse_lines};
use super::{ListKey, ListStore, StorageError};

/// Flat-file [`ListStore`]: one newline-delimited text file per list.
///
/// ```text
/// <root>/
/// ├── repositories.txt              # subscribed sources
/// ├── frequent-emotes.txt           # recency list, max 50
/// ├── frequent-stickers.txt         # recency list, max 50
/// ├── favourite-emotes.txt          # aggregate favourites
/// └── <favourites-key>.nitroless    # one per repository
/// ```
///
/// Writes go to a temporary file that is renamed over the target, so a reader
/// in another process never sees a half-written list. There is no locking:
/// concurrent read-modify-write from two processes can still lose an update.
#[derive(Debug, Clone)]
pub struct FileListStore {
    root: PathBuf,
}

impl FileListStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file backing `key`.
    pub fn path_for(&self, key: &ListKey) -> PathBuf {
        self.root.join(key.file_name())
    }
}

impl ListStore for FileListStore {
    async fn load(&self, key: &ListKey) -> Result<Vec<String>, StorageError> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(parse_lines(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "List file missing, treating as empty");
                Ok(Vec::new())
            }
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    async fn save(&self, key: &ListKey, items: &[String]) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StorageError::io(&self.root, e))?;

        let path = self.path_for(key);
        atomic_write(&path, join_lines(items).as_bytes()).await
    }

    async fn remove(&self, key: &ListKey) -> Result<(), StorageError> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Temp-file name unique across processes (pid) and within one (counter).
fn temp_path_for(dst: &Path) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    dst.with_extension(format!("tmp.{}.{}.{:x}", std::process::id(), seq, nanos))
}

/// Write `content` to `dst` via write-to-temp-then-rename.
async fn atomic_write(dst: &Path, content: &[u8]) -> Result<(), StorageError> {
    let temp_path = temp_path_for(dst);

    let mut temp_file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .await
        .map_err(|e| StorageError::io(&temp_path, e))?;

    let written = async {
        temp_file.write_all(content).await?;
        temp_file.sync_all().await
    }
    .await;
    drop(temp_file);

    if let Err(e) = written {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(StorageError::io(&temp_path, e));
    }

    // On Windows, rename fails if destination exists, so remove it first
    #[cfg(windows)]
    if let Err(e) = tokio::fs::remove_file(dst).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(StorageError::io(dst, e));
        }
    }

    if let Err(e) = tokio::fs::rename(&temp_path, dst).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(StorageError::io(dst, e));
    }

    Ok(())
}

//! Artifact store: uploaded sources, generated HTML and Word files on disk

use crate::error::{Result, TypesetError};
use crate::input::file_detector::extension_of;
use log::{debug, info, warn};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt};

pub const PUBLIC_PREFIX: &str = "/uploads";
const MAX_NAME_ATTEMPTS: usize = 1000;

/// A file persisted in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub name: String,
    pub path: PathBuf,
}

impl StoredArtifact {
    pub fn url(&self) -> String {
        format!("{}/{}", PUBLIC_PREFIX, self.name)
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await.map_err(|e| {
            TypesetError::Storage(format!("cannot create {}: {}", self.root.display(), e))
        })
    }

    /// Persist an uploaded file as `textFile-<millis>-<random><.ext>`.
    pub async fn store_upload(&self, original_name: &str, bytes: &[u8]) -> Result<StoredArtifact> {
        let ext = extension_of(original_name);
        let suffix = if ext.is_empty() { String::new() } else { format!(".{}", ext) };

        self.write_unique(bytes, |attempt| {
            let random: u32 = rand::random_range(0..1_000_000_000);
            if attempt == 0 {
                format!("textFile-{}-{}{}", now_millis(), random, suffix)
            } else {
                format!("textFile-{}-{}-{}{}", now_millis(), random, attempt, suffix)
            }
        })
        .await
    }

    /// Persist a generated artifact as `<prefix>-<millis>.<ext>`, adding a
    /// `-<n>` suffix when another artifact already claimed that millisecond.
    pub async fn store_generated(&self, prefix: &str, ext: &str, bytes: &[u8]) -> Result<StoredArtifact> {
        let millis = now_millis();
        self.write_unique(bytes, |attempt| {
            if attempt == 0 {
                format!("{}-{}.{}", prefix, millis, ext)
            } else {
                format!("{}-{}-{}.{}", prefix, millis, attempt, ext)
            }
        })
        .await
    }

    async fn write_unique<F>(&self, bytes: &[u8], mut name_for: F) -> Result<StoredArtifact>
    where
        F: FnMut(usize) -> String,
    {
        self.ensure_root().await?;

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = name_for(attempt);
            let path = self.root.join(&name);

            let file = match fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!("Artifact name {} taken, retrying", name);
                    continue;
                }
                Err(e) => {
                    return Err(TypesetError::Storage(format!("cannot create {}: {}", path.display(), e)))
                }
            };

            write_or_discard(file, &path, bytes).await?;
            debug!("Stored artifact {} ({} bytes)", path.display(), bytes.len());
            return Ok(StoredArtifact { name, path });
        }

        Err(TypesetError::Storage(format!(
            "no free artifact name after {} attempts",
            MAX_NAME_ATTEMPTS
        )))
    }

    /// Delete regular files whose modification time is older than `max_age`.
    pub async fn sweep_expired(&self, max_age: Duration) -> Result<usize> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let now = SystemTime::now();
        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age > max_age {
                match fs::remove_file(entry.path()).await {
                    Ok(()) => removed += 1,
                    Err(e) => warn!("Failed to remove expired artifact {}: {}", entry.path().display(), e),
                }
            }
        }

        Ok(removed)
    }

    /// Periodically sweep expired artifacts until the runtime shuts down.
    pub fn spawn_sweeper(&self, retention: Duration, interval: Duration) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match store.sweep_expired(retention).await {
                    Ok(0) => {}
                    Ok(removed) => info!("Swept {} expired artifacts from {}", removed, store.root.display()),
                    Err(e) => warn!("Artifact sweep failed: {}", e),
                }
            }
        })
    }
}

/// Write the whole artifact; a partial file is removed so it is never served.
async fn write_or_discard<W>(mut writer: W, path: &Path, bytes: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let written = async {
        writer.write_all(bytes).await?;
        writer.flush().await
    }
    .await;

    if let Err(e) = written {
        drop(writer);
        if let Err(remove_err) = fs::remove_file(path).await {
            warn!("Failed to remove partial artifact {}: {}", path.display(), remove_err);
        }
        return Err(TypesetError::Storage(format!("cannot write {}: {}", path.display(), e)));
    }
    Ok(())
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

use std::path::PathBuf;

use crate::error::AppResult;
use crate::models::CacheSnapshot;

/// Persistence for the run snapshot
///
/// One snapshot per store. A run assumes exclusive access for its duration.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the stored snapshot, or `None` when nothing was saved
    async fn load(&self) -> AppResult<Option<CacheSnapshot>>;

    /// Replaces the stored snapshot
    async fn save(&self, snapshot: &CacheSnapshot) -> AppResult<()>;

    /// Removes the stored snapshot
    async fn clear(&self) -> AppResult<()>;

    /// Backend name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Snapshot stored as a JSON file
pub struct FileCacheStore {
    path: PathBuf,
}

impl FileCacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "cache.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait::async_trait]
impl CacheStore for FileCacheStore {
    async fn load(&self) -> AppResult<Option<CacheSnapshot>> {
        let json = match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let snapshot: CacheSnapshot = serde_json::from_str(&json)?;
        tracing::debug!(
            path = %self.path.display(),
            members = snapshot.members.len(),
            "Loaded cache snapshot"
        );
        Ok(Some(snapshot))
    }

    async fn save(&self, snapshot: &CacheSnapshot) -> AppResult<()> {
        let json = serde_json::to_string_pretty(snapshot)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write then rename so an interrupted save never leaves a truncated file
        let temp = self.temp_path();
        tokio::fs::write(&temp, json).await?;
        tokio::fs::rename(&temp, &self.path).await?;

        tracing::debug!(
            path = %self.path.display(),
            members = snapshot.members.len(),
            "Saved cache snapshot"
        );
        Ok(())
    }

    async fn clear(&self) -> AppResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), "Cache cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

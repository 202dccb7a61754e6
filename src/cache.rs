use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::data_models::{FilterRecord, Kind, SearchResult};
use crate::error::Result;

/// File name of a cached page: a digest, so any dork text is filesystem safe.
pub fn page_cache_key(kind: Kind, dork: &str, page: usize) -> String {
    let digest = Sha256::digest(format!("{kind}_{dork}_{page}").as_bytes());
    format!("{digest:x}.json")
}

/// Name of a full-result file. Kept readable so operators can grep for it.
pub fn local_result_key(kind: Kind, dork: &str, count: usize) -> String {
    format!("{kind}_{}_{count}", urlencoding::encode(dork))
}

/// Filesystem-backed per-page cache plus the full-result local store.
///
/// No locking is done: concurrent writers of the same file simply overwrite
/// each other. Read and decode failures are reported as misses.
#[derive(Debug, Clone)]
pub struct ResultStore {
    cache_dir: PathBuf,
    data_dir: PathBuf,
    ttl: chrono::Duration,
}

impl ResultStore {
    pub fn new(cache_dir: PathBuf, data_dir: PathBuf, ttl: chrono::Duration) -> Self {
        Self {
            cache_dir,
            data_dir,
            ttl,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.cache_path.clone(),
            config.data_path.clone(),
            config.ttl(),
        )
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn is_expired(&self, modified: DateTime<Utc>) -> bool {
        Utc::now().signed_duration_since(modified) > self.ttl
    }

    async fn modified(path: &Path) -> Option<DateTime<Utc>> {
        let meta = tokio::fs::metadata(path).await.ok()?;
        meta.modified().ok().map(DateTime::<Utc>::from)
    }

    /// Checks a cache file, removing it when it is older than the TTL.
    pub async fn has_cached(&self, path: &Path) -> bool {
        let Some(modified) = Self::modified(path).await else {
            return false;
        };
        if self.is_expired(modified) {
            log::debug!("cache file expired, removing: {}", path.display());
            if let Err(e) = tokio::fs::remove_file(path).await {
                log::warn!("failed to remove expired cache file {}: {e}", path.display());
            }
            return false;
        }
        true
    }

    async fn read_result(path: &Path) -> Option<SearchResult> {
        let bytes = tokio::fs::read(path).await.ok()?;
        match serde_json::from_slice::<SearchResult>(&bytes) {
            Ok(mut result) => {
                result.raw = bytes;
                Some(result)
            }
            Err(e) => {
                log::debug!("ignoring undecodable file {}: {e}", path.display());
                None
            }
        }
    }

    /// Reads a cached page, or `None` on miss, expiry or corruption.
    pub async fn read_page(&self, key: &str) -> Option<SearchResult> {
        let path = self.cache_dir.join(key);
        if !self.has_cached(&path).await {
            return None;
        }
        Self::read_result(&path).await
    }

    pub async fn write_page(&self, key: &str, result: &SearchResult) -> Result<()> {
        let data = serde_json::to_vec(result)?;
        write_file(&self.cache_dir.join(key), &data).await
    }

    /// Reads a saved full result. Expired files are ignored but left in place.
    pub async fn read_local(&self, name: &str) -> Option<SearchResult> {
        let path = self.data_dir.join(format!("{name}.json"));
        let modified = Self::modified(&path).await?;
        if self.is_expired(modified) {
            log::debug!("local result expired: {}", path.display());
            return None;
        }
        Self::read_result(&path).await
    }

    /// Writes `<name>.json` (and `<name>_filtered.json` when the result
    /// carries filter output) into the data directory.
    pub async fn save(&self, result: &SearchResult, name: &str) -> Result<PathBuf> {
        let path = self.data_dir.join(format!("{name}.json"));
        let data = serde_json::to_vec(result)?;
        write_file(&path, &data).await?;

        if !result.filter_cache.is_empty() {
            let filtered = self.data_dir.join(format!("{name}_filtered.json"));
            if let Err(e) = self.save_filtered(&result.filter_cache, &filtered).await {
                log::warn!("failed to save filtered data {}: {e}", filtered.display());
            }
        }
        Ok(std::path::absolute(&path)?)
    }

    pub async fn save_filtered(&self, records: &[FilterRecord], path: &Path) -> Result<PathBuf> {
        let data = serde_json::to_vec(records)?;
        write_file(path, &data).await?;
        Ok(std::path::absolute(path)?)
    }

    /// Loads a previously saved result. Unlike cache reads, failures here are
    /// returned to the caller.
    pub async fn load(path: &Path) -> Result<SearchResult> {
        let bytes = tokio::fs::read(path).await?;
        let mut result: SearchResult = serde_json::from_slice(&bytes)?;
        result.kind = Some(infer_kind(&result));
        result.raw = bytes;
        Ok(result)
    }

    /// Removes every per-page cache file and returns how many were deleted.
    pub async fn clean(&self) -> Result<usize> {
        let mut entries = match tokio::fs::read_dir(&self.cache_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                tokio::fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }
        log::info!("removed {removed} cache files from {}", self.cache_dir.display());
        Ok(removed)
    }
}

/// Web matches carry a `site` field that host matches never have.
pub fn infer_kind(result: &SearchResult) -> Kind {
    match result.matches.first() {
        Some(record) if record.contains("site") => Kind::Web,
        _ => Kind::Host,
    }
}

async fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(path, data).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }
    Ok(())
}

//! Disk tier: one JSON file per key under a dedicated cache directory
//!
//! File names are the SHA-256 digest of the key, so arbitrary query text maps
//! to a safe name. Each file embeds the key and both timestamps; an in-memory
//! index of those fields is rebuilt from the directory on open and drives
//! expiry sweeps and capacity eviction without re-reading every file.

use crate::cache::{
    config::LevelConfig,
    entry::CacheEntry,
    key::CacheNamespace,
    level::{excess_oldest, CacheLevel, LevelCounters},
    types::{LevelKind, LevelStats},
};
use crate::clock::Clock;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const ENTRY_EXTENSION: &str = "entry";
const TMP_EXTENSION: &str = "tmp";

/// On-disk layout of one entry
#[derive(Debug, Serialize, Deserialize)]
struct DiskRecord<T> {
    key: String,
    entry: CacheEntry<T>,
}

/// Index row for one file
#[derive(Debug, Clone)]
struct IndexedFile {
    key: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// File-backed cache tier
pub struct DiskLevel<T> {
    dir: PathBuf,
    config: LevelConfig,
    clock: Arc<dyn Clock>,
    /// file name -> indexed metadata; the lock also serializes file I/O
    index: Mutex<HashMap<String, IndexedFile>>,
    counters: LevelCounters,
    _value: PhantomData<fn() -> T>,
}

impl<T> DiskLevel<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Open (creating if needed) the cache directory and index existing files
    pub async fn open(
        dir: impl Into<PathBuf>,
        config: LevelConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;

        let index = Self::scan(&dir).await?;
        info!(
            "Opened disk cache level at {:?} ({} entries)",
            dir,
            index.len()
        );

        Ok(Self {
            dir,
            config,
            clock,
            index: Mutex::new(index),
            counters: LevelCounters::default(),
            _value: PhantomData,
        })
    }

    /// Directory holding the entry files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(key: &str) -> String {
        format!("{:x}.{}", Sha256::digest(key.as_bytes()), ENTRY_EXTENSION)
    }

    /// Rebuild the index from the files on disk, deleting unreadable ones
    /// and temporaries left by interrupted writes
    async fn scan(dir: &Path) -> Result<HashMap<String, IndexedFile>> {
        let mut index = HashMap::new();
        let mut read_dir = fs::read_dir(dir).await?;

        while let Some(dirent) = read_dir.next_entry().await? {
            let path = dirent.path();
            match path.extension().and_then(|e| e.to_str()) {
                Some(ENTRY_EXTENSION) => {}
                Some(TMP_EXTENSION) => {
                    debug!("Removing leftover temporary file {:?}", path);
                    remove_file(&path).await;
                    continue;
                }
                _ => continue,
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                continue;
            };

            match read_record::<T>(&path).await {
                Ok(Some(record)) => {
                    index.insert(
                        name,
                        IndexedFile {
                            key: record.key,
                            created_at: record.entry.created_at,
                            expires_at: record.entry.expires_at,
                        },
                    );
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Removing unreadable cache file {:?}: {}", path, e);
                    remove_file(&path).await;
                }
            }
        }

        Ok(index)
    }

    async fn write_record(&self, name: &str, record: &DiskRecord<T>) -> Result<()> {
        let bytes = serde_json::to_vec(record)?;
        let path = self.dir.join(name);
        let tmp = path.with_extension(TMP_EXTENSION);

        let written = match fs::write(&tmp, bytes).await {
            Ok(()) => fs::rename(&tmp, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn remove_indexed(&self, index: &mut HashMap<String, IndexedFile>, names: &[String]) {
        for name in names {
            index.remove(name);
            remove_file(&self.dir.join(name)).await;
        }
    }

    async fn remove_expired(&self, index: &mut HashMap<String, IndexedFile>) -> usize {
        let now = self.clock.now();
        let expired: Vec<String> = index
            .iter()
            .filter(|(_, file)| now >= file.expires_at)
            .map(|(name, _)| name.clone())
            .collect();

        self.remove_indexed(index, &expired).await;
        self.counters.expired(expired.len());
        expired.len()
    }
}

async fn read_record<T: DeserializeOwned>(path: &Path) -> Result<Option<DiskRecord<T>>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_slice(&bytes)?))
}

async fn remove_file(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != ErrorKind::NotFound {
            warn!("Failed to remove cache file {:?}: {}", path, e);
        }
    }
}

#[async_trait]
impl<T> CacheLevel<T> for DiskLevel<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn kind(&self) -> LevelKind {
        LevelKind::Disk
    }

    fn ttl(&self) -> Duration {
        self.config.ttl
    }

    fn max_entries(&self) -> usize {
        self.config.max_entries
    }

    async fn get(&self, key: &str) -> Option<CacheEntry<T>> {
        let name = Self::file_name(key);
        let path = self.dir.join(&name);
        let mut index = self.index.lock().await;

        let record = match read_record::<T>(&path).await {
            Ok(Some(record)) if record.key == key => record,
            Ok(_) => {
                index.remove(&name);
                self.counters.read(false);
                return None;
            }
            Err(e) => {
                warn!("Treating unreadable cache file for {} as a miss: {}", key, e);
                index.remove(&name);
                remove_file(&path).await;
                self.counters.read(false);
                return None;
            }
        };

        if record.entry.is_expired_at(self.clock.now()) {
            debug!("Disk entry expired: {}", key);
            index.remove(&name);
            remove_file(&path).await;
            self.counters.expired(1);
            self.counters.read(false);
            return None;
        }

        debug!("Disk hit: {}", key);
        self.counters.read(true);
        Some(record.entry)
    }

    async fn set(&self, key: &str, entry: CacheEntry<T>) {
        let name = Self::file_name(key);
        let mut index = self.index.lock().await;

        if !index.contains_key(&name) && index.len() >= self.config.max_entries {
            let oldest = index
                .iter()
                .min_by_key(|(_, file)| file.created_at)
                .map(|(name, _)| name.clone());
            if let Some(oldest) = oldest {
                debug!("Evicting disk entry due to max_entries limit: {}", oldest);
                self.remove_indexed(&mut index, &[oldest]).await;
                self.counters.evicted(1);
            }
        }

        let indexed = IndexedFile {
            key: key.to_string(),
            created_at: entry.created_at,
            expires_at: entry.expires_at,
        };
        let record = DiskRecord {
            key: key.to_string(),
            entry,
        };

        match self.write_record(&name, &record).await {
            Ok(()) => {
                index.insert(name, indexed);
                self.counters.write();
            }
            Err(e) => warn!("Dropping disk cache write for {}: {}", key, e),
        }
    }

    async fn clear(&self) {
        let mut index = self.index.lock().await;
        index.clear();

        let mut removed = 0usize;
        match fs::read_dir(&self.dir).await {
            Ok(mut read_dir) => loop {
                match read_dir.next_entry().await {
                    Ok(Some(dirent)) => {
                        let path = dirent.path();
                        match path.extension().and_then(|e| e.to_str()) {
                            Some(ENTRY_EXTENSION) => {
                                remove_file(&path).await;
                                removed += 1;
                            }
                            Some(TMP_EXTENSION) => remove_file(&path).await,
                            _ => {}
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Failed to list disk cache directory: {}", e);
                        break;
                    }
                }
            },
            Err(e) => warn!("Failed to clear disk cache directory {:?}: {}", self.dir, e),
        }

        info!("Cleared {} entries from disk level", removed);
    }

    async fn clear_namespace(&self, namespace: CacheNamespace) {
        let mut index = self.index.lock().await;
        let names: Vec<String> = index
            .iter()
            .filter(|(_, file)| namespace.contains(&file.key))
            .map(|(name, _)| name.clone())
            .collect();
        self.remove_indexed(&mut index, &names).await;
        debug!("Cleared {} {} entries from disk level", names.len(), namespace);
    }

    async fn evict_expired(&self) {
        let mut index = self.index.lock().await;
        let removed = self.remove_expired(&mut index).await;
        if removed > 0 {
            debug!("Disk level: removed {} expired entries", removed);
        }
    }

    async fn optimize(&self) {
        let mut index = self.index.lock().await;
        self.remove_expired(&mut index).await;

        let ages = index
            .iter()
            .map(|(name, file)| (name.clone(), file.created_at))
            .collect();
        let excess = excess_oldest(ages, self.config.max_entries);
        self.remove_indexed(&mut index, &excess).await;
        self.counters.evicted(excess.len());
    }

    async fn len(&self) -> usize {
        self.index.lock().await.len()
    }

    async fn stats(&self) -> LevelStats {
        let entries = self.index.lock().await.len();
        self.counters.snapshot(entries)
    }
}

//! Identity storage adapters.
//!
//! ## File layout
//!
//! One JSON document per peer, named after the lowercase hex identity:
//!
//! ```text
//! identities/
//!   3f1c...e2.json   {"lastSeenHostname": "10.0.0.7", "lastSeenPort": 6001,
//!                     "publicKeyPEM": "-----BEGIN PUBLIC KEY-----\n..."}
//! ```

use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use shared_crypto::{PeerIdentity, PeerPublicKey};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::domain::{StorageError, StoredIdentity};
use crate::ports::PeerIdentityStorage;

/// Records not read for this long are dropped from the in-process cache.
pub const CACHE_EXPIRY: Duration = Duration::from_secs(60 * 60);

/// Records kept in the in-process cache.
pub const CACHE_CAPACITY: usize = 1024;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_seen_hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_seen_port: Option<u16>,
    #[serde(rename = "publicKeyPEM")]
    public_key_pem: String,
}

#[derive(Debug)]
struct CachedRecord {
    record: StoredIdentity,
    last_access: Instant,
}

/// Folder of `<identity>.json` files with a read-through cache.
#[derive(Debug)]
pub struct FilePeerIdentityStorage {
    folder: PathBuf,
    cache: Mutex<LruCache<PeerIdentity, CachedRecord>>,
    cache_expiry: Duration,
}

impl FilePeerIdentityStorage {
    /// Open (and create if missing) the identity folder.
    pub fn open(folder: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let folder = folder.into();
        fs::create_dir_all(&folder).map_err(|source| StorageError::Io {
            path: folder.display().to_string(),
            source,
        })?;
        Ok(Self {
            folder,
            cache: Mutex::new(LruCache::new(cache_capacity(CACHE_CAPACITY))),
            cache_expiry: CACHE_EXPIRY,
        })
    }

    /// Replace the cache bounds.
    pub fn with_cache(mut self, capacity: usize, expiry: Duration) -> Self {
        self.cache = Mutex::new(LruCache::new(cache_capacity(capacity)));
        self.cache_expiry = expiry;
        self
    }

    /// Folder the records live in.
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    fn path_of(&self, identity: &PeerIdentity) -> PathBuf {
        self.folder.join(format!("{}.json", identity.to_hex()))
    }

    fn read_file(path: &Path, expected: Option<&PeerIdentity>) -> Result<StoredIdentity, StorageError> {
        let corrupt = |reason: String| StorageError::Corrupt {
            path: path.display().to_string(),
            reason,
        };

        let json = fs::read_to_string(path).map_err(|source| StorageError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file: IdentityFile = serde_json::from_str(&json).map_err(|e| corrupt(e.to_string()))?;
        let public_key =
            PeerPublicKey::from_pem(&file.public_key_pem).map_err(|e| corrupt(e.to_string()))?;

        let filed_under = match expected {
            Some(identity) => *identity,
            None => path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| PeerIdentity::from_hex(stem).ok())
                .ok_or_else(|| corrupt("file name is not an identity".into()))?,
        };
        if public_key.identity() != filed_under {
            return Err(StorageError::IdentityMismatch(filed_under));
        }

        Ok(StoredIdentity {
            last_seen_hostname: file.last_seen_hostname,
            last_seen_port: file.last_seen_port,
            public_key,
        })
    }

    fn cache_get(&self, identity: &PeerIdentity) -> Option<StoredIdentity> {
        let mut cache = self.cache.lock();
        let now = Instant::now();
        let cached = cache.get_mut(identity)?;
        if now.duration_since(cached.last_access) >= self.cache_expiry {
            cache.pop(identity);
            return None;
        }
        cached.last_access = now;
        Some(cached.record.clone())
    }

    fn cache_put(&self, record: StoredIdentity) {
        self.cache.lock().put(
            record.identity(),
            CachedRecord {
                record,
                last_access: Instant::now(),
            },
        );
    }
}

impl PeerIdentityStorage for FilePeerIdentityStorage {
    fn retrieve(&self, identity: &PeerIdentity) -> Result<Option<StoredIdentity>, StorageError> {
        if let Some(record) = self.cache_get(identity) {
            return Ok(Some(record));
        }

        let path = self.path_of(identity);
        match Self::read_file(&path, Some(identity)) {
            Ok(record) => {
                self.cache_put(record.clone());
                Ok(Some(record))
            }
            Err(StorageError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn store(&self, record: StoredIdentity) -> Result<(), StorageError> {
        let path = self.path_of(&record.identity());
        let public_key_pem = record
            .public_key
            .to_pem()
            .map_err(|e| StorageError::Corrupt {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        let file = IdentityFile {
            last_seen_hostname: record.last_seen_hostname.clone(),
            last_seen_port: record.last_seen_port,
            public_key_pem,
        };
        let json = serde_json::to_string_pretty(&file).map_err(|e| StorageError::Corrupt {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        fs::write(&path, json).map_err(|source| StorageError::Io {
            path: path.display().to_string(),
            source,
        })?;
        debug!(peer = %record.identity(), path = %path.display(), "Stored peer identity");
        self.cache_put(record);
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<StoredIdentity>, StorageError> {
        let entries = fs::read_dir(&self.folder).map_err(|source| StorageError::Io {
            path: self.folder.display().to_string(),
            source,
        })?;

        let mut records = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match Self::read_file(&path, None) {
                Ok(record) => records.push(record),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable identity file"),
            }
        }
        Ok(records)
    }
}

fn cache_capacity(capacity: usize) -> NonZeroUsize {
    NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)
}

/// Identity store kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryPeerIdentityStorage {
    records: RwLock<HashMap<PeerIdentity, StoredIdentity>>,
}

impl InMemoryPeerIdentityStorage {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-filled with `records`.
    pub fn with_records(records: impl IntoIterator<Item = StoredIdentity>) -> Self {
        let store = Self::new();
        {
            let mut map = store.records.write();
            for record in records {
                map.insert(record.identity(), record);
            }
        }
        store
    }
}

impl PeerIdentityStorage for InMemoryPeerIdentityStorage {
    fn retrieve(&self, identity: &PeerIdentity) -> Result<Option<StoredIdentity>, StorageError> {
        Ok(self.records.read().get(identity).cloned())
    }

    fn store(&self, record: StoredIdentity) -> Result<(), StorageError> {
        self.records.write().insert(record.identity(), record);
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<StoredIdentity>, StorageError> {
        Ok(self.records.read().values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_crypto::testing::test_host_key;

    fn record(slot: usize) -> StoredIdentity {
        StoredIdentity::with_address(test_host_key(slot).public_key().clone(), "10.1.2.3", 6001)
    }

    // =========================================================================
    // TEST GROUP 1: File storage
    // =========================================================================

    #[test]
    fn test_store_then_retrieve_from_fresh_instance() {
        let dir = tempfile::tempdir().unwrap();
        let stored = record(1);
        FilePeerIdentityStorage::open(dir.path())
            .unwrap()
            .store(stored.clone())
            .unwrap();

        let reopened = FilePeerIdentityStorage::open(dir.path()).unwrap();
        assert_eq!(reopened.retrieve(&stored.identity()).unwrap(), Some(stored));
    }

    #[test]
    fn test_file_format() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FilePeerIdentityStorage::open(dir.path()).unwrap();
        let stored = record(1);
        storage.store(stored.clone()).unwrap();

        let path = dir.path().join(format!("{}.json", stored.identity().to_hex()));
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(json["lastSeenHostname"], "10.1.2.3");
        assert_eq!(json["lastSeenPort"], 6001);
        assert!(json["publicKeyPEM"]
            .as_str()
            .unwrap()
            .starts_with("-----BEGIN PUBLIC KEY-----"));
    }

    #[test]
    fn test_unknown_identity_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FilePeerIdentityStorage::open(dir.path()).unwrap();

        assert_eq!(storage.retrieve(&test_host_key(2).identity()).unwrap(), None);
    }

    #[test]
    fn test_key_must_match_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FilePeerIdentityStorage::open(dir.path()).unwrap();
        storage.store(record(1)).unwrap();

        // file of peer 1 renamed to identity of peer 2
        let from = dir.path().join(format!("{}.json", test_host_key(1).identity().to_hex()));
        let victim = test_host_key(2).identity();
        fs::rename(&from, dir.path().join(format!("{}.json", victim.to_hex()))).unwrap();

        let fresh = FilePeerIdentityStorage::open(dir.path()).unwrap();
        assert!(matches!(
            fresh.retrieve(&victim),
            Err(StorageError::IdentityMismatch(id)) if id == victim
        ));
    }

    #[test]
    fn test_load_all_skips_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FilePeerIdentityStorage::open(dir.path()).unwrap();
        storage.store(record(1)).unwrap();
        storage
            .store(StoredIdentity::new(test_host_key(2).public_key().clone()))
            .unwrap();
        fs::write(dir.path().join("garbage.json"), "{not json").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut loaded = storage.load_all().unwrap();
        loaded.sort_by_key(|r| r.identity());
        assert_eq!(loaded.len(), 2);
        assert!(loaded.iter().any(|r| r.address().is_none()));
    }

    #[test]
    fn test_expired_cache_entry_is_read_again() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FilePeerIdentityStorage::open(dir.path())
            .unwrap()
            .with_cache(CACHE_CAPACITY, Duration::ZERO);
        let stored = record(1);
        storage.store(stored.clone()).unwrap();

        // only the file can answer now
        fs::remove_file(dir.path().join(format!("{}.json", stored.identity().to_hex()))).unwrap();
        assert_eq!(storage.retrieve(&stored.identity()).unwrap(), None);
    }

    #[test]
    fn test_cache_keeps_most_recent_records() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FilePeerIdentityStorage::open(dir.path())
            .unwrap()
            .with_cache(1, CACHE_EXPIRY);
        let (first, second) = (record(1), record(2));
        storage.store(first.clone()).unwrap();
        storage.store(second.clone()).unwrap();
        for stored in [&first, &second] {
            fs::remove_file(dir.path().join(format!("{}.json", stored.identity().to_hex())))
                .unwrap();
        }

        assert_eq!(storage.retrieve(&first.identity()).unwrap(), None);
        assert_eq!(storage.retrieve(&second.identity()).unwrap(), Some(second));
    }

    // =========================================================================
    // TEST GROUP 2: In-memory storage
    // =========================================================================

    #[test]
    fn test_in_memory_round_trip() {
        let storage = InMemoryPeerIdentityStorage::with_records([record(1)]);
        assert!(storage.retrieve(&test_host_key(1).identity()).unwrap().is_some());

        storage.store(record(2)).unwrap();
        assert_eq!(storage.load_all().unwrap().len(), 2);
    }
}

// Local persistent cache - string key/value storage for guest-mode state

use log::warn;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::RwLock;

/// Key/value storage that survives restarts on this device only.
pub trait LocalCache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, String>;

    /// Replace the value under `key` in a single write.
    fn set(&self, key: &str, value: &str) -> Result<(), String>;
}

/// Cache backed by one JSON object on disk.
///
/// Every `set` rewrites the whole file through a temporary file and an atomic
/// rename, so readers never observe a half-written value.
pub struct FileCache {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileCache {
    /// Open (or lazily create) the cache file at `path`.
    ///
    /// A missing file is an empty cache. A file that is not a JSON object of
    /// strings is logged and treated as empty; the next `set` replaces it.
    pub fn open(path: PathBuf) -> Result<Self, String> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create cache directory: {}", e))?;
            }
        }

        let entries = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| format!("Failed to read cache file: {}", e))?;
            match serde_json::from_str::<BTreeMap<String, String>>(&contents) {
                Ok(map) => map,
                Err(e) => {
                    warn!("Cache: Failed to parse {}: {}. Starting empty.", path.display(), e);
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn save_to_file(&self, entries: &BTreeMap<String, String>) -> Result<(), String> {
        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| format!("Failed to serialize cache: {}", e))?;

        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, json)
            .map_err(|e| format!("Failed to write temporary cache file: {}", e))?;

        std::fs::rename(&temp_path, &self.path)
            .map_err(|e| format!("Failed to rename cache file: {}", e))?;

        Ok(())
    }
}

impl LocalCache for FileCache {
    fn get(&self, key: &str) -> Result<Option<String>, String> {
        let entries = self.entries.read()
            .map_err(|e| format!("Failed to acquire read lock: {}", e))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), String> {
        let mut entries = self.entries.write()
            .map_err(|e| format!("Failed to acquire write lock: {}", e))?;

        let mut updated = entries.clone();
        updated.insert(key.to_string(), value.to_string());

        // Disk first; memory only changes if the write landed.
        self.save_to_file(&updated)?;
        *entries = updated;
        Ok(())
    }
}

/// Process-lifetime cache, for tests and hosts without a writable disk.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalCache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<String>, String> {
        let entries = self.entries.read()
            .map_err(|e| format!("Failed to acquire read lock: {}", e))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), String> {
        self.entries.write()
            .map_err(|e| format!("Failed to acquire write lock: {}", e))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_cache_get_set() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get("k").unwrap(), None);
        cache.set("k", "v1").unwrap();
        cache.set("k", "v2").unwrap();
        assert_eq!(cache.get("k").unwrap().as_deref(), Some("v2"));
    }

    #[test]
    fn test_file_cache_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let cache = FileCache::open(path.clone()).unwrap();
        cache.set("guestSelectedApps", r#"["1","3"]"#).unwrap();
        drop(cache);

        let reopened = FileCache::open(path).unwrap();
        assert_eq!(
            reopened.get("guestSelectedApps").unwrap().as_deref(),
            Some(r#"["1","3"]"#)
        );
    }

    #[test]
    fn test_file_cache_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("cache.json");
        let cache = FileCache::open(path.clone()).unwrap();
        cache.set("a", "b").unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_file_cache_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{ not json").unwrap();

        let cache = FileCache::open(path.clone()).unwrap();
        assert_eq!(cache.get("anything").unwrap(), None);

        cache.set("k", "v").unwrap();
        let reopened = FileCache::open(path).unwrap();
        assert_eq!(reopened.get("k").unwrap().as_deref(), Some("v"));
    }
}

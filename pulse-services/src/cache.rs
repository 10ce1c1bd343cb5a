//! Response Cache
//!
//! SQLite-backed key/value cache for normalized upstream responses, one row
//! per logical request identity. Entries expire lazily: a stale or
//! unreadable row is deleted on the read that discovers it, there is no
//! background sweep. The cache never fails its caller; storage errors
//! degrade to a miss on read and a no-op on write, so a broken cache file
//! costs an extra upstream call rather than a request.
//!
//! Keys carry a version suffix (`analysis_v3_...`) tied to the payload
//! shape. Bump the suffix whenever the cached shape changes so old rows
//! read as misses instead of deserializing into the wrong type.

use std::path::Path;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use pulse_core::{PulseError, PulseResult};

/// Entry lifetime: 2 hours
pub const CACHE_TTL_MS: i64 = 2 * 60 * 60 * 1000;

/// SQLite-backed response cache
pub struct ResponseCache {
    db_path: String,
    ttl_ms: i64,
}

impl ResponseCache {
    /// Open (or create) the cache at the given path
    pub fn new(db_path: impl AsRef<Path>) -> PulseResult<Self> {
        let db_path = db_path
            .as_ref()
            .to_str()
            .ok_or_else(|| PulseError::config("cache path is not valid UTF-8"))?
            .to_string();

        if let Some(parent) = Path::new(&db_path).parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let cache = Self {
            db_path,
            ttl_ms: CACHE_TTL_MS,
        };
        cache.init_db().map_err(|e| {
            PulseError::internal(format!("Failed to initialize cache schema: {}", e))
        })?;

        info!("Initialized response cache at: {}", cache.db_path);
        Ok(cache)
    }

    fn init_db(&self) -> Result<(), rusqlite::Error> {
        let conn = self.connection()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                stored_at INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    fn connection(&self) -> Result<Connection, rusqlite::Error> {
        Connection::open(&self.db_path)
    }

    /// Read a cached value
    ///
    /// Returns `None` for a missing, expired, or undeserializable entry;
    /// expired and undeserializable rows are deleted on the way out.
    /// Storage errors are logged and reported as a miss.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.try_get(key) {
            Ok(value) => value,
            Err(e) => {
                debug!("Cache read failed for {}: {}", key, e);
                None
            }
        }
    }

    fn try_get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, rusqlite::Error> {
        let conn = self.connection()?;

        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT data, stored_at FROM cache_entries WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((data, stored_at)) = row else {
            return Ok(None);
        };

        let age_ms = Utc::now().timestamp_millis() - stored_at;
        if age_ms > self.ttl_ms {
            debug!("Cache entry {} expired ({}ms old), removing", key, age_ms);
            conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])?;
            return Ok(None);
        }

        match serde_json::from_str(&data) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                // A row that no longer matches the expected shape is as good
                // as absent; drop it so the next write replaces it cleanly.
                debug!("Cache entry {} undeserializable ({}), removing", key, e);
                conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])?;
                Ok(None)
            }
        }
    }

    /// Store a value under `key`, replacing any prior entry
    ///
    /// A failed write is logged and swallowed; it must not fail the fetch
    /// whose result it was persisting.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) {
        if let Err(e) = self.try_set(key, value) {
            warn!("Cache write failed for {}: {}", key, e);
        }
    }

    fn try_set<T: Serialize>(&self, key: &str, value: &T) -> PulseResult<()> {
        let data = serde_json::to_string(value)
            .map_err(|e| PulseError::internal(format!("serialize cache entry: {}", e)))?;

        let conn = self
            .connection()
            .map_err(|e| PulseError::internal(format!("open cache: {}", e)))?;

        conn.execute(
            "INSERT OR REPLACE INTO cache_entries (key, data, stored_at) VALUES (?1, ?2, ?3)",
            params![key, data, Utc::now().timestamp_millis()],
        )
        .map_err(|e| PulseError::internal(format!("write cache entry: {}", e)))?;

        Ok(())
    }

    /// Open a cache with a custom TTL (used by expiry tests)
    #[cfg(test)]
    fn with_ttl(db_path: impl AsRef<Path>, ttl_ms: i64) -> PulseResult<Self> {
        let mut cache = Self::new(db_path)?;
        cache.ttl_ms = ttl_ms;
        Ok(cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Payload {
        name: String,
        value: i32,
    }

    fn create_test_cache() -> (ResponseCache, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir");
        let cache = ResponseCache::new(temp_dir.path().join("cache.db")).expect("cache");
        (cache, temp_dir)
    }

    fn payload() -> Payload {
        Payload {
            name: "btc".to_string(),
            value: 42,
        }
    }

    #[test]
    fn get_after_set_returns_the_value() {
        let (cache, _dir) = create_test_cache();
        cache.set("analysis_v3_BTC", &payload());

        let read: Option<Payload> = cache.get("analysis_v3_BTC");
        assert_eq!(read, Some(payload()));
    }

    #[test]
    fn missing_key_is_a_miss() {
        let (cache, _dir) = create_test_cache();
        let read: Option<Payload> = cache.get("nope");
        assert!(read.is_none());
    }

    #[test]
    fn repeated_get_is_idempotent() {
        let (cache, _dir) = create_test_cache();
        cache.set("key", &payload());

        let first: Option<Payload> = cache.get("key");
        let second: Option<Payload> = cache.get("key");
        assert_eq!(first, second);
        assert!(first.is_some());
    }

    #[test]
    fn expired_entry_is_removed_and_reads_as_miss() {
        let temp_dir = TempDir::new().expect("temp dir");
        let cache =
            ResponseCache::with_ttl(temp_dir.path().join("cache.db"), -1).expect("cache");
        cache.set("stale", &payload());

        let read: Option<Payload> = cache.get("stale");
        assert!(read.is_none());

        // The row itself is gone, not just filtered
        let conn = cache.connection().expect("conn");
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))
            .expect("count");
        assert_eq!(count, 0);
    }

    #[test]
    fn undeserializable_entry_reads_as_miss_and_is_removed() {
        let (cache, _dir) = create_test_cache();

        let conn = cache.connection().expect("conn");
        conn.execute(
            "INSERT INTO cache_entries (key, data, stored_at) VALUES (?1, ?2, ?3)",
            params!["bad", "not json at all", Utc::now().timestamp_millis()],
        )
        .expect("insert");

        let read: Option<Payload> = cache.get("bad");
        assert!(read.is_none());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))
            .expect("count");
        assert_eq!(count, 0);
    }

    #[test]
    fn set_overwrites_prior_entry() {
        let (cache, _dir) = create_test_cache();
        cache.set("key", &payload());
        let replacement = Payload {
            name: "eth".to_string(),
            value: 7,
        };
        cache.set("key", &replacement);

        let read: Option<Payload> = cache.get("key");
        assert_eq!(read, Some(replacement));
    }

    #[test]
    fn cache_survives_reopening() {
        let temp_dir = TempDir::new().expect("temp dir");
        let path = temp_dir.path().join("cache.db");

        {
            let cache = ResponseCache::new(&path).expect("cache");
            cache.set("durable", &payload());
        }

        let reopened = ResponseCache::new(&path).expect("cache");
        let read: Option<Payload> = reopened.get("durable");
        assert_eq!(read, Some(payload()));
    }
}

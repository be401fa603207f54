use rusqlite::{params, OptionalExtension};
use tokio_rusqlite::Connection;

use crate::error::StorageError;

use super::kv::KeyValueStore;
use super::schema::SCHEMA;

/// Device-local persistent substrate over a single SQLite table.
pub struct SqliteStore {
    conn: Connection,
    quota_bytes: Option<u64>,
}

impl SqliteStore {
    pub async fn open(db_path: &str, quota_bytes: Option<u64>) -> Result<Self, StorageError> {
        let conn = Connection::open(db_path).await?;
        Self::init(conn, quota_bytes).await
    }

    #[cfg(test)]
    pub async fn open_in_memory(quota_bytes: Option<u64>) -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn, quota_bytes).await
    }

    async fn init(conn: Connection, quota_bytes: Option<u64>) -> Result<Self, StorageError> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn, quota_bytes })
    }
}

impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let key = key.to_string();
        let value = self
            .conn
            .call(move |conn| {
                let value = conn
                    .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                        row.get::<_, String>(0)
                    })
                    .optional()?;
                Ok(value)
            })
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let key = key.to_string();
        let value = value.to_string();
        let quota = self.quota_bytes;

        // Returns the size the write would need when it is over quota.
        let rejected = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;

                if let Some(quota) = quota {
                    let others: i64 = tx.query_row(
                        "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0) FROM kv WHERE key <> ?1",
                        params![key],
                        |row| row.get(0),
                    )?;
                    let needed = others.max(0) as u64 + (key.len() + value.len()) as u64;
                    if needed > quota {
                        return Ok(Some(needed));
                    }
                }

                tx.execute(
                    r#"INSERT INTO kv (key, value) VALUES (?1, ?2)
                       ON CONFLICT(key) DO UPDATE SET
                           value = excluded.value,
                           updated_at = datetime('now')"#,
                    params![key, value],
                )?;
                tx.commit()?;
                Ok(None)
            })
            .await?;

        match (rejected, quota) {
            (Some(needed), Some(quota)) => Err(StorageError::QuotaExceeded { needed, quota }),
            _ => Ok(()),
        }
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let key = key.to_string();
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        let keys = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT key FROM kv ORDER BY key")?;
                let keys = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(keys)
            })
            .await?;
        Ok(keys)
    }

    /// Bytes currently held, counted as key plus value.
    async fn usage_bytes(&self) -> Result<u64, StorageError> {
        let used = self
            .conn
            .call(|conn| {
                let used: i64 = conn.query_row(
                    "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0) FROM kv",
                    [],
                    |row| row.get(0),
                )?;
                Ok(used)
            })
            .await?;
        Ok(used.max(0) as u64)
    }

    fn quota_bytes(&self) -> Option<u64> {
        self.quota_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        let path = path.to_str().unwrap();

        {
            let store = SqliteStore::open(path, None).await.unwrap();
            store.set("channel-report:v1:c1:1", "{}").await.unwrap();
            store.set("channel-report:v1:c1:1", "{\"x\":1}").await.unwrap();
        }

        let store = SqliteStore::open(path, None).await.unwrap();
        assert_eq!(
            store.get("channel-report:v1:c1:1").await.unwrap().as_deref(),
            Some("{\"x\":1}")
        );
        assert_eq!(store.keys().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let store = SqliteStore::open_in_memory(None).await.unwrap();
        store.set("a", "1").await.unwrap();
        store.remove("a").await.unwrap();
        store.remove("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn quota_rejects_and_rolls_back() {
        let store = SqliteStore::open_in_memory(Some(12)).await.unwrap();
        store.set("a", "12345").await.unwrap();
        assert_eq!(store.usage_bytes().await.unwrap(), 6);

        let err = store.set("b", "1234567890").await.unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { needed: 17, quota: 12 }));
        assert_eq!(store.get("b").await.unwrap(), None);
        assert_eq!(store.usage_bytes().await.unwrap(), 6);
    }
}
